//! Redis integration for the traffic monitor backend.
//!
//! Redis plays two roles. Its pub/sub channel is the live source of traffic
//! messages, and its RediSearch index over `packet:*` hashes is queried once
//! at startup to rebuild the latest snapshot.
//!
//! # Modules
//!
//! - [`pubsub`] -- [`RedisSource`], the pub/sub [`MessageSource`]
//! - [`search`] -- [`PacketIndex`], the RediSearch [`LatestIndex`]
//! - [`error`] -- shared error types
//!
//! [`MessageSource`]: traffic_core::MessageSource
//! [`LatestIndex`]: traffic_core::LatestIndex

pub mod error;
pub mod pubsub;
pub mod search;

// Re-export primary types for convenience.
pub use error::DbError;
pub use pubsub::RedisSource;
pub use search::{DEFAULT_SEARCH_LIMIT, PACKET_INDEX, PACKET_PREFIX, PacketIndex};

use fred::prelude::*;

/// Build and connect a client for `url` (`redis://host:port/db`).
///
/// # Errors
///
/// Returns [`DbError::Config`] if the URL cannot be parsed.
/// Returns [`DbError::Redis`] if the connection fails.
pub async fn connect(url: &str) -> Result<Client, DbError> {
    let config = redis_config(url)?;
    let client = Builder::from_config(config).build()?;
    client.init().await?;
    tracing::debug!(url, "Connected to Redis");
    Ok(client)
}

fn redis_config(url: &str) -> Result<Config, DbError> {
    Config::from_url(url).map_err(|e| DbError::Config(format!("Invalid Redis URL {url}: {e}")))
}
