//! Backend entry point for the traffic monitor.
//!
//! Subscribes to the Redis traffic channel, keeps the rolling snapshot of the
//! newest timestamp, and pushes every raw payload to connected `WebSocket`
//! clients.
//!
//! # Architecture
//!
//! ```text
//! Redis pub/sub --> IngestLoop --+--> AggregateStore <-- GET /latest
//!                                |
//!                                +--> fan-out queue --> DispatchLoop --> /ws clients
//! ```
//!
//! At startup the store is seeded from the RediSearch index. A failed seed
//! or a failed subscription is logged and the HTTP server keeps running.

mod config;
mod error;

use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use traffic_core::{
    AggregateStore, DispatchLoop, IngestLoop, IngestOutcome, Reconstruction, fanout_queue,
    reconstruct,
};
use traffic_db::{PacketIndex, RedisSource};
use traffic_observer::{AppState, start_server};

use crate::config::BackendConfig;
use crate::error::BackendError;

/// Application entry point.
///
/// Loads configuration, initializes logging, seeds the store from Redis,
/// spawns the ingest and dispatch loops, then serves HTTP until the process
/// is terminated.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the server cannot
/// bind its listen address.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = BackendConfig::from_env()?;

    let default_level = if config.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(true)
        .init();

    info!("traffic-backend starting");
    info!(
        redis_addr = config.redis_addr,
        redis_db = config.redis_db,
        channel = config.redis_channel,
        fanout_capacity = config.fanout_capacity,
        search_limit = config.search_limit,
        send_timeout = ?config.send_timeout,
        "configuration loaded"
    );

    run(config).await?;
    Ok(())
}

/// Wire the pipeline together and serve until the process is terminated.
async fn run(config: BackendConfig) -> Result<(), BackendError> {
    let redis_url = config.redis_url();

    // Warm start from the index
    let reconstruction = match PacketIndex::connect(&redis_url, config.search_limit).await {
        Ok(index) => {
            let outcome = reconstruct(&index).await;
            index.close().await;
            outcome
        }
        Err(e) => {
            warn!(error = %e, "Redis unreachable, starting with an empty snapshot");
            Reconstruction::Fallback(e.to_string())
        }
    };

    let store = Arc::new(AggregateStore::new());
    reconstruction.install(&store).await;

    let state = Arc::new(AppState::with_store(Arc::clone(&store)));
    let (queue_tx, queue_rx) = fanout_queue(config.fanout_capacity);

    // Ingest: Redis -> queue + store
    let source = RedisSource::new(&redis_url, &config.redis_channel)?;
    tokio::spawn(async move {
        match IngestLoop::new(source, store, queue_tx).run().await {
            IngestOutcome::SubscribeFailed(e) => {
                error!(error = %e, "ingest stopped, live updates unavailable");
            }
            IngestOutcome::SourceClosed {
                received,
                parse_failures,
            } => {
                warn!(received, parse_failures, "traffic subscription closed");
            }
        }
    });

    // Dispatch: queue -> WebSocket clients
    let dispatch = DispatchLoop::new(queue_rx, Arc::clone(&state.registry))
        .with_send_timeout(config.send_timeout);
    tokio::spawn(async move {
        let cycles = dispatch.run().await;
        info!(cycles, "dispatch loop finished");
    });

    start_server(&config.server, state).await?;
    Ok(())
}
