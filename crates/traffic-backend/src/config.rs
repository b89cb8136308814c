//! Configuration for the backend binary.
//!
//! All configuration is loaded from environment variables, each with a
//! default. Empty variables count as unset.

use std::time::Duration;

use traffic_core::DEFAULT_FANOUT_CAPACITY;
use traffic_db::DEFAULT_SEARCH_LIMIT;
use traffic_observer::ServerConfig;

use crate::error::BackendError;

/// Complete backend configuration loaded from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    /// Verbose logging when no `RUST_LOG` filter is set.
    pub debug: bool,
    /// Redis `host:port`.
    pub redis_addr: String,
    /// Redis database number.
    pub redis_db: u32,
    /// Pub/sub channel carrying traffic messages.
    pub redis_channel: String,
    /// HTTP listen address.
    pub server: ServerConfig,
    /// Capacity of the fan-out queue.
    pub fanout_capacity: usize,
    /// Maximum records fetched when rebuilding the latest snapshot.
    pub search_limit: usize,
    /// Optional deadline for a single `WebSocket` send.
    pub send_timeout: Option<Duration>,
}

impl BackendConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables (all optional):
    /// - `DEBUG` -- `true` or `1` enables debug logging (default off)
    /// - `REDIS_ADDR` -- Redis `host:port` (default `localhost:6379`)
    /// - `REDIS_DB` -- Redis database number (default `0`)
    /// - `REDIS_CHANNEL` -- traffic channel (default `traffic_channel`)
    /// - `SERVER_PORT` -- listen address, `:port` or `ip:port` (default `:8080`)
    /// - `FANOUT_CAPACITY` -- fan-out queue capacity (default `100`)
    /// - `SEARCH_LIMIT` -- max records for the warm start (default `10000`)
    /// - `DELIVERY_SEND_TIMEOUT_MS` -- per-send timeout (default none)
    pub fn from_env() -> Result<Self, BackendError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, BackendError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.is_empty());

        let debug = get("DEBUG").is_some_and(|v| v == "true" || v == "1");
        let redis_addr = get("REDIS_ADDR").unwrap_or_else(|| "localhost:6379".to_owned());
        let redis_db = parse_or("REDIS_DB", get("REDIS_DB"), 0)?;
        let redis_channel = get("REDIS_CHANNEL").unwrap_or_else(|| "traffic_channel".to_owned());
        let server = parse_listen_addr(&get("SERVER_PORT").unwrap_or_else(|| ":8080".to_owned()))?;

        let fanout_capacity: usize =
            parse_or("FANOUT_CAPACITY", get("FANOUT_CAPACITY"), DEFAULT_FANOUT_CAPACITY)?;
        if fanout_capacity == 0 {
            return Err(BackendError::Config(String::from(
                "FANOUT_CAPACITY must be at least 1",
            )));
        }

        let search_limit = parse_or("SEARCH_LIMIT", get("SEARCH_LIMIT"), DEFAULT_SEARCH_LIMIT)?;

        let send_timeout = get("DELIVERY_SEND_TIMEOUT_MS")
            .map(|raw| parse_or::<u64>("DELIVERY_SEND_TIMEOUT_MS", Some(raw), 0))
            .transpose()?
            .map(Duration::from_millis);

        Ok(Self {
            debug,
            redis_addr,
            redis_db,
            redis_channel,
            server,
            fanout_capacity,
            search_limit,
            send_timeout,
        })
    }

    /// Redis connection URL for the configured address and database.
    pub fn redis_url(&self) -> String {
        format!("redis://{}/{}", self.redis_addr, self.redis_db)
    }
}

fn parse_or<T>(name: &str, raw: Option<String>, default: T) -> Result<T, BackendError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.map_or(Ok(default), |raw| {
        raw.trim()
            .parse()
            .map_err(|e| BackendError::Config(format!("invalid {name} {raw:?}: {e}")))
    })
}

/// Parse `:port` (all interfaces) or `ip:port`.
fn parse_listen_addr(raw: &str) -> Result<ServerConfig, BackendError> {
    let (host, port) = raw
        .rsplit_once(':')
        .ok_or_else(|| BackendError::Config(format!("invalid SERVER_PORT {raw:?}: missing port")))?;

    let port: u16 = port
        .parse()
        .map_err(|e| BackendError::Config(format!("invalid SERVER_PORT {raw:?}: {e}")))?;
    let host = if host.is_empty() { "0.0.0.0" } else { host };

    let config = ServerConfig {
        host: host.to_owned(),
        port,
    };
    config
        .socket_addr()
        .map_err(|e| BackendError::Config(format!("invalid SERVER_PORT {raw:?}: {e}")))?;
    Ok(config)
}
