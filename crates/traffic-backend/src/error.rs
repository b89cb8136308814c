//! Error types for the backend binary.
//!
//! [`BackendError`] is the top-level error type that wraps all possible
//! failure modes during startup and serving.

/// Top-level error for the backend binary.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Configuration is invalid.
    #[error("config error: {0}")]
    Config(String),

    /// The Redis layer rejected its configuration.
    #[error("redis error: {source}")]
    Db {
        /// The underlying data layer error.
        #[from]
        source: traffic_db::DbError,
    },

    /// The HTTP server failed to bind or serve.
    #[error("server error: {source}")]
    Server {
        /// The underlying server error.
        #[from]
        source: traffic_observer::ServerError,
    },
}
