//! Error types for the Redis layer.
//!
//! All errors are propagated via [`DbError`] which wraps the underlying
//! [`fred`] errors with context about which reply could not be understood.

/// Errors that can occur talking to Redis.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A Redis command or connection failed.
    #[error("Redis error: {0}")]
    Redis(#[from] fred::error::Error),

    /// A reply did not have the expected shape.
    #[error("Unexpected reply to {command}: {detail}")]
    UnexpectedReply {
        /// The command whose reply was rejected.
        command: &'static str,
        /// What was wrong with it.
        detail: String,
    },

    /// The indexed maximum timestamp is not an integer.
    #[error("Malformed timestamp: {0}")]
    MalformedTimestamp(String),

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}
