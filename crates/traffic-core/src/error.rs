//! Error types for the pipeline.
//!
//! Neither error is fatal to the process. A [`SourceError`] ends the ingest
//! loop, a [`DeliveryError`] evicts one delivery target.

/// Errors raised by a [`MessageSource`](crate::ingest::MessageSource).
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The source could not confirm the subscription.
    #[error("subscription to {channel} failed: {message}")]
    Subscribe {
        /// The channel that was being subscribed to.
        channel: String,
        /// Description of the failure.
        message: String,
    },
}

/// Errors raised while sending a payload to a delivery target.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The underlying connection rejected the write.
    #[error("send failed: {0}")]
    Send(String),

    /// The target has already been closed by its peer.
    #[error("target closed")]
    Closed,

    /// The send did not complete within the configured timeout.
    #[error("send timed out after {timeout_ms}ms")]
    Timeout {
        /// The timeout that elapsed, in milliseconds.
        timeout_ms: u128,
    },
}
