//! Event channel error types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventError {
    /// Payload is not a known event (never retried)
    #[error("malformed event payload: {0}")]
    Decode(String),

    #[error("failed to encode event: {0}")]
    Encode(String),

    #[error("publish failed after {attempts} attempts: {reason}")]
    PublishExhausted { attempts: u32, reason: String },

    /// Broker or transport failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Handler refused the message; it stays uncommitted
    #[error("handler error: {0}")]
    Handler(String),

    #[error("channel closed")]
    Closed,
}

impl EventError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, EventError::Transport(_) | EventError::Handler(_))
    }
}
