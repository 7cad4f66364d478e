use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WebhookError {
    #[error("webhook transport error: {0}")]
    Transport(String),

    #[error("webhook answered with status {0}")]
    Status(u16),

    #[error("failed to build webhook client: {0}")]
    Client(String),

    /// Delivered, but stamping the transaction processed failed
    #[error("webhook delivered but completion failed: {0}")]
    Completion(String),
}

impl WebhookError {
    /// The receiver got the notification
    pub fn was_delivered(&self) -> bool {
        matches!(self, WebhookError::Completion(_))
    }
}
