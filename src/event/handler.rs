//! Typed event handler interface

use async_trait::async_trait;

use super::envelope::{EventEnvelope, TransferEvent};
use super::error::EventError;

/// One method per event kind
///
/// Returning `Err` leaves the message uncommitted.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn on_transfer_requested(&self, event: TransferEvent) -> Result<(), EventError>;
}

/// Route a decoded envelope to its handler method
pub async fn dispatch(handler: &dyn EventHandler, envelope: EventEnvelope) -> Result<(), EventError> {
    match envelope {
        EventEnvelope::TransferRequested(event) => handler.on_transfer_requested(event).await,
    }
}
