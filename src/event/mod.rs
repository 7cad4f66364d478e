//! Event Channel
//!
//! Ordered, partitioned append log with consumer-group semantics.
//!
//! - Publishing retries a bounded number of attempts and creates the topic on first use
//! - A subscription delivers one message at a time per partition
//! - Offsets are committed only after the handler returns `Ok`; a failed message stays
//!   uncommitted and is redelivered when the group resumes

pub mod channel;
pub mod envelope;
pub mod error;
pub mod handler;
#[cfg(feature = "kafka")]
pub mod kafka;
pub mod memory;

pub use channel::{
    ConsumerStats, Delivery, EventPublisher, EventSource, PublishRetry, publish_event,
    publish_with_retry, run_consumer,
};
pub use envelope::{EventEnvelope, TransferEvent};
pub use error::EventError;
pub use handler::{EventHandler, dispatch};
#[cfg(feature = "kafka")]
pub use kafka::{KafkaEventChannel, KafkaSubscription};
pub use memory::{MemoryEventChannel, MemorySubscription};
