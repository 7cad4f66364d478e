//! Publisher and subscription seams, retrying publish and the consumer loop

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use super::envelope::EventEnvelope;
use super::error::EventError;
use super::handler::{EventHandler, dispatch};

/// One fetched message, owned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub partition: i32,
    pub offset: i64,
    pub key: Option<String>,
    pub payload: Vec<u8>,
}

/// Producer side of the channel
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Create the topic if it does not exist yet
    async fn ensure_topic(&self) -> Result<(), EventError>;

    /// Single publish attempt
    async fn publish(&self, key: &str, payload: &[u8]) -> Result<(), EventError>;
}

/// Consumer side: one subscription per partition assignment
#[async_trait]
pub trait EventSource: Send {
    /// Wait for the next message. `Ok(None)` means the channel is closed.
    async fn fetch(&mut self) -> Result<Option<Delivery>, EventError>;

    /// Mark `delivery` processed for the consumer group
    async fn commit(&mut self, delivery: &Delivery) -> Result<(), EventError>;

    /// Release the underlying reader
    async fn close(&mut self);
}

/// Bounded publish retry
#[derive(Debug, Clone, Copy)]
pub struct PublishRetry {
    pub attempts: u32,
    /// Delay before attempt `n` is `backoff * n`
    pub backoff: Duration,
}

impl Default for PublishRetry {
    fn default() -> Self {
        Self {
            attempts: 4,
            backoff: Duration::from_millis(100),
        }
    }
}

/// Publish with bounded retries, creating the topic on first use
pub async fn publish_with_retry(
    publisher: &dyn EventPublisher,
    key: &str,
    payload: &[u8],
    retry: PublishRetry,
) -> Result<(), EventError> {
    let attempts = retry.attempts.max(1);
    let mut last_error = String::new();

    for attempt in 1..=attempts {
        let result = match publisher.ensure_topic().await {
            Ok(()) => publisher.publish(key, payload).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                if attempt > 1 {
                    tracing::info!(attempt, key, "Event published after retry");
                }
                return Ok(());
            }
            Err(e) => {
                tracing::warn!(attempt, max_attempts = attempts, key, error = %e, "Event publish failed");
                last_error = e.to_string();
                if attempt < attempts {
                    tokio::time::sleep(retry.backoff * attempt).await;
                }
            }
        }
    }

    Err(EventError::PublishExhausted {
        attempts,
        reason: last_error,
    })
}

/// Encode and publish an envelope keyed by its partition key
pub async fn publish_event(
    publisher: &dyn EventPublisher,
    envelope: &EventEnvelope,
    retry: PublishRetry,
) -> Result<(), EventError> {
    let payload = envelope.encode()?;
    publish_with_retry(publisher, &envelope.partition_key(), &payload, retry).await
}

/// Counters reported when a consumer loop exits
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConsumerStats {
    pub handled: u64,
    pub failed: u64,
    pub malformed: u64,
}

const FETCH_ERROR_BACKOFF: Duration = Duration::from_millis(200);

/// Long-running subscription loop
///
/// Processes one message at a time. The offset is committed only when the handler
/// succeeds; malformed payloads are committed and skipped since a retry cannot fix
/// them. Handler and fetch errors are logged, never propagated. Shutdown is checked
/// between messages only, so an in-flight handler always runs to completion.
pub async fn run_consumer<S: EventSource>(
    mut source: S,
    handler: Arc<dyn EventHandler>,
    mut shutdown: watch::Receiver<bool>,
) -> ConsumerStats {
    let mut stats = ConsumerStats::default();

    loop {
        if *shutdown.borrow() {
            break;
        }

        let fetched = tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
            fetched = source.fetch() => fetched,
        };

        let delivery = match fetched {
            Ok(Some(delivery)) => delivery,
            Ok(None) => {
                tracing::info!("Event channel closed");
                break;
            }
            Err(e) => {
                tracing::error!(error = %e, "Event fetch failed");
                tokio::time::sleep(FETCH_ERROR_BACKOFF).await;
                continue;
            }
        };

        let envelope = match EventEnvelope::decode(&delivery.payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                stats.malformed += 1;
                tracing::error!(
                    partition = delivery.partition,
                    offset = delivery.offset,
                    error = %e,
                    "Dropping malformed event"
                );
                commit(&mut source, &delivery).await;
                continue;
            }
        };

        let kind = envelope.kind();
        match dispatch(handler.as_ref(), envelope).await {
            Ok(()) => {
                stats.handled += 1;
                commit(&mut source, &delivery).await;
            }
            Err(e) => {
                stats.failed += 1;
                tracing::error!(
                    partition = delivery.partition,
                    offset = delivery.offset,
                    event = kind,
                    error = %e,
                    "Event handler failed, offset left uncommitted"
                );
            }
        }
    }

    source.close().await;
    tracing::info!(
        handled = stats.handled,
        failed = stats.failed,
        malformed = stats.malformed,
        "Event consumer stopped"
    );
    stats
}

async fn commit<S: EventSource>(source: &mut S, delivery: &Delivery) {
    if let Err(e) = source.commit(delivery).await {
        tracing::error!(
            partition = delivery.partition,
            offset = delivery.offset,
            error = %e,
            "Offset commit failed"
        );
    }
}
