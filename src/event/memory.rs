//! In-process partitioned event log
//!
//! Same contract as the broker transport: messages are routed to a partition by
//! key hash, each consumer group keeps a committed offset per partition, and a new
//! subscription resumes from that offset. Uncommitted messages are therefore
//! redelivered to the next subscription of the group.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::Notify;

use super::channel::{Delivery, EventPublisher, EventSource};
use super::error::EventError;

struct Record {
    key: String,
    payload: Vec<u8>,
}

struct State {
    partitions: Vec<Vec<Record>>,
    /// (group, partition) -> next offset to deliver
    committed: HashMap<(String, i32), i64>,
    topic_created: bool,
    closed: bool,
}

pub struct MemoryEventChannel {
    topic: String,
    state: Mutex<State>,
    notify: Notify,
}

impl MemoryEventChannel {
    pub fn new(topic: impl Into<String>, partitions: usize) -> Self {
        let partitions = partitions.max(1);
        Self {
            topic: topic.into(),
            state: Mutex::new(State {
                partitions: (0..partitions).map(|_| Vec::new()).collect(),
                committed: HashMap::new(),
                topic_created: false,
                closed: false,
            }),
            notify: Notify::new(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn partition_count(&self) -> usize {
        self.lock().map(|s| s.partitions.len()).unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, EventError> {
        self.state
            .lock()
            .map_err(|_| EventError::Transport("event log lock poisoned".to_string()))
    }

    fn partition_for(key: &str, partitions: usize) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % partitions as u64) as usize
    }

    /// Open a subscription for `group` on one partition, starting at the
    /// group's committed offset
    pub fn subscribe(self: &Arc<Self>, group: &str, partition: i32) -> Result<MemorySubscription, EventError> {
        let state = self.lock()?;
        if partition < 0 || partition as usize >= state.partitions.len() {
            return Err(EventError::Transport(format!(
                "unknown partition {} for topic {}",
                partition, self.topic
            )));
        }
        let cursor = state
            .committed
            .get(&(group.to_string(), partition))
            .copied()
            .unwrap_or(0);

        Ok(MemorySubscription {
            channel: Arc::clone(self),
            group: group.to_string(),
            partition,
            cursor,
        })
    }

    /// Committed offset of `group` on `partition`
    pub fn committed_offset(&self, group: &str, partition: i32) -> i64 {
        self.lock()
            .ok()
            .and_then(|s| s.committed.get(&(group.to_string(), partition)).copied())
            .unwrap_or(0)
    }

    /// Messages published to `partition` so far
    pub fn len(&self, partition: i32) -> usize {
        self.lock()
            .ok()
            .and_then(|s| s.partitions.get(partition as usize).map(Vec::len))
            .unwrap_or(0)
    }

    /// Wake all subscriptions and make further fetches return `None`
    pub fn close(&self) {
        if let Ok(mut state) = self.lock() {
            state.closed = true;
        }
        self.notify.notify_waiters();
    }
}

#[async_trait]
impl EventPublisher for MemoryEventChannel {
    async fn ensure_topic(&self) -> Result<(), EventError> {
        let mut state = self.lock()?;
        if !state.topic_created {
            state.topic_created = true;
            tracing::info!(topic = %self.topic, partitions = state.partitions.len(), "Topic created");
        }
        Ok(())
    }

    async fn publish(&self, key: &str, payload: &[u8]) -> Result<(), EventError> {
        {
            let mut state = self.lock()?;
            if state.closed {
                return Err(EventError::Closed);
            }
            let partition = Self::partition_for(key, state.partitions.len());
            state.partitions[partition].push(Record {
                key: key.to_string(),
                payload: payload.to_vec(),
            });
        }
        self.notify.notify_waiters();
        Ok(())
    }
}

/// Subscription of one consumer group to one partition
pub struct MemorySubscription {
    channel: Arc<MemoryEventChannel>,
    group: String,
    partition: i32,
    cursor: i64,
}

impl MemorySubscription {
    pub fn partition(&self) -> i32 {
        self.partition
    }
}

#[async_trait]
impl EventSource for MemorySubscription {
    async fn fetch(&mut self) -> Result<Option<Delivery>, EventError> {
        loop {
            let notified = self.channel.notify.notified();
            tokio::pin!(notified);
            // Register before checking so a publish in between is not missed
            notified.as_mut().enable();

            {
                let state = self.channel.lock()?;
                if state.closed {
                    return Ok(None);
                }
                let log = &state.partitions[self.partition as usize];
                if let Some(record) = log.get(self.cursor as usize) {
                    let delivery = Delivery {
                        partition: self.partition,
                        offset: self.cursor,
                        key: Some(record.key.clone()),
                        payload: record.payload.clone(),
                    };
                    self.cursor += 1;
                    return Ok(Some(delivery));
                }
            }

            notified.await;
        }
    }

    async fn commit(&mut self, delivery: &Delivery) -> Result<(), EventError> {
        let mut state = self.channel.lock()?;
        let next = delivery.offset + 1;
        let entry = state
            .committed
            .entry((self.group.clone(), delivery.partition))
            .or_insert(0);
        if next > *entry {
            *entry = next;
        }
        Ok(())
    }

    async fn close(&mut self) {
        tracing::debug!(group = %self.group, partition = self.partition, "Subscription closed");
    }
}
