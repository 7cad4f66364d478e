//! In-memory transaction log (development mode and tests)

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::error::TransactionLogError;
use super::state::TransactionStatus;
use super::store::TransactionLog;
use super::types::{NewTransaction, Stamp, Transaction, TransactionId};

#[derive(Default)]
pub struct MemoryTransactionLog {
    records: DashMap<TransactionId, Transaction>,
    by_key: DashMap<String, TransactionId>,
}

impl MemoryTransactionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Snapshot of every record (test support)
    pub fn all(&self) -> Vec<Transaction> {
        self.records.iter().map(|r| r.value().clone()).collect()
    }
}

#[async_trait]
impl TransactionLog for MemoryTransactionLog {
    async fn create(&self, new: NewTransaction) -> Result<Transaction, TransactionLogError> {
        let tx = Transaction::pending(new);

        if let Some(key) = &tx.idempotency_key {
            match self.by_key.entry(key.clone()) {
                Entry::Occupied(_) => return Err(TransactionLogError::DuplicateKey(key.clone())),
                Entry::Vacant(slot) => {
                    // Record first, so a key hit always finds its record
                    self.records.insert(tx.id, tx.clone());
                    slot.insert(tx.id);
                }
            }
        } else {
            self.records.insert(tx.id, tx.clone());
        }

        Ok(tx)
    }

    async fn get(&self, id: TransactionId) -> Result<Option<Transaction>, TransactionLogError> {
        Ok(self.records.get(&id).map(|r| r.value().clone()))
    }

    async fn find_by_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<Transaction>, TransactionLogError> {
        let id = match self.by_key.get(key) {
            Some(id) => *id,
            None => return Ok(None),
        };
        self.get(id).await
    }

    async fn list(&self, ids: &[TransactionId]) -> Result<Vec<Transaction>, TransactionLogError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.records.get(id).map(|r| r.value().clone()))
            .collect())
    }

    async fn mark_failed(&self, id: TransactionId, error: &str) -> Result<bool, TransactionLogError> {
        let mut record = self
            .records
            .get_mut(&id)
            .ok_or(TransactionLogError::NotFound(id))?;
        if record.status != TransactionStatus::Pending {
            return Ok(false);
        }
        record.status = TransactionStatus::Failed;
        record.err_message = Some(error.to_string());
        record.updated_at = Utc::now();
        Ok(true)
    }

    async fn mark_processed(&self, id: TransactionId) -> Result<Stamp, TransactionLogError> {
        let mut record = self
            .records
            .get_mut(&id)
            .ok_or(TransactionLogError::NotFound(id))?;
        match record.status {
            TransactionStatus::Pending => {
                let now = Utc::now();
                record.status = TransactionStatus::Completed;
                record.processed_at = Some(now);
                record.updated_at = now;
                Ok(Stamp::Stamped)
            }
            TransactionStatus::Completed => Ok(Stamp::AlreadyProcessed),
            TransactionStatus::Failed => Err(TransactionLogError::InvalidTransition {
                from: TransactionStatus::Failed,
                to: TransactionStatus::Completed,
            }),
        }
    }
}
