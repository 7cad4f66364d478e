//! TransactionLog trait

use async_trait::async_trait;

use super::error::TransactionLogError;
use super::types::{NewTransaction, Stamp, Transaction, TransactionId};

/// Persistence contract for transaction records
#[async_trait]
pub trait TransactionLog: Send + Sync {
    /// Insert a PENDING record
    ///
    /// A reused `idempotency_key` is [`TransactionLogError::DuplicateKey`].
    async fn create(&self, new: NewTransaction) -> Result<Transaction, TransactionLogError>;

    async fn get(&self, id: TransactionId) -> Result<Option<Transaction>, TransactionLogError>;

    async fn find_by_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<Transaction>, TransactionLogError>;

    /// Records for the given ids, missing ids skipped
    async fn list(&self, ids: &[TransactionId]) -> Result<Vec<Transaction>, TransactionLogError>;

    /// CAS PENDING -> FAILED with `err_message`
    ///
    /// Returns false if the record was not PENDING.
    async fn mark_failed(&self, id: TransactionId, error: &str) -> Result<bool, TransactionLogError>;

    /// CAS PENDING -> COMPLETED, stamping `processed_at`
    ///
    /// Idempotent: an already COMPLETED record yields [`Stamp::AlreadyProcessed`].
    /// A FAILED record is `InvalidTransition`, a missing one `NotFound`.
    async fn mark_processed(&self, id: TransactionId) -> Result<Stamp, TransactionLogError>;
}
