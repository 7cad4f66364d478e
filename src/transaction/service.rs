//! Transaction operations exposed through the RPC surface

use std::sync::Arc;

use serde::Deserialize;

use super::error::TransactionLogError;
use super::state::TransactionStatus;
use super::store::TransactionLog;
use super::types::{NewTransaction, Stamp, Transaction, TransactionId};
use crate::ledger::AccountId;
use crate::money::Amount;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTransactionRequest {
    pub account_id: AccountId,
    pub receiver: AccountId,
    pub value: Amount,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

#[derive(Clone)]
pub struct TransactionService {
    log: Arc<dyn TransactionLog>,
}

impl TransactionService {
    pub fn new(log: Arc<dyn TransactionLog>) -> Self {
        Self { log }
    }

    pub async fn create(&self, req: CreateTransactionRequest) -> Result<Transaction, TransactionLogError> {
        if req.account_id == req.receiver {
            return Err(TransactionLogError::Validation(
                "sender and receiver must differ".to_string(),
            ));
        }
        self.log
            .create(NewTransaction {
                account_id: req.account_id,
                receiver: req.receiver,
                value: req.value,
                idempotency_key: req.idempotency_key,
            })
            .await
    }

    pub async fn find(&self, id: TransactionId) -> Result<Transaction, TransactionLogError> {
        self.log
            .get(id)
            .await?
            .ok_or(TransactionLogError::NotFound(id))
    }

    pub async fn list(&self, ids: &[TransactionId]) -> Result<Vec<Transaction>, TransactionLogError> {
        if ids.is_empty() {
            return Err(TransactionLogError::Validation(
                "transaction ids are required".to_string(),
            ));
        }
        self.log.list(ids).await
    }

    /// Move a PENDING transaction to a terminal status
    pub async fn update_status(
        &self,
        id: TransactionId,
        status: TransactionStatus,
        err_message: Option<&str>,
    ) -> Result<Transaction, TransactionLogError> {
        match status {
            TransactionStatus::Completed => {
                if self.log.mark_processed(id).await? == Stamp::AlreadyProcessed {
                    tracing::debug!(transaction_id = %id, "Transaction already completed");
                }
            }
            TransactionStatus::Failed => {
                let message = err_message.unwrap_or("failed");
                if !self.log.mark_failed(id, message).await? {
                    let current = self.find(id).await?;
                    return Err(TransactionLogError::InvalidTransition {
                        from: current.status,
                        to: TransactionStatus::Failed,
                    });
                }
            }
            TransactionStatus::Pending => {
                let current = self.find(id).await?;
                return Err(TransactionLogError::InvalidTransition {
                    from: current.status,
                    to: TransactionStatus::Pending,
                });
            }
        }
        self.find(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::MemoryTransactionLog;
    use uuid::Uuid;

    fn service() -> TransactionService {
        TransactionService::new(Arc::new(MemoryTransactionLog::new()))
    }

    fn request() -> CreateTransactionRequest {
        CreateTransactionRequest {
            account_id: Uuid::new_v4(),
            receiver: Uuid::new_v4(),
            value: "12.34".parse().unwrap(),
            idempotency_key: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let svc = service();
        let tx = svc.create(request()).await.unwrap();
        assert_eq!(svc.find(tx.id).await.unwrap(), tx);
    }

    #[tokio::test]
    async fn test_create_rejects_self_transfer() {
        let svc = service();
        let mut req = request();
        req.receiver = req.account_id;
        assert!(matches!(svc.create(req).await, Err(TransactionLogError::Validation(_))));
    }

    #[tokio::test]
    async fn test_list_requires_ids() {
        let svc = service();
        assert_eq!(
            svc.list(&[]).await,
            Err(TransactionLogError::Validation("transaction ids are required".to_string()))
        );

        let a = svc.create(request()).await.unwrap();
        let b = svc.create(request()).await.unwrap();
        assert_eq!(svc.list(&[a.id, b.id]).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_status() {
        let svc = service();
        let tx = svc.create(request()).await.unwrap();

        let done = svc
            .update_status(tx.id, TransactionStatus::Completed, None)
            .await
            .unwrap();
        assert_eq!(done.status, TransactionStatus::Completed);
        assert!(done.processed_at.is_some());

        assert_eq!(
            svc.update_status(tx.id, TransactionStatus::Failed, Some("late")).await,
            Err(TransactionLogError::InvalidTransition {
                from: TransactionStatus::Completed,
                to: TransactionStatus::Failed,
            })
        );
        assert!(matches!(
            svc.update_status(tx.id, TransactionStatus::Pending, None).await,
            Err(TransactionLogError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_find_missing() {
        let svc = service();
        let id = TransactionId::new();
        assert_eq!(svc.find(id).await, Err(TransactionLogError::NotFound(id)));
    }
}
