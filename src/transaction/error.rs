//! Transaction log error types

use thiserror::Error;

use super::state::TransactionStatus;
use super::types::TransactionId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionLogError {
    #[error("transaction not found: {0}")]
    NotFound(TransactionId),

    #[error("invalid transition {from} -> {to}")]
    InvalidTransition {
        from: TransactionStatus,
        to: TransactionStatus,
    },

    #[error("idempotency key already used: {0}")]
    DuplicateKey(String),

    #[error("{0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for TransactionLogError {
    fn from(e: sqlx::Error) -> Self {
        TransactionLogError::Database(e.to_string())
    }
}
