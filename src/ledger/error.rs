//! Ledger error types

use thiserror::Error;

use super::models::{AccountId, KeyId};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("key not found in the database")]
    KeyNotFound,

    #[error("key not found: {0}")]
    KeyIdNotFound(KeyId),

    #[error("invalid key: {0}")]
    InvalidAlias(String),

    #[error("key already exists")]
    DuplicateKey,

    #[error("insufficient balance")]
    InsufficientBalance,

    #[error("sender account blocked")]
    SenderBlocked,

    #[error("account blocked")]
    ReceiverBlocked,

    #[error("source and target account cannot be the same")]
    SameAccount,

    #[error("Database error: {0}")]
    Database(String),
}

impl LedgerError {
    /// Transport-level failure (retry may succeed)
    pub fn is_transient(&self) -> bool {
        matches!(self, LedgerError::Database(_))
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        LedgerError::Database(e.to_string())
    }
}
