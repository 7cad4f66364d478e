//! RPC status taxonomy
//!
//! Closed set of status codes crossing service boundaries. Every backend error is
//! matched exhaustively into one of these at the boundary; the gateway turns them
//! into HTTP statuses with a generic message.

use std::fmt;

use serde::Serialize;

use crate::ledger::LedgerError;
use crate::transaction::TransactionLogError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RpcCode {
    NotFound,
    InvalidArgument,
    AlreadyExists,
    Internal,
    Unavailable,
    DeadlineExceeded,
}

impl RpcCode {
    pub fn http_status(&self) -> u16 {
        match self {
            RpcCode::NotFound => 404,
            RpcCode::InvalidArgument => 400,
            RpcCode::AlreadyExists => 409,
            RpcCode::Internal => 500,
            RpcCode::Unavailable => 503,
            RpcCode::DeadlineExceeded => 504,
        }
    }

    /// Message shown to external callers
    pub fn generic_message(&self) -> &'static str {
        match self {
            RpcCode::NotFound => "resource not found",
            RpcCode::InvalidArgument => "invalid argument",
            RpcCode::AlreadyExists => "resource already exists",
            RpcCode::Internal => "internal error",
            RpcCode::Unavailable => "service unavailable",
            RpcCode::DeadlineExceeded => "deadline exceeded",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RpcCode::NotFound => "NOT_FOUND",
            RpcCode::InvalidArgument => "INVALID_ARGUMENT",
            RpcCode::AlreadyExists => "ALREADY_EXISTS",
            RpcCode::Internal => "INTERNAL",
            RpcCode::Unavailable => "UNAVAILABLE",
            RpcCode::DeadlineExceeded => "DEADLINE_EXCEEDED",
        }
    }
}

impl fmt::Display for RpcCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Classify an error at the RPC boundary
pub trait RpcStatus {
    fn rpc_code(&self) -> RpcCode;
}

/// Database failures that look like timeouts map to DeadlineExceeded
fn database_code(message: &str) -> RpcCode {
    let lower = message.to_ascii_lowercase();
    if lower.contains("timed out") || lower.contains("timeout") {
        RpcCode::DeadlineExceeded
    } else {
        RpcCode::Unavailable
    }
}

impl RpcStatus for LedgerError {
    fn rpc_code(&self) -> RpcCode {
        match self {
            LedgerError::AccountNotFound(_) | LedgerError::KeyNotFound | LedgerError::KeyIdNotFound(_) => {
                RpcCode::NotFound
            }
            LedgerError::InvalidAlias(_)
            | LedgerError::InsufficientBalance
            | LedgerError::SenderBlocked
            | LedgerError::ReceiverBlocked
            | LedgerError::SameAccount => RpcCode::InvalidArgument,
            LedgerError::DuplicateKey => RpcCode::AlreadyExists,
            LedgerError::Database(message) => database_code(message),
        }
    }
}

impl RpcStatus for TransactionLogError {
    fn rpc_code(&self) -> RpcCode {
        match self {
            TransactionLogError::NotFound(_) => RpcCode::NotFound,
            TransactionLogError::Validation(_) => RpcCode::InvalidArgument,
            TransactionLogError::DuplicateKey(_) => RpcCode::AlreadyExists,
            TransactionLogError::InvalidTransition { .. } => RpcCode::InvalidArgument,
            TransactionLogError::Database(message) => database_code(message),
        }
    }
}
