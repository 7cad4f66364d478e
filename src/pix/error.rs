//! Business error taxonomy of the transfer saga

use thiserror::Error;

use crate::event::EventError;
use crate::money::MoneyError;
use crate::rpc::{RpcCode, RpcStatus};
use crate::transaction::TransactionLogError;

/// Broad class of a [`PixError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected before any state change
    Validation,
    /// Precondition failure, terminal
    Business,
    /// Infrastructure failure, retried by the layer below
    Transport,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PixError {
    // === Validation ===
    #[error("invalid amount: {0}")]
    InvalidAmount(MoneyError),

    #[error("malformed key: {0}")]
    MalformedKey(String),

    // === Business ===
    #[error("invalid key")]
    InvalidKey,

    #[error("sender account not found")]
    SenderNotFound,

    #[error("inactive account")]
    InactiveAccount,

    #[error("sender and receiver are the same account")]
    SelfTransfer,

    #[error("account blocked")]
    ReceiverBlocked,

    #[error("insufficient balance")]
    InsufficientBalance,

    // === Transport ===
    #[error("webhook dispatch failed: {0}")]
    Notification(String),

    #[error("transport error: {0}")]
    Transport(String),
}

impl PixError {
    pub fn code(&self) -> &'static str {
        match self {
            PixError::InvalidAmount(_) => "INVALID_AMOUNT",
            PixError::MalformedKey(_) => "MALFORMED_KEY",
            PixError::InvalidKey => "INVALID_KEY",
            PixError::SenderNotFound => "SENDER_NOT_FOUND",
            PixError::InactiveAccount => "INACTIVE_ACCOUNT",
            PixError::SelfTransfer => "SELF_TRANSFER",
            PixError::ReceiverBlocked => "RECEIVER_BLOCKED",
            PixError::InsufficientBalance => "INSUFFICIENT_BALANCE",
            PixError::Notification(_) => "NOTIFICATION_FAILED",
            PixError::Transport(_) => "TRANSPORT_ERROR",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PixError::InvalidAmount(_) | PixError::MalformedKey(_) => ErrorKind::Validation,
            PixError::InvalidKey
            | PixError::SenderNotFound
            | PixError::InactiveAccount
            | PixError::SelfTransfer
            | PixError::ReceiverBlocked
            | PixError::InsufficientBalance => ErrorKind::Business,
            PixError::Notification(_) | PixError::Transport(_) => ErrorKind::Transport,
        }
    }

    /// Only a redelivery can fix a transport failure
    pub fn is_retryable(&self) -> bool {
        matches!(self, PixError::Transport(_))
    }
}

impl RpcStatus for PixError {
    fn rpc_code(&self) -> RpcCode {
        match self {
            PixError::InvalidAmount(_)
            | PixError::MalformedKey(_)
            | PixError::InactiveAccount
            | PixError::SelfTransfer
            | PixError::ReceiverBlocked
            | PixError::InsufficientBalance => RpcCode::InvalidArgument,
            PixError::InvalidKey | PixError::SenderNotFound => RpcCode::NotFound,
            PixError::Notification(_) | PixError::Transport(_) => RpcCode::Unavailable,
        }
    }
}

impl From<TransactionLogError> for PixError {
    fn from(e: TransactionLogError) -> Self {
        PixError::Transport(e.to_string())
    }
}

impl From<PixError> for EventError {
    fn from(e: PixError) -> Self {
        EventError::Handler(e.to_string())
    }
}
