//! Transaction status definitions
//!
//! Status IDs are stored in PostgreSQL as SMALLINT.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Transaction status
///
/// Terminal: COMPLETED (40), FAILED (-10)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[repr(i16)]
pub enum TransactionStatus {
    /// Created, ledger not yet confirmed or notification not yet acknowledged
    Pending = 0,

    /// Terminal: balances moved and the webhook acknowledged
    Completed = 40,

    /// Terminal: see `err_message`
    Failed = -10,
}

impl TransactionStatus {
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransactionStatus::Completed | TransactionStatus::Failed)
    }

    /// Whether `self -> next` is a legal transition
    #[inline]
    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        *self == TransactionStatus::Pending && next.is_terminal()
    }

    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(TransactionStatus::Pending),
            40 => Some(TransactionStatus::Completed),
            -10 => Some(TransactionStatus::Failed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Completed => "COMPLETED",
            TransactionStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
