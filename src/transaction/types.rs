//! Transaction record types

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::state::TransactionStatus;
use crate::ledger::AccountId;
use crate::money::Amount;

/// Transaction identifier
///
/// ULID: unique across orchestrator instances and sortable by creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(ulid::Ulid);

impl TransactionId {
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }

    pub fn inner(&self) -> ulid::Ulid {
        self.0
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TransactionId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(ulid::Ulid::from_string(s)?))
    }
}

impl Serialize for TransactionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for TransactionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Persisted transaction record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    /// Sender account
    pub account_id: AccountId,
    /// Resolved receiver account
    pub receiver: AccountId,
    pub value: Decimal,
    pub status: TransactionStatus,
    /// Set only when FAILED
    pub err_message: Option<String>,
    /// Token derived from the inbound event, unique when present
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl Transaction {
    /// Build a fresh PENDING record
    pub fn pending(new: NewTransaction) -> Self {
        let now = Utc::now();
        Self {
            id: TransactionId::new(),
            account_id: new.account_id,
            receiver: new.receiver,
            value: new.value.value(),
            status: TransactionStatus::Pending,
            err_message: None,
            idempotency_key: new.idempotency_key,
            created_at: now,
            updated_at: now,
            processed_at: None,
        }
    }
}

/// Input for [`TransactionLog::create`](super::TransactionLog::create)
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub account_id: AccountId,
    pub receiver: AccountId,
    pub value: Amount,
    pub idempotency_key: Option<String>,
}

/// Result of a completion stamp
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stamp {
    /// PENDING -> COMPLETED happened now
    Stamped,
    /// Already COMPLETED; `processed_at` left untouched
    AlreadyProcessed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_transaction_id_roundtrip() {
        let id = TransactionId::new();
        let parsed: TransactionId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!("not-a-ulid".parse::<TransactionId>().is_err());

        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id));
    }

    #[test]
    fn test_pending_record() {
        let tx = Transaction::pending(NewTransaction {
            account_id: Uuid::new_v4(),
            receiver: Uuid::new_v4(),
            value: "40.00".parse().unwrap(),
            idempotency_key: Some("evt-1".to_string()),
        });
        assert_eq!(tx.status, TransactionStatus::Pending);
        assert_eq!(tx.value, Decimal::new(4000, 2));
        assert!(tx.processed_at.is_none());
        assert!(tx.err_message.is_none());
    }
}
