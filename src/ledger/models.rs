//! Data models for the ledger: accounts and alias keys

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type AccountId = Uuid;
pub type KeyId = Uuid;

/// Ledger account
///
/// `holder_name` / `holder_tax_id` come from the owning user and are only carried
/// so notifications can snapshot the parties of a transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub user_id: Uuid,
    pub holder_name: String,
    pub holder_tax_id: String,
    pub balance: Decimal,
    pub agency: String,
    pub bank: String,
    pub blocked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Account {
    #[inline]
    pub fn is_blocked(&self) -> bool {
        self.blocked_at.is_some()
    }

    #[inline]
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Active accounts may send and receive transfers
    #[inline]
    pub fn is_active(&self) -> bool {
        !self.is_blocked() && !self.is_deleted()
    }
}

/// Input for opening an account (bootstrap and tests)
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub user_id: Uuid,
    pub holder_name: String,
    pub holder_tax_id: String,
    pub balance: Decimal,
    pub agency: String,
    pub bank: String,
}

impl NewAccount {
    pub fn new(holder_name: impl Into<String>, holder_tax_id: impl Into<String>, balance: Decimal) -> Self {
        Self {
            user_id: Uuid::new_v4(),
            holder_name: holder_name.into(),
            holder_tax_id: holder_tax_id.into(),
            balance,
            agency: "0001".to_string(),
            bank: "001".to_string(),
        }
    }
}

/// Alias key type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    /// Tax id (CPF, `000.000.000-00`)
    Cpf,
    Phone,
    Email,
    /// Random token issued for the account
    Random,
}

impl KeyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::Cpf => "cpf",
            KeyType::Phone => "phone",
            KeyType::Email => "email",
            KeyType::Random => "random",
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for KeyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cpf" => Ok(KeyType::Cpf),
            "phone" => Ok(KeyType::Phone),
            "email" => Ok(KeyType::Email),
            "random" => Ok(KeyType::Random),
            _ => Err(format!("Invalid key type: {}", s)),
        }
    }
}

/// Alias key pointing at one account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Key {
    pub id: KeyId,
    pub account_id: AccountId,
    pub name: String,
    #[serde(rename = "type")]
    pub key_type: KeyType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account() -> Account {
        let now = Utc::now();
        Account {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            holder_name: "Alice".to_string(),
            holder_tax_id: "123.456.789-00".to_string(),
            balance: Decimal::new(10000, 2),
            agency: "0001".to_string(),
            bank: "001".to_string(),
            blocked_at: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[test]
    fn test_account_activity() {
        let mut acc = account();
        assert!(acc.is_active());

        acc.blocked_at = Some(Utc::now());
        assert!(acc.is_blocked());
        assert!(!acc.is_active());

        acc.blocked_at = None;
        acc.deleted_at = Some(Utc::now());
        assert!(!acc.is_active());
    }

    #[test]
    fn test_key_type_parse() {
        assert_eq!("cpf".parse::<KeyType>().unwrap(), KeyType::Cpf);
        assert_eq!("EMAIL".parse::<KeyType>().unwrap(), KeyType::Email);
        assert!("iban".parse::<KeyType>().is_err());
        assert_eq!(serde_json::to_string(&KeyType::Random).unwrap(), "\"random\"");
    }
}
