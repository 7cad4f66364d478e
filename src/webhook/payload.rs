//! Outbound notification body

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ledger::Account;
use crate::money::Amount;
use crate::transaction::TransactionId;

/// Party identity as shown to the webhook receiver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub name: String,
    pub agency: String,
    pub bank: String,
    pub tax_id: String,
}

impl From<&Account> for AccountSnapshot {
    fn from(account: &Account) -> Self {
        Self {
            name: account.holder_name.clone(),
            agency: account.agency.clone(),
            bank: account.bank.clone(),
            tax_id: account.holder_tax_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NotificationStatus {
    Completed,
    Failed,
}

impl fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationStatus::Completed => write!(f, "COMPLETED"),
            NotificationStatus::Failed => write!(f, "FAILED"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub transaction_id: TransactionId,
    pub sender: AccountSnapshot,
    pub receiver: AccountSnapshot,
    pub amount: Amount,
    pub status: NotificationStatus,
}

impl WebhookPayload {
    pub fn completed(transaction_id: TransactionId, sender: &Account, receiver: &Account, amount: Amount) -> Self {
        Self {
            transaction_id,
            sender: sender.into(),
            receiver: receiver.into(),
            amount,
            status: NotificationStatus::Completed,
        }
    }
}
