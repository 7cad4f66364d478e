//! In-process ledger store
//!
//! One mutex guards accounts and keys together, so `apply_transfer` observes and
//! mutates both balances under a single critical section.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::error::LedgerError;
use super::models::{Account, AccountId, Key, KeyId, KeyType, NewAccount};
use super::store::LedgerStore;
use crate::money::Amount;

#[derive(Default)]
struct Inner {
    accounts: HashMap<AccountId, Account>,
    keys: HashMap<KeyId, Key>,
    /// alias -> key id
    names: HashMap<String, KeyId>,
}

/// Ledger store backed by process memory (development mode and tests)
#[derive(Default)]
pub struct MemoryLedgerStore {
    inner: Mutex<Inner>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, LedgerError> {
        self.inner
            .lock()
            .map_err(|_| LedgerError::Database("ledger lock poisoned".to_string()))
    }

    /// Soft-delete an account (test support for the inactive path)
    pub fn soft_delete(&self, id: AccountId) -> Result<(), LedgerError> {
        let mut inner = self.lock()?;
        let account = inner
            .accounts
            .get_mut(&id)
            .ok_or(LedgerError::AccountNotFound(id))?;
        account.deleted_at = Some(Utc::now());
        Ok(())
    }
}

fn live_account(inner: &Inner, id: AccountId) -> Result<&Account, LedgerError> {
    inner
        .accounts
        .get(&id)
        .filter(|a| !a.is_deleted())
        .ok_or(LedgerError::AccountNotFound(id))
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn find_account(&self, id: AccountId) -> Result<Account, LedgerError> {
        let inner = self.lock()?;
        inner
            .accounts
            .get(&id)
            .cloned()
            .ok_or(LedgerError::AccountNotFound(id))
    }

    async fn find_account_by_alias(&self, alias: &str) -> Result<Account, LedgerError> {
        let inner = self.lock()?;
        let key_id = inner.names.get(alias).ok_or(LedgerError::KeyNotFound)?;
        let key = inner.keys.get(key_id).ok_or(LedgerError::KeyNotFound)?;
        inner
            .accounts
            .get(&key.account_id)
            .cloned()
            .ok_or(LedgerError::AccountNotFound(key.account_id))
    }

    async fn apply_transfer(
        &self,
        sender: AccountId,
        receiver: AccountId,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        if sender == receiver {
            return Err(LedgerError::SameAccount);
        }

        let mut inner = self.lock()?;

        let from = live_account(&inner, sender)?;
        if from.is_blocked() {
            return Err(LedgerError::SenderBlocked);
        }
        if from.balance < amount.value() {
            return Err(LedgerError::InsufficientBalance);
        }
        let to = live_account(&inner, receiver)?;
        if to.is_blocked() {
            return Err(LedgerError::ReceiverBlocked);
        }

        let now = Utc::now();
        if let Some(from) = inner.accounts.get_mut(&sender) {
            from.balance -= amount.value();
            from.updated_at = now;
        }
        if let Some(to) = inner.accounts.get_mut(&receiver) {
            to.balance += amount.value();
            to.updated_at = now;
        }
        Ok(())
    }

    async fn set_blocked(&self, id: AccountId, blocked: bool) -> Result<Account, LedgerError> {
        let mut inner = self.lock()?;
        let account = inner
            .accounts
            .get_mut(&id)
            .ok_or(LedgerError::AccountNotFound(id))?;
        let now = Utc::now();
        account.blocked_at = if blocked {
            account.blocked_at.or(Some(now))
        } else {
            None
        };
        account.updated_at = now;
        Ok(account.clone())
    }

    async fn open_account(&self, new: NewAccount) -> Result<Account, LedgerError> {
        let now = Utc::now();
        let account = Account {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            holder_name: new.holder_name,
            holder_tax_id: new.holder_tax_id,
            balance: new.balance,
            agency: new.agency,
            bank: new.bank,
            blocked_at: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        self.lock()?.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn insert_key(&self, key: Key) -> Result<Key, LedgerError> {
        let mut inner = self.lock()?;
        if inner.names.contains_key(&key.name) {
            return Err(LedgerError::DuplicateKey);
        }
        live_account(&inner, key.account_id)?;
        inner.names.insert(key.name.clone(), key.id);
        inner.keys.insert(key.id, key.clone());
        Ok(key)
    }

    async fn find_key(&self, id: KeyId) -> Result<Key, LedgerError> {
        self.lock()?
            .keys
            .get(&id)
            .cloned()
            .ok_or(LedgerError::KeyIdNotFound(id))
    }

    async fn find_key_by_name(&self, name: &str) -> Result<Key, LedgerError> {
        let inner = self.lock()?;
        inner
            .names
            .get(name)
            .and_then(|id| inner.keys.get(id))
            .cloned()
            .ok_or(LedgerError::KeyNotFound)
    }

    async fn list_keys(&self, account_id: AccountId) -> Result<Vec<Key>, LedgerError> {
        let inner = self.lock()?;
        let mut keys: Vec<Key> = inner
            .keys
            .values()
            .filter(|k| k.account_id == account_id)
            .cloned()
            .collect();
        keys.sort_by_key(|k| k.created_at);
        Ok(keys)
    }

    async fn update_key(&self, id: KeyId, name: &str, key_type: KeyType) -> Result<Key, LedgerError> {
        let mut inner = self.lock()?;
        let old_name = inner
            .keys
            .get(&id)
            .map(|k| k.name.clone())
            .ok_or(LedgerError::KeyIdNotFound(id))?;

        if old_name != name && inner.names.contains_key(name) {
            return Err(LedgerError::DuplicateKey);
        }

        inner.names.remove(&old_name);
        inner.names.insert(name.to_string(), id);
        let key = inner
            .keys
            .get_mut(&id)
            .ok_or(LedgerError::KeyIdNotFound(id))?;
        key.name = name.to_string();
        key.key_type = key_type;
        key.updated_at = Utc::now();
        Ok(key.clone())
    }

    async fn delete_key(&self, id: KeyId) -> Result<(), LedgerError> {
        let mut inner = self.lock()?;
        let key = inner.keys.remove(&id).ok_or(LedgerError::KeyIdNotFound(id))?;
        inner.names.remove(&key.name);
        Ok(())
    }
}
