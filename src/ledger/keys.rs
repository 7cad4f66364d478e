//! Key management: create, look up, update and delete alias keys

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use super::error::LedgerError;
use super::models::{AccountId, Key, KeyId, KeyType};
use super::store::LedgerStore;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateKeyRequest {
    pub account_id: AccountId,
    pub name: String,
    #[serde(rename = "type")]
    pub key_type: KeyType,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateKeyRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub key_type: KeyType,
}

/// Key operations on top of a [`LedgerStore`]
///
/// Every write validates the alias against the pattern of its declared type.
/// Uniqueness is enforced by the store.
#[derive(Clone)]
pub struct KeyService {
    store: Arc<dyn LedgerStore>,
}

impl KeyService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    fn validate(name: &str, key_type: KeyType) -> Result<(), LedgerError> {
        if key_type.matches(name) {
            Ok(())
        } else {
            Err(LedgerError::InvalidAlias(format!(
                "{name} is not a valid {key_type} key"
            )))
        }
    }

    pub async fn create(&self, req: CreateKeyRequest) -> Result<Key, LedgerError> {
        let name = req.name.trim().to_string();
        Self::validate(&name, req.key_type)?;

        let account = self.store.find_account(req.account_id).await?;
        if account.is_deleted() {
            return Err(LedgerError::AccountNotFound(account.id));
        }

        let now = Utc::now();
        let key = Key {
            id: Uuid::new_v4(),
            account_id: account.id,
            name,
            key_type: req.key_type,
            created_at: now,
            updated_at: now,
        };
        let key = self.store.insert_key(key).await?;

        tracing::info!(key_id = %key.id, account_id = %key.account_id, key_type = %key.key_type, "Key created");
        Ok(key)
    }

    pub async fn find(&self, id: KeyId) -> Result<Key, LedgerError> {
        self.store.find_key(id).await
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Key, LedgerError> {
        self.store.find_key_by_name(name).await
    }

    pub async fn list_by_account(&self, account_id: AccountId) -> Result<Vec<Key>, LedgerError> {
        self.store.list_keys(account_id).await
    }

    pub async fn update(&self, id: KeyId, req: UpdateKeyRequest) -> Result<Key, LedgerError> {
        let name = req.name.trim().to_string();
        Self::validate(&name, req.key_type)?;
        let key = self.store.update_key(id, &name, req.key_type).await?;
        tracing::info!(key_id = %key.id, "Key updated");
        Ok(key)
    }

    pub async fn delete(&self, id: KeyId) -> Result<(), LedgerError> {
        self.store.delete_key(id).await?;
        tracing::info!(key_id = %id, "Key deleted");
        Ok(())
    }
}
