//! Key Resolution: alias -> owning account

use std::sync::Arc;

use crate::ledger::{Account, KeyType, LedgerError, LedgerStore, detect_key_type};

use super::error::PixError;

#[derive(Clone)]
pub struct KeyResolver {
    store: Arc<dyn LedgerStore>,
}

impl KeyResolver {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Shape check only; no lookup
    pub fn classify(alias: &str) -> Result<KeyType, PixError> {
        detect_key_type(alias).ok_or_else(|| PixError::MalformedKey(alias.to_string()))
    }

    /// Resolve `alias` to a live account
    ///
    /// # Errors
    /// * `MalformedKey` - alias matches none of the key patterns; no lookup made
    /// * `InvalidKey` - no key with this alias, or its account is gone
    /// * `Transport` - store failure
    pub async fn resolve(&self, alias: &str) -> Result<Account, PixError> {
        let key_type = Self::classify(alias)?;

        match self.store.find_account_by_alias(alias).await {
            Ok(account) if account.is_deleted() => {
                tracing::debug!(alias, "Key points at a deleted account");
                Err(PixError::InvalidKey)
            }
            Ok(account) => {
                tracing::debug!(alias, %key_type, account_id = %account.id, "Key resolved");
                Ok(account)
            }
            Err(LedgerError::KeyNotFound) | Err(LedgerError::AccountNotFound(_)) => {
                Err(PixError::InvalidKey)
            }
            Err(e) => Err(PixError::Transport(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{KeyService, CreateKeyRequest, MemoryLedgerStore, NewAccount};
    use rust_decimal::Decimal;

    #[tokio::test]
    async fn test_resolve() {
        let store = Arc::new(MemoryLedgerStore::new());
        let account = store
            .open_account(NewAccount::new("Bob", "222.222.222-22", Decimal::ZERO))
            .await
            .unwrap();
        KeyService::new(store.clone())
            .create(CreateKeyRequest {
                account_id: account.id,
                name: "bob@example.com".to_string(),
                key_type: KeyType::Email,
            })
            .await
            .unwrap();

        let resolver = KeyResolver::new(store.clone());
        assert_eq!(resolver.resolve("bob@example.com").await.unwrap().id, account.id);
        assert_eq!(resolver.resolve("not-a-real-key").await, Err(PixError::InvalidKey));
        assert!(matches!(
            resolver.resolve("bad alias!").await,
            Err(PixError::MalformedKey(_))
        ));

        store.soft_delete(account.id).unwrap();
        assert_eq!(resolver.resolve("bob@example.com").await, Err(PixError::InvalidKey));
    }
}
