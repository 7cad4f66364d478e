//! LedgerStore trait: the seam between the saga and balance persistence

use async_trait::async_trait;

use super::error::LedgerError;
use super::models::{Account, AccountId, Key, KeyId, KeyType, NewAccount};
use crate::money::Amount;

/// Persistence contract for accounts and alias keys
///
/// Implementations must make [`apply_transfer`](LedgerStore::apply_transfer) atomic:
/// debit and credit become visible together or not at all, and the balance and
/// blocked checks run inside the same unit as the mutation.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn find_account(&self, id: AccountId) -> Result<Account, LedgerError>;

    /// Resolve an alias to its owning account. Miss is [`LedgerError::KeyNotFound`].
    async fn find_account_by_alias(&self, alias: &str) -> Result<Account, LedgerError>;

    async fn is_account_active(&self, id: AccountId) -> Result<bool, LedgerError> {
        Ok(self.find_account(id).await?.is_active())
    }

    /// Move `amount` from `sender` to `receiver` in one atomic unit
    ///
    /// # Errors
    /// * `SameAccount` - sender and receiver are the same account
    /// * `AccountNotFound` - either side is missing or soft-deleted
    /// * `SenderBlocked` / `ReceiverBlocked` - blocked party, nothing mutated
    /// * `InsufficientBalance` - sender balance below amount, nothing mutated
    /// * `Database` - infrastructure failure, nothing mutated
    async fn apply_transfer(
        &self,
        sender: AccountId,
        receiver: AccountId,
        amount: Amount,
    ) -> Result<(), LedgerError>;

    /// Block or unblock an account
    async fn set_blocked(&self, id: AccountId, blocked: bool) -> Result<Account, LedgerError>;

    async fn open_account(&self, account: NewAccount) -> Result<Account, LedgerError>;

    /// Insert a key. Alias already taken is [`LedgerError::DuplicateKey`].
    async fn insert_key(&self, key: Key) -> Result<Key, LedgerError>;

    async fn find_key(&self, id: KeyId) -> Result<Key, LedgerError>;

    async fn find_key_by_name(&self, name: &str) -> Result<Key, LedgerError>;

    async fn list_keys(&self, account_id: AccountId) -> Result<Vec<Key>, LedgerError>;

    async fn update_key(&self, id: KeyId, name: &str, key_type: KeyType) -> Result<Key, LedgerError>;

    async fn delete_key(&self, id: KeyId) -> Result<(), LedgerError>;
}
