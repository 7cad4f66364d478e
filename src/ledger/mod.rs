//! Ledger Store
//!
//! Owns account balances and alias keys.
//!
//! # Safety Invariants
//!
//! 1. **Single Mutation Path**: balances change only through
//!    [`LedgerStore::apply_transfer`], which debits and credits inside one atomic unit
//! 2. **Preconditions Inside The Unit**: sender balance and blocked flags are checked
//!    under the same lock/transaction that applies the mutation
//! 3. **Alias Uniqueness**: an alias resolves to exactly one account

pub mod alias;
pub mod db;
pub mod error;
pub mod keys;
pub mod memory;
pub mod models;
pub mod store;

pub use alias::detect_key_type;
pub use db::PgLedgerStore;
pub use error::LedgerError;
pub use keys::{CreateKeyRequest, KeyService, UpdateKeyRequest};
pub use memory::MemoryLedgerStore;
pub use models::{Account, AccountId, Key, KeyId, KeyType, NewAccount};
pub use store::LedgerStore;
