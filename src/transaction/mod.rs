//! Transaction Log
//!
//! Persists one record per transfer attempt and enforces its state machine:
//!
//! ```text
//! PENDING ──► COMPLETED   (webhook acknowledged, processed_at stamped once)
//!    │
//!    └──────► FAILED      (err_message set)
//! ```
//!
//! Terminal states never re-transition. All transitions are compare-and-swap on
//! the current status.

pub mod db;
pub mod error;
pub mod memory;
pub mod service;
pub mod state;
pub mod store;
pub mod types;

pub use db::PgTransactionLog;
pub use error::TransactionLogError;
pub use memory::MemoryTransactionLog;
pub use service::{CreateTransactionRequest, TransactionService};
pub use state::TransactionStatus;
pub use store::TransactionLog;
pub use types::{NewTransaction, Stamp, Transaction, TransactionId};
