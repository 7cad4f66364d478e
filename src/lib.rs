//! Pix Transfer - event-driven Pix payment orchestration
//!
//! # Modules
//!
//! - [`money`] - Exact two-decimal transfer amounts
//! - [`ledger`] - Accounts, balances, Pix keys and the atomic transfer mutation
//! - [`transaction`] - Transaction log and its PENDING/COMPLETED/FAILED state machine
//! - [`event`] - Partitioned event channel, publishing with retry, consumer loop
//! - [`webhook`] - Outbound transfer notifications
//! - [`pix`] - Alias resolution and the transfer saga
//! - [`rpc`] - Error classification shared by the service surfaces
//! - [`gateway`] - HTTP API
//! - [`config`], [`logging`], [`db`] - Runtime plumbing

pub mod config;
pub mod db;
pub mod event;
pub mod gateway;
pub mod ledger;
pub mod logging;
pub mod money;
pub mod pix;
pub mod rpc;
pub mod transaction;
pub mod webhook;

pub use money::{Amount, MoneyError};
pub use pix::{PixCoordinator, PixError, TransferOutcome};
