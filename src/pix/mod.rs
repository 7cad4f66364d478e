//! Pix Transfer Orchestrator
//!
//! Turns one inbound [`TransferEvent`](crate::event::TransferEvent) into a validated
//! balance change, a terminal transaction record and an outbound notification.
//!
//! # Saga
//!
//! ```text
//! validate amount/alias ─► resolve alias ─► load sender ─► create PENDING
//!        │                      │               │               │
//!   ValidationError         InvalidKey    Inactive/Self    balance check ─► apply_transfer
//!   (no record)             (no record)    (no record)          │                 │
//!                                                            FAILED            FAILED
//!                                                                                 │
//!                                      webhook 2xx ─► dispatcher stamps COMPLETED ◄┘
//!                                      webhook err ─► FAILED (funds stay moved)
//! ```

pub mod coordinator;
pub mod error;
pub mod resolver;

#[cfg(test)]
mod integration_tests;

pub use coordinator::{PixCoordinator, TransferOutcome};
pub use error::{ErrorKind, PixError};
pub use resolver::KeyResolver;
