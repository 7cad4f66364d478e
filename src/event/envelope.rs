//! Typed event envelope
//!
//! The wire format is a JSON object tagged by `type`. Each variant maps to exactly
//! one [`EventHandler`](super::EventHandler) method.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::EventError;
use crate::ledger::AccountId;

/// Transfer intent published by the gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferEvent {
    /// Idempotency token; redeliveries carry the same value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    /// Sender account
    pub account_id: AccountId,
    /// Receiver alias
    pub key: String,
    /// Raw amount; validated by the orchestrator, not the decoder
    pub amount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventEnvelope {
    TransferRequested(TransferEvent),
}

impl EventEnvelope {
    pub fn decode(payload: &[u8]) -> Result<Self, EventError> {
        serde_json::from_slice(payload).map_err(|e| EventError::Decode(e.to_string()))
    }

    pub fn encode(&self) -> Result<Vec<u8>, EventError> {
        serde_json::to_vec(self).map_err(|e| EventError::Encode(e.to_string()))
    }

    /// Partition key: events of one sender stay in publish order
    pub fn partition_key(&self) -> String {
        match self {
            EventEnvelope::TransferRequested(event) => event.account_id.to_string(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            EventEnvelope::TransferRequested(_) => "transfer_requested",
        }
    }
}
