//! Webhook Dispatcher
//!
//! Synchronous JSON POST to a caller-supplied URL. A 2xx answer to a COMPLETED
//! payload is what makes the transaction's completion durable: the dispatcher
//! stamps it processed right after delivery.

pub mod dispatcher;
pub mod error;
pub mod payload;

pub use dispatcher::{Notifier, WebhookDispatcher};
pub use error::WebhookError;
pub use payload::{AccountSnapshot, NotificationStatus, WebhookPayload};
