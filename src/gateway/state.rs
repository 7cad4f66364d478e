use std::sync::Arc;

use crate::db::Database;
use crate::event::{EventPublisher, PublishRetry};
use crate::ledger::{KeyService, LedgerStore};
use crate::transaction::TransactionService;

/// Shared gateway state
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<dyn LedgerStore>,
    pub keys: KeyService,
    pub transactions: TransactionService,
    /// Transfer events go out here
    pub publisher: Arc<dyn EventPublisher>,
    pub publish_retry: PublishRetry,
    /// Present when running on PostgreSQL (used by health check)
    pub db: Option<Arc<Database>>,
}

impl AppState {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        transactions: TransactionService,
        publisher: Arc<dyn EventPublisher>,
        publish_retry: PublishRetry,
    ) -> Self {
        Self {
            keys: KeyService::new(ledger.clone()),
            ledger,
            transactions,
            publisher,
            publish_retry,
            db: None,
        }
    }

    pub fn with_database(mut self, db: Arc<Database>) -> Self {
        self.db = Some(db);
        self
    }
}
