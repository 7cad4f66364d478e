//! Saga tests on the in-memory stores
//!
//! The notifier is a mock that behaves like the real dispatcher on success: it
//! stamps the transaction processed.

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use super::{PixCoordinator, PixError, TransferOutcome};
use crate::event::{EventHandler, TransferEvent};
use crate::ledger::{
    Account, AccountId, CreateKeyRequest, KeyService, KeyType, LedgerError, LedgerStore,
    MemoryLedgerStore, NewAccount,
};
use crate::money::Amount;
use crate::transaction::{
    MemoryTransactionLog, NewTransaction, Stamp, Transaction, TransactionId, TransactionLog,
    TransactionLogError, TransactionStatus,
};
use crate::webhook::{NotificationStatus, Notifier, WebhookError, WebhookPayload};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    Accept,
    Reject,
    /// Delivered, but no completion stamp
    AcceptWithoutStamp,
}

struct MockNotifier {
    transactions: Arc<MemoryTransactionLog>,
    mode: Mutex<Mode>,
    sent: Mutex<Vec<(WebhookPayload, String)>>,
}

impl MockNotifier {
    fn new(transactions: Arc<MemoryTransactionLog>) -> Self {
        Self {
            transactions,
            mode: Mutex::new(Mode::Accept),
            sent: Mutex::new(Vec::new()),
        }
    }

    fn set_mode(&self, mode: Mode) {
        *self.mode.lock().unwrap() = mode;
    }

    fn sent(&self) -> Vec<(WebhookPayload, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn send(&self, payload: &WebhookPayload, url: &str) -> Result<(), WebhookError> {
        self.sent
            .lock()
            .unwrap()
            .push((payload.clone(), url.to_string()));
        let mode = *self.mode.lock().unwrap();
        match mode {
            Mode::Accept => {
                if payload.status == NotificationStatus::Completed {
                    self.transactions
                        .mark_processed(payload.transaction_id)
                        .await
                        .map_err(|e| WebhookError::Completion(e.to_string()))?;
                }
                Ok(())
            }
            Mode::Reject => Err(WebhookError::Status(503)),
            Mode::AcceptWithoutStamp => Err(WebhookError::Completion("lost".to_string())),
        }
    }
}

/// Memory ledger whose calls can be made to fail like a dropped connection
struct FlakyLedger {
    inner: MemoryLedgerStore,
    fail_apply: AtomicBool,
    fail_find: AtomicBool,
}

#[async_trait]
impl LedgerStore for FlakyLedger {
    async fn find_account(&self, id: AccountId) -> Result<Account, LedgerError> {
        if self.fail_find.load(Ordering::SeqCst) {
            return Err(LedgerError::Database("connection reset".to_string()));
        }
        self.inner.find_account(id).await
    }

    async fn find_account_by_alias(&self, alias: &str) -> Result<Account, LedgerError> {
        self.inner.find_account_by_alias(alias).await
    }

    async fn apply_transfer(
        &self,
        sender: AccountId,
        receiver: AccountId,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        if self.fail_apply.load(Ordering::SeqCst) {
            return Err(LedgerError::Database("connection reset".to_string()));
        }
        self.inner.apply_transfer(sender, receiver, amount).await
    }

    async fn set_blocked(&self, id: AccountId, blocked: bool) -> Result<Account, LedgerError> {
        self.inner.set_blocked(id, blocked).await
    }

    async fn open_account(&self, account: NewAccount) -> Result<Account, LedgerError> {
        self.inner.open_account(account).await
    }

    async fn insert_key(&self, key: crate::ledger::Key) -> Result<crate::ledger::Key, LedgerError> {
        self.inner.insert_key(key).await
    }

    async fn find_key(&self, id: crate::ledger::KeyId) -> Result<crate::ledger::Key, LedgerError> {
        self.inner.find_key(id).await
    }

    async fn find_key_by_name(&self, name: &str) -> Result<crate::ledger::Key, LedgerError> {
        self.inner.find_key_by_name(name).await
    }

    async fn list_keys(&self, account_id: AccountId) -> Result<Vec<crate::ledger::Key>, LedgerError> {
        self.inner.list_keys(account_id).await
    }

    async fn update_key(
        &self,
        id: crate::ledger::KeyId,
        name: &str,
        key_type: KeyType,
    ) -> Result<crate::ledger::Key, LedgerError> {
        self.inner.update_key(id, name, key_type).await
    }

    async fn delete_key(&self, id: crate::ledger::KeyId) -> Result<(), LedgerError> {
        self.inner.delete_key(id).await
    }
}

/// Memory transaction log whose terminal status writes fail like a dropped connection
struct StatusWriteFailingLog {
    inner: MemoryTransactionLog,
}

impl StatusWriteFailingLog {
    fn down() -> TransactionLogError {
        TransactionLogError::Database("connection reset".to_string())
    }
}

#[async_trait]
impl TransactionLog for StatusWriteFailingLog {
    async fn create(&self, new: NewTransaction) -> Result<Transaction, TransactionLogError> {
        self.inner.create(new).await
    }

    async fn get(&self, id: TransactionId) -> Result<Option<Transaction>, TransactionLogError> {
        self.inner.get(id).await
    }

    async fn find_by_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<Transaction>, TransactionLogError> {
        self.inner.find_by_idempotency_key(key).await
    }

    async fn list(&self, ids: &[TransactionId]) -> Result<Vec<Transaction>, TransactionLogError> {
        self.inner.list(ids).await
    }

    async fn mark_failed(&self, _id: TransactionId, _error: &str) -> Result<bool, TransactionLogError> {
        Err(Self::down())
    }

    async fn mark_processed(&self, _id: TransactionId) -> Result<Stamp, TransactionLogError> {
        Err(Self::down())
    }
}

const HOOK: &str = "http://hooks.local/pix";

struct TestHarness {
    coordinator: Arc<PixCoordinator>,
    ledger: Arc<FlakyLedger>,
    transactions: Arc<MemoryTransactionLog>,
    notifier: Arc<MockNotifier>,
    sender: Account,
    receiver: Account,
}

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

impl TestHarness {
    /// Sender with `sender_balance`, receiver reachable as `bob@example.com`
    async fn new(sender_balance: &str) -> Self {
        let ledger = Arc::new(FlakyLedger {
            inner: MemoryLedgerStore::new(),
            fail_apply: AtomicBool::new(false),
            fail_find: AtomicBool::new(false),
        });
        let transactions = Arc::new(MemoryTransactionLog::new());
        let notifier = Arc::new(MockNotifier::new(transactions.clone()));

        let sender = ledger
            .open_account(NewAccount::new("Alice", "111.111.111-11", dec(sender_balance)))
            .await
            .unwrap();
        let receiver = ledger
            .open_account(NewAccount::new("Bob", "222.222.222-22", Decimal::ZERO))
            .await
            .unwrap();

        let keys = KeyService::new(ledger.clone());
        for (account, name, key_type) in [
            (&sender, "alice@example.com", KeyType::Email),
            (&receiver, "bob@example.com", KeyType::Email),
        ] {
            keys.create(CreateKeyRequest {
                account_id: account.id,
                name: name.to_string(),
                key_type,
            })
            .await
            .unwrap();
        }

        let coordinator = Arc::new(PixCoordinator::new(
            ledger.clone(),
            transactions.clone(),
            notifier.clone(),
        ));

        Self {
            coordinator,
            ledger,
            transactions,
            notifier,
            sender,
            receiver,
        }
    }

    fn event(&self, key: &str, amount: &str) -> TransferEvent {
        TransferEvent {
            event_id: None,
            account_id: self.sender.id,
            key: key.to_string(),
            amount: dec(amount),
            webhook_url: Some(HOOK.to_string()),
        }
    }

    async fn balance(&self, id: AccountId) -> Decimal {
        self.ledger.find_account(id).await.unwrap().balance
    }

    async fn assert_balances(&self, sender: &str, receiver: &str) {
        assert_eq!(self.balance(self.sender.id).await, dec(sender));
        assert_eq!(self.balance(self.receiver.id).await, dec(receiver));
    }
}

// ============================================================================
// Happy path
// ============================================================================

#[tokio::test]
async fn test_transfer_completes() {
    let h = TestHarness::new("100.00").await;

    let outcome = h
        .coordinator
        .execute(h.event("bob@example.com", "40.00"))
        .await
        .unwrap();

    let id = match outcome {
        TransferOutcome::Completed(id) => id,
        other => panic!("expected Completed, got {:?}", other),
    };
    h.assert_balances("60.00", "40.00").await;

    let tx = h.transactions.get(id).await.unwrap().unwrap();
    assert_eq!(tx.status, TransactionStatus::Completed);
    assert!(tx.processed_at.is_some());
    assert!(tx.err_message.is_none());
    assert_eq!(tx.account_id, h.sender.id);
    assert_eq!(tx.receiver, h.receiver.id);
    assert_eq!(tx.value, dec("40.00"));

    let sent = h.notifier.sent();
    assert_eq!(sent.len(), 1);
    let (payload, url) = &sent[0];
    assert_eq!(url, HOOK);
    assert_eq!(payload.transaction_id, id);
    assert_eq!(payload.status, NotificationStatus::Completed);
    assert_eq!(payload.sender.name, "Alice");
    assert_eq!(payload.receiver.tax_id, "222.222.222-22");
    assert_eq!(payload.amount.to_string(), "40.00");
}

#[tokio::test]
async fn test_no_webhook_url_completes_directly() {
    let h = TestHarness::new("100.00").await;
    let mut event = h.event("bob@example.com", "10.00");
    event.webhook_url = None;

    let outcome = h.coordinator.execute(event).await.unwrap();
    let tx = h.transactions.get(outcome.transaction_id()).await.unwrap().unwrap();

    assert!(matches!(outcome, TransferOutcome::Completed(_)));
    assert_eq!(tx.status, TransactionStatus::Completed);
    assert!(h.notifier.sent().is_empty());
}

// ============================================================================
// Business failures
// ============================================================================

#[tokio::test]
async fn test_insufficient_balance_fails_without_mutation() {
    let h = TestHarness::new("10.00").await;

    let outcome = h
        .coordinator
        .execute(h.event("bob@example.com", "40.00"))
        .await
        .unwrap();

    assert!(matches!(
        outcome,
        TransferOutcome::Failed { reason: PixError::InsufficientBalance, .. }
    ));
    h.assert_balances("10.00", "0.00").await;

    let tx = h.transactions.get(outcome.transaction_id()).await.unwrap().unwrap();
    assert_eq!(tx.status, TransactionStatus::Failed);
    assert!(tx.err_message.unwrap().contains("insufficient balance"));
    assert!(tx.processed_at.is_none());
    assert!(h.notifier.sent().is_empty());
}

#[tokio::test]
async fn test_unknown_alias_creates_no_transaction() {
    let h = TestHarness::new("100.00").await;

    let result = h.coordinator.execute(h.event("not-a-real-key", "40.00")).await;

    assert_eq!(result, Err(PixError::InvalidKey));
    assert!(h.transactions.is_empty());
    h.assert_balances("100.00", "0.00").await;
}

#[tokio::test]
async fn test_blocked_receiver_fails_without_mutation() {
    let h = TestHarness::new("100.00").await;
    h.ledger.set_blocked(h.receiver.id, true).await.unwrap();

    let outcome = h
        .coordinator
        .execute(h.event("bob@example.com", "40.00"))
        .await
        .unwrap();

    assert!(matches!(
        outcome,
        TransferOutcome::Failed { reason: PixError::ReceiverBlocked, .. }
    ));
    h.assert_balances("100.00", "0.00").await;
    let tx = h.transactions.get(outcome.transaction_id()).await.unwrap().unwrap();
    assert_eq!(tx.status, TransactionStatus::Failed);
    assert!(h.notifier.sent().is_empty());
}

#[tokio::test]
async fn test_inactive_sender_rejected_before_record() {
    let h = TestHarness::new("100.00").await;
    h.ledger.set_blocked(h.sender.id, true).await.unwrap();

    let result = h.coordinator.execute(h.event("bob@example.com", "40.00")).await;

    assert_eq!(result, Err(PixError::InactiveAccount));
    assert!(h.transactions.is_empty());
}

#[tokio::test]
async fn test_unknown_sender_rejected() {
    let h = TestHarness::new("100.00").await;
    let mut event = h.event("bob@example.com", "40.00");
    event.account_id = Uuid::new_v4();

    assert_eq!(h.coordinator.execute(event).await, Err(PixError::SenderNotFound));
    assert!(h.transactions.is_empty());
}

#[tokio::test]
async fn test_self_transfer_rejected() {
    let h = TestHarness::new("100.00").await;

    let result = h.coordinator.execute(h.event("alice@example.com", "1.00")).await;

    assert_eq!(result, Err(PixError::SelfTransfer));
    assert!(h.transactions.is_empty());
    h.assert_balances("100.00", "0.00").await;
}

#[tokio::test]
async fn test_validation_rejects_before_any_state_change() {
    let h = TestHarness::new("100.00").await;

    for amount in ["0", "-40.00", "0.001"] {
        let result = h.coordinator.execute(h.event("bob@example.com", amount)).await;
        assert!(
            matches!(result, Err(PixError::InvalidAmount(_))),
            "amount {amount} gave {result:?}"
        );
    }

    let result = h.coordinator.execute(h.event("bob at example", "1.00")).await;
    assert!(matches!(result, Err(PixError::MalformedKey(_))));

    assert!(h.transactions.is_empty());
}

// ============================================================================
// Notification failures
// ============================================================================

#[tokio::test]
async fn test_webhook_failure_marks_failed_and_keeps_funds_moved() {
    let h = TestHarness::new("100.00").await;
    h.notifier.set_mode(Mode::Reject);

    let outcome = h
        .coordinator
        .execute(h.event("bob@example.com", "40.00"))
        .await
        .unwrap();

    assert!(matches!(
        outcome,
        TransferOutcome::Failed { reason: PixError::Notification(_), .. }
    ));
    h.assert_balances("60.00", "40.00").await;

    let tx = h.transactions.get(outcome.transaction_id()).await.unwrap().unwrap();
    assert_eq!(tx.status, TransactionStatus::Failed);
    assert!(tx.err_message.unwrap().starts_with("webhook dispatch failed"));
    assert!(tx.processed_at.is_none());
}

#[tokio::test]
async fn test_lost_completion_stamp_is_retried() {
    let h = TestHarness::new("100.00").await;
    h.notifier.set_mode(Mode::AcceptWithoutStamp);

    let outcome = h
        .coordinator
        .execute(h.event("bob@example.com", "40.00"))
        .await
        .unwrap();

    assert!(matches!(outcome, TransferOutcome::Completed(_)));
    let tx = h.transactions.get(outcome.transaction_id()).await.unwrap().unwrap();
    assert_eq!(tx.status, TransactionStatus::Completed);
    assert!(tx.processed_at.is_some());
}

// ============================================================================
// Infrastructure failures
// ============================================================================

#[tokio::test]
async fn test_ledger_error_during_mutation_fails_transaction() {
    let h = TestHarness::new("100.00").await;
    h.ledger.fail_apply.store(true, Ordering::SeqCst);

    let outcome = h
        .coordinator
        .execute(h.event("bob@example.com", "40.00"))
        .await
        .unwrap();

    assert!(matches!(
        outcome,
        TransferOutcome::Failed { reason: PixError::Transport(_), .. }
    ));
    h.assert_balances("100.00", "0.00").await;
    let tx = h.transactions.get(outcome.transaction_id()).await.unwrap().unwrap();
    assert!(tx.err_message.unwrap().contains("connection reset"));
}

#[tokio::test]
async fn test_handler_leaves_transport_errors_uncommitted() {
    let h = TestHarness::new("100.00").await;

    // Business rejection: acknowledged
    let handled = h
        .coordinator
        .on_transfer_requested(h.event("not-a-real-key", "40.00"))
        .await;
    assert!(handled.is_ok());

    // Sender lookup fails on the wire: redelivery wanted
    h.ledger.fail_find.store(true, Ordering::SeqCst);
    let handled = h
        .coordinator
        .on_transfer_requested(h.event("bob@example.com", "40.00"))
        .await;
    assert!(handled.is_err());
    assert!(h.transactions.is_empty());
}

#[tokio::test]
async fn test_status_write_failure_after_mutation_is_acknowledged() {
    let h = TestHarness::new("100.00").await;
    h.notifier.set_mode(Mode::Reject);
    let log = Arc::new(StatusWriteFailingLog {
        inner: MemoryTransactionLog::new(),
    });
    let coordinator = PixCoordinator::new(h.ledger.clone(), log.clone(), h.notifier.clone());

    // No event_id: only an acknowledged first delivery keeps this from being replayed
    let handled = coordinator
        .on_transfer_requested(h.event("bob@example.com", "40.00"))
        .await;
    assert!(handled.is_ok());
    h.assert_balances("60.00", "40.00").await;

    let outcome = coordinator
        .execute(h.event("bob@example.com", "10.00"))
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        TransferOutcome::FailureUnrecorded { reason: PixError::Notification(_), .. }
    ));
    let tx = log.get(outcome.transaction_id()).await.unwrap().unwrap();
    assert_eq!(tx.status, TransactionStatus::Pending);
    h.assert_balances("50.00", "50.00").await;
}

#[tokio::test]
async fn test_redelivery_after_status_write_failure_moves_funds_once() {
    let h = TestHarness::new("100.00").await;
    h.notifier.set_mode(Mode::Reject);
    let log = Arc::new(StatusWriteFailingLog {
        inner: MemoryTransactionLog::new(),
    });
    let coordinator = PixCoordinator::new(h.ledger.clone(), log.clone(), h.notifier.clone());
    let mut event = h.event("bob@example.com", "40.00");
    event.event_id = Some("evt-7".to_string());

    assert!(coordinator.on_transfer_requested(event.clone()).await.is_ok());
    assert!(coordinator.on_transfer_requested(event).await.is_ok());

    h.assert_balances("60.00", "40.00").await;
    assert_eq!(log.inner.len(), 1);
}

#[tokio::test]
async fn test_completion_write_failure_without_webhook_awaits_completion() {
    let h = TestHarness::new("100.00").await;
    let log = Arc::new(StatusWriteFailingLog {
        inner: MemoryTransactionLog::new(),
    });
    let coordinator = PixCoordinator::new(h.ledger.clone(), log.clone(), h.notifier.clone());
    let mut event = h.event("bob@example.com", "40.00");
    event.webhook_url = None;

    let outcome = coordinator.execute(event).await.unwrap();

    assert!(matches!(outcome, TransferOutcome::AwaitingCompletion(_)));
    h.assert_balances("60.00", "40.00").await;
    assert!(h.notifier.sent().is_empty());
}

// ============================================================================
// Idempotency and concurrency
// ============================================================================

#[tokio::test]
async fn test_redelivered_event_runs_once() {
    let h = TestHarness::new("100.00").await;
    let mut event = h.event("bob@example.com", "40.00");
    event.event_id = Some("evt-42".to_string());

    let first = h.coordinator.execute(event.clone()).await.unwrap();
    let second = h.coordinator.execute(event).await.unwrap();

    assert!(matches!(first, TransferOutcome::Completed(_)));
    assert_eq!(
        second,
        TransferOutcome::Duplicate {
            transaction_id: first.transaction_id(),
            status: TransactionStatus::Completed,
        }
    );
    h.assert_balances("60.00", "40.00").await;
    assert_eq!(h.transactions.len(), 1);
    assert_eq!(h.notifier.sent().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_debits_exactly_one_succeeds() {
    let h = TestHarness::new("100.00").await;

    let a = {
        let coordinator = h.coordinator.clone();
        let event = h.event("bob@example.com", "60.00");
        tokio::spawn(async move { coordinator.execute(event).await })
    };
    let b = {
        let coordinator = h.coordinator.clone();
        let event = h.event("bob@example.com", "70.00");
        tokio::spawn(async move { coordinator.execute(event).await })
    };

    let outcomes = [a.await.unwrap().unwrap(), b.await.unwrap().unwrap()];
    let completed = outcomes
        .iter()
        .filter(|o| matches!(o, TransferOutcome::Completed(_)))
        .count();
    let insufficient = outcomes
        .iter()
        .filter(|o| matches!(o, TransferOutcome::Failed { reason: PixError::InsufficientBalance, .. }))
        .count();

    assert_eq!(completed, 1);
    assert_eq!(insufficient, 1);

    let sender = h.balance(h.sender.id).await;
    let receiver = h.balance(h.receiver.id).await;
    assert!(sender >= Decimal::ZERO);
    assert_eq!(sender + receiver, dec("100.00"));
    assert!(sender == dec("40.00") || sender == dec("30.00"));
}
