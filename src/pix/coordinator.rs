//! Transfer saga driver

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use super::error::PixError;
use super::resolver::KeyResolver;
use crate::event::{EventError, EventHandler, TransferEvent};
use crate::ledger::{Account, LedgerError, LedgerStore};
use crate::money::Amount;
use crate::transaction::{
    NewTransaction, TransactionId, TransactionLog, TransactionLogError, TransactionStatus,
};
use crate::webhook::{Notifier, WebhookPayload};

/// How one event ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// Balances moved and the transaction is COMPLETED
    Completed(TransactionId),
    /// Transaction is FAILED with `reason` as its message
    Failed {
        transaction_id: TransactionId,
        reason: PixError,
    },
    /// Event already produced a transaction; nothing was run
    Duplicate {
        transaction_id: TransactionId,
        status: TransactionStatus,
    },
    /// Balances moved and the transfer succeeded, but the completion stamp
    /// could not be written; the transaction stays PENDING
    AwaitingCompletion(TransactionId),
    /// Balances moved, the webhook failed, and the FAILED status could not be
    /// written; the transaction stays PENDING
    FailureUnrecorded {
        transaction_id: TransactionId,
        reason: PixError,
    },
}

impl TransferOutcome {
    pub fn transaction_id(&self) -> TransactionId {
        match self {
            TransferOutcome::Completed(id) | TransferOutcome::AwaitingCompletion(id) => *id,
            TransferOutcome::Failed { transaction_id, .. }
            | TransferOutcome::Duplicate { transaction_id, .. }
            | TransferOutcome::FailureUnrecorded { transaction_id, .. } => *transaction_id,
        }
    }
}

/// Pix transfer coordinator
pub struct PixCoordinator {
    ledger: Arc<dyn LedgerStore>,
    transactions: Arc<dyn TransactionLog>,
    notifier: Arc<dyn Notifier>,
    resolver: KeyResolver,
    default_webhook_url: Option<String>,
}

impl PixCoordinator {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        transactions: Arc<dyn TransactionLog>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            resolver: KeyResolver::new(ledger.clone()),
            ledger,
            transactions,
            notifier,
            default_webhook_url: None,
        }
    }

    /// Callback URL for events that carry none
    pub fn with_default_webhook_url(mut self, url: Option<String>) -> Self {
        self.default_webhook_url = url;
        self
    }

    /// Run the saga for one transfer event
    ///
    /// `Err` means no balance was touched: either the event was rejected before a
    /// transaction record existed, or infrastructure failed before the mutation.
    /// Failures after the record exists are reported as [`TransferOutcome::Failed`].
    /// Once balances have moved this never returns `Err`, so the event is always
    /// acknowledged and cannot be replayed into a second debit.
    pub async fn execute(&self, event: TransferEvent) -> Result<TransferOutcome, PixError> {
        // 1. Validation, no I/O
        let amount = Amount::try_from(event.amount).map_err(PixError::InvalidAmount)?;
        KeyResolver::classify(&event.key)?;

        // Redelivered event
        if let Some(event_id) = &event.event_id
            && let Some(existing) = self.transactions.find_by_idempotency_key(event_id).await?
        {
            info!(
                event_id = %event_id,
                transaction_id = %existing.id,
                status = %existing.status,
                "Event already processed"
            );
            return Ok(TransferOutcome::Duplicate {
                transaction_id: existing.id,
                status: existing.status,
            });
        }

        // 2. Receiver
        let receiver = self.resolver.resolve(&event.key).await?;

        // 3. Sender
        let sender = self.load_sender(&event).await?;
        if sender.id == receiver.id {
            return Err(PixError::SelfTransfer);
        }

        // 4. PENDING record
        let new = NewTransaction {
            account_id: sender.id,
            receiver: receiver.id,
            value: amount,
            idempotency_key: event.event_id.clone(),
        };
        let tx = match self.transactions.create(new).await {
            Ok(tx) => tx,
            Err(TransactionLogError::DuplicateKey(key)) => {
                // Lost a race with a concurrent delivery of the same event
                let existing = self
                    .transactions
                    .find_by_idempotency_key(&key)
                    .await?
                    .ok_or_else(|| PixError::Transport(format!("idempotency key {} vanished", key)))?;
                return Ok(TransferOutcome::Duplicate {
                    transaction_id: existing.id,
                    status: existing.status,
                });
            }
            Err(e) => return Err(e.into()),
        };
        let id = tx.id;
        debug!(transaction_id = %id, sender = %sender.id, receiver = %receiver.id, amount = %amount, "Transaction created");

        // 5. Balance pre-check; the authoritative check runs inside apply_transfer
        if sender.balance < amount.value() {
            return self.fail(id, PixError::InsufficientBalance).await;
        }

        // 6. Atomic mutation
        if let Err(e) = self.ledger.apply_transfer(sender.id, receiver.id, amount).await {
            let reason = match e {
                LedgerError::InsufficientBalance => PixError::InsufficientBalance,
                LedgerError::ReceiverBlocked => PixError::ReceiverBlocked,
                LedgerError::SenderBlocked => PixError::InactiveAccount,
                LedgerError::SameAccount => PixError::SelfTransfer,
                LedgerError::AccountNotFound(account) if account == sender.id => {
                    PixError::SenderNotFound
                }
                LedgerError::AccountNotFound(_) => PixError::InvalidKey,
                other => PixError::Transport(other.to_string()),
            };
            return self.fail(id, reason).await;
        }
        info!(transaction_id = %id, amount = %amount, "Balances updated");

        // 7-8. Notification; a 2xx makes the dispatcher stamp COMPLETED
        let Some(url) = event.webhook_url.as_deref().or(self.default_webhook_url.as_deref()) else {
            return Ok(match self.transactions.mark_processed(id).await {
                Ok(_) => {
                    info!(transaction_id = %id, "Transaction completed without webhook");
                    TransferOutcome::Completed(id)
                }
                Err(e) => {
                    error!(transaction_id = %id, error = %e, "Transaction left PENDING after balances moved");
                    TransferOutcome::AwaitingCompletion(id)
                }
            });
        };

        let payload = WebhookPayload::completed(id, &sender, &receiver, amount);
        match self.notifier.send(&payload, url).await {
            Ok(()) => Ok(TransferOutcome::Completed(id)),
            Err(e) if e.was_delivered() => {
                warn!(transaction_id = %id, error = %e, "Completion stamp failed, retrying once");
                match self.transactions.mark_processed(id).await {
                    Ok(_) => Ok(TransferOutcome::Completed(id)),
                    Err(e) => {
                        error!(
                            transaction_id = %id,
                            error = %e,
                            "Transaction left PENDING after delivered webhook"
                        );
                        Ok(TransferOutcome::AwaitingCompletion(id))
                    }
                }
            }
            // 9. Funds stay moved; the record says FAILED
            Err(e) => {
                error!(
                    transaction_id = %id,
                    sender = %sender.id,
                    receiver = %receiver.id,
                    amount = %amount,
                    error = %e,
                    "Webhook failed after balances moved"
                );
                Ok(self.fail_after_mutation(id, PixError::Notification(e.to_string())).await)
            }
        }
    }

    async fn load_sender(&self, event: &TransferEvent) -> Result<Account, PixError> {
        let sender = match self.ledger.find_account(event.account_id).await {
            Ok(account) => account,
            Err(LedgerError::AccountNotFound(_)) => return Err(PixError::SenderNotFound),
            Err(e) => return Err(PixError::Transport(e.to_string())),
        };
        if !sender.is_active() {
            return Err(PixError::InactiveAccount);
        }
        Ok(sender)
    }

    /// PENDING -> FAILED with `reason` as err_message
    async fn fail(&self, id: TransactionId, reason: PixError) -> Result<TransferOutcome, PixError> {
        if !self.transactions.mark_failed(id, &reason.to_string()).await? {
            warn!(transaction_id = %id, "Transaction was no longer PENDING");
        }
        warn!(transaction_id = %id, code = reason.code(), reason = %reason, "Transaction failed");
        Ok(TransferOutcome::Failed {
            transaction_id: id,
            reason,
        })
    }

    /// PENDING -> FAILED once balances have moved; log errors are reported, not returned
    async fn fail_after_mutation(&self, id: TransactionId, reason: PixError) -> TransferOutcome {
        match self.fail(id, reason.clone()).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(
                    transaction_id = %id,
                    reason = %reason,
                    error = %e,
                    "Transaction left PENDING after balances moved"
                );
                TransferOutcome::FailureUnrecorded {
                    transaction_id: id,
                    reason,
                }
            }
        }
    }
}

#[async_trait]
impl EventHandler for PixCoordinator {
    async fn on_transfer_requested(&self, event: TransferEvent) -> Result<(), EventError> {
        let account_id = event.account_id;
        match self.execute(event).await {
            Ok(outcome) => {
                debug!(%account_id, ?outcome, "Transfer event handled");
                Ok(())
            }
            Err(e) if e.is_retryable() => {
                error!(%account_id, error = %e, "Transfer aborted before balance mutation");
                Err(e.into())
            }
            Err(e) => {
                warn!(%account_id, code = e.code(), error = %e, "Transfer rejected");
                Ok(())
            }
        }
    }
}
