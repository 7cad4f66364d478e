//! reqwest-based dispatcher with completion callback

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::error::WebhookError;
use super::payload::{NotificationStatus, WebhookPayload};
use crate::transaction::{Stamp, TransactionId, TransactionLog};

/// Outbound notification seam
#[async_trait]
pub trait Notifier: Send + Sync {
    /// POST `payload` to `url`. Any status outside 200..300 is a failure.
    async fn send(&self, payload: &WebhookPayload, url: &str) -> Result<(), WebhookError>;
}

pub struct WebhookDispatcher {
    client: Client,
    transactions: Arc<dyn TransactionLog>,
}

impl WebhookDispatcher {
    /// `timeout: None` leaves the call unbounded
    pub fn new(transactions: Arc<dyn TransactionLog>, timeout: Option<Duration>) -> Result<Self, WebhookError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| WebhookError::Client(e.to_string()))?;

        Ok(Self {
            client,
            transactions,
        })
    }

    /// Stamp the transaction processed; repeated stamps are no-ops
    async fn complete(&self, id: TransactionId) -> Result<(), WebhookError> {
        match self.transactions.mark_processed(id).await {
            Ok(Stamp::Stamped) => {
                tracing::info!(transaction_id = %id, "Transaction completed");
                Ok(())
            }
            Ok(Stamp::AlreadyProcessed) => {
                tracing::debug!(transaction_id = %id, "Transaction already processed");
                Ok(())
            }
            Err(e) => Err(WebhookError::Completion(e.to_string())),
        }
    }
}

#[async_trait]
impl Notifier for WebhookDispatcher {
    async fn send(&self, payload: &WebhookPayload, url: &str) -> Result<(), WebhookError> {
        let response = self
            .client
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(|e| WebhookError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(
                transaction_id = %payload.transaction_id,
                status = status.as_u16(),
                url,
                "Webhook rejected"
            );
            return Err(WebhookError::Status(status.as_u16()));
        }

        tracing::debug!(transaction_id = %payload.transaction_id, url, "Webhook delivered");

        if payload.status == NotificationStatus::Completed {
            self.complete(payload.transaction_id).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::{MemoryTransactionLog, NewTransaction, TransactionStatus};
    use crate::webhook::AccountSnapshot;
    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::post;
    use std::sync::Mutex;
    use uuid::Uuid;

    type Received = Arc<Mutex<Vec<serde_json::Value>>>;

    /// Local webhook sink answering with `status`
    async fn sink(status: StatusCode) -> (String, Received) {
        let received: Received = Arc::new(Mutex::new(Vec::new()));
        let store = Arc::clone(&received);
        let app = Router::new().route(
            "/hook",
            post(move |axum::Json(body): axum::Json<serde_json::Value>| {
                let store = Arc::clone(&store);
                async move {
                    store.lock().unwrap().push(body);
                    status
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}/hook", addr), received)
    }

    async fn pending(log: &MemoryTransactionLog) -> TransactionId {
        log.create(NewTransaction {
            account_id: Uuid::new_v4(),
            receiver: Uuid::new_v4(),
            value: "40.00".parse().unwrap(),
            idempotency_key: None,
        })
        .await
        .unwrap()
        .id
    }

    fn payload(id: TransactionId, status: NotificationStatus) -> WebhookPayload {
        let party = AccountSnapshot {
            name: "Alice".to_string(),
            agency: "0001".to_string(),
            bank: "001".to_string(),
            tax_id: "123.456.789-00".to_string(),
        };
        WebhookPayload {
            transaction_id: id,
            sender: party.clone(),
            receiver: party,
            amount: "40.00".parse().unwrap(),
            status,
        }
    }

    #[tokio::test]
    async fn test_success_stamps_transaction_once() {
        let (url, received) = sink(StatusCode::OK).await;
        let log = Arc::new(MemoryTransactionLog::new());
        let id = pending(&log).await;
        let dispatcher = WebhookDispatcher::new(log.clone(), None).unwrap();

        dispatcher
            .send(&payload(id, NotificationStatus::Completed), &url)
            .await
            .unwrap();
        let first = log.get(id).await.unwrap().unwrap();
        assert_eq!(first.status, TransactionStatus::Completed);

        // second delivery: stamp is a no-op
        dispatcher
            .send(&payload(id, NotificationStatus::Completed), &url)
            .await
            .unwrap();
        let second = log.get(id).await.unwrap().unwrap();
        assert_eq!(second.processed_at, first.processed_at);

        let bodies = received.lock().unwrap();
        assert_eq!(bodies.len(), 2);
        assert_eq!(bodies[0]["status"], "COMPLETED");
        assert_eq!(bodies[0]["amount"], "40.00");
    }

    #[tokio::test]
    async fn test_non_2xx_is_failure_and_leaves_pending() {
        let (url, _) = sink(StatusCode::INTERNAL_SERVER_ERROR).await;
        let log = Arc::new(MemoryTransactionLog::new());
        let id = pending(&log).await;
        let dispatcher = WebhookDispatcher::new(log.clone(), None).unwrap();

        let err = dispatcher
            .send(&payload(id, NotificationStatus::Completed), &url)
            .await
            .unwrap_err();
        assert_eq!(err, WebhookError::Status(500));
        assert_eq!(log.get(id).await.unwrap().unwrap().status, TransactionStatus::Pending);
    }

    #[tokio::test]
    async fn test_failed_payload_does_not_stamp() {
        let (url, _) = sink(StatusCode::NO_CONTENT).await;
        let log = Arc::new(MemoryTransactionLog::new());
        let id = pending(&log).await;
        let dispatcher = WebhookDispatcher::new(log.clone(), None).unwrap();

        dispatcher
            .send(&payload(id, NotificationStatus::Failed), &url)
            .await
            .unwrap();
        assert_eq!(log.get(id).await.unwrap().unwrap().status, TransactionStatus::Pending);
    }

    #[tokio::test]
    async fn test_transport_error() {
        let log = Arc::new(MemoryTransactionLog::new());
        let id = pending(&log).await;
        let dispatcher =
            WebhookDispatcher::new(log.clone(), Some(Duration::from_secs(2))).unwrap();

        // Bind then drop to get a port with no listener
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = dispatcher
            .send(&payload(id, NotificationStatus::Completed), &format!("http://{}/hook", addr))
            .await
            .unwrap_err();
        assert!(matches!(err, WebhookError::Transport(_)));
    }

    #[tokio::test]
    async fn test_completion_error_reported_after_delivery() {
        let (url, _) = sink(StatusCode::OK).await;
        let log = Arc::new(MemoryTransactionLog::new());
        let id = pending(&log).await;
        log.mark_failed(id, "insufficient balance").await.unwrap();
        let dispatcher = WebhookDispatcher::new(log.clone(), None).unwrap();

        let err = dispatcher
            .send(&payload(id, NotificationStatus::Completed), &url)
            .await
            .unwrap_err();
        assert!(err.was_delivered());
    }
}
