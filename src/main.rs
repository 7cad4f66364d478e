//! Pix transfer service
//!
//! ```text
//! ┌─────────┐  publish   ┌───────────────┐  consume   ┌────────────────┐
//! │ Gateway │──────────▶│ Event Channel │──────────▶│ PixCoordinator │
//! └─────────┘            └───────────────┘            └───────┬────────┘
//!      │                                                      │
//!      ▼                                                      ▼
//!  Ledger / Transaction Log ◀─────────────────────── Ledger, Log, Webhook
//! ```

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use pix_transfer::config::AppConfig;
use pix_transfer::db::Database;
use pix_transfer::event::{ConsumerStats, EventHandler, EventPublisher, run_consumer};
use pix_transfer::gateway::{self, AppState};
use pix_transfer::ledger::{LedgerStore, MemoryLedgerStore, PgLedgerStore};
use pix_transfer::logging::init_logging;
use pix_transfer::pix::PixCoordinator;
use pix_transfer::transaction::{
    MemoryTransactionLog, PgTransactionLog, TransactionLog, TransactionService,
};
use pix_transfer::webhook::WebhookDispatcher;

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

struct Stores {
    ledger: Arc<dyn LedgerStore>,
    transactions: Arc<dyn TransactionLog>,
    db: Option<Arc<Database>>,
}

async fn build_stores(config: &AppConfig) -> anyhow::Result<Stores> {
    match &config.postgres_url {
        Some(url) => {
            let db = Database::connect(url)
                .await
                .context("connecting to PostgreSQL")?;
            db.migrate().await.context("running migrations")?;
            let pool = db.pool().clone();
            Ok(Stores {
                ledger: Arc::new(PgLedgerStore::new(pool.clone())),
                transactions: Arc::new(PgTransactionLog::new(pool)),
                db: Some(Arc::new(db)),
            })
        }
        None => {
            tracing::warn!("postgres_url not set, running on in-memory stores");
            Ok(Stores {
                ledger: Arc::new(MemoryLedgerStore::new()),
                transactions: Arc::new(MemoryTransactionLog::new()),
                db: None,
            })
        }
    }
}

#[cfg(feature = "kafka")]
fn start_channel(
    config: &AppConfig,
    handler: Arc<dyn EventHandler>,
    shutdown: &watch::Receiver<bool>,
) -> anyhow::Result<(Arc<dyn EventPublisher>, Vec<JoinHandle<ConsumerStats>>)> {
    use pix_transfer::event::KafkaEventChannel;

    let events = &config.events;
    let channel = KafkaEventChannel::new(
        &events.brokers.join(","),
        &events.topic,
        events.partitions as i32,
        events.publish_attempts,
    )
    .context("creating kafka channel")?;

    let group = events.consumer_group();
    let mut workers = Vec::with_capacity(events.partitions);
    for _ in 0..events.partitions {
        let subscription = channel.subscribe(&group).context("subscribing to topic")?;
        workers.push(tokio::spawn(run_consumer(
            subscription,
            handler.clone(),
            shutdown.clone(),
        )));
    }
    tracing::info!(topic = %events.topic, %group, workers = workers.len(), "Kafka consumers started");

    let publisher: Arc<dyn EventPublisher> = Arc::new(channel);
    Ok((publisher, workers))
}

#[cfg(not(feature = "kafka"))]
fn start_channel(
    config: &AppConfig,
    handler: Arc<dyn EventHandler>,
    shutdown: &watch::Receiver<bool>,
) -> anyhow::Result<(Arc<dyn EventPublisher>, Vec<JoinHandle<ConsumerStats>>)> {
    use pix_transfer::event::MemoryEventChannel;

    let events = &config.events;
    let channel = Arc::new(MemoryEventChannel::new(&events.topic, events.partitions));
    let group = events.consumer_group();

    let mut workers = Vec::with_capacity(channel.partition_count());
    for partition in 0..channel.partition_count() as i32 {
        let subscription = channel.subscribe(&group, partition)?;
        workers.push(tokio::spawn(run_consumer(
            subscription,
            handler.clone(),
            shutdown.clone(),
        )));
    }
    tracing::info!(topic = %events.topic, %group, workers = workers.len(), "In-process event channel started");

    let publisher: Arc<dyn EventPublisher> = channel;
    Ok((publisher, workers))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let config = AppConfig::load(&env)?;
    let _log_guard = init_logging(&config)?;

    tracing::info!("Starting Pix transfer service in {} mode", env);

    let stores = build_stores(&config).await?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let dispatcher = WebhookDispatcher::new(stores.transactions.clone(), config.webhook.timeout())?;
    let coordinator = PixCoordinator::new(
        stores.ledger.clone(),
        stores.transactions.clone(),
        Arc::new(dispatcher),
    )
    .with_default_webhook_url(config.webhook.default_url.clone());

    let (publisher, workers) = start_channel(&config, Arc::new(coordinator), &shutdown_rx)?;

    let mut state = AppState::new(
        stores.ledger,
        TransactionService::new(stores.transactions),
        publisher,
        config.events.publish_retry(),
    );
    if let Some(db) = stores.db {
        state = state.with_database(db);
    }

    let addr = config.gateway.socket_addr()?;
    let server = tokio::spawn(gateway::run_server(addr, Arc::new(state), shutdown_rx));

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    tracing::info!("Shutdown requested");
    let _ = shutdown_tx.send(true);

    if let Err(e) = server.await? {
        tracing::error!(error = %e, "Gateway exited with error");
    }
    let mut total = ConsumerStats::default();
    for stats in futures::future::join_all(workers).await {
        let stats = stats?;
        total.handled += stats.handled;
        total.failed += stats.failed;
        total.malformed += stats.malformed;
    }
    tracing::info!(
        handled = total.handled,
        failed = total.failed,
        malformed = total.malformed,
        "All consumers stopped"
    );

    Ok(())
}
