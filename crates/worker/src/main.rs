mod inbox;
mod intake;
mod observability;
mod outbox;
mod subscriber;

use std::sync::Arc;
use std::time::Duration;

use grantflow_domain::intake::{InboxIntake, IntakeConfig};
use grantflow_domain::ports::db::StoreAdapter;
use grantflow_domain::transition::ApplyExternalStateChange;
use grantflow_infra::bus::RedisMessageBus;
use grantflow_infra::config::AppConfig;
use grantflow_infra::db::{DocumentStoreAdapter, StoreConfig};
use grantflow_infra::dedup::RedisDedupStore;
use grantflow_infra::logging::init_tracing;
use grantflow_infra::repositories::{MemoryStore, RetryPolicy};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::info;

use crate::inbox::InboxDispatcher;
use crate::intake::IntakeLoop;
use crate::outbox::OutboxDispatcher;
use crate::subscriber::{Subscriber, SubscriberConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    init_tracing(&config)?;
    observability::init_metrics()?;

    if config.data_backend != "memory" {
        let adapter = DocumentStoreAdapter::new(StoreConfig::from_app_config(&config));
        adapter.health_check().await?;
        info!(store = adapter.name(), "store reachable");
    }

    let policy = RetryPolicy {
        max_retries: config.worker_max_retry_attempts,
        lease_ms: config.worker_claim_lease_ms,
    };
    let store = MemoryStore::new(policy);

    let bus = Arc::new(
        RedisMessageBus::connect_with_prefix(&config.redis_url, config.bus_prefix.clone()).await?,
    );
    let dedup = Arc::new(RedisDedupStore::connect(&config.redis_url).await?);

    let poll_interval = Duration::from_millis(config.worker_poll_interval_ms);
    let outbox_subscriber = Arc::new(Subscriber::new(
        SubscriberConfig {
            actor: "outbox",
            poll_interval,
            claim_batch_size: config.worker_claim_batch_size,
        },
        store.outbox(),
        store.fifo_locks(),
        Arc::new(OutboxDispatcher::new(store.outbox(), bus.clone())),
    ));
    let inbox_subscriber = Arc::new(Subscriber::new(
        SubscriberConfig {
            actor: "inbox",
            poll_interval,
            claim_batch_size: config.worker_claim_batch_size,
        },
        store.inbox(),
        store.fifo_locks(),
        Arc::new(InboxDispatcher::new(ApplyExternalStateChange::new(
            store.applications(),
            store.grants(),
        ))),
    ));
    let intake_loop = Arc::new(IntakeLoop::new(
        bus,
        InboxIntake::new(
            store.inbox(),
            dedup,
            IntakeConfig {
                consumer: "inbox".to_string(),
                dedup_ttl: Duration::from_secs(config.inbox_dedup_ttl_secs),
            },
        ),
        config.inbox_queue.clone(),
        Duration::from_secs(1),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks = JoinSet::new();
    {
        let subscriber = outbox_subscriber.clone();
        let shutdown_rx = shutdown_rx.clone();
        tasks.spawn(async move { subscriber.run(shutdown_rx).await });
    }
    {
        let subscriber = inbox_subscriber.clone();
        let shutdown_rx = shutdown_rx.clone();
        tasks.spawn(async move { subscriber.run(shutdown_rx).await });
    }
    {
        let intake_loop = intake_loop.clone();
        let shutdown_rx = shutdown_rx.clone();
        tasks.spawn(async move { intake_loop.run(shutdown_rx).await });
    }

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);
    while tasks.join_next().await.is_some() {}
    info!("worker shutdown");

    Ok(())
}
