use std::sync::Arc;
use std::time::{Duration, Instant};

use grantflow_domain::DomainResult;
use grantflow_domain::delivery::{EventRecord, EventStatus};
use grantflow_domain::ports::BoxFuture;
use grantflow_domain::ports::delivery::EventRecordRepository;
use grantflow_domain::ports::fifo::FifoLockRepository;
use grantflow_domain::util::uuid_v7_without_dashes;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{Instrument, debug, info, warn};

use crate::observability;

pub trait EventDispatcher: Send + Sync {
    fn dispatch(&self, record: &EventRecord) -> BoxFuture<'_, DomainResult<()>>;
}

#[derive(Clone, Debug)]
pub struct SubscriberConfig {
    pub actor: &'static str,
    pub poll_interval: Duration,
    pub claim_batch_size: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PollSummary {
    pub claimed: usize,
    pub completed: usize,
    pub failed: usize,
    pub expired: u64,
    pub resubmitted: u64,
    pub republished: u64,
    pub dead: u64,
}

enum RecordResult {
    Completed,
    Failed,
}

pub struct Subscriber {
    config: SubscriberConfig,
    worker_id: String,
    records: Arc<dyn EventRecordRepository>,
    locks: Arc<dyn FifoLockRepository>,
    dispatcher: Arc<dyn EventDispatcher>,
}

impl Subscriber {
    pub fn new(
        config: SubscriberConfig,
        records: Arc<dyn EventRecordRepository>,
        locks: Arc<dyn FifoLockRepository>,
        dispatcher: Arc<dyn EventDispatcher>,
    ) -> Self {
        let worker_id = format!("{}-{}", config.actor, uuid_v7_without_dashes());
        Self {
            config,
            worker_id,
            records,
            locks,
            dispatcher,
        }
    }

    pub async fn run(&self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(
            actor = self.config.actor,
            worker_id = %self.worker_id,
            "subscriber started"
        );

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            let summary = self.poll_once().await;
            if summary != PollSummary::default() {
                debug!(
                    actor = self.config.actor,
                    claimed = summary.claimed,
                    completed = summary.completed,
                    failed = summary.failed,
                    expired = summary.expired,
                    resubmitted = summary.resubmitted,
                    republished = summary.republished,
                    dead = summary.dead,
                    "poll cycle finished"
                );
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.poll_interval) => {}
                _ = shutdown_rx.changed() => {}
            }
        }

        info!(actor = self.config.actor, "subscriber stopped");
    }

    pub async fn poll_once(&self) -> PollSummary {
        let mut summary = PollSummary::default();
        if let Err(err) = self.drain_next_key(&mut summary).await {
            warn!(actor = self.config.actor, error = %err, "claim cycle failed");
        }
        self.maintenance(&mut summary).await;
        summary
    }

    async fn drain_next_key(&self, summary: &mut PollSummary) -> DomainResult<()> {
        let locked = self.locks.get_fifo_locks(self.config.actor).await?;
        let Some(key) = self.records.next_available_segregation(&locked).await? else {
            return Ok(());
        };
        if !self.locks.set_fifo_lock(self.config.actor, &key).await? {
            debug!(
                actor = self.config.actor,
                segregation_ref = %key,
                "segregation key already locked"
            );
            return Ok(());
        }

        let drained = self.process_key(&key, summary).await;
        if let Err(err) = self.locks.free_fifo_lock(self.config.actor, &key).await {
            warn!(
                actor = self.config.actor,
                segregation_ref = %key,
                error = %err,
                "failed to release fifo lock"
            );
        }
        drained
    }

    async fn process_key(&self, key: &str, summary: &mut PollSummary) -> DomainResult<()> {
        let batch = self
            .records
            .claim_events(&self.worker_id, key, self.config.claim_batch_size)
            .await?;
        if batch.is_empty() {
            return Ok(());
        }
        summary.claimed += batch.len();
        observability::register_claim_batch(self.config.actor, batch.len());

        let mut tasks = JoinSet::new();
        for record in batch {
            let records = self.records.clone();
            let dispatcher = self.dispatcher.clone();
            let actor = self.config.actor;
            tasks.spawn(process_record(records, dispatcher, actor, record));
        }
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(RecordResult::Completed) => summary.completed += 1,
                Ok(RecordResult::Failed) => summary.failed += 1,
                Err(err) => {
                    warn!(actor = self.config.actor, error = %err, "record task panicked");
                    summary.failed += 1;
                }
            }
        }
        Ok(())
    }

    async fn maintenance(&self, summary: &mut PollSummary) {
        let actor = self.config.actor;
        match self.records.process_expired_events().await {
            Ok(modified) => {
                summary.expired = modified;
                observability::register_maintenance(actor, "expired", modified);
            }
            Err(err) => warn!(actor, error = %err, "expired lease sweep failed"),
        }
        match self.records.update_failed_events().await {
            Ok(modified) => {
                summary.resubmitted = modified;
                observability::register_maintenance(actor, "resubmitted", modified);
            }
            Err(err) => warn!(actor, error = %err, "failed record sweep failed"),
        }
        match self.records.update_resubmitted_events().await {
            Ok(modified) => {
                summary.republished = modified;
                observability::register_maintenance(actor, "republished", modified);
            }
            Err(err) => warn!(actor, error = %err, "resubmitted record sweep failed"),
        }
        match self.records.update_dead_events().await {
            Ok(modified) => {
                summary.dead = modified;
                observability::register_maintenance(actor, "dead", modified);
                if modified > 0 {
                    warn!(actor, moved = modified, "records moved to dead letter");
                }
            }
            Err(err) => warn!(actor, error = %err, "dead letter sweep failed"),
        }
        match self.records.count_by_status(EventStatus::Dead).await {
            Ok(depth) => observability::set_dead_letter_depth(actor, depth),
            Err(err) => warn!(actor, error = %err, "dead letter depth query failed"),
        }
    }
}

async fn process_record(
    records: Arc<dyn EventRecordRepository>,
    dispatcher: Arc<dyn EventDispatcher>,
    actor: &'static str,
    record: EventRecord,
) -> RecordResult {
    let span = tracing::info_span!(
        "handle_event",
        actor,
        record_id = %record.id,
        segregation_ref = %record.segregation_ref,
        traceparent = record.trace_parent.as_deref().unwrap_or_default(),
    );
    let started = Instant::now();
    let dispatched = dispatcher.dispatch(&record).instrument(span).await;
    let elapsed_ms = started.elapsed().as_secs_f64() * 1_000.0;

    match dispatched {
        Ok(()) => {
            let completed = record.clone().into_completed();
            match records.update(&completed).await {
                Ok(_) => {
                    observability::register_record_processed(actor, "completed", elapsed_ms);
                    RecordResult::Completed
                }
                Err(err) => {
                    warn!(
                        record_id = %record.id,
                        error = %err,
                        "failed to mark record complete"
                    );
                    RecordResult::Failed
                }
            }
        }
        Err(err) => {
            warn!(record_id = %record.id, error = %err, "dispatch failed");
            observability::register_record_processed(actor, "failed", elapsed_ms);
            let failed = record.clone().into_failed();
            if let Err(update_err) = records.update(&failed).await {
                warn!(
                    record_id = %record.id,
                    error = %update_err,
                    "failed to mark record failed"
                );
            }
            RecordResult::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grantflow_domain::error::DomainError;
    use grantflow_infra::repositories::{MemoryStore, RetryPolicy};
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingDispatcher {
        seen: Mutex<Vec<i64>>,
        fail: bool,
    }

    impl RecordingDispatcher {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        fn seen(&self) -> Vec<i64> {
            self.seen.lock().expect("seen lock").clone()
        }
    }

    impl EventDispatcher for RecordingDispatcher {
        fn dispatch(&self, record: &EventRecord) -> BoxFuture<'_, DomainResult<()>> {
            self.seen
                .lock()
                .expect("seen lock")
                .push(record.publication_date_ms);
            let fail = self.fail;
            Box::pin(async move {
                if fail {
                    Err(DomainError::Store("publish refused".into()))
                } else {
                    Ok(())
                }
            })
        }
    }

    fn record_at(segregation: &str, publication_date_ms: i64) -> EventRecord {
        let mut record = EventRecord::outbox(
            "application-events",
            json!({"type": "ApplicationStatusUpdatedEvent"}),
            segregation,
            None,
        )
        .expect("record");
        record.publication_date_ms = publication_date_ms;
        record
    }

    fn subscriber(
        store: &MemoryStore,
        dispatcher: Arc<RecordingDispatcher>,
        claim_batch_size: usize,
    ) -> Subscriber {
        Subscriber::new(
            SubscriberConfig {
                actor: "outbox",
                poll_interval: Duration::from_millis(10),
                claim_batch_size,
            },
            store.outbox(),
            store.fifo_locks(),
            dispatcher,
        )
    }

    #[tokio::test]
    async fn records_within_a_key_are_processed_in_publication_order() {
        let store = MemoryStore::new(RetryPolicy::default());
        for record in [
            record_at("key-a", 1_000),
            record_at("key-a", 2_000),
            record_at("key-a", 3_000),
            record_at("key-b", 1_500),
        ] {
            store.outbox().insert(&record).await.expect("insert");
        }

        let dispatcher = Arc::new(RecordingDispatcher::default());
        let subscriber = subscriber(&store, dispatcher.clone(), 1);

        let mut completed = 0;
        for _ in 0..4 {
            completed += subscriber.poll_once().await.completed;
        }

        assert_eq!(completed, 4);
        assert_eq!(dispatcher.seen(), vec![1_000, 1_500, 2_000, 3_000]);
        assert_eq!(
            store
                .outbox()
                .count_by_status(EventStatus::Completed)
                .await
                .expect("count"),
            4
        );
    }

    #[tokio::test]
    async fn a_claimed_batch_fans_out_and_completes() {
        let store = MemoryStore::new(RetryPolicy::default());
        for record in [
            record_at("key-a", 1_000),
            record_at("key-a", 2_000),
            record_at("key-a", 3_000),
        ] {
            store.outbox().insert(&record).await.expect("insert");
        }

        let dispatcher = Arc::new(RecordingDispatcher::default());
        let subscriber = subscriber(&store, dispatcher.clone(), 10);

        let summary = subscriber.poll_once().await;
        assert_eq!(summary.claimed, 3);
        assert_eq!(summary.completed, 3);
        assert_eq!(summary.failed, 0);

        let mut seen = dispatcher.seen();
        seen.sort_unstable();
        assert_eq!(seen, vec![1_000, 2_000, 3_000]);
    }

    #[tokio::test]
    async fn failing_dispatch_retries_then_dead_letters() {
        let store = MemoryStore::new(RetryPolicy {
            max_retries: 2,
            lease_ms: 30_000,
        });
        store
            .outbox()
            .insert(&record_at("key-a", 1_000))
            .await
            .expect("insert");

        let dispatcher = Arc::new(RecordingDispatcher::failing());
        let subscriber = subscriber(&store, dispatcher.clone(), 10);

        for _ in 0..4 {
            subscriber.poll_once().await;
        }

        // dispatched exactly max_retries times, then never claimed again
        assert_eq!(dispatcher.seen().len(), 2);
        assert_eq!(
            store
                .outbox()
                .count_by_status(EventStatus::Dead)
                .await
                .expect("count"),
            1
        );
    }

    #[tokio::test]
    async fn locked_keys_are_not_claimed() {
        let store = MemoryStore::new(RetryPolicy::default());
        store
            .outbox()
            .insert(&record_at("key-a", 1_000))
            .await
            .expect("insert");

        let dispatcher = Arc::new(RecordingDispatcher::default());
        let subscriber = subscriber(&store, dispatcher.clone(), 10);

        assert!(
            store
                .fifo_locks()
                .set_fifo_lock("outbox", "key-a")
                .await
                .expect("lock")
        );
        let summary = subscriber.poll_once().await;
        assert_eq!(summary.claimed, 0);
        assert!(dispatcher.seen().is_empty());

        store
            .fifo_locks()
            .free_fifo_lock("outbox", "key-a")
            .await
            .expect("free");
        let summary = subscriber.poll_once().await;
        assert_eq!(summary.claimed, 1);
        assert_eq!(summary.completed, 1);
    }

    #[tokio::test]
    async fn shutdown_signal_stops_the_loop() {
        let store = MemoryStore::new(RetryPolicy::default());
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let subscriber = subscriber(&store, dispatcher, 10);

        let (shutdown_tx, shutdown_rx) = watch::channel(true);
        tokio::time::timeout(Duration::from_secs(1), subscriber.run(shutdown_rx))
            .await
            .expect("loop exits once the stop flag is observed");
        drop(shutdown_tx);
    }
}
