use std::collections::HashMap;
use std::sync::Arc;

use grantflow_domain::DomainResult;
use grantflow_domain::application::Application;
use grantflow_domain::delivery::{DispatchLog, EventRecord, EventStatus};
use grantflow_domain::error::DomainError;
use grantflow_domain::fifo::FifoLock;
use grantflow_domain::grant::Grant;
use grantflow_domain::ports::BoxFuture;
use grantflow_domain::ports::applications::ApplicationRepository;
use grantflow_domain::ports::delivery::EventRecordRepository;
use grantflow_domain::ports::fifo::FifoLockRepository;
use grantflow_domain::ports::grants::GrantRepository;
use grantflow_domain::util::now_ms;
use tokio::sync::RwLock;

#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub lease_ms: i64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            lease_ms: 30_000,
        }
    }
}

#[derive(Clone, Debug)]
struct StoredRecord {
    record: EventRecord,
    seq: u64,
}

#[derive(Default)]
struct RecordCollection {
    records: HashMap<String, StoredRecord>,
    next_seq: u64,
}

impl RecordCollection {
    fn insert(&mut self, record: EventRecord) -> DomainResult<EventRecord> {
        if self.records.contains_key(&record.id) {
            return Err(DomainError::Conflict);
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.records.insert(
            record.id.clone(),
            StoredRecord {
                record: record.clone(),
                seq,
            },
        );
        Ok(record)
    }

    fn oldest_claimable<'a>(
        &'a self,
        max_retries: u32,
        matches: impl Fn(&EventRecord) -> bool,
    ) -> Option<&'a StoredRecord> {
        self.records
            .values()
            .filter(|stored| stored.record.is_claimable(max_retries) && matches(&stored.record))
            .min_by_key(|stored| (stored.record.publication_date_ms, stored.seq))
    }
}

pub struct InMemoryEventRecordRepository {
    collection: Arc<RwLock<RecordCollection>>,
    logs: Arc<RwLock<HashMap<String, Vec<DispatchLog>>>>,
    policy: RetryPolicy,
}

impl InMemoryEventRecordRepository {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            collection: Arc::new(RwLock::new(RecordCollection::default())),
            logs: Arc::new(RwLock::new(HashMap::new())),
            policy,
        }
    }

    /// Inserts every record or none of them, used by the transition persist
    /// path to keep the application update and its outbox rows atomic.
    pub(crate) async fn insert_all(&self, records: &[EventRecord]) -> DomainResult<()> {
        let mut collection = self.collection.write().await;
        for record in records {
            if collection.records.contains_key(&record.id) {
                return Err(DomainError::Conflict);
            }
        }
        let mut seen = std::collections::HashSet::new();
        for record in records {
            if !seen.insert(record.id.clone()) {
                return Err(DomainError::Conflict);
            }
        }
        for record in records {
            let seq = collection.next_seq;
            collection.next_seq += 1;
            collection.records.insert(
                record.id.clone(),
                StoredRecord {
                    record: record.clone(),
                    seq,
                },
            );
        }
        Ok(())
    }

    async fn sweep(
        &self,
        mut transition: impl FnMut(&EventRecord) -> Option<EventRecord>,
    ) -> u64 {
        let mut collection = self.collection.write().await;
        let mut modified = 0;
        for stored in collection.records.values_mut() {
            if let Some(updated) = transition(&stored.record) {
                stored.record = updated;
                modified += 1;
            }
        }
        modified
    }
}

impl EventRecordRepository for InMemoryEventRecordRepository {
    fn insert(&self, record: &EventRecord) -> BoxFuture<'_, DomainResult<EventRecord>> {
        let record = record.clone();
        Box::pin(async move { self.collection.write().await.insert(record) })
    }

    fn get(&self, record_id: &str) -> BoxFuture<'_, DomainResult<Option<EventRecord>>> {
        let record_id = record_id.to_string();
        Box::pin(async move {
            let collection = self.collection.read().await;
            Ok(collection
                .records
                .get(&record_id)
                .map(|stored| stored.record.clone()))
        })
    }

    fn next_available_segregation(
        &self,
        excluded_refs: &[String],
    ) -> BoxFuture<'_, DomainResult<Option<String>>> {
        let excluded: Vec<String> = excluded_refs.to_vec();
        Box::pin(async move {
            let collection = self.collection.read().await;
            let candidate = collection.oldest_claimable(self.policy.max_retries, |record| {
                !excluded.contains(&record.segregation_ref)
            });
            Ok(candidate.map(|stored| stored.record.segregation_ref.clone()))
        })
    }

    fn claim_events(
        &self,
        claimed_by: &str,
        segregation_ref: &str,
        max_records: usize,
    ) -> BoxFuture<'_, DomainResult<Vec<EventRecord>>> {
        let claimed_by = claimed_by.to_string();
        let segregation_ref = segregation_ref.to_string();
        Box::pin(async move {
            let mut claimed = Vec::new();
            for _ in 0..max_records {
                // one guarded find-and-modify per attempt, mirroring the
                // store's single-document conditional update
                let mut collection = self.collection.write().await;
                let candidate = collection
                    .oldest_claimable(self.policy.max_retries, |record| {
                        record.segregation_ref == segregation_ref
                    })
                    .map(|stored| stored.record.id.clone());
                let Some(record_id) = candidate else {
                    break;
                };
                if let Some(stored) = collection.records.get_mut(&record_id) {
                    stored.record = stored
                        .record
                        .clone()
                        .into_claimed(claimed_by.as_str(), self.policy.lease_ms);
                    claimed.push(stored.record.clone());
                }
            }
            Ok(claimed)
        })
    }

    fn process_expired_events(&self) -> BoxFuture<'_, DomainResult<u64>> {
        Box::pin(async move {
            let now = now_ms();
            let modified = self
                .sweep(|record| {
                    record
                        .lease_expired(now)
                        .then(|| record.clone().into_resubmittable())
                })
                .await;
            Ok(modified)
        })
    }

    fn update_failed_events(&self) -> BoxFuture<'_, DomainResult<u64>> {
        Box::pin(async move {
            let modified = self
                .sweep(|record| {
                    (record.status == EventStatus::Failed)
                        .then(|| record.clone().into_resubmittable())
                })
                .await;
            Ok(modified)
        })
    }

    fn update_resubmitted_events(&self) -> BoxFuture<'_, DomainResult<u64>> {
        Box::pin(async move {
            let modified = self
                .sweep(|record| {
                    (record.status == EventStatus::Resubmitted)
                        .then(|| record.clone().into_republished())
                })
                .await;
            Ok(modified)
        })
    }

    fn update_dead_events(&self) -> BoxFuture<'_, DomainResult<u64>> {
        let max_retries = self.policy.max_retries;
        Box::pin(async move {
            let modified = self
                .sweep(|record| {
                    let exhausted = !record.status.is_terminal()
                        && record.status != EventStatus::Processing
                        && record.completion_attempts >= max_retries;
                    exhausted.then(|| record.clone().into_dead())
                })
                .await;
            Ok(modified)
        })
    }

    fn update(&self, record: &EventRecord) -> BoxFuture<'_, DomainResult<EventRecord>> {
        let record = record.clone();
        Box::pin(async move {
            let mut collection = self.collection.write().await;
            let stored = collection
                .records
                .get_mut(&record.id)
                .ok_or(DomainError::NotFound)?;
            stored.record = record.clone();
            Ok(record)
        })
    }

    fn count_by_status(&self, status: EventStatus) -> BoxFuture<'_, DomainResult<u64>> {
        Box::pin(async move {
            let collection = self.collection.read().await;
            let count = collection
                .records
                .values()
                .filter(|stored| stored.record.status == status)
                .count();
            Ok(count as u64)
        })
    }

    fn append_dispatch_log(&self, log: &DispatchLog) -> BoxFuture<'_, DomainResult<DispatchLog>> {
        let log = log.clone();
        Box::pin(async move {
            let mut logs = self.logs.write().await;
            logs.entry(log.record_id.clone())
                .or_default()
                .push(log.clone());
            Ok(log)
        })
    }

    fn list_dispatch_logs(
        &self,
        record_id: &str,
    ) -> BoxFuture<'_, DomainResult<Vec<DispatchLog>>> {
        let record_id = record_id.to_string();
        Box::pin(async move {
            let logs = self.logs.read().await;
            Ok(logs.get(&record_id).cloned().unwrap_or_default())
        })
    }
}

#[derive(Default)]
pub struct InMemoryFifoLockRepository {
    locks: Arc<RwLock<HashMap<(String, String), FifoLock>>>,
}

impl InMemoryFifoLockRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FifoLockRepository for InMemoryFifoLockRepository {
    fn get_fifo_locks(&self, actor: &str) -> BoxFuture<'_, DomainResult<Vec<String>>> {
        let actor = actor.to_string();
        Box::pin(async move {
            let locks = self.locks.read().await;
            let mut held: Vec<String> = locks
                .values()
                .filter(|lock| lock.actor == actor && lock.locked)
                .map(|lock| lock.segregation_ref.clone())
                .collect();
            held.sort();
            Ok(held)
        })
    }

    fn set_fifo_lock(
        &self,
        actor: &str,
        segregation_ref: &str,
    ) -> BoxFuture<'_, DomainResult<bool>> {
        let key = (actor.to_string(), segregation_ref.to_string());
        Box::pin(async move {
            let mut locks = self.locks.write().await;
            if locks.get(&key).map(|lock| lock.locked).unwrap_or(false) {
                return Ok(false);
            }
            locks.insert(key.clone(), FifoLock::acquired(key.0.clone(), key.1.clone()));
            Ok(true)
        })
    }

    fn free_fifo_lock(
        &self,
        actor: &str,
        segregation_ref: &str,
    ) -> BoxFuture<'_, DomainResult<()>> {
        let key = (actor.to_string(), segregation_ref.to_string());
        Box::pin(async move {
            let mut locks = self.locks.write().await;
            let released = match locks.remove(&key) {
                Some(lock) => lock.released(),
                None => FifoLock::acquired(key.0.clone(), key.1.clone()).released(),
            };
            locks.insert(key, released);
            Ok(())
        })
    }
}

pub struct InMemoryApplicationRepository {
    applications: Arc<RwLock<HashMap<(String, String), Application>>>,
    outbox: Arc<InMemoryEventRecordRepository>,
}

impl InMemoryApplicationRepository {
    pub fn new(outbox: Arc<InMemoryEventRecordRepository>) -> Self {
        Self {
            applications: Arc::new(RwLock::new(HashMap::new())),
            outbox,
        }
    }
}

impl ApplicationRepository for InMemoryApplicationRepository {
    fn get(
        &self,
        client_ref: &str,
        code: &str,
    ) -> BoxFuture<'_, DomainResult<Option<Application>>> {
        let key = (client_ref.to_string(), code.to_string());
        Box::pin(async move { Ok(self.applications.read().await.get(&key).cloned()) })
    }

    fn insert(&self, application: &Application) -> BoxFuture<'_, DomainResult<Application>> {
        let application = application.clone();
        Box::pin(async move {
            let key = (application.client_ref.clone(), application.code.clone());
            let mut applications = self.applications.write().await;
            if applications.contains_key(&key) {
                return Err(DomainError::Conflict);
            }
            applications.insert(key, application.clone());
            Ok(application)
        })
    }

    fn persist_transition(
        &self,
        application: &Application,
        outbox_records: &[EventRecord],
    ) -> BoxFuture<'_, DomainResult<()>> {
        let application = application.clone();
        let outbox_records = outbox_records.to_vec();
        Box::pin(async move {
            // outbox rows first: insert_all is all-or-nothing, and the
            // application upsert below cannot fail afterwards
            self.outbox.insert_all(&outbox_records).await?;
            let key = (application.client_ref.clone(), application.code.clone());
            self.applications.write().await.insert(key, application);
            Ok(())
        })
    }
}

#[derive(Default)]
pub struct InMemoryGrantRepository {
    grants: Arc<RwLock<HashMap<String, Grant>>>,
}

impl InMemoryGrantRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GrantRepository for InMemoryGrantRepository {
    fn get(&self, code: &str) -> BoxFuture<'_, DomainResult<Option<Grant>>> {
        let code = code.to_string();
        Box::pin(async move { Ok(self.grants.read().await.get(&code).cloned()) })
    }

    fn insert(&self, grant: &Grant) -> BoxFuture<'_, DomainResult<Grant>> {
        let grant = grant.clone();
        Box::pin(async move {
            self.grants
                .write()
                .await
                .insert(grant.code.clone(), grant.clone());
            Ok(grant)
        })
    }
}

/// One process-local store wiring every collection the delivery core needs,
/// backing the `data_backend = memory` default.
pub struct MemoryStore {
    outbox: Arc<InMemoryEventRecordRepository>,
    inbox: Arc<InMemoryEventRecordRepository>,
    fifo_locks: Arc<InMemoryFifoLockRepository>,
    applications: Arc<InMemoryApplicationRepository>,
    grants: Arc<InMemoryGrantRepository>,
}

impl MemoryStore {
    pub fn new(policy: RetryPolicy) -> Self {
        let outbox = Arc::new(InMemoryEventRecordRepository::new(policy));
        let inbox = Arc::new(InMemoryEventRecordRepository::new(policy));
        let applications = Arc::new(InMemoryApplicationRepository::new(outbox.clone()));
        Self {
            outbox,
            inbox,
            fifo_locks: Arc::new(InMemoryFifoLockRepository::new()),
            applications,
            grants: Arc::new(InMemoryGrantRepository::new()),
        }
    }

    pub fn outbox(&self) -> Arc<InMemoryEventRecordRepository> {
        self.outbox.clone()
    }

    pub fn inbox(&self) -> Arc<InMemoryEventRecordRepository> {
        self.inbox.clone()
    }

    pub fn fifo_locks(&self) -> Arc<InMemoryFifoLockRepository> {
        self.fifo_locks.clone()
    }

    pub fn applications(&self) -> Arc<InMemoryApplicationRepository> {
        self.applications.clone()
    }

    pub fn grants(&self) -> Arc<InMemoryGrantRepository> {
        self.grants.clone()
    }
}
