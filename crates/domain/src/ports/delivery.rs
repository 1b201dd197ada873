use crate::DomainResult;
use crate::delivery::{DispatchLog, EventRecord, EventStatus};

use super::BoxFuture;

/// Claim operations over one direction's record collection. Every claim is a
/// single atomic conditional update in the backing store; that atomicity is
/// the only thing preventing double-delivery across competing instances.
pub trait EventRecordRepository: Send + Sync {
    fn insert(&self, record: &EventRecord) -> BoxFuture<'_, DomainResult<EventRecord>>;

    fn get(&self, record_id: &str) -> BoxFuture<'_, DomainResult<Option<EventRecord>>>;

    fn next_available_segregation(
        &self,
        excluded_refs: &[String],
    ) -> BoxFuture<'_, DomainResult<Option<String>>>;

    fn claim_events(
        &self,
        claimed_by: &str,
        segregation_ref: &str,
        max_records: usize,
    ) -> BoxFuture<'_, DomainResult<Vec<EventRecord>>>;

    fn process_expired_events(&self) -> BoxFuture<'_, DomainResult<u64>>;

    fn update_failed_events(&self) -> BoxFuture<'_, DomainResult<u64>>;

    fn update_resubmitted_events(&self) -> BoxFuture<'_, DomainResult<u64>>;

    fn update_dead_events(&self) -> BoxFuture<'_, DomainResult<u64>>;

    fn update(&self, record: &EventRecord) -> BoxFuture<'_, DomainResult<EventRecord>>;

    fn count_by_status(&self, status: EventStatus) -> BoxFuture<'_, DomainResult<u64>>;

    fn append_dispatch_log(&self, log: &DispatchLog) -> BoxFuture<'_, DomainResult<DispatchLog>>;

    fn list_dispatch_logs(&self, record_id: &str)
    -> BoxFuture<'_, DomainResult<Vec<DispatchLog>>>;
}
