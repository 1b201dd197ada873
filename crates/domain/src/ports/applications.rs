use crate::DomainResult;
use crate::application::Application;
use crate::delivery::EventRecord;

use super::BoxFuture;

pub trait ApplicationRepository: Send + Sync {
    fn get(
        &self,
        client_ref: &str,
        code: &str,
    ) -> BoxFuture<'_, DomainResult<Option<Application>>>;

    fn insert(&self, application: &Application) -> BoxFuture<'_, DomainResult<Application>>;

    /// Persists the mutated application together with every derived outbox
    /// record in one store transaction. Either everything is visible
    /// afterwards or nothing is.
    fn persist_transition(
        &self,
        application: &Application,
        outbox_records: &[EventRecord],
    ) -> BoxFuture<'_, DomainResult<()>>;
}
