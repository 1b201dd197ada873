use std::sync::Arc;

use grantflow_domain::DomainResult;
use grantflow_domain::delivery::{DispatchLog, EventRecord, Route};
use grantflow_domain::error::DomainError;
use grantflow_domain::ports::BoxFuture;
use grantflow_domain::ports::bus::MessagePublisher;
use grantflow_domain::ports::delivery::EventRecordRepository;
use tracing::warn;

use crate::subscriber::EventDispatcher;

pub struct OutboxDispatcher {
    records: Arc<dyn EventRecordRepository>,
    bus: Arc<dyn MessagePublisher>,
}

impl OutboxDispatcher {
    pub fn new(records: Arc<dyn EventRecordRepository>, bus: Arc<dyn MessagePublisher>) -> Self {
        Self { records, bus }
    }

    async fn append_log(&self, log: DomainResult<DispatchLog>) {
        match log {
            Ok(log) => {
                if let Err(err) = self.records.append_dispatch_log(&log).await {
                    warn!(record_id = %log.record_id, error = %err, "failed to append dispatch log");
                }
            }
            Err(err) => warn!(error = %err, "failed to build dispatch log"),
        }
    }
}

impl EventDispatcher for OutboxDispatcher {
    fn dispatch(&self, record: &EventRecord) -> BoxFuture<'_, DomainResult<()>> {
        let record = record.clone();
        Box::pin(async move {
            let Route::Outbox { target } = &record.route else {
                return Err(DomainError::Validation(
                    "inbox records cannot be published outbound".into(),
                ));
            };

            match self.bus.publish(target, &record.event).await {
                Ok(()) => {
                    self.append_log(DispatchLog::delivered(&record)).await;
                    Ok(())
                }
                Err(err) => {
                    self.append_log(DispatchLog::failed(&record, err.to_string()))
                        .await;
                    Err(DomainError::Store(err.to_string()))
                }
            }
        })
    }
}
