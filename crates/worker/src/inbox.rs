use grantflow_domain::DomainResult;
use grantflow_domain::delivery::EventRecord;
use grantflow_domain::error::DomainError;
use grantflow_domain::inbox::{InboxResolution, resolve_handler};
use grantflow_domain::ports::BoxFuture;
use grantflow_domain::transition::{ApplyExternalStateChange, TransitionOutcome};
use tracing::{info, warn};

use crate::subscriber::EventDispatcher;

pub struct InboxDispatcher {
    transitions: ApplyExternalStateChange,
}

impl InboxDispatcher {
    pub fn new(transitions: ApplyExternalStateChange) -> Self {
        Self { transitions }
    }
}

impl EventDispatcher for InboxDispatcher {
    fn dispatch(&self, record: &EventRecord) -> BoxFuture<'_, DomainResult<()>> {
        let record = record.clone();
        Box::pin(async move {
            match resolve_handler(&record)? {
                InboxResolution::StateChange(command) => {
                    match self.transitions.apply(command).await? {
                        TransitionOutcome::Applied {
                            from,
                            to,
                            outbox_records,
                            skipped_processes,
                        } => {
                            info!(
                                record_id = %record.id,
                                from = %from,
                                to = %to,
                                outbox_records,
                                "state transition applied"
                            );
                            for process in skipped_processes {
                                warn!(
                                    record_id = %record.id,
                                    process = %process,
                                    "unknown entry process skipped"
                                );
                            }
                        }
                        TransitionOutcome::Ignored(reason) => {
                            info!(
                                record_id = %record.id,
                                reason = reason.as_str(),
                                "state change ignored"
                            );
                        }
                    }
                    Ok(())
                }
                InboxResolution::Unhandled(event_type) => Err(DomainError::Validation(format!(
                    "no handler registered for event type {event_type}"
                ))),
            }
        })
    }
}
