use std::sync::Arc;

use serde_json::json;

use crate::DomainResult;
use crate::application::Application;
use crate::delivery::{EventRecord, segregation_ref};
use crate::error::DomainError;
use crate::grant::{QualifiedStatus, resolve_target, transition_allowed};
use crate::processes::EntryProcess;
use crate::ports::applications::ApplicationRepository;
use crate::ports::grants::GrantRepository;
use crate::util::format_ms_rfc3339;

pub const APPLICATION_EVENTS_TOPIC: &str = "application-events";

#[derive(Clone, Debug, PartialEq)]
pub struct StateChangeCommand {
    pub source_system: String,
    pub client_ref: String,
    pub code: String,
    pub external_requested_state: String,
    pub event_data: serde_json::Value,
    pub trace_parent: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IgnoreReason {
    NoMapping,
    MalformedMapping(String),
    TargetNotInGraph(String),
    NotReachableFromCurrent { from: String, to: String },
}

impl IgnoreReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoMapping => "no_mapping",
            Self::MalformedMapping(_) => "malformed_mapping",
            Self::TargetNotInGraph(_) => "target_not_in_graph",
            Self::NotReachableFromCurrent { .. } => "not_reachable_from_current",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum TransitionOutcome {
    Applied {
        from: QualifiedStatus,
        to: QualifiedStatus,
        outbox_records: usize,
        skipped_processes: Vec<String>,
    },
    Ignored(IgnoreReason),
}

#[derive(Clone)]
pub struct ApplyExternalStateChange {
    applications: Arc<dyn ApplicationRepository>,
    grants: Arc<dyn GrantRepository>,
}

impl ApplyExternalStateChange {
    pub fn new(
        applications: Arc<dyn ApplicationRepository>,
        grants: Arc<dyn GrantRepository>,
    ) -> Self {
        Self {
            applications,
            grants,
        }
    }

    pub async fn apply(&self, command: StateChangeCommand) -> DomainResult<TransitionOutcome> {
        let application = self
            .applications
            .get(&command.client_ref, &command.code)
            .await?
            .ok_or(DomainError::NotFound)?;
        let grant = self
            .grants
            .get(&application.code)
            .await?
            .ok_or(DomainError::NotFound)?;

        let Some(mapped_to) = grant.map_external_state(
            &application.current_phase,
            &application.current_stage,
            &command.external_requested_state,
            &command.source_system,
        ) else {
            return Ok(TransitionOutcome::Ignored(IgnoreReason::NoMapping));
        };
        let mapped_to = mapped_to.to_string();

        let Some(target) = resolve_target(
            &mapped_to,
            &application.current_phase,
            &application.current_stage,
        ) else {
            return Ok(TransitionOutcome::Ignored(IgnoreReason::MalformedMapping(
                mapped_to,
            )));
        };

        let Some(definition) = grant.status_definition(&target) else {
            return Ok(TransitionOutcome::Ignored(IgnoreReason::TargetNotInGraph(
                target.to_string(),
            )));
        };

        let from = application.fully_qualified_status();
        if !transition_allowed(definition, &from) {
            return Ok(TransitionOutcome::Ignored(
                IgnoreReason::NotReachableFromCurrent {
                    from: from.to_string(),
                    to: target.to_string(),
                },
            ));
        }

        let definition = definition.clone();
        let mut application = application.with_state(&target);
        let mut outbox_records = Vec::new();
        if from != target {
            outbox_records.push(status_updated_event(
                &application,
                &from,
                &target,
                command.trace_parent.as_deref(),
            )?);
        }

        let mut skipped_processes = Vec::new();
        for name in &definition.processes {
            match EntryProcess::parse(name) {
                Some(process) => outbox_records.extend(process.run(
                    &mut application,
                    &command.event_data,
                    command.trace_parent.as_deref(),
                )?),
                None => skipped_processes.push(name.clone()),
            }
        }

        self.applications
            .persist_transition(&application, &outbox_records)
            .await?;

        Ok(TransitionOutcome::Applied {
            from,
            to: target,
            outbox_records: outbox_records.len(),
            skipped_processes,
        })
    }
}

fn status_updated_event(
    application: &Application,
    from: &QualifiedStatus,
    to: &QualifiedStatus,
    trace_parent: Option<&str>,
) -> DomainResult<EventRecord> {
    let event = json!({
        "type": "ApplicationStatusUpdatedEvent",
        "data": {
            "clientRef": application.client_ref,
            "code": application.code,
            "previousStatus": from.to_string(),
            "newStatus": to.to_string(),
            "updatedAt": format_ms_rfc3339(application.updated_at_ms),
        },
    });
    EventRecord::outbox(
        APPLICATION_EVENTS_TOPIC,
        event,
        segregation_ref(&application.client_ref, &application.code),
        trace_parent.map(str::to_string),
    )
}
