use serde_json::Value;

use crate::DomainResult;
use crate::delivery::{EventRecord, Route};
use crate::error::DomainError;
use crate::transition::StateChangeCommand;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InboxEventKind {
    ApplicationStateChanged,
}

impl InboxEventKind {
    pub fn parse(event_type: &str) -> Option<Self> {
        match event_type {
            "ApplicationStateChangedEvent" => Some(Self::ApplicationStateChanged),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum InboxResolution {
    StateChange(StateChangeCommand),
    Unhandled(String),
}

pub fn resolve_handler(record: &EventRecord) -> DomainResult<InboxResolution> {
    let Route::Inbox {
        event_type, source, ..
    } = &record.route
    else {
        return Err(DomainError::Validation(
            "outbox records have no inbox handler".into(),
        ));
    };

    match InboxEventKind::parse(event_type) {
        Some(InboxEventKind::ApplicationStateChanged) => {
            let command = state_change_command(record, source)?;
            Ok(InboxResolution::StateChange(command))
        }
        None => match try_state_change_command(record, source) {
            Some(command) => Ok(InboxResolution::StateChange(command)),
            None => Ok(InboxResolution::Unhandled(event_type.clone())),
        },
    }
}

fn state_change_command(record: &EventRecord, source: &str) -> DomainResult<StateChangeCommand> {
    try_state_change_command(record, source).ok_or_else(|| {
        DomainError::Validation(
            "state change event requires status, clientRef, code and sourceSystem".into(),
        )
    })
}

fn try_state_change_command(record: &EventRecord, source: &str) -> Option<StateChangeCommand> {
    let data = &record.event;
    let field = |name: &str| {
        data.get(name)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };

    let status = field("status")?;
    let client_ref = field("clientRef")?;
    let code = field("code")?;
    let source_system = field("sourceSystem").unwrap_or_else(|| source.to_string());
    let event_data = data.get("eventData").cloned().unwrap_or_else(|| data.clone());

    Some(StateChangeCommand {
        source_system,
        client_ref,
        code,
        external_requested_state: status,
        event_data,
        trace_parent: record.trace_parent.clone(),
    })
}
