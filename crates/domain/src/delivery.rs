use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::DomainError;
use crate::util::{now_ms, payload_sha256, uuid_v7_without_dashes};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Published,
    Processing,
    Completed,
    Failed,
    Resubmitted,
    Dead,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Published => "published",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Resubmitted => "resubmitted",
            Self::Dead => "dead",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        value.parse().ok()
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Dead)
    }
}

impl FromStr for EventStatus {
    type Err = &'static str;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "published" => Ok(Self::Published),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "resubmitted" => Ok(Self::Resubmitted),
            "dead" => Ok(Self::Dead),
            _ => Err("unknown event status"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "direction", rename_all = "snake_case")]
pub enum Route {
    Outbox {
        target: String,
    },
    Inbox {
        event_type: String,
        source: String,
        message_id: String,
    },
}

impl Route {
    pub fn direction(&self) -> &'static str {
        match self {
            Self::Outbox { .. } => "outbox",
            Self::Inbox { .. } => "inbox",
        }
    }
}

pub fn segregation_ref(client_ref: &str, code: &str) -> String {
    format!("{client_ref}-{code}")
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EventRecord {
    pub id: String,
    pub publication_date_ms: i64,
    pub route: Route,
    pub event: serde_json::Value,
    pub segregation_ref: String,
    pub status: EventStatus,
    pub claimed_by: Option<String>,
    pub claimed_at_ms: Option<i64>,
    pub claim_expires_at_ms: Option<i64>,
    pub completion_attempts: u32,
    pub last_resubmission_date_ms: Option<i64>,
    pub completion_date_ms: Option<i64>,
    pub trace_parent: Option<String>,
}

impl EventRecord {
    pub fn outbox(
        target: impl Into<String>,
        event: serde_json::Value,
        segregation_ref: impl Into<String>,
        trace_parent: Option<String>,
    ) -> Result<Self, DomainError> {
        let target = target.into();
        if target.trim().is_empty() {
            return Err(DomainError::Validation("target is required".into()));
        }
        Self::new(Route::Outbox { target }, event, segregation_ref, trace_parent)
    }

    pub fn inbox(
        event_type: impl Into<String>,
        source: impl Into<String>,
        message_id: impl Into<String>,
        event: serde_json::Value,
        segregation_ref: impl Into<String>,
        trace_parent: Option<String>,
    ) -> Result<Self, DomainError> {
        let event_type = event_type.into();
        let source = source.into();
        let message_id = message_id.into();
        if event_type.trim().is_empty() || source.trim().is_empty() {
            return Err(DomainError::Validation(
                "event_type and source are required".into(),
            ));
        }
        if message_id.trim().is_empty() {
            return Err(DomainError::Validation("message_id is required".into()));
        }
        Self::new(
            Route::Inbox {
                event_type,
                source,
                message_id,
            },
            event,
            segregation_ref,
            trace_parent,
        )
    }

    fn new(
        route: Route,
        event: serde_json::Value,
        segregation_ref: impl Into<String>,
        trace_parent: Option<String>,
    ) -> Result<Self, DomainError> {
        let segregation_ref = segregation_ref.into();
        if segregation_ref.trim().is_empty() {
            return Err(DomainError::Validation("segregation_ref is required".into()));
        }
        Ok(Self {
            id: uuid_v7_without_dashes(),
            publication_date_ms: now_ms(),
            route,
            event,
            segregation_ref,
            status: EventStatus::Published,
            claimed_by: None,
            claimed_at_ms: None,
            claim_expires_at_ms: None,
            completion_attempts: 0,
            last_resubmission_date_ms: None,
            completion_date_ms: None,
            trace_parent,
        })
    }

    pub fn is_claimable(&self, max_retries: u32) -> bool {
        self.status == EventStatus::Published
            && self.claimed_by.is_none()
            && self.completion_attempts < max_retries
    }

    pub fn lease_expired(&self, now_ms: i64) -> bool {
        self.status == EventStatus::Processing
            && self
                .claim_expires_at_ms
                .map(|deadline| deadline < now_ms)
                .unwrap_or(true)
    }

    pub fn into_claimed(mut self, claimed_by: impl Into<String>, lease_ms: i64) -> Self {
        let now = now_ms();
        self.status = EventStatus::Processing;
        self.claimed_by = Some(claimed_by.into());
        self.claimed_at_ms = Some(now);
        self.claim_expires_at_ms = Some(now + lease_ms);
        self
    }

    pub fn into_completed(mut self) -> Self {
        self.status = EventStatus::Completed;
        self.completion_date_ms = Some(now_ms());
        self.clear_claim()
    }

    pub fn into_failed(mut self) -> Self {
        self.status = EventStatus::Failed;
        self.clear_claim()
    }

    pub fn into_resubmittable(mut self) -> Self {
        self.status = EventStatus::Resubmitted;
        self.clear_claim()
    }

    pub fn into_republished(mut self) -> Self {
        self.status = EventStatus::Published;
        self.completion_attempts = self.completion_attempts.saturating_add(1);
        self.last_resubmission_date_ms = Some(now_ms());
        self
    }

    pub fn into_dead(mut self) -> Self {
        self.status = EventStatus::Dead;
        self.clear_claim()
    }

    fn clear_claim(mut self) -> Self {
        self.claimed_by = None;
        self.claimed_at_ms = None;
        self.claim_expires_at_ms = None;
        self
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DispatchOutcome {
    Delivered,
    RetryableFailure,
}

impl DispatchOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Delivered => "delivered",
            Self::RetryableFailure => "retryable_failure",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DispatchLog {
    pub log_id: String,
    pub record_id: String,
    pub attempt: u32,
    pub outcome: DispatchOutcome,
    pub payload_sha256: String,
    pub error_message: Option<String>,
    pub created_at_ms: i64,
}

impl DispatchLog {
    pub fn delivered(record: &EventRecord) -> Result<Self, DomainError> {
        Self::new(record, DispatchOutcome::Delivered, None)
    }

    pub fn failed(record: &EventRecord, error: impl Into<String>) -> Result<Self, DomainError> {
        Self::new(record, DispatchOutcome::RetryableFailure, Some(error.into()))
    }

    fn new(
        record: &EventRecord,
        outcome: DispatchOutcome,
        error_message: Option<String>,
    ) -> Result<Self, DomainError> {
        Ok(Self {
            log_id: uuid_v7_without_dashes(),
            record_id: record.id.clone(),
            attempt: record.completion_attempts.saturating_add(1),
            outcome,
            payload_sha256: payload_sha256(&record.event)?,
            error_message,
            created_at_ms: now_ms(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn outbox_record() -> EventRecord {
        EventRecord::outbox(
            "application-events",
            json!({"type": "ApplicationStatusUpdatedEvent"}),
            "client-1-GRANT_A",
            None,
        )
        .expect("record")
    }

    #[test]
    fn new_records_start_published_and_unclaimed() {
        let record = outbox_record();
        assert_eq!(record.status, EventStatus::Published);
        assert!(record.claimed_by.is_none());
        assert_eq!(record.completion_attempts, 0);
        assert!(record.is_claimable(3));
    }

    #[test]
    fn empty_segregation_ref_is_rejected() {
        let err = EventRecord::outbox("topic", json!({}), "  ", None).expect_err("error");
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn claim_sets_processing_and_lease() {
        let record = outbox_record().into_claimed("worker-1", 30_000);
        assert_eq!(record.status, EventStatus::Processing);
        assert_eq!(record.claimed_by.as_deref(), Some("worker-1"));
        let claimed_at = record.claimed_at_ms.expect("claimed_at");
        let expires_at = record.claim_expires_at_ms.expect("expires_at");
        assert_eq!(expires_at - claimed_at, 30_000);
        assert!(!record.lease_expired(claimed_at));
        assert!(record.lease_expired(expires_at + 1));
    }

    #[test]
    fn completion_clears_claim_fields() {
        let record = outbox_record().into_claimed("worker-1", 30_000).into_completed();
        assert_eq!(record.status, EventStatus::Completed);
        assert!(record.status.is_terminal());
        assert!(record.claimed_by.is_none());
        assert!(record.claim_expires_at_ms.is_none());
        assert!(record.completion_date_ms.is_some());
    }

    #[test]
    fn republish_increments_attempts() {
        let record = outbox_record()
            .into_claimed("worker-1", 30_000)
            .into_failed()
            .into_resubmittable()
            .into_republished();
        assert_eq!(record.status, EventStatus::Published);
        assert_eq!(record.completion_attempts, 1);
        assert!(record.last_resubmission_date_ms.is_some());
    }

    #[test]
    fn exhausted_records_are_not_claimable() {
        let mut record = outbox_record();
        record.completion_attempts = 3;
        assert!(!record.is_claimable(3));
        let record = record.into_dead();
        assert_eq!(record.status, EventStatus::Dead);
        assert!(record.status.is_terminal());
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            EventStatus::Published,
            EventStatus::Processing,
            EventStatus::Completed,
            EventStatus::Failed,
            EventStatus::Resubmitted,
            EventStatus::Dead,
        ] {
            assert_eq!(EventStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(EventStatus::parse("unknown"), None);
    }

    #[test]
    fn dispatch_log_captures_attempt_and_digest() {
        let record = outbox_record();
        let log = DispatchLog::failed(&record, "connection refused").expect("log");
        assert_eq!(log.record_id, record.id);
        assert_eq!(log.attempt, 1);
        assert_eq!(log.outcome, DispatchOutcome::RetryableFailure);
        assert_eq!(log.payload_sha256.len(), 64);
        assert_eq!(log.error_message.as_deref(), Some("connection refused"));
    }
}
