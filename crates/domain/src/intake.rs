use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde_json::Value;

use crate::DomainResult;
use crate::delivery::{EventRecord, segregation_ref};
use crate::error::DomainError;
use crate::ports::BoxFuture;
use crate::ports::dedup::{DedupError, DedupStore, MarkOutcome, MessageKey};
use crate::ports::delivery::EventRecordRepository;

#[derive(Clone, Debug)]
pub struct IntakeConfig {
    pub consumer: String,
    pub dedup_ttl: Duration,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            consumer: "inbox".to_string(),
            dedup_ttl: Duration::from_secs(60 * 60 * 24),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct InboundEnvelope {
    pub event_type: String,
    pub source: String,
    pub message_id: String,
    pub data: Value,
    pub trace_parent: Option<String>,
}

impl InboundEnvelope {
    pub fn from_value(body: &Value) -> DomainResult<Self> {
        let field = |name: &str| {
            body.get(name)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
                .ok_or_else(|| {
                    DomainError::Validation(format!("missing {name} in inbound envelope"))
                })
        };
        Ok(Self {
            event_type: field("type")?,
            source: field("source")?,
            message_id: field("messageId")?,
            data: body.get("data").cloned().unwrap_or(Value::Null),
            trace_parent: body
                .get("traceparent")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }

    fn derive_segregation(&self) -> String {
        let client_ref = self.data.get("clientRef").and_then(Value::as_str);
        let code = self.data.get("code").and_then(Value::as_str);
        match (client_ref, code) {
            (Some(client_ref), Some(code)) => segregation_ref(client_ref, code),
            _ => self.message_id.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum IntakeOutcome {
    Accepted(EventRecord),
    Duplicate,
}

#[derive(Clone)]
pub struct InboxIntake {
    records: Arc<dyn EventRecordRepository>,
    dedup: Arc<dyn DedupStore>,
    config: IntakeConfig,
}

impl InboxIntake {
    pub fn new(
        records: Arc<dyn EventRecordRepository>,
        dedup: Arc<dyn DedupStore>,
        config: IntakeConfig,
    ) -> Self {
        Self {
            records,
            dedup,
            config,
        }
    }

    pub async fn accept(&self, envelope: InboundEnvelope) -> DomainResult<IntakeOutcome> {
        let key = MessageKey::new(
            &self.config.consumer,
            &envelope.source,
            &envelope.message_id,
        );
        let outcome = self
            .dedup
            .mark_if_first(&key, self.config.dedup_ttl)
            .await
            .map_err(|err| DomainError::Store(err.to_string()))?;
        if outcome == MarkOutcome::Duplicate {
            return Ok(IntakeOutcome::Duplicate);
        }

        let segregation = envelope.derive_segregation();
        let record = EventRecord::inbox(
            envelope.event_type,
            envelope.source,
            envelope.message_id,
            envelope.data,
            segregation,
            envelope.trace_parent,
        )?;
        let record = self.records.insert(&record).await?;
        Ok(IntakeOutcome::Accepted(record))
    }
}

#[derive(Clone, Debug, Default)]
pub struct InMemoryDedupStore {
    inner: Arc<Mutex<HashMap<String, Instant>>>,
}

impl InMemoryDedupStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn is_expired(deadline: Instant) -> bool {
        Instant::now() >= deadline
    }
}

impl DedupStore for InMemoryDedupStore {
    fn mark_if_first(
        &self,
        key: &MessageKey,
        ttl: Duration,
    ) -> BoxFuture<'_, Result<MarkOutcome, DedupError>> {
        let cache_key = key.cache_key("memory");
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut guard = inner
                .lock()
                .map_err(|err| DedupError::Store(err.to_string()))?;
            if let Some(deadline) = guard.get(&cache_key).copied() {
                if !Self::is_expired(deadline) {
                    return Ok(MarkOutcome::Duplicate);
                }
                guard.remove(&cache_key);
            }
            let deadline = Instant::now() + ttl.max(Duration::from_millis(1));
            guard.insert(cache_key, deadline);
            Ok(MarkOutcome::FirstDelivery)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_requires_type_source_and_message_id() {
        let body = json!({"type": "ApplicationStateChangedEvent", "source": "caseworks"});
        let err = InboundEnvelope::from_value(&body).expect_err("error");
        assert!(matches!(err, DomainError::Validation(message) if message.contains("messageId")));
    }

    #[test]
    fn segregation_prefers_business_identity() {
        let body = json!({
            "type": "ApplicationStateChangedEvent",
            "source": "caseworks",
            "messageId": "msg-1",
            "data": {"clientRef": "client-1", "code": "GRANT_A"},
        });
        let envelope = InboundEnvelope::from_value(&body).expect("envelope");
        assert_eq!(envelope.derive_segregation(), "client-1-GRANT_A");
    }

    #[test]
    fn segregation_falls_back_to_message_id() {
        let body = json!({
            "type": "PingEvent",
            "source": "caseworks",
            "messageId": "msg-2",
        });
        let envelope = InboundEnvelope::from_value(&body).expect("envelope");
        assert_eq!(envelope.derive_segregation(), "msg-2");
    }

    #[tokio::test]
    async fn dedup_store_marks_first_then_duplicate() {
        let store = InMemoryDedupStore::new();
        let key = MessageKey::new("inbox", "caseworks", "msg-1");
        let first = store
            .mark_if_first(&key, Duration::from_secs(60))
            .await
            .expect("first");
        assert_eq!(first, MarkOutcome::FirstDelivery);
        let second = store
            .mark_if_first(&key, Duration::from_secs(60))
            .await
            .expect("second");
        assert_eq!(second, MarkOutcome::Duplicate);
    }

    #[tokio::test]
    async fn expired_marks_allow_redelivery() {
        let store = InMemoryDedupStore::new();
        let key = MessageKey::new("inbox", "caseworks", "msg-3");
        store
            .mark_if_first(&key, Duration::from_millis(10))
            .await
            .expect("first");
        tokio::time::sleep(Duration::from_millis(20)).await;
        let outcome = store
            .mark_if_first(&key, Duration::from_millis(10))
            .await
            .expect("again");
        assert_eq!(outcome, MarkOutcome::FirstDelivery);
    }
}
