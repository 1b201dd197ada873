use std::sync::Arc;
use std::time::Duration;

use grantflow_domain::intake::{InboundEnvelope, InboxIntake, IntakeOutcome};
use grantflow_domain::ports::bus::MessageConsumer;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::observability;

/// Consumes the inbound delivery queue and saves each message into the inbox
/// behind the message-id dedup check. The inbox subscriber picks the records
/// up from there.
pub struct IntakeLoop {
    consumer: Arc<dyn MessageConsumer>,
    intake: InboxIntake,
    queue: String,
    receive_timeout: Duration,
}

impl IntakeLoop {
    pub fn new(
        consumer: Arc<dyn MessageConsumer>,
        intake: InboxIntake,
        queue: impl Into<String>,
        receive_timeout: Duration,
    ) -> Self {
        Self {
            consumer,
            intake,
            queue: queue.into(),
            receive_timeout,
        }
    }

    pub async fn run(&self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(queue = %self.queue, "intake loop started");
        loop {
            if *shutdown_rx.borrow() {
                break;
            }
            let had_error = self.poll_once().await;
            if had_error {
                tokio::select! {
                    _ = tokio::time::sleep(self.receive_timeout) => {}
                    _ = shutdown_rx.changed() => {}
                }
            }
        }
        info!(queue = %self.queue, "intake loop stopped");
    }

    /// Returns true when the receive itself failed, so the caller can back
    /// off instead of hot-looping against a broken connection.
    pub async fn poll_once(&self) -> bool {
        let body = match self.consumer.receive(&self.queue, self.receive_timeout).await {
            Ok(Some(body)) => body,
            Ok(None) => return false,
            Err(err) => {
                warn!(queue = %self.queue, error = %err, "inbound receive failed");
                return true;
            }
        };

        let envelope = match InboundEnvelope::from_value(&body) {
            Ok(envelope) => envelope,
            Err(err) => {
                observability::register_intake("invalid");
                warn!(queue = %self.queue, error = %err, "invalid inbound envelope");
                return false;
            }
        };

        match self.intake.accept(envelope).await {
            Ok(IntakeOutcome::Accepted(record)) => {
                observability::register_intake("accepted");
                info!(
                    record_id = %record.id,
                    segregation_ref = %record.segregation_ref,
                    "inbound message queued"
                );
            }
            Ok(IntakeOutcome::Duplicate) => {
                observability::register_intake("duplicate");
                info!(queue = %self.queue, "duplicate inbound message ignored");
            }
            Err(err) => {
                observability::register_intake("error");
                warn!(queue = %self.queue, error = %err, "failed to queue inbound message");
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grantflow_domain::delivery::EventStatus;
    use grantflow_domain::intake::{InMemoryDedupStore, IntakeConfig};
    use grantflow_domain::ports::BoxFuture;
    use grantflow_domain::ports::bus::BusError;
    use grantflow_domain::ports::delivery::EventRecordRepository;
    use grantflow_infra::repositories::{MemoryStore, RetryPolicy};
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct ScriptedConsumer {
        queued: Mutex<VecDeque<serde_json::Value>>,
    }

    impl ScriptedConsumer {
        fn with(messages: Vec<serde_json::Value>) -> Self {
            Self {
                queued: Mutex::new(messages.into()),
            }
        }
    }

    impl MessageConsumer for ScriptedConsumer {
        fn receive(
            &self,
            _source: &str,
            _timeout: Duration,
        ) -> BoxFuture<'_, Result<Option<serde_json::Value>, BusError>> {
            let next = self.queued.lock().expect("queued lock").pop_front();
            Box::pin(async move { Ok(next) })
        }
    }

    fn message(message_id: &str) -> serde_json::Value {
        json!({
            "type": "ApplicationStateChangedEvent",
            "source": "caseworks",
            "messageId": message_id,
            "data": {
                "status": "CASE_APPROVED",
                "clientRef": "client-1",
                "code": "GRANT_A",
            },
        })
    }

    #[tokio::test]
    async fn queued_messages_land_in_the_inbox_once() {
        let store = MemoryStore::new(RetryPolicy::default());
        let consumer = Arc::new(ScriptedConsumer::with(vec![
            message("msg-1"),
            message("msg-1"),
            message("msg-2"),
            json!({"type": "Broken"}),
        ]));
        let intake_loop = IntakeLoop::new(
            consumer,
            InboxIntake::new(
                store.inbox(),
                Arc::new(InMemoryDedupStore::new()),
                IntakeConfig::default(),
            ),
            "grantflow:inbox",
            Duration::from_millis(10),
        );

        for _ in 0..5 {
            assert!(!intake_loop.poll_once().await);
        }

        // msg-1 twice collapses to one record, the malformed envelope is dropped
        assert_eq!(
            store
                .inbox()
                .count_by_status(EventStatus::Published)
                .await
                .expect("count"),
            2
        );
    }
}
