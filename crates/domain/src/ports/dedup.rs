use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::BoxFuture;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageKey {
    pub consumer: String,
    pub source: String,
    pub message_id: String,
}

impl MessageKey {
    pub fn new(
        consumer: impl Into<String>,
        source: impl Into<String>,
        message_id: impl Into<String>,
    ) -> Self {
        Self {
            consumer: consumer.into(),
            source: source.into(),
            message_id: message_id.into(),
        }
    }

    pub fn cache_key(&self, prefix: &str) -> String {
        format!(
            "{prefix}:{}:{}:{}",
            self.consumer, self.source, self.message_id
        )
    }
}

#[derive(Debug, Error)]
pub enum DedupError {
    #[error("dedup store unavailable: {0}")]
    Unavailable(String),
    #[error("dedup store error: {0}")]
    Store(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkOutcome {
    FirstDelivery,
    Duplicate,
}

pub trait DedupStore: Send + Sync {
    fn mark_if_first(
        &self,
        key: &MessageKey,
        ttl: Duration,
    ) -> BoxFuture<'_, Result<MarkOutcome, DedupError>>;
}
