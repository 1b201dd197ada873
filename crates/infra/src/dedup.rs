use std::time::Duration;

use grantflow_domain::ports::BoxFuture;
use grantflow_domain::ports::dedup::{DedupError, DedupStore, MarkOutcome, MessageKey};
use redis::aio::ConnectionManager;

const DEFAULT_PREFIX: &str = "grantflow:dedup";

#[derive(Clone)]
pub struct RedisDedupStore {
    manager: ConnectionManager,
    prefix: String,
}

impl RedisDedupStore {
    pub async fn connect(redis_url: &str) -> Result<Self, DedupError> {
        Self::connect_with_prefix(redis_url, DEFAULT_PREFIX).await
    }

    pub async fn connect_with_prefix(
        redis_url: &str,
        prefix: impl Into<String>,
    ) -> Result<Self, DedupError> {
        let client = redis::Client::open(redis_url)
            .map_err(|err| DedupError::Unavailable(err.to_string()))?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|err| DedupError::Unavailable(err.to_string()))?;
        Ok(Self {
            manager,
            prefix: prefix.into(),
        })
    }

    fn ttl_ms(ttl: Duration) -> u64 {
        let ms = ttl.as_millis() as u64;
        if ms == 0 { 1 } else { ms }
    }
}

impl DedupStore for RedisDedupStore {
    fn mark_if_first(
        &self,
        key: &MessageKey,
        ttl: Duration,
    ) -> BoxFuture<'_, Result<MarkOutcome, DedupError>> {
        let cache_key = key.cache_key(&self.prefix);
        let ttl_ms = Self::ttl_ms(ttl);
        Box::pin(async move {
            let mut conn = self.manager.clone();
            let stored: Option<String> = redis::cmd("SET")
                .arg(&cache_key)
                .arg(1)
                .arg("NX")
                .arg("PX")
                .arg(ttl_ms)
                .query_async(&mut conn)
                .await
                .map_err(|err| DedupError::Store(err.to_string()))?;

            if stored.is_some() {
                Ok(MarkOutcome::FirstDelivery)
            } else {
                Ok(MarkOutcome::Duplicate)
            }
        })
    }
}
