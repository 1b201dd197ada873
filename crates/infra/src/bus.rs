use std::time::Duration;

use grantflow_domain::ports::BoxFuture;
use grantflow_domain::ports::bus::{BusError, MessageConsumer, MessagePublisher};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

const DEFAULT_PREFIX: &str = "grantflow:bus";

#[derive(Clone)]
pub struct RedisMessageBus {
    manager: ConnectionManager,
    prefix: String,
}

impl RedisMessageBus {
    pub async fn connect(redis_url: &str) -> Result<Self, BusError> {
        Self::connect_with_prefix(redis_url, DEFAULT_PREFIX).await
    }

    pub async fn connect_with_prefix(
        redis_url: &str,
        prefix: impl Into<String>,
    ) -> Result<Self, BusError> {
        let client =
            redis::Client::open(redis_url).map_err(|err| BusError::Unavailable(err.to_string()))?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|err| BusError::Unavailable(err.to_string()))?;
        Ok(Self {
            manager,
            prefix: prefix.into(),
        })
    }

    fn destination_key(&self, destination: &str) -> String {
        format!("{}:{destination}", self.prefix)
    }
}

impl MessagePublisher for RedisMessageBus {
    fn publish(
        &self,
        destination: &str,
        payload: &serde_json::Value,
    ) -> BoxFuture<'_, Result<(), BusError>> {
        let destination_key = self.destination_key(destination);
        let payload = serde_json::to_string(payload);
        Box::pin(async move {
            let payload = payload.map_err(|err| BusError::Serialization(err.to_string()))?;
            let mut conn = self.manager.clone();
            let _: i64 = conn
                .rpush(destination_key, payload)
                .await
                .map_err(|err| BusError::Delivery(err.to_string()))?;
            Ok(())
        })
    }
}

impl MessageConsumer for RedisMessageBus {
    fn receive(
        &self,
        source: &str,
        timeout: Duration,
    ) -> BoxFuture<'_, Result<Option<serde_json::Value>, BusError>> {
        let source = source.to_string();
        let timeout_secs = timeout.as_secs().max(1) as f64;
        Box::pin(async move {
            let mut conn = self.manager.clone();
            let popped: Option<(String, String)> = redis::cmd("BLPOP")
                .arg(&source)
                .arg(timeout_secs)
                .query_async(&mut conn)
                .await
                .map_err(|err| BusError::Delivery(err.to_string()))?;
            match popped {
                Some((_, payload)) => serde_json::from_str(&payload)
                    .map(Some)
                    .map_err(|err| BusError::Serialization(err.to_string())),
                None => Ok(None),
            }
        })
    }
}
