use thiserror::Error;

use super::BoxFuture;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("message bus unavailable: {0}")]
    Unavailable(String),
    #[error("message bus serialization error: {0}")]
    Serialization(String),
    #[error("message bus delivery failed: {0}")]
    Delivery(String),
}

pub trait MessagePublisher: Send + Sync {
    fn publish(
        &self,
        destination: &str,
        payload: &serde_json::Value,
    ) -> BoxFuture<'_, Result<(), BusError>>;
}

pub trait MessageConsumer: Send + Sync {
    fn receive(
        &self,
        source: &str,
        timeout: std::time::Duration,
    ) -> BoxFuture<'_, Result<Option<serde_json::Value>, BusError>>;
}
