use grantflow_domain::ports::BoxFuture;
use grantflow_domain::ports::db::{DbError, StoreAdapter};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use url::Url;

use crate::config::AppConfig;

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub endpoint: String,
    pub namespace: String,
    pub database: String,
    pub username: String,
    pub password: String,
}

impl StoreConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            endpoint: config.store_endpoint.clone(),
            namespace: config.store_namespace.clone(),
            database: config.store_database.clone(),
            username: config.store_user.clone(),
            password: config.store_pass.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DocumentStoreAdapter {
    config: StoreConfig,
}

impl DocumentStoreAdapter {
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }
}

impl StoreAdapter for DocumentStoreAdapter {
    fn name(&self) -> &'static str {
        "documentdb"
    }

    fn health_check(&self) -> BoxFuture<'_, Result<(), DbError>> {
        let endpoint = self.config.endpoint.clone();
        let ns = self.config.namespace.clone();
        let db = self.config.database.clone();

        Box::pin(async move {
            let address = parse_socket_address(&endpoint)?;
            let connect = timeout(Duration::from_secs(2), TcpStream::connect(address))
                .await
                .map_err(|_| DbError::Unavailable("store endpoint connect timed out".to_string()))?;
            connect.map_err(|err| {
                DbError::Unavailable(format!("store endpoint connect failed: {err}"))
            })?;

            tracing::debug!(
                endpoint,
                namespace = ns,
                database = db,
                "store health check succeeded"
            );
            Ok(())
        })
    }
}

fn parse_socket_address(endpoint: &str) -> Result<String, DbError> {
    let normalized = if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("ws://{endpoint}")
    };
    let parsed = Url::parse(&normalized)
        .map_err(|err| DbError::Unavailable(format!("invalid store endpoint '{endpoint}': {err}")))?;

    let scheme = parsed.scheme();
    let host = parsed.host_str().ok_or_else(|| {
        DbError::Unavailable(format!("missing store host in endpoint '{endpoint}'"))
    })?;
    let port = parsed.port_or_known_default().unwrap_or(match scheme {
        "wss" | "https" => 443,
        "http" | "ws" => 8000,
        _ => 8000,
    });
    Ok(format!("{host}:{port}"))
}
