use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app_env: String,
    pub log_level: String,
    pub data_backend: String,
    pub store_endpoint: String,
    pub store_namespace: String,
    pub store_database: String,
    pub store_user: String,
    pub store_pass: String,
    pub redis_url: String,
    pub bus_prefix: String,
    pub inbox_queue: String,
    pub worker_poll_interval_ms: u64,
    pub worker_claim_batch_size: usize,
    pub worker_claim_lease_ms: i64,
    pub worker_max_retry_attempts: u32,
    pub inbox_dedup_ttl_secs: u64,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();
        let cfg = config::Config::builder()
            .set_default("app_env", "development")?
            .set_default("log_level", "info")?
            .set_default("data_backend", "memory")?
            .set_default("store_endpoint", "ws://127.0.0.1:8000")?
            .set_default("store_namespace", "grantflow")?
            .set_default("store_database", "delivery")?
            .set_default("store_user", "root")?
            .set_default("store_pass", "root")?
            .set_default("redis_url", "redis://127.0.0.1:6379")?
            .set_default("bus_prefix", "grantflow:bus")?
            .set_default("inbox_queue", "grantflow:inbox")?
            .set_default("worker_poll_interval_ms", 1000)?
            .set_default("worker_claim_batch_size", 10)?
            .set_default("worker_claim_lease_ms", 30000)?
            .set_default("worker_max_retry_attempts", 3)?
            .set_default("inbox_dedup_ttl_secs", 86400)?
            .add_source(config::Environment::default().separator("__"))
            .build()?;
        cfg.try_deserialize()
    }

    pub fn is_production(&self) -> bool {
        self.app_env.eq_ignore_ascii_case("production")
    }
}
