use std::sync::OnceLock;

use anyhow::Result;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

const RECORDS_PROCESSED_TOTAL: &str = "grantflow_worker_records_processed_total";
const DISPATCH_DURATION_MS: &str = "grantflow_worker_dispatch_duration_ms";
const CLAIM_BATCH_SIZE: &str = "grantflow_worker_claim_batch_size";
const MAINTENANCE_TRANSITIONS_TOTAL: &str = "grantflow_worker_maintenance_transitions_total";
const DEAD_LETTER_GAUGE: &str = "grantflow_worker_dead_letter_total";
const INTAKE_MESSAGES_TOTAL: &str = "grantflow_worker_intake_messages_total";

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub fn init_metrics() -> Result<()> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = METRICS_HANDLE.set(handle);
    Ok(())
}

pub fn _render_metrics() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

pub fn register_record_processed(actor: &str, result: &str, duration_ms: f64) {
    counter!(
        RECORDS_PROCESSED_TOTAL,
        "actor" => actor.to_string(),
        "result" => result.to_string()
    )
    .increment(1);

    histogram!(
        DISPATCH_DURATION_MS,
        "actor" => actor.to_string(),
        "result" => result.to_string()
    )
    .record(duration_ms.max(0.0));
}

pub fn register_claim_batch(actor: &str, size: usize) {
    histogram!(
        CLAIM_BATCH_SIZE,
        "actor" => actor.to_string()
    )
    .record(size as f64);
}

pub fn register_maintenance(actor: &str, kind: &str, modified: u64) {
    if modified == 0 {
        return;
    }
    counter!(
        MAINTENANCE_TRANSITIONS_TOTAL,
        "actor" => actor.to_string(),
        "kind" => kind.to_string()
    )
    .increment(modified);
}

pub fn set_dead_letter_depth(actor: &str, depth: u64) {
    gauge!(
        DEAD_LETTER_GAUGE,
        "actor" => actor.to_string()
    )
    .set(depth as f64);
}

pub fn register_intake(result: &str) {
    counter!(
        INTAKE_MESSAGES_TOTAL,
        "result" => result.to_string()
    )
    .increment(1);
}
