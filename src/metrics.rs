//! Prometheus metrics

use anyhow::Result;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::time::Duration;

/// Setup Prometheus metrics exporter
/// Returns a handle that can be used to retrieve metrics
pub fn setup_metrics() -> Result<metrics_exporter_prometheus::PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus exporter: {}", e))?;

    tracing::info!("Prometheus metrics exporter installed");

    Ok(handle)
}

/// Record a finished generation request
pub fn record_generation(elapsed: Duration, outcome: &'static str) {
    metrics::counter!("vllm_manager_generations_total", "outcome" => outcome).increment(1);
    metrics::histogram!("vllm_manager_generation_duration_seconds", "outcome" => outcome)
        .record(elapsed.as_secs_f64());
}

/// Record a model download attempt
pub fn record_download(model_id: &str, outcome: &'static str) {
    metrics::counter!("vllm_manager_downloads_total",
        "model" => model_id.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Record a download request served from the local cache
pub fn record_cache_hit(model_id: &str) {
    metrics::counter!("vllm_manager_cache_hits_total",
        "model" => model_id.to_string()
    )
    .increment(1);
}

/// Record cache directories deleted by cleanup or explicit removal
pub fn record_models_removed(count: usize) {
    if count > 0 {
        metrics::counter!("vllm_manager_models_removed_total").increment(count as u64);
    }
}

/// Update the engine health gauge (1 healthy, 0 unhealthy)
pub fn update_engine_health(healthy: bool) {
    metrics::gauge!("vllm_manager_engine_healthy").set(if healthy { 1.0 } else { 0.0 });
}
