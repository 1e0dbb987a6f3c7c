//! Metrics implementation using Prometheus.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use playpen_core::{Error, Result};

/// Initialize Prometheus recorder and return the handle.
pub fn setup_metrics_recorder() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| Error::config(format!("Failed to install Prometheus recorder: {}", e)))?;

    tracing::info!("Prometheus metrics recorder initialized");
    Ok(handle)
}

/// Helper to track HTTP request metrics (latency, count).
pub fn track_request(method: &str, path: &str, status: u16, latency_sec: f64) {
    metrics::counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    metrics::histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path.to_string()
    )
    .record(latency_sec);
}

/// Helper to track one sandbox run. `outcome` is `ok`, `failed`, `timeout`
/// or `error`.
pub fn track_execution(channel: &str, outcome: &'static str, latency_sec: f64) {
    metrics::counter!(
        "sandbox_executions_total",
        "channel" => channel.to_string(),
        "outcome" => outcome
    )
    .increment(1);

    metrics::histogram!("sandbox_execution_duration_seconds", "channel" => channel.to_string())
        .record(latency_sec);
}

/// Which cache a lookup went to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLayer {
    Memo,
    Store,
}

impl CacheLayer {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Memo => "memo",
            Self::Store => "store",
        }
    }
}

pub fn track_cache(layer: CacheLayer, hit: bool) {
    let name = if hit { "cache_hits_total" } else { "cache_misses_total" };
    metrics::counter!(name, "layer" => layer.as_str()).increment(1);
}

pub fn track_paste(backend: &'static str, success: bool) {
    metrics::counter!(
        "paste_uploads_total",
        "backend" => backend,
        "status" => if success { "ok" } else { "failed" }
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_helpers_without_recorder_are_noops() {
        track_request("POST", "/evaluate.json", 200, 0.01);
        track_execution("stable", "ok", 0.5);
        track_cache(CacheLayer::Memo, true);
        track_cache(CacheLayer::Store, false);
        track_paste("gist", false);
    }
}
