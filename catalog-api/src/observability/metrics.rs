//! Prometheus exporter wiring and the scrape endpoint.
//!
//! # Example
//!
//! ```rust,ignore
//! use catalog_api::observability::metrics::{build_metrics_sink, MetricsConfig};
//! use catalog_telemetry::TelemetryRegistry;
//!
//! let registry = TelemetryRegistry::new(build_metrics_sink(&MetricsConfig::default()));
//! ```

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use catalog_telemetry::registry::{install_prometheus, MetricsSink, PrometheusSink};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info};

use super::telemetry::TelemetryState;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Install the Prometheus recorder at startup.
    pub enabled: bool,
    /// Route templates left out of the HTTP metrics (e.g. /health, /metrics)
    pub excluded_paths: HashSet<String>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        let mut excluded_paths = HashSet::new();
        excluded_paths.insert("/health".to_string());
        excluded_paths.insert("/metrics".to_string());

        Self {
            enabled: true,
            excluded_paths,
        }
    }
}

impl MetricsConfig {
    pub fn is_excluded(&self, path: &str) -> bool {
        self.excluded_paths.contains(path)
    }
}

/// Sink for the process-wide registry.
///
/// A recorder that fails to install leaves the service running without a
/// scrape endpoint; it is reported here and not again.
pub fn build_metrics_sink(config: &MetricsConfig) -> Arc<dyn MetricsSink> {
    if !config.enabled {
        info!("Prometheus exporter disabled by configuration");
        return Arc::new(PrometheusSink::new(None));
    }

    match install_prometheus() {
        Ok(handle) => {
            info!("Prometheus exporter installed");
            Arc::new(PrometheusSink::new(Some(handle)))
        }
        Err(e) => {
            error!(error = %e, "Failed to install Prometheus exporter, metrics will not be exported");
            Arc::new(PrometheusSink::new(None))
        }
    }
}

/// `GET /metrics` in the Prometheus text exposition format.
pub async fn metrics_handler(State(telemetry): State<TelemetryState>) -> Response {
    match telemetry.registry.render() {
        Some(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "Metrics exporter not installed").into_response(),
    }
}
