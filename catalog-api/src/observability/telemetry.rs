//! Per-request metering, HTTP metrics and the completion log line.

use axum::{
    body::HttpBody,
    extract::{MatchedPath, Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use catalog_telemetry::{
    aggregators::{BusinessMetricsAggregator, InventoryThresholds},
    events::EventLogger,
    masking::Masker,
    registry::TelemetryRegistry,
    snapshot::RequestMeter,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use super::logging::masked_headers;
use super::metrics::MetricsConfig;

/// Endpoint label for requests that matched no route. Keeps the label set
/// bounded when clients probe arbitrary paths.
pub const UNMATCHED_ENDPOINT: &str = "unmatched";

/// Telemetry collaborators shared by the middleware and the handlers.
#[derive(Clone)]
pub struct TelemetryState {
    pub masker: Arc<Masker>,
    pub registry: Arc<TelemetryRegistry>,
    pub meter: RequestMeter,
    pub aggregator: BusinessMetricsAggregator,
    pub events: EventLogger,
    excluded_paths: Arc<HashSet<String>>,
}

impl TelemetryState {
    pub fn new(
        masker: Arc<Masker>,
        registry: Arc<TelemetryRegistry>,
        thresholds: InventoryThresholds,
    ) -> Self {
        Self {
            meter: RequestMeter::new(registry.clone()),
            aggregator: BusinessMetricsAggregator::new(thresholds, registry.clone()),
            events: EventLogger::new(masker.clone()),
            excluded_paths: Arc::new(MetricsConfig::default().excluded_paths),
            masker,
            registry,
        }
    }

    /// Replace the set of route templates that skip HTTP metrics.
    pub fn with_excluded_paths(mut self, paths: impl IntoIterator<Item = String>) -> Self {
        self.excluded_paths = Arc::new(paths.into_iter().collect());
        self
    }

    pub fn thresholds(&self) -> &InventoryThresholds {
        self.aggregator.thresholds()
    }

    fn records_metrics_for(&self, endpoint: &str) -> bool {
        !self.excluded_paths.contains(endpoint)
    }
}

fn content_length(request: &Request) -> u64 {
    request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse().ok())
        .unwrap_or(0)
}

pub async fn request_telemetry_middleware(
    State(telemetry): State<TelemetryState>,
    request: Request,
    next: Next,
) -> Response {
    let in_flight = telemetry.meter.begin();
    let start = Instant::now();

    let method = request.method().clone();
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_owned())
        .unwrap_or_else(|| UNMATCHED_ENDPOINT.to_owned());
    let path = telemetry.masker.mask_str(request.uri().path());
    let query = request
        .uri()
        .query()
        .map(|query| telemetry.masker.mask_str(query))
        .unwrap_or_default();
    let headers = masked_headers(&telemetry.masker, request.headers());
    let request_bytes = content_length(&request);

    let response = next.run(request).await;

    let duration = start.elapsed();
    let status = response.status();
    let response_bytes = response.body().size_hint().exact().unwrap_or(0);

    if telemetry.records_metrics_for(&endpoint) {
        telemetry.registry.record_http_request(
            method.as_str(),
            &endpoint,
            status.as_u16(),
            duration,
            request_bytes,
            response_bytes,
        );
    }

    let delta = telemetry.meter.finish(in_flight);
    let duration_ms = duration.as_millis() as u64;

    if status.is_server_error() {
        error!(
            method = %method,
            endpoint = %endpoint,
            path = %path,
            query = %query,
            headers = ?headers,
            status = status.as_u16(),
            duration_ms,
            response_bytes,
            allocated_bytes = delta.allocated_bytes,
            allocations = delta.allocations,
            "Request failed"
        );
    } else if status.is_client_error() {
        warn!(
            method = %method,
            endpoint = %endpoint,
            path = %path,
            query = %query,
            headers = ?headers,
            status = status.as_u16(),
            duration_ms,
            response_bytes,
            allocated_bytes = delta.allocated_bytes,
            allocations = delta.allocations,
            "Request rejected"
        );
    } else {
        info!(
            method = %method,
            endpoint = %endpoint,
            path = %path,
            query = %query,
            headers = ?headers,
            status = status.as_u16(),
            duration_ms,
            response_bytes,
            allocated_bytes = delta.allocated_bytes,
            allocations = delta.allocations,
            "Request completed"
        );
    }

    response
}
