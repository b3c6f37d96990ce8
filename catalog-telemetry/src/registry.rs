//! Metrics registry injected into every telemetry component.
//!
//! Components record through [`TelemetryRegistry`], which forwards to a
//! [`MetricsSink`]. Production uses [`PrometheusSink`] on top of the
//! `metrics` facade; tests use [`InMemorySink`] and read values back.

use metrics::{describe_counter, describe_gauge, describe_histogram, Label, Unit};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tracing::warn;

use crate::aggregators::AggregateStats;
use crate::error::{TelemetryError, TelemetryResult};
use crate::snapshot::{MetricsDelta, MetricsSnapshot};

pub type Labels<'a> = &'a [(&'static str, String)];

/// Destination for metric updates.
///
/// Implementations must not fail or block for long; a broken backend is
/// reported once and otherwise ignored.
pub trait MetricsSink: Send + Sync {
    fn increment_counter(&self, name: &'static str, labels: Labels<'_>);
    fn set_gauge(&self, name: &'static str, value: f64, labels: Labels<'_>);
    fn record_histogram(&self, name: &'static str, value: f64, labels: Labels<'_>);

    /// Exposition text, when the backend supports scraping.
    fn render(&self) -> Option<String> {
        None
    }
}

// ============================================================================
// Prometheus
// ============================================================================

/// Install the global Prometheus recorder with bucket layouts for the
/// histograms this service emits.
pub fn install_prometheus() -> TelemetryResult<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("http_request_duration".to_string()),
            &[
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ],
        )
        .map_err(|e| TelemetryError::Installation(e.to_string()))?
        .set_buckets_for_metric(
            Matcher::Prefix("db_operation_duration".to_string()),
            &[
                0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
            ],
        )
        .map_err(|e| TelemetryError::Installation(e.to_string()))?
        .set_buckets_for_metric(
            Matcher::Suffix("size_bytes".to_string()),
            &[
                100.0, 1_000.0, 10_000.0, 100_000.0, 1_000_000.0, 10_000_000.0,
            ],
        )
        .map_err(|e| TelemetryError::Installation(e.to_string()))?
        .set_buckets_for_metric(
            Matcher::Full("request_allocated_bytes".to_string()),
            &[
                1_024.0, 16_384.0, 65_536.0, 262_144.0, 1_048_576.0, 4_194_304.0,
                16_777_216.0,
            ],
        )
        .map_err(|e| TelemetryError::Installation(e.to_string()))?
        .install_recorder()
        .map_err(|e| TelemetryError::Installation(e.to_string()))?;

    register_metric_descriptions();

    Ok(handle)
}

fn register_metric_descriptions() {
    // HTTP
    describe_counter!("http_requests_total", Unit::Count, "Total HTTP requests handled");
    describe_histogram!(
        "http_request_duration_seconds",
        Unit::Seconds,
        "HTTP request duration in seconds"
    );
    describe_histogram!("http_request_size_bytes", Unit::Bytes, "HTTP request body size");
    describe_histogram!("http_response_size_bytes", Unit::Bytes, "HTTP response body size");

    // Inventory
    describe_gauge!("products_total", Unit::Count, "Products in the last aggregation pass");
    describe_gauge!("products_low_stock", Unit::Count, "Products below the low-stock threshold");
    describe_gauge!("products_out_of_stock", Unit::Count, "Products with zero stock");
    describe_gauge!("products_high_value", Unit::Count, "Products above the high-value threshold");
    describe_gauge!("products_average_price", "Mean product price");
    describe_gauge!("inventory_total_value", "Sum of price times stock");
    describe_gauge!("products_by_category", Unit::Count, "Products per category");
    describe_gauge!("products_category_average_price", "Mean product price per category");

    // Process
    describe_gauge!("process_allocated_bytes", Unit::Bytes, "Live heap bytes");
    describe_gauge!("process_system_bytes", Unit::Bytes, "Resident set size");
    describe_gauge!("runtime_live_tasks", Unit::Count, "Tasks alive on the runtime");
    describe_histogram!(
        "request_allocated_bytes",
        Unit::Bytes,
        "Growth in live heap bytes across one request"
    );

    // Data access
    describe_counter!("db_operations_total", Unit::Count, "Data-access calls by outcome");
    describe_histogram!(
        "db_operation_duration_seconds",
        Unit::Seconds,
        "Data-access call duration in seconds"
    );
    describe_counter!(
        "db_slow_operations_total",
        Unit::Count,
        "Data-access calls over their latency budget"
    );
}

/// Sink backed by the global `metrics` recorder.
pub struct PrometheusSink {
    handle: Option<PrometheusHandle>,
    unavailable_reported: AtomicBool,
}

impl PrometheusSink {
    /// `None` means no exporter is installed: updates are dropped by the
    /// facade and scraping reports the sink as unavailable.
    pub fn new(handle: Option<PrometheusHandle>) -> Self {
        Self {
            handle,
            unavailable_reported: AtomicBool::new(false),
        }
    }
}

fn to_labels(labels: Labels<'_>) -> Vec<Label> {
    labels
        .iter()
        .map(|(key, value)| Label::new(*key, value.clone()))
        .collect()
}

impl MetricsSink for PrometheusSink {
    fn increment_counter(&self, name: &'static str, labels: Labels<'_>) {
        metrics::counter!(name, to_labels(labels)).increment(1);
    }

    fn set_gauge(&self, name: &'static str, value: f64, labels: Labels<'_>) {
        metrics::gauge!(name, to_labels(labels)).set(value);
    }

    fn record_histogram(&self, name: &'static str, value: f64, labels: Labels<'_>) {
        metrics::histogram!(name, to_labels(labels)).record(value);
    }

    fn render(&self) -> Option<String> {
        match &self.handle {
            Some(handle) => Some(handle.render()),
            None => {
                if !self.unavailable_reported.swap(true, Ordering::Relaxed) {
                    warn!("Metrics exporter is not installed; scrape requests will be empty");
                }
                None
            }
        }
    }
}

// ============================================================================
// In-memory
// ============================================================================

/// Samples kept per histogram series; older ones are dropped first.
pub const HISTOGRAM_SAMPLE_LIMIT: usize = 1024;

#[derive(Debug, Default)]
struct InMemoryState {
    counters: HashMap<String, u64>,
    gauges: HashMap<String, f64>,
    histograms: HashMap<String, VecDeque<f64>>,
}

/// Sink that keeps values in process for tests and local inspection.
/// Histograms hold at most [`HISTOGRAM_SAMPLE_LIMIT`] recent samples per
/// series.
#[derive(Debug, Default)]
pub struct InMemorySink {
    state: Mutex<InMemoryState>,
}

fn series_key(name: &str, labels: Labels<'_>) -> String {
    if labels.is_empty() {
        return name.to_string();
    }
    let rendered: Vec<String> = labels
        .iter()
        .map(|(k, v)| format!("{k}=\"{v}\""))
        .collect();
    format!("{name}{{{}}}", rendered.join(","))
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut InMemoryState) -> T) -> T {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        f(&mut state)
    }

    pub fn counter(&self, name: &str, labels: Labels<'_>) -> u64 {
        let key = series_key(name, labels);
        self.with_state(|s| s.counters.get(&key).copied().unwrap_or(0))
    }

    pub fn gauge(&self, name: &str, labels: Labels<'_>) -> Option<f64> {
        let key = series_key(name, labels);
        self.with_state(|s| s.gauges.get(&key).copied())
    }

    pub fn histogram(&self, name: &str, labels: Labels<'_>) -> Vec<f64> {
        let key = series_key(name, labels);
        self.with_state(|s| {
            s.histograms
                .get(&key)
                .map(|samples| samples.iter().copied().collect())
                .unwrap_or_default()
        })
    }
}

impl MetricsSink for InMemorySink {
    fn increment_counter(&self, name: &'static str, labels: Labels<'_>) {
        let key = series_key(name, labels);
        self.with_state(|s| *s.counters.entry(key).or_insert(0) += 1);
    }

    fn set_gauge(&self, name: &'static str, value: f64, labels: Labels<'_>) {
        let key = series_key(name, labels);
        self.with_state(|s| {
            s.gauges.insert(key, value);
        });
    }

    fn record_histogram(&self, name: &'static str, value: f64, labels: Labels<'_>) {
        let key = series_key(name, labels);
        self.with_state(|s| {
            let samples = s.histograms.entry(key).or_default();
            if samples.len() == HISTOGRAM_SAMPLE_LIMIT {
                samples.pop_front();
            }
            samples.push_back(value);
        });
    }

    /// One `series value` line per counter and gauge, sorted.
    fn render(&self) -> Option<String> {
        self.with_state(|s| {
            let mut lines: Vec<String> = s
                .counters
                .iter()
                .map(|(k, v)| format!("{k} {v}"))
                .chain(s.gauges.iter().map(|(k, v)| format!("{k} {v}")))
                .collect();
            lines.sort();
            Some(lines.join("\n"))
        })
    }
}

// ============================================================================
// Registry
// ============================================================================

fn status_class(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "error"
    }
}

/// Typed front door to the metrics sink.
pub struct TelemetryRegistry {
    sink: Arc<dyn MetricsSink>,
    // Guards every inventory gauge so scrapes see one complete pass.
    inventory: RwLock<Option<Arc<AggregateStats>>>,
}

impl TelemetryRegistry {
    pub fn new(sink: Arc<dyn MetricsSink>) -> Self {
        Self {
            sink,
            inventory: RwLock::new(None),
        }
    }

    pub fn in_memory() -> (Arc<Self>, Arc<InMemorySink>) {
        let sink = Arc::new(InMemorySink::new());
        let registry = Arc::new(Self::new(sink.clone()));
        (registry, sink)
    }

    pub fn record_http_request(
        &self,
        method: &str,
        endpoint: &str,
        status: u16,
        duration: Duration,
        request_bytes: u64,
        response_bytes: u64,
    ) {
        let labels = [
            ("method", method.to_string()),
            ("endpoint", endpoint.to_string()),
            ("status", status.to_string()),
        ];

        self.sink.increment_counter("http_requests_total", &labels);
        self.sink
            .record_histogram("http_request_duration_seconds", duration.as_secs_f64(), &labels);
        self.sink
            .record_histogram("http_request_size_bytes", request_bytes as f64, &labels[..2]);
        self.sink
            .record_histogram("http_response_size_bytes", response_bytes as f64, &labels[..2]);
    }

    pub fn record_db_operation(&self, operation: &'static str, duration: Duration, success: bool) {
        self.sink.increment_counter(
            "db_operations_total",
            &[
                ("operation", operation.to_string()),
                ("status", status_class(success).to_string()),
            ],
        );
        self.sink.record_histogram(
            "db_operation_duration_seconds",
            duration.as_secs_f64(),
            &[("operation", operation.to_string())],
        );
    }

    pub fn record_slow_operation(&self, operation: &'static str) {
        self.sink
            .increment_counter("db_slow_operations_total", &[("operation", operation.to_string())]);
    }

    pub fn record_process(&self, snapshot: &MetricsSnapshot) {
        self.sink
            .set_gauge("process_allocated_bytes", snapshot.allocated_bytes as f64, &[]);
        self.sink
            .set_gauge("process_system_bytes", snapshot.system_bytes as f64, &[]);
        self.sink
            .set_gauge("runtime_live_tasks", snapshot.live_tasks as f64, &[]);
    }

    pub fn record_request_allocation(&self, delta: &MetricsDelta) {
        self.sink
            .record_histogram("request_allocated_bytes", delta.allocated_bytes as f64, &[]);
    }

    /// Overwrite every inventory gauge with `stats`.
    ///
    /// Categories present in the previous pass but missing from this one are
    /// set to zero, since gauges cannot be removed from the exporter.
    pub fn publish_inventory(&self, stats: AggregateStats) -> Arc<AggregateStats> {
        let stats = Arc::new(stats);
        let mut current = self.inventory.write().unwrap_or_else(|p| p.into_inner());

        self.sink
            .set_gauge("products_total", stats.total_count as f64, &[]);
        self.sink
            .set_gauge("products_low_stock", stats.low_stock_count as f64, &[]);
        self.sink
            .set_gauge("products_out_of_stock", stats.out_of_stock_count as f64, &[]);
        self.sink
            .set_gauge("products_high_value", stats.high_value_count as f64, &[]);
        self.sink
            .set_gauge("products_average_price", stats.average_price, &[]);
        self.sink
            .set_gauge("inventory_total_value", stats.total_inventory_value, &[]);

        if let Some(previous) = current.as_ref() {
            for category in previous
                .per_category_count
                .keys()
                .filter(|c| !stats.per_category_count.contains_key(*c))
            {
                let labels = [("category", category.clone())];
                self.sink.set_gauge("products_by_category", 0.0, &labels);
                self.sink
                    .set_gauge("products_category_average_price", 0.0, &labels);
            }
        }

        for (category, count) in &stats.per_category_count {
            let labels = [("category", category.clone())];
            self.sink
                .set_gauge("products_by_category", *count as f64, &labels);
            let average = stats
                .per_category_average_price
                .get(category)
                .copied()
                .unwrap_or(0.0);
            self.sink
                .set_gauge("products_category_average_price", average, &labels);
        }

        *current = Some(stats.clone());
        stats
    }

    /// Stats from the most recent publication.
    pub fn inventory(&self) -> Option<Arc<AggregateStats>> {
        self.inventory
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// Exposition text for scrapes. Never interleaves with a publication.
    pub fn render(&self) -> Option<String> {
        let _guard = self.inventory.read().unwrap_or_else(|p| p.into_inner());
        self.sink.render()
    }
}
