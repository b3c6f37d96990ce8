//! Request-scoped observability for the HTTP surface.
//!
//! - correlation ids and the per-request span
//! - metering, HTTP metrics and masked request logging
//! - logging initialization
//! - the Prometheus scrape endpoint

pub mod correlation;
pub mod logging;
pub mod metrics;
pub mod telemetry;

pub use correlation::{correlation_middleware, Correlated};
pub use logging::{init_logging, masked_headers, LogConfig, LogFormat, LoggingError};
pub use metrics::{build_metrics_sink, metrics_handler, MetricsConfig};
pub use telemetry::{request_telemetry_middleware, TelemetryState, UNMATCHED_ENDPOINT};
