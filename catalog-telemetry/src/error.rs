use thiserror::Error;

/// Errors raised while setting up the telemetry pipeline.
///
/// Recording never fails; only installation and configuration do.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Failed to install metrics exporter: {0}")]
    Installation(String),

    #[error("Invalid masking pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

pub type TelemetryResult<T> = std::result::Result<T, TelemetryError>;
