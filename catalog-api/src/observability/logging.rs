//! Structured logging setup and header masking for request logs.
//!
//! # Examples
//!
//! ```rust,no_run
//! use catalog_api::observability::logging::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::default()).expect("Failed to initialize logging");
//! ```

use axum::http::HeaderMap;
use catalog_telemetry::masking::{Masker, MASK};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::info;
use tracing_subscriber::{
    filter::ParseError,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
    EnvFilter, Layer,
};

/// Log format configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format for production (machine-readable)
    Json,
    /// Pretty format for development (human-readable)
    Pretty,
    /// Compact format for minimal output
    Compact,
}

impl Default for LogFormat {
    fn default() -> Self {
        #[cfg(debug_assertions)]
        return Self::Pretty;

        #[cfg(not(debug_assertions))]
        return Self::Json;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub format: LogFormat,
    /// Default log level
    pub level: String,
    /// Per-module directives (e.g. "catalog_api=debug,tower_http=warn").
    /// Takes precedence over `level`.
    pub filter: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: "info".to_string(),
            filter: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log filter: {0}")]
    Filter(#[from] ParseError),

    #[error("Failed to install log subscriber: {0}")]
    Install(#[from] TryInitError),
}

/// Install the global subscriber. `RUST_LOG`, when set and valid, wins over
/// the configured level and filter.
pub fn init_logging(config: &LogConfig) -> Result<(), LoggingError> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(config.filter.as_deref().unwrap_or(&config.level))?,
    };

    match config.format {
        LogFormat::Json => {
            let json_layer = fmt::layer()
                .json()
                .with_span_events(FmtSpan::CLOSE)
                .with_current_span(true)
                .with_thread_ids(true)
                .with_filter(env_filter);

            tracing_subscriber::registry().with(json_layer).try_init()?;
        }
        LogFormat::Pretty => {
            let pretty_layer = fmt::layer()
                .pretty()
                .with_thread_ids(true)
                .with_filter(env_filter);

            tracing_subscriber::registry().with(pretty_layer).try_init()?;
        }
        LogFormat::Compact => {
            let compact_layer = fmt::layer().compact().with_filter(env_filter);

            tracing_subscriber::registry().with(compact_layer).try_init()?;
        }
    }

    info!(format = ?config.format, "Logging initialized");
    Ok(())
}

/// Headers as they should appear in a log line.
///
/// Values flagged sensitive upstream are masked alongside the built-in
/// sensitive header names.
pub fn masked_headers(masker: &Masker, headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut masked = masker.mask_headers(
        headers
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_bytes())),
    );

    for (name, value) in headers {
        if value.is_sensitive() {
            masked.insert(name.as_str().to_string(), MASK.to_string());
        }
    }

    masked
}
