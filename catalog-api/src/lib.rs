//! HTTP surface of the catalog service.
//!
//! [`routes`] holds the product API, mounted under `/api/v1` by [`app`], which
//! adds the probe and scrape endpoints and the telemetry middleware stack.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod observability;

use axum::{
    extract::FromRef,
    http::HeaderName,
    middleware,
    routing::get,
    Router,
};
use catalog_core::ProductStore;
use std::sync::Arc;
use tower_http::sensitive_headers::SetSensitiveRequestHeadersLayer;

use catalog_telemetry::masking::SENSITIVE_HEADERS;
use observability::{correlation_middleware, metrics_handler, request_telemetry_middleware, TelemetryState};

pub use error::{ApiError, ApiResult};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ProductStore>,
    pub telemetry: TelemetryState,
}

impl FromRef<AppState> for TelemetryState {
    fn from_ref(state: &AppState) -> Self {
        state.telemetry.clone()
    }
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route(
            "/products",
            get(handlers::products::list).post(handlers::products::create),
        )
        .route("/products/stats", get(handlers::products::stats))
        .route(
            "/products/:id",
            get(handlers::products::get)
                .put(handlers::products::update)
                .delete(handlers::products::delete),
        )
        .with_state(state)
}

/// Full application router.
///
/// Correlation runs outermost so every later layer, handler and store call
/// logs inside the request span.
pub fn app(state: AppState) -> Router {
    let telemetry = state.telemetry.clone();
    let sensitive_headers = SENSITIVE_HEADERS
        .iter()
        .filter_map(|name| name.parse().ok())
        .collect::<Vec<HeaderName>>();

    Router::new()
        .route("/health", get(handlers::system::health))
        .route("/metrics", get(metrics_handler).with_state(telemetry.clone()))
        .nest("/api/v1", routes(state))
        .layer(middleware::from_fn_with_state(
            telemetry,
            request_telemetry_middleware,
        ))
        .layer(SetSensitiveRequestHeadersLayer::new(sensitive_headers))
        .layer(middleware::from_fn(correlation_middleware))
}
