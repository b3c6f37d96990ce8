use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use catalog_api::{app, observability::TelemetryState, AppState};
use catalog_storage::{InMemoryProductStore, InstrumentedStore};
use catalog_telemetry::{
    InMemorySink, InventoryThresholds, Masker, SlowOperationThresholds, TelemetryRegistry,
};
use serde_json::Value;
use std::io;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

fn test_app() -> (Router, Arc<InMemorySink>) {
    let (registry, sink) = TelemetryRegistry::in_memory();
    let store = InstrumentedStore::new(
        InMemoryProductStore::new(),
        registry.clone(),
        SlowOperationThresholds::default(),
    );
    let telemetry = TelemetryState::new(
        Arc::new(Masker::default()),
        registry,
        InventoryThresholds::default(),
    );
    let state = AppState {
        store: Arc::new(store),
        telemetry,
    };
    (app(state), sink)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn header<'a>(response: &'a axum::response::Response, name: &str) -> &'a str {
    response.headers()[name].to_str().unwrap()
}

fn is_hex_id(value: &str) -> bool {
    value.len() == 32 && value.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
}

#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl CapturedLogs {
    fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    fn records(&self) -> Vec<Value> {
        let bytes = self.0.lock().unwrap().clone();
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }
}

#[tokio::test]
async fn test_inherited_correlation_id_is_echoed() {
    let (app, _sink) = test_app();

    let request = Request::builder()
        .uri("/health")
        .header("x-correlation-id", "abc")
        .header("x-request-id", "xyz")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "x-correlation-id"), "abc");
    let request_id = header(&response, "x-request-id");
    assert_ne!(request_id, "xyz");
    assert!(is_hex_id(request_id));
}

#[tokio::test]
async fn test_missing_headers_get_fresh_ids() {
    let (app, _sink) = test_app();

    let first = app.clone().oneshot(get("/health")).await.unwrap();
    let second = app.oneshot(get("/health")).await.unwrap();

    let first_id = header(&first, "x-correlation-id");
    let second_id = header(&second, "x-correlation-id");
    assert!(is_hex_id(first_id));
    assert!(is_hex_id(second_id));
    assert_ne!(first_id, second_id);
}

#[tokio::test]
async fn test_blank_correlation_header_falls_back() {
    let (app, _sink) = test_app();

    let request = Request::builder()
        .uri("/health")
        .header("x-correlation-id", "  ")
        .header("x-request-id", "upstream-9")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(header(&response, "x-correlation-id"), "upstream-9");
}

#[tokio::test]
async fn test_ids_are_set_on_error_responses() {
    let (app, _sink) = test_app();

    let response = app.oneshot(get("/nowhere")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(response.headers().contains_key("x-correlation-id"));
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_http_metrics_use_route_template() {
    let (app, sink) = test_app();

    let uri = format!("/api/v1/products/{}", uuid::Uuid::new_v4());
    let response = app.oneshot(get(&uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let labels = [
        ("method", "GET".to_string()),
        ("endpoint", "/api/v1/products/:id".to_string()),
        ("status", "404".to_string()),
    ];
    assert_eq!(sink.counter("http_requests_total", &labels), 1);
    assert_eq!(sink.histogram("http_request_duration_seconds", &labels).len(), 1);
}

#[tokio::test]
async fn test_unmatched_paths_share_one_label() {
    let (app, sink) = test_app();

    app.clone().oneshot(get("/a")).await.unwrap();
    app.oneshot(get("/b/c")).await.unwrap();

    let labels = [
        ("method", "GET".to_string()),
        ("endpoint", "unmatched".to_string()),
        ("status", "404".to_string()),
    ];
    assert_eq!(sink.counter("http_requests_total", &labels), 2);
}

#[tokio::test]
async fn test_health_routes_are_not_counted() {
    let (app, sink) = test_app();

    app.oneshot(get("/health")).await.unwrap();

    let labels = [
        ("method", "GET".to_string()),
        ("endpoint", "/health".to_string()),
        ("status", "200".to_string()),
    ];
    assert_eq!(sink.counter("http_requests_total", &labels), 0);
}

#[tokio::test]
async fn test_response_size_and_meter_are_recorded() {
    let (app, sink) = test_app();

    app.oneshot(get("/api/v1/products")).await.unwrap();

    let labels = [
        ("method", "GET".to_string()),
        ("endpoint", "/api/v1/products".to_string()),
    ];
    assert_eq!(sink.histogram("http_response_size_bytes", &labels), vec![2.0]);
    assert_eq!(sink.histogram("http_request_size_bytes", &labels), vec![0.0]);
    assert_eq!(sink.histogram("request_allocated_bytes", &[]).len(), 1);
    assert!(sink.gauge("runtime_live_tasks", &[]).is_some());
}

#[tokio::test]
async fn test_metrics_endpoint_renders_registry() {
    let (app, _sink) = test_app();

    app.clone().oneshot(get("/api/v1/products")).await.unwrap();
    let response = app.oneshot(get("/metrics")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        header(&response, "content-type"),
        "text/plain; version=0.0.4"
    );
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = String::from_utf8(body.to_vec()).unwrap();
    assert!(body.contains(
        "http_requests_total{method=\"GET\",endpoint=\"/api/v1/products\",status=\"200\"} 1"
    ));
    assert!(body.contains("products_total 0"));
}

#[tokio::test]
async fn test_request_log_is_masked_and_correlated() {
    let (app, _sink) = test_app();
    let logs = CapturedLogs::default();
    let _guard = logs.install();

    let request = Request::builder()
        .uri("/api/v1/products?token=abc123&category=audio")
        .header("x-correlation-id", "corr-77")
        .header("authorization", "Bearer abc.def")
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap();

    let records = logs.records();
    let completed = records
        .iter()
        .find(|r| r["fields"]["message"] == "Request completed")
        .expect("completion record");

    assert_eq!(completed["level"], "INFO");
    assert_eq!(completed["fields"]["query"], "token=[MASKED]&category=audio");
    assert_eq!(completed["fields"]["status"], 200);
    assert_eq!(completed["span"]["correlation_id"], "corr-77");

    let headers = completed["fields"]["headers"].as_str().unwrap();
    assert!(headers.contains("[MASKED]"));
    assert!(!headers.contains("abc.def"));
}

#[tokio::test]
async fn test_client_errors_log_at_warn() {
    let (app, _sink) = test_app();
    let logs = CapturedLogs::default();
    let _guard = logs.install();

    app.oneshot(get("/nowhere")).await.unwrap();

    let records = logs.records();
    let rejected = records
        .iter()
        .find(|r| r["fields"]["message"] == "Request rejected")
        .expect("rejection record");
    assert_eq!(rejected["level"], "WARN");
    assert_eq!(rejected["fields"]["endpoint"], "unmatched");
}
