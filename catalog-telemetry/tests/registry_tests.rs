use catalog_core::Product;
use catalog_telemetry::aggregators::{aggregate, InventoryThresholds};
use catalog_telemetry::registry::TelemetryRegistry;
use catalog_telemetry::snapshot::{MetricsSnapshot, RequestMeter};
use std::collections::HashMap;
use std::time::Duration;

fn stock_of(category: &str, count: usize) -> Vec<Product> {
    (0..count)
        .map(|i| {
            Product::new(
                format!("{category}-{i}"),
                None,
                category.to_string(),
                5.0,
                1,
                None,
            )
        })
        .collect()
}

fn parse_render(text: &str) -> HashMap<String, f64> {
    text.lines()
        .filter_map(|line| {
            let (series, value) = line.rsplit_once(' ')?;
            Some((series.to_string(), value.parse().ok()?))
        })
        .collect()
}

#[test]
fn test_http_request_series() {
    let (registry, sink) = TelemetryRegistry::in_memory();

    registry.record_http_request("GET", "/api/v1/products", 200, Duration::from_millis(12), 0, 512);
    registry.record_http_request("GET", "/api/v1/products", 200, Duration::from_millis(8), 0, 256);

    let full = [
        ("method", "GET".to_string()),
        ("endpoint", "/api/v1/products".to_string()),
        ("status", "200".to_string()),
    ];
    assert_eq!(sink.counter("http_requests_total", &full), 2);
    assert_eq!(sink.histogram("http_request_duration_seconds", &full).len(), 2);
    assert_eq!(
        sink.histogram("http_response_size_bytes", &full[..2]),
        vec![512.0, 256.0]
    );
}

#[test]
fn test_slow_operation_counter() {
    let (registry, sink) = TelemetryRegistry::in_memory();
    registry.record_slow_operation("list");
    registry.record_slow_operation("list");

    assert_eq!(
        sink.counter("db_slow_operations_total", &[("operation", "list".to_string())]),
        2
    );
}

#[tokio::test]
async fn test_meter_exports_process_gauges() {
    let (registry, sink) = TelemetryRegistry::in_memory();
    let meter = RequestMeter::new(registry);

    let in_flight = meter.begin();
    let _work: Vec<u8> = vec![0; 4096];
    let delta = meter.finish(in_flight);

    assert!(sink.gauge("process_allocated_bytes", &[]).is_some());
    assert!(sink.gauge("process_system_bytes", &[]).is_some());
    assert!(sink.gauge("runtime_live_tasks", &[]).is_some());
    assert_eq!(sink.histogram("request_allocated_bytes", &[]).len(), 1);
    assert!(delta.elapsed <= Duration::from_secs(5));
}

#[test]
fn test_process_gauges_mirror_snapshot() {
    let (registry, sink) = TelemetryRegistry::in_memory();
    let mut snapshot = MetricsSnapshot::capture();
    snapshot.allocated_bytes = 2048;
    snapshot.live_tasks = 4;

    registry.record_process(&snapshot);

    assert_eq!(sink.gauge("process_allocated_bytes", &[]), Some(2048.0));
    assert_eq!(sink.gauge("runtime_live_tasks", &[]), Some(4.0));
}

#[test]
fn test_concurrent_publication_is_never_torn() {
    let (registry, _sink) = TelemetryRegistry::in_memory();
    let thresholds = InventoryThresholds::default();
    let small = aggregate(&stock_of("small", 3), &thresholds);
    let large = aggregate(&stock_of("large", 7), &thresholds);

    std::thread::scope(|scope| {
        for writer in 0..4 {
            let registry = &registry;
            let (first, second) = if writer % 2 == 0 {
                (&small, &large)
            } else {
                (&large, &small)
            };
            scope.spawn(move || {
                for _ in 0..200 {
                    registry.publish_inventory(first.clone());
                    registry.publish_inventory(second.clone());
                }
            });
        }

        for _ in 0..4 {
            let registry = &registry;
            scope.spawn(move || {
                for _ in 0..200 {
                    let Some(text) = registry.render() else { continue };
                    let series = parse_render(&text);
                    let Some(total) = series.get("products_total").copied() else {
                        continue;
                    };

                    assert_eq!(series.get("products_low_stock").copied(), Some(total));
                    assert_eq!(series.get("inventory_total_value").copied(), Some(total * 5.0));
                    let current = if total == 3.0 { "small" } else { "large" };
                    assert_eq!(
                        series
                            .get(&format!("products_by_category{{category=\"{current}\"}}"))
                            .copied(),
                        Some(total)
                    );
                }
            });
        }
    });

    let last = registry.inventory().expect("published at least once");
    assert!(last.total_count == 3 || last.total_count == 7);
}
