use async_trait::async_trait;
use catalog_core::{CoreError, Product, ProductId, ProductStore, Result};
use catalog_storage::{InMemoryProductStore, InstrumentedStore};
use catalog_telemetry::{InMemorySink, SlowOperationThresholds, TelemetryRegistry};
use rstest::rstest;
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

/// Delays point reads to trip the slow-operation budget.
struct SluggishStore {
    inner: InMemoryProductStore,
    delay: Duration,
}

#[async_trait]
impl ProductStore for SluggishStore {
    async fn list(&self) -> Result<Vec<Product>> {
        self.inner.list().await
    }

    async fn list_by_category(&self, category: &str) -> Result<Vec<Product>> {
        self.inner.list_by_category(category).await
    }

    async fn get(&self, id: &ProductId) -> Result<Option<Product>> {
        tokio::time::sleep(self.delay).await;
        self.inner.get(id).await
    }

    async fn create(&self, product: Product) -> Result<Product> {
        self.inner.create(product).await
    }

    async fn update(&self, product: Product) -> Result<Product> {
        self.inner.update(product).await
    }

    async fn delete(&self, id: &ProductId) -> Result<bool> {
        self.inner.delete(id).await
    }
}

fn labels(operation: &str, status: &str) -> [(&'static str, String); 2] {
    [
        ("operation", operation.to_string()),
        ("status", status.to_string()),
    ]
}

fn lamp() -> Product {
    Product::new("Lamp".into(), None, "lighting".into(), 30.0, 4, None)
}

fn instrumented() -> (InstrumentedStore<InMemoryProductStore>, Arc<InMemorySink>) {
    let (registry, sink) = TelemetryRegistry::in_memory();
    let store = InstrumentedStore::new(
        InMemoryProductStore::new(),
        registry,
        SlowOperationThresholds::default(),
    );
    (store, sink)
}

#[tokio::test]
async fn test_successful_calls_are_counted() {
    let (store, sink) = instrumented();

    let created = assert_ok!(store.create(lamp()).await);
    assert_ok!(store.get(&created.id).await);
    assert_ok!(store.list().await);

    assert_eq!(sink.counter("db_operations_total", &labels("create", "success")), 1);
    assert_eq!(sink.counter("db_operations_total", &labels("get", "success")), 1);
    assert_eq!(sink.counter("db_operations_total", &labels("list", "success")), 1);
    assert_eq!(
        sink.histogram("db_operation_duration_seconds", &[("operation", "get".to_string())])
            .len(),
        1
    );
}

#[tokio::test]
async fn test_failures_are_counted_and_propagated() {
    let (store, sink) = instrumented();

    let err = assert_err!(store.update(lamp()).await);

    assert!(matches!(err, CoreError::NotFound(_)));
    assert_eq!(sink.counter("db_operations_total", &labels("update", "error")), 1);
    assert_eq!(sink.counter("db_operations_total", &labels("update", "success")), 0);
}

#[rstest]
#[case(Duration::from_millis(0), 0)]
#[case(Duration::from_millis(80), 1)]
#[tokio::test]
async fn test_slow_point_reads_are_flagged(#[case] delay: Duration, #[case] expected: u64) {
    let (registry, sink) = TelemetryRegistry::in_memory();
    let store = InstrumentedStore::new(
        SluggishStore {
            inner: InMemoryProductStore::new(),
            delay,
        },
        registry,
        SlowOperationThresholds::default(),
    );

    store.get(&ProductId::new()).await.unwrap();

    assert_eq!(
        sink.counter("db_slow_operations_total", &[("operation", "get".to_string())]),
        expected
    );
}

#[tokio::test]
async fn test_store_results_are_unchanged() {
    let (store, _sink) = instrumented();
    let created = store.create(lamp()).await.unwrap();

    assert!(store.delete(&created.id).await.unwrap());
    assert_eq!(store.get(&created.id).await.unwrap(), None);
    assert!(store.inner().is_empty());
}
