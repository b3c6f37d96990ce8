//! Timing decorator for any [`ProductStore`].
//!
//! Every call is recorded under `db_operations_total` and
//! `db_operation_duration_seconds`. Calls over their latency budget also bump
//! `db_slow_operations_total` and log a warning. Log records are emitted inside
//! the caller's span, so they carry the request's correlation fields.

use async_trait::async_trait;
use catalog_core::{Product, ProductId, ProductStore, Result};
use catalog_telemetry::{OperationKind, SlowOperationThresholds, TelemetryRegistry};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

pub struct InstrumentedStore<S> {
    inner: S,
    registry: Arc<TelemetryRegistry>,
    thresholds: SlowOperationThresholds,
}

impl<S: ProductStore> InstrumentedStore<S> {
    pub fn new(inner: S, registry: Arc<TelemetryRegistry>, thresholds: SlowOperationThresholds) -> Self {
        Self {
            inner,
            registry,
            thresholds,
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    async fn timed<T, F>(&self, operation: &'static str, kind: OperationKind, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>> + Send,
    {
        let start = Instant::now();
        let result = call.await;
        let elapsed = start.elapsed();

        self.registry
            .record_db_operation(operation, elapsed, result.is_ok());

        if self.thresholds.is_slow(kind, elapsed) {
            self.registry.record_slow_operation(operation);
            warn!(
                operation,
                elapsed_ms = elapsed.as_millis() as u64,
                threshold_ms = self.thresholds.threshold(kind).as_millis() as u64,
                "Slow data-access operation"
            );
        }

        if let Err(e) = &result {
            warn!(operation, error = %e, "Data-access operation failed");
        }

        result
    }
}

#[async_trait]
impl<S: ProductStore> ProductStore for InstrumentedStore<S> {
    async fn list(&self) -> Result<Vec<Product>> {
        self.timed("list", OperationKind::BulkRead, self.inner.list())
            .await
    }

    async fn list_by_category(&self, category: &str) -> Result<Vec<Product>> {
        self.timed(
            "list_by_category",
            OperationKind::BulkRead,
            self.inner.list_by_category(category),
        )
        .await
    }

    async fn get(&self, id: &ProductId) -> Result<Option<Product>> {
        self.timed("get", OperationKind::PointRead, self.inner.get(id))
            .await
    }

    async fn create(&self, product: Product) -> Result<Product> {
        self.timed("create", OperationKind::Write, self.inner.create(product))
            .await
    }

    async fn update(&self, product: Product) -> Result<Product> {
        self.timed("update", OperationKind::Write, self.inner.update(product))
            .await
    }

    async fn delete(&self, id: &ProductId) -> Result<bool> {
        self.timed("delete", OperationKind::Write, self.inner.delete(id))
            .await
    }
}
