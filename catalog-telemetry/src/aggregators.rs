use catalog_core::Product;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::registry::TelemetryRegistry;

/// Stock and price cut-offs for inventory classification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryThresholds {
    /// Products with `0 < stock < low_stock_threshold` count as low stock.
    pub low_stock_threshold: i32,
    /// Products priced strictly above this count as high value.
    pub high_value_threshold: f64,
}

impl Default for InventoryThresholds {
    fn default() -> Self {
        Self {
            low_stock_threshold: 10,
            high_value_threshold: 1000.0,
        }
    }
}

impl InventoryThresholds {
    pub fn is_low_stock(&self, product: &Product) -> bool {
        product.stock > 0 && product.stock < self.low_stock_threshold
    }

    pub fn is_high_value(&self, product: &Product) -> bool {
        product.price > self.high_value_threshold
    }
}

/// Summary of one product collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateStats {
    pub total_count: u64,
    pub per_category_count: BTreeMap<String, u64>,
    pub per_category_average_price: BTreeMap<String, f64>,
    pub low_stock_count: u64,
    pub out_of_stock_count: u64,
    pub high_value_count: u64,
    pub total_inventory_value: f64,
    pub average_price: f64,
}

/// Compute [`AggregateStats`] in a single pass. Pure; no metrics are touched.
pub fn aggregate(products: &[Product], thresholds: &InventoryThresholds) -> AggregateStats {
    let mut stats = AggregateStats::default();
    let mut price_sum = 0.0;
    let mut category_price_sums: BTreeMap<String, f64> = BTreeMap::new();

    for product in products {
        stats.total_count += 1;
        *stats
            .per_category_count
            .entry(product.category.clone())
            .or_insert(0) += 1;
        *category_price_sums
            .entry(product.category.clone())
            .or_insert(0.0) += product.price;

        if product.stock == 0 {
            stats.out_of_stock_count += 1;
        } else if thresholds.is_low_stock(product) {
            stats.low_stock_count += 1;
        }

        if thresholds.is_high_value(product) {
            stats.high_value_count += 1;
        }

        price_sum += product.price;
        stats.total_inventory_value += product.inventory_value();
    }

    if stats.total_count > 0 {
        stats.average_price = price_sum / stats.total_count as f64;
    }

    stats.per_category_average_price = category_price_sums
        .into_iter()
        .map(|(category, sum)| {
            let count = stats.per_category_count.get(&category).copied().unwrap_or(1);
            (category, sum / count as f64)
        })
        .collect();

    stats
}

/// Turns query results into inventory gauges.
#[derive(Clone)]
pub struct BusinessMetricsAggregator {
    thresholds: InventoryThresholds,
    registry: Arc<TelemetryRegistry>,
}

impl BusinessMetricsAggregator {
    pub fn new(thresholds: InventoryThresholds, registry: Arc<TelemetryRegistry>) -> Self {
        Self {
            thresholds,
            registry,
        }
    }

    pub fn thresholds(&self) -> &InventoryThresholds {
        &self.thresholds
    }

    pub fn compute(&self, products: &[Product]) -> AggregateStats {
        aggregate(products, &self.thresholds)
    }

    /// Aggregate and publish. Gauges from earlier passes are overwritten.
    pub fn observe(&self, products: &[Product]) -> Arc<AggregateStats> {
        let stats = self.compute(products);
        tracing::debug!(
            total = stats.total_count,
            low_stock = stats.low_stock_count,
            out_of_stock = stats.out_of_stock_count,
            high_value = stats.high_value_count,
            "Publishing inventory metrics"
        );
        self.registry.publish_inventory(stats)
    }
}
