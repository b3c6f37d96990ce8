//! Structured business events.
//!
//! Events are built from a [`RequestContext`] and the affected product, then
//! emitted as a single INFO record with every field passed through the
//! [`Masker`]. Emission never fails the caller.

use catalog_core::Product;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tracing::warn;

use crate::correlation::RequestContext;
use crate::masking::Masker;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    ProductCreated,
    ProductUpdated,
    ProductDeleted,
    LowStockAlert,
    HighValueAccess,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::ProductCreated => "product_created",
            EventType::ProductUpdated => "product_updated",
            EventType::ProductDeleted => "product_deleted",
            EventType::LowStockAlert => "low_stock_alert",
            EventType::HighValueAccess => "high_value_access",
        }
    }

    fn default_name(&self) -> &'static str {
        match self {
            EventType::ProductCreated => "Product created",
            EventType::ProductUpdated => "Product updated",
            EventType::ProductDeleted => "Product deleted",
            EventType::LowStockAlert => "Low stock alert",
            EventType::HighValueAccess => "High-value product accessed",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessEvent {
    pub event_type: EventType,
    pub event_name: String,
    pub timestamp: DateTime<Utc>,
    pub correlation_id: String,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_value: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_value: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

fn product_snapshot(product: &Product) -> Option<Map<String, Value>> {
    match serde_json::to_value(product) {
        Ok(Value::Object(map)) => Some(map),
        Ok(_) => None,
        Err(e) => {
            warn!(error = %e, product_id = %product.id, "Failed to snapshot product for event");
            None
        }
    }
}

impl BusinessEvent {
    fn for_product(ctx: &RequestContext, event_type: EventType, product: &Product) -> Self {
        Self {
            event_type,
            event_name: event_type.default_name().to_string(),
            timestamp: Utc::now(),
            correlation_id: ctx.correlation_id().to_string(),
            request_id: ctx.request_id().to_string(),
            entity_id: Some(product.id.to_string()),
            entity_name: Some(product.name.clone()),
            category: Some(product.category.clone()),
            price: Some(product.price),
            stock: Some(product.stock),
            old_value: None,
            new_value: None,
            metadata: Map::new(),
        }
    }

    pub fn created(ctx: &RequestContext, product: &Product) -> Self {
        let mut event = Self::for_product(ctx, EventType::ProductCreated, product);
        event.new_value = product_snapshot(product);
        event
    }

    pub fn updated(ctx: &RequestContext, old: &Product, new: &Product) -> Self {
        let mut event = Self::for_product(ctx, EventType::ProductUpdated, new);
        event.old_value = product_snapshot(old);
        event.new_value = product_snapshot(new);
        event
    }

    pub fn deleted(ctx: &RequestContext, product: &Product) -> Self {
        let mut event = Self::for_product(ctx, EventType::ProductDeleted, product);
        event.old_value = product_snapshot(product);
        event
    }

    pub fn low_stock_alert(ctx: &RequestContext, product: &Product, threshold: i32) -> Self {
        Self::for_product(ctx, EventType::LowStockAlert, product)
            .with_metadata("threshold", Value::from(threshold))
    }

    pub fn high_value_access(ctx: &RequestContext, product: &Product, threshold: f64) -> Self {
        Self::for_product(ctx, EventType::HighValueAccess, product)
            .with_metadata("threshold", Value::from(threshold))
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Emits [`BusinessEvent`]s through `tracing`.
#[derive(Debug, Clone)]
pub struct EventLogger {
    masker: Arc<Masker>,
}

const NESTED_MAPS: [&str; 3] = ["old_value", "new_value", "metadata"];

impl EventLogger {
    pub fn new(masker: Arc<Masker>) -> Self {
        Self { masker }
    }

    /// Serialized and masked form of `event`, as it will appear in the log.
    pub fn masked_payload(&self, event: &BusinessEvent) -> Map<String, Value> {
        let raw = match serde_json::to_value(event) {
            Ok(Value::Object(map)) => map,
            Ok(_) => Map::new(),
            Err(e) => {
                warn!(error = %e, event_type = %event.event_type, "Failed to serialize business event");
                let mut fallback = Map::new();
                fallback.insert("event_type".into(), Value::from(event.event_type.as_str()));
                fallback.insert("event_name".into(), Value::from(event.event_name.clone()));
                fallback.insert("correlation_id".into(), Value::from(event.correlation_id.clone()));
                fallback.insert("request_id".into(), Value::from(event.request_id.clone()));
                fallback
            }
        };

        let mut masked = self.masker.mask_fields(&raw);
        for key in NESTED_MAPS {
            if let Some(Value::Object(nested)) = masked.get(key) {
                let nested = self.masker.mask_fields(nested);
                masked.insert(key.to_string(), Value::Object(nested));
            }
        }
        masked
    }

    /// Every field of the record goes through the masker, ids included,
    /// since correlation ids are caller supplied.
    pub fn emit(&self, ctx: &RequestContext, event: &BusinessEvent) {
        let payload = self.masked_payload(event);
        let payload = serde_json::to_string(&payload).unwrap_or_else(|e| {
            warn!(error = %e, "Failed to encode business event payload");
            String::from("{}")
        });

        tracing::info!(
            parent: ctx.span(),
            business_event = true,
            event_type = event.event_type.as_str(),
            event_name = %self.masker.mask_str(&event.event_name),
            request_id = %self.masker.mask_str(&event.request_id),
            correlation_id = %self.masker.mask_str(&event.correlation_id),
            payload = %payload,
            "Business event"
        );
    }
}
