use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::ids::ProductId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Product {
    pub id: ProductId,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub description: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub category: String,
    #[validate(range(min = 0.0))]
    pub price: f64,
    #[validate(range(min = 0))]
    pub stock: i32,
    pub sku: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn new(
        name: String,
        description: Option<String>,
        category: String,
        price: f64,
        stock: i32,
        sku: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ProductId::new(),
            name,
            description,
            category,
            price,
            stock,
            sku,
            created_at: now,
            updated_at: now,
        }
    }

    /// Price multiplied by units on hand.
    pub fn inventory_value(&self) -> f64 {
        self.price * f64::from(self.stock)
    }

    pub fn is_out_of_stock(&self) -> bool {
        self.stock == 0
    }

    /// Apply a partial update, bumping `updated_at` when anything changed.
    pub fn apply(&mut self, patch: ProductPatch) {
        let before = self.clone();

        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(description) = patch.description {
            self.description = Some(description);
        }
        if let Some(category) = patch.category {
            self.category = category;
        }
        if let Some(price) = patch.price {
            self.price = price;
        }
        if let Some(stock) = patch.stock {
            self.stock = stock;
        }
        if let Some(sku) = patch.sku {
            self.sku = Some(sku);
        }

        if *self != before {
            self.updated_at = Utc::now();
        }
    }
}

/// Partial update for a [`Product`]. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: Option<f64>,
    pub stock: Option<i32>,
    pub sku: Option<String>,
}
