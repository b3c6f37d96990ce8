use async_trait::async_trait;

use crate::domain::{Product, ProductId};
use crate::error::Result;

/// Data-access collaborator for the product catalog.
///
/// Implementations own persistence; callers layer instrumentation on top
/// (see `catalog_storage::InstrumentedStore`).
#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn list(&self) -> Result<Vec<Product>>;
    async fn list_by_category(&self, category: &str) -> Result<Vec<Product>>;
    async fn get(&self, id: &ProductId) -> Result<Option<Product>>;
    async fn create(&self, product: Product) -> Result<Product>;
    async fn update(&self, product: Product) -> Result<Product>;

    /// Returns `true` when a product was removed.
    async fn delete(&self, id: &ProductId) -> Result<bool>;
}
