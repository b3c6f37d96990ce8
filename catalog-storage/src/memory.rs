use async_trait::async_trait;
use catalog_core::{CoreError, Product, ProductId, ProductStore, Result};
use dashmap::DashMap;

/// Process-local product store.
///
/// Listings are ordered by creation time, then name, so repeated reads of an
/// unchanged catalog are identical.
#[derive(Debug, Default)]
pub struct InMemoryProductStore {
    products: DashMap<ProductId, Product>,
}

impl InMemoryProductStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store, replacing any product with the same id.
    pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let store = Self::new();
        for product in products {
            store.products.insert(product.id, product);
        }
        store
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    fn sorted(mut products: Vec<Product>) -> Vec<Product> {
        products.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.name.cmp(&b.name))
        });
        products
    }
}

#[async_trait]
impl ProductStore for InMemoryProductStore {
    async fn list(&self) -> Result<Vec<Product>> {
        let products = self.products.iter().map(|entry| entry.value().clone()).collect();
        Ok(Self::sorted(products))
    }

    async fn list_by_category(&self, category: &str) -> Result<Vec<Product>> {
        let products = self
            .products
            .iter()
            .filter(|entry| entry.value().category == category)
            .map(|entry| entry.value().clone())
            .collect();
        Ok(Self::sorted(products))
    }

    async fn get(&self, id: &ProductId) -> Result<Option<Product>> {
        Ok(self.products.get(id).map(|entry| entry.value().clone()))
    }

    async fn create(&self, product: Product) -> Result<Product> {
        use dashmap::mapref::entry::Entry;

        match self.products.entry(product.id) {
            Entry::Occupied(_) => Err(CoreError::AlreadyExists(format!(
                "product {}",
                product.id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(product.clone());
                Ok(product)
            }
        }
    }

    async fn update(&self, product: Product) -> Result<Product> {
        match self.products.get_mut(&product.id) {
            Some(mut existing) => {
                *existing = product.clone();
                Ok(product)
            }
            None => Err(CoreError::NotFound(format!("product {}", product.id))),
        }
    }

    async fn delete(&self, id: &ProductId) -> Result<bool> {
        Ok(self.products.remove(id).is_some())
    }
}
