//! Fixed in-memory catalog for tests and offline sessions.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use storefront_core::ProductId;

use super::{CatalogError, Product, ProductCatalog};

/// Serves a fixed list of products. Unknown ids fail with `NotFound`.
#[derive(Debug, Default)]
pub struct StaticCatalog {
    products: Vec<Product>,
    detail_requests: AtomicUsize,
}

impl StaticCatalog {
    #[must_use]
    pub fn new(products: Vec<Product>) -> Self {
        Self {
            products,
            detail_requests: AtomicUsize::new(0),
        }
    }

    /// Number of `get_product` calls served so far.
    #[must_use]
    pub fn detail_requests(&self) -> usize {
        self.detail_requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProductCatalog for StaticCatalog {
    async fn list_products(&self) -> Result<Vec<Product>, CatalogError> {
        Ok(self.products.clone())
    }

    async fn get_product(&self, id: &ProductId) -> Result<Product, CatalogError> {
        self.detail_requests.fetch_add(1, Ordering::SeqCst);
        self.products
            .iter()
            .find(|product| &product.id == id)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(id.clone()))
    }
}
