//! Remote product catalog.
//!
//! # Architecture
//!
//! - Thin `reqwest` wrapper over the product REST API
//! - The API is the source of truth - no local sync, direct calls
//! - Product detail is cached in memory via `moka` (configurable TTL)
//! - Every call is bounded by the configured timeout, no retries
//!
//! # Endpoints
//!
//! - `GET {base}/product/get` - all products
//! - `GET {base}/product/product/{id}` - one product
//!
//! The [`ProductCatalog`] trait is the seam consumed by the cart engine and
//! the views. [`StaticCatalog`] serves a fixed product set from memory.

mod client;
mod memory;
pub mod types;

pub use client::CatalogClient;
pub use memory::StaticCatalog;
pub use types::*;

use std::time::Duration;

use async_trait::async_trait;
use storefront_core::ProductId;
use thiserror::Error;

/// Errors that can occur when calling the product API.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Transport-level failure (DNS, connection reset, TLS).
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    /// The request did not complete within the configured bound.
    #[error("Request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// Product does not exist.
    #[error("Not found: {0}")]
    NotFound(ProductId),

    /// API returned a non-success status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Response body was not the expected JSON.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The configured base URL cannot be used.
    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(String),
}

impl CatalogError {
    /// Whether the failure came from the network rather than the data.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout(_))
    }
}

/// Read access to product data.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Fetch the full product list in API order.
    async fn list_products(&self) -> Result<Vec<Product>, CatalogError>;

    /// Fetch one product's detail.
    async fn get_product(&self, id: &ProductId) -> Result<Product, CatalogError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_error_display() {
        let err = CatalogError::NotFound(ProductId::new("p-404"));
        assert_eq!(err.to_string(), "Not found: p-404");

        let err = CatalogError::Timeout(Duration::from_secs(60));
        assert_eq!(err.to_string(), "Request timed out after 60s");
        assert!(err.is_transient());
    }

    #[test]
    fn test_api_error_is_not_transient() {
        let err = CatalogError::Api {
            status: 500,
            message: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "API error: 500 - boom");
        assert!(!err.is_transient());
    }
}
