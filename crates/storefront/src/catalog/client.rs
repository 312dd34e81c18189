//! Product API client implementation.
//!
//! Uses `reqwest` with a cookie store (requests carry credentials) and a
//! fixed per-request timeout. Product detail is cached using `moka`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use storefront_core::ProductId;
use tracing::{debug, instrument, warn};
use url::Url;

use super::{CatalogError, Product, ProductCatalog};
use crate::config::{CatalogConfig, parse_base_url};

/// Client for the remote product API.
///
/// Cheap to clone; clones share the HTTP connection pool and the cache.
#[derive(Clone)]
pub struct CatalogClient {
    inner: Arc<CatalogClientInner>,
}

struct CatalogClientInner {
    client: reqwest::Client,
    base_url: Url,
    timeout: Duration,
    products: Option<Cache<ProductId, Product>>,
}

impl CatalogClient {
    /// Create a new product API client.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::InvalidBaseUrl` if the base URL cannot be parsed
    /// and `CatalogError::Network` if the HTTP client fails to build.
    pub fn new(config: &CatalogConfig) -> Result<Self, CatalogError> {
        let base_url = parse_base_url(&config.base_url).map_err(CatalogError::InvalidBaseUrl)?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .cookie_store(true)
            .timeout(config.timeout)
            .build()
            .map_err(CatalogError::Network)?;

        let products = (!config.product_cache_ttl.is_zero()).then(|| {
            Cache::builder()
                .max_capacity(1000)
                .time_to_live(config.product_cache_ttl)
                .build()
        });

        Ok(Self {
            inner: Arc::new(CatalogClientInner {
                client,
                base_url,
                timeout: config.timeout,
                products,
            }),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, CatalogError> {
        let mut url = self.inner.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| CatalogError::InvalidBaseUrl(self.inner.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Issue a GET and return the body of a successful response.
    ///
    /// `Ok(None)` means the server answered 404.
    async fn get_text(&self, url: Url) -> Result<Option<String>, CatalogError> {
        let response = self
            .inner
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body = response.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %body.chars().take(500).collect::<String>(),
                "Product API returned non-success status"
            );
            return Err(CatalogError::Api {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }

        Ok(Some(body))
    }

    fn transport_error(&self, err: reqwest::Error) -> CatalogError {
        if err.is_timeout() {
            CatalogError::Timeout(self.inner.timeout)
        } else {
            CatalogError::Network(err)
        }
    }
}

#[async_trait]
impl ProductCatalog for CatalogClient {
    /// Get all products.
    ///
    /// A body that is not a JSON array yields an empty list.
    #[instrument(skip(self))]
    async fn list_products(&self) -> Result<Vec<Product>, CatalogError> {
        let url = self.endpoint(&["product", "get"])?;
        let Some(body) = self.get_text(url).await? else {
            return Err(CatalogError::Api {
                status: 404,
                message: "product list endpoint not found".to_string(),
            });
        };

        let value: serde_json::Value = serde_json::from_str(&body)?;
        if !value.is_array() {
            warn!("Product list response is not an array; showing no products");
            return Ok(Vec::new());
        }

        let products: Vec<Product> = serde_json::from_value(value)?;
        debug!(count = products.len(), "Fetched product list");
        Ok(products)
    }

    /// Get a product by id.
    #[instrument(skip(self), fields(product_id = %id))]
    async fn get_product(&self, id: &ProductId) -> Result<Product, CatalogError> {
        if let Some(cache) = &self.inner.products
            && let Some(product) = cache.get(id).await
        {
            debug!("Cache hit for product");
            return Ok(product);
        }

        let url = self.endpoint(&["product", "product", id.as_str()])?;
        let body = self
            .get_text(url)
            .await?
            .ok_or_else(|| CatalogError::NotFound(id.clone()))?;

        let value: serde_json::Value = serde_json::from_str(&body)?;
        if value.is_null() {
            return Err(CatalogError::NotFound(id.clone()));
        }
        let product: Product = serde_json::from_value(value)?;

        if let Some(cache) = &self.inner.products {
            cache.insert(id.clone(), product.clone()).await;
        }

        Ok(product)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::{Json, Router, extract::Path, http::StatusCode, routing::get};
    use serde_json::{Value, json};

    use super::*;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/api")
    }

    fn config(base_url: String, ttl: Duration) -> CatalogConfig {
        CatalogConfig {
            base_url,
            timeout: Duration::from_secs(5),
            product_cache_ttl: ttl,
        }
    }

    fn kurta() -> Value {
        json!({"_id": "k1", "name": "Kurta", "price": 999, "image": "k.jpg"})
    }

    #[tokio::test]
    async fn test_list_products_in_api_order() {
        let router = Router::new().route(
            "/api/product/get",
            get(|| async {
                Json(json!([
                    kurta(),
                    {"_id": "m1", "name": "Mug", "price": 249, "image": "m.jpg"}
                ]))
            }),
        );
        let client = CatalogClient::new(&config(serve(router).await, Duration::ZERO)).unwrap();

        let products = client.list_products().await.unwrap();
        let ids: Vec<_> = products.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["k1", "m1"]);
    }

    #[tokio::test]
    async fn test_list_products_non_array_is_empty() {
        let router = Router::new().route(
            "/api/product/get",
            get(|| async { Json(json!({"message": "maintenance"})) }),
        );
        let client = CatalogClient::new(&config(serve(router).await, Duration::ZERO)).unwrap();

        assert!(client.list_products().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_product_not_found() {
        let router = Router::new().route(
            "/api/product/product/{id}",
            get(|| async { StatusCode::NOT_FOUND }),
        );
        let client = CatalogClient::new(&config(serve(router).await, Duration::ZERO)).unwrap();

        let err = client.get_product(&ProductId::new("gone")).await.unwrap_err();
        assert!(matches!(err, CatalogError::NotFound(id) if id.as_str() == "gone"));
    }

    #[tokio::test]
    async fn test_get_product_server_error() {
        let router = Router::new().route(
            "/api/product/product/{id}",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "db down") }),
        );
        let client = CatalogClient::new(&config(serve(router).await, Duration::ZERO)).unwrap();

        let err = client.get_product(&ProductId::new("k1")).await.unwrap_err();
        assert!(matches!(err, CatalogError::Api { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_get_product_is_cached() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let router = Router::new().route(
            "/api/product/product/{id}",
            get(move |Path(id): Path<String>| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    assert_eq!(id, "k1");
                    Json(kurta())
                }
            }),
        );
        let client =
            CatalogClient::new(&config(serve(router).await, Duration::from_secs(60))).unwrap();
        let id = ProductId::new("k1");

        assert_eq!(client.get_product(&id).await.unwrap().name, "Kurta");
        assert_eq!(client.get_product(&id).await.unwrap().name, "Kurta");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_request_times_out() {
        let router = Router::new().route(
            "/api/product/get",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!([]))
            }),
        );
        let mut config = config(serve(router).await, Duration::ZERO);
        config.timeout = Duration::from_millis(100);
        let client = CatalogClient::new(&config).unwrap();

        let err = client.list_products().await.unwrap_err();
        assert!(matches!(err, CatalogError::Timeout(t) if t == Duration::from_millis(100)));
    }

    #[test]
    fn test_invalid_base_url() {
        let result = CatalogClient::new(&config("nope".to_string(), Duration::ZERO));
        assert!(matches!(result, Err(CatalogError::InvalidBaseUrl(_))));
    }
}
