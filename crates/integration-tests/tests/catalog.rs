//! Product API client against a local server, and the file-backed cart cache.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use storefront_client::Storefront;
use storefront_client::catalog::{CatalogClient, CatalogError, ProductCatalog};
use storefront_client::config::{CatalogConfig, StorefrontConfig};
use storefront_client::documents::MemoryDocumentStore;
use storefront_client::identity::MemoryIdentityProvider;
use storefront_core::ProductId;
use storefront_integration_tests::{FakeCatalog, product_json};

fn catalog_config(catalog: &FakeCatalog, ttl: Duration) -> CatalogConfig {
    CatalogConfig {
        base_url: catalog.base_url().to_string(),
        timeout: Duration::from_secs(5),
        product_cache_ttl: ttl,
    }
}

#[tokio::test]
async fn test_failed_detail_is_not_cached() {
    let catalog = FakeCatalog::start(vec![product_json("kurta", "Cotton Kurta", 1299)]).await;
    let client = CatalogClient::new(&catalog_config(&catalog, Duration::from_secs(60))).unwrap();
    let missing = ProductId::new("missing");

    assert!(matches!(
        client.get_product(&missing).await,
        Err(CatalogError::NotFound(_))
    ));
    assert!(client.get_product(&missing).await.is_err());
    assert_eq!(catalog.detail_hits(), 2);

    let kurta = client.get_product(&ProductId::new("kurta")).await.unwrap();
    assert_eq!(kurta.price, Decimal::new(1299, 0));
    client.get_product(&ProductId::new("kurta")).await.unwrap();
    assert_eq!(catalog.detail_hits(), 3);
}

#[tokio::test]
async fn test_server_error_surfaces_status() {
    let catalog = FakeCatalog::start(vec![product_json("mug", "Clay Mug", 249)]).await;
    catalog.break_product("mug");
    let client = CatalogClient::new(&catalog_config(&catalog, Duration::ZERO)).unwrap();

    let err = client.get_product(&ProductId::new("mug")).await.unwrap_err();
    assert!(matches!(err, CatalogError::Api { status: 500, .. }));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_file_cache_keeps_cart_between_sessions() {
    let catalog = FakeCatalog::start(Vec::new()).await;
    let dir = tempfile::tempdir().unwrap();
    let mut config = StorefrontConfig::default();
    config.catalog = catalog_config(&catalog, Duration::ZERO);
    config.cache_dir = dir.path().to_path_buf();
    config.auto_hydrate = false;

    let open = |config: StorefrontConfig| {
        Storefront::open(
            config,
            Arc::new(MemoryIdentityProvider::new()),
            Arc::new(MemoryDocumentStore::new()),
        )
        .unwrap()
    };

    let first = open(config.clone());
    let _ = first.cart().add_to_cart(&ProductId::new("kurta"), 2);
    first.shutdown();

    let second = open(config);
    assert_eq!(
        second.cart().snapshot().quantity_of(&ProductId::new("kurta")),
        Some(2)
    );
    assert!(dir.path().join("storedCart.json").is_file());
}
