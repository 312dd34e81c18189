//! Composition root.
//!
//! Wires the catalog client, session observer, cart engine, wishlist and
//! auth service together. Every collaborator is passed in; nothing is
//! reached through globals.

use std::sync::Arc;

use tracing::info;

use crate::cache::{FileCache, LocalCache};
use crate::cart::{CartEngine, CartEngineOptions};
use crate::catalog::{CatalogClient, CatalogError, ProductCatalog};
use crate::config::StorefrontConfig;
use crate::documents::DocumentStore;
use crate::error::StorefrontError;
use crate::identity::{IdentityProvider, SessionObserver};
use crate::services::auth::AuthService;
use crate::views::{CartView, ProductListActions, ProductListView, RouteGate};
use crate::wishlist::Wishlist;

/// The storefront client.
///
/// This struct is cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct Storefront {
    inner: Arc<StorefrontInner>,
}

struct StorefrontInner {
    config: StorefrontConfig,
    catalog: Arc<dyn ProductCatalog>,
    observer: SessionObserver,
    cart: CartEngine,
    wishlist: Wishlist,
    auth: AuthService,
}

impl Storefront {
    /// Create a client talking to the configured product API.
    ///
    /// # Errors
    ///
    /// Returns `StorefrontError::Catalog` if the HTTP client cannot be built.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn new(
        config: StorefrontConfig,
        provider: Arc<dyn IdentityProvider>,
        documents: Arc<dyn DocumentStore>,
        cache: Arc<dyn LocalCache>,
    ) -> Result<Self, StorefrontError> {
        let catalog = Arc::new(CatalogClient::new(&config.catalog)?);
        Ok(Self::with_catalog(config, catalog, provider, documents, cache))
    }

    /// Like [`Storefront::new`], caching the cart under `config.cache_dir`.
    ///
    /// # Errors
    ///
    /// Returns `StorefrontError::Cache` if the directory cannot be created,
    /// or `StorefrontError::Catalog` as for [`Storefront::new`].
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn open(
        config: StorefrontConfig,
        provider: Arc<dyn IdentityProvider>,
        documents: Arc<dyn DocumentStore>,
    ) -> Result<Self, StorefrontError> {
        let cache = Arc::new(FileCache::open(&config.cache_dir)?);
        Self::new(config, provider, documents, cache)
    }

    /// Create a client over an arbitrary catalog.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    #[must_use]
    pub fn with_catalog(
        config: StorefrontConfig,
        catalog: Arc<dyn ProductCatalog>,
        provider: Arc<dyn IdentityProvider>,
        documents: Arc<dyn DocumentStore>,
        cache: Arc<dyn LocalCache>,
    ) -> Self {
        let observer = SessionObserver::start(Arc::clone(&provider));

        let cart = CartEngine::new(
            Arc::clone(&catalog),
            Arc::clone(&documents),
            cache,
            CartEngineOptions {
                collection: config.collections.carts.clone(),
                auto_hydrate: config.auto_hydrate,
            },
        );
        cart.attach(observer.subscribe());

        let wishlist = Wishlist::new(Arc::clone(&documents), config.collections.wishlists.clone());
        wishlist.attach(observer.subscribe());

        let auth = AuthService::new(provider, documents, config.collections.profiles.clone());

        info!(
            auto_hydrate = config.auto_hydrate,
            carts = %config.collections.carts,
            "Storefront client started"
        );

        Self {
            inner: Arc::new(StorefrontInner {
                config,
                catalog,
                observer,
                cart,
                wishlist,
                auth,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn catalog(&self) -> &Arc<dyn ProductCatalog> {
        &self.inner.catalog
    }

    #[must_use]
    pub fn observer(&self) -> &SessionObserver {
        &self.inner.observer
    }

    #[must_use]
    pub fn cart(&self) -> &CartEngine {
        &self.inner.cart
    }

    #[must_use]
    pub fn wishlist(&self) -> &Wishlist {
        &self.inner.wishlist
    }

    #[must_use]
    pub fn auth(&self) -> &AuthService {
        &self.inner.auth
    }

    /// Fetch and build the product grid.
    ///
    /// # Errors
    ///
    /// Returns the catalog's error.
    pub async fn product_list(&self) -> Result<ProductListView, CatalogError> {
        ProductListView::load(self.inner.catalog.as_ref()).await
    }

    #[must_use]
    pub fn product_actions(&self) -> ProductListActions {
        ProductListActions::new(
            self.inner.cart.clone(),
            self.inner.wishlist.clone(),
            self.inner.observer.clone(),
        )
    }

    #[must_use]
    pub fn cart_view(&self) -> CartView {
        CartView::from_engine(&self.inner.cart)
    }

    /// Gate for protected screens.
    #[must_use]
    pub fn gate(&self) -> RouteGate {
        RouteGate::check(&self.inner.observer)
    }

    /// Stop all identity listeners. In-flight remote writes still finish.
    pub fn shutdown(&self) {
        self.inner.cart.detach();
        self.inner.wishlist.detach();
        self.inner.observer.shutdown();
        info!("Storefront client shut down");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::documents::MemoryDocumentStore;
    use crate::identity::{AuthStatus, MemoryIdentityProvider};

    #[tokio::test]
    async fn test_new_wires_default_config() {
        let storefront = Storefront::new(
            StorefrontConfig::default(),
            Arc::new(MemoryIdentityProvider::new()),
            Arc::new(MemoryDocumentStore::new()),
            Arc::new(MemoryCache::new()),
        )
        .unwrap();

        assert!(storefront.cart_view().is_empty());
        assert_eq!(storefront.config().collections.carts, "userCarts");
    }

    #[tokio::test]
    async fn test_invalid_base_url_is_reported() {
        let mut config = StorefrontConfig::default();
        config.catalog.base_url = "ftp://catalog".to_string();
        let result = Storefront::new(
            config,
            Arc::new(MemoryIdentityProvider::new()),
            Arc::new(MemoryDocumentStore::new()),
            Arc::new(MemoryCache::new()),
        );
        assert!(matches!(
            result,
            Err(StorefrontError::Catalog(CatalogError::InvalidBaseUrl(_)))
        ));
    }

    #[tokio::test]
    async fn test_open_creates_cache_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = StorefrontConfig::default();
        config.cache_dir = dir.path().join("cache");
        Storefront::open(
            config,
            Arc::new(MemoryIdentityProvider::new()),
            Arc::new(MemoryDocumentStore::new()),
        )
        .unwrap();
        assert!(dir.path().join("cache").is_dir());
    }

    #[tokio::test]
    async fn test_gate_resolves_after_first_emission() {
        let storefront = Storefront::new(
            StorefrontConfig::default(),
            Arc::new(MemoryIdentityProvider::new()),
            Arc::new(MemoryDocumentStore::new()),
            Arc::new(MemoryCache::new()),
        )
        .unwrap();

        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            while storefront.observer().status() == AuthStatus::Unknown {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        assert_eq!(storefront.gate(), RouteGate::RedirectToLogin);
        storefront.shutdown();
    }
}
