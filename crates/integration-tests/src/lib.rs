//! Shared fixtures for the storefront client integration tests.
//!
//! # Fixtures
//!
//! - [`FakeCatalog`] - local axum server speaking the product API
//! - [`TestStorefront`] - a [`Storefront`] over in-memory backends, with
//!   handles to those backends for assertions
//! - [`SlowDocumentStore`] - document store wrapper that delays reads and
//!   writes so background sync work interleaves

use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use secrecy::SecretString;
use serde_json::{Value, json};
use storefront_client::Storefront;
use storefront_client::cache::MemoryCache;
use storefront_client::cart::{CartEngine, CartSyncState};
use storefront_client::config::StorefrontConfig;
use storefront_client::documents::{DocumentStore, MemoryDocumentStore, StoreError};
use storefront_client::identity::{
    AuthStatus, IdentityProvider, MemoryIdentityProvider, UserIdentity,
};
use storefront_core::Email;

/// How long a test waits for background state to settle.
pub const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct CatalogState {
    products: Vec<Value>,
    broken: Mutex<HashSet<String>>,
    detail_hits: AtomicUsize,
}

/// Local product API.
///
/// Serves `GET /api/product/get` and `GET /api/product/product/{id}`.
/// Ids marked broken answer 500.
pub struct FakeCatalog {
    base_url: String,
    state: Arc<CatalogState>,
}

impl FakeCatalog {
    /// Start serving `products` on an ephemeral port.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound.
    pub async fn start(products: Vec<Value>) -> Self {
        let state = Arc::new(CatalogState {
            products,
            ..CatalogState::default()
        });
        let router = Router::new()
            .route("/api/product/get", get(list_products))
            .route("/api/product/product/{id}", get(get_product))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap_or_else(|e| panic!("bind fake catalog: {e}"));
        let addr = listener
            .local_addr()
            .unwrap_or_else(|e| panic!("fake catalog address: {e}"));
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        Self {
            base_url: format!("http://{addr}/api"),
            state,
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Make detail requests for `id` fail with HTTP 500.
    pub fn break_product(&self, id: &str) {
        self.state
            .broken
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_string());
    }

    /// Detail requests served so far.
    #[must_use]
    pub fn detail_hits(&self) -> usize {
        self.state.detail_hits.load(Ordering::SeqCst)
    }
}

async fn list_products(State(state): State<Arc<CatalogState>>) -> Json<Value> {
    Json(Value::Array(state.products.clone()))
}

async fn get_product(State(state): State<Arc<CatalogState>>, Path(id): Path<String>) -> Response {
    state.detail_hits.fetch_add(1, Ordering::SeqCst);
    let broken = state
        .broken
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .contains(&id);
    if broken {
        return (StatusCode::INTERNAL_SERVER_ERROR, "upstream failure").into_response();
    }
    state
        .products
        .iter()
        .find(|product| product["_id"] == id.as_str())
        .map_or_else(
            || StatusCode::NOT_FOUND.into_response(),
            |product| Json(product.clone()).into_response(),
        )
}

/// A product payload as the API returns it.
#[must_use]
pub fn product_json(id: &str, name: &str, price: u32) -> Value {
    json!({
        "_id": id,
        "name": name,
        "price": price,
        "image": format!("https://cdn.example/{id}.jpg"),
        "__v": 0
    })
}

/// Client wired to a fake catalog and in-memory backends.
pub struct TestStorefront {
    pub storefront: Storefront,
    pub provider: Arc<MemoryIdentityProvider>,
    pub documents: Arc<MemoryDocumentStore>,
    pub cache: Arc<MemoryCache>,
}

impl TestStorefront {
    /// Build a client against `catalog` with auto-hydration off and the
    /// product cache disabled.
    ///
    /// # Panics
    ///
    /// Panics if the client cannot be built.
    #[must_use]
    pub fn new(catalog: &FakeCatalog) -> Self {
        Self::with_backends(
            catalog,
            Arc::new(MemoryIdentityProvider::new()),
            Arc::new(MemoryDocumentStore::new()),
            Arc::new(MemoryCache::new()),
        )
    }

    /// Build a client whose document store answers through a
    /// [`SlowDocumentStore`]. `documents` still sees every write.
    ///
    /// # Panics
    ///
    /// Panics if the client cannot be built.
    #[must_use]
    pub fn with_slow_store(catalog: &FakeCatalog) -> (Self, Arc<SlowDocumentStore>) {
        let documents = Arc::new(MemoryDocumentStore::new());
        let slow = Arc::new(SlowDocumentStore::new(Arc::clone(&documents)));
        let t = Self::build(
            catalog,
            Arc::new(MemoryIdentityProvider::new()),
            slow.clone(),
            documents,
            Arc::new(MemoryCache::new()),
        );
        (t, slow)
    }

    /// Build a client over existing backends, as after an app restart.
    ///
    /// # Panics
    ///
    /// Panics if the client cannot be built.
    #[must_use]
    pub fn with_backends(
        catalog: &FakeCatalog,
        provider: Arc<MemoryIdentityProvider>,
        documents: Arc<MemoryDocumentStore>,
        cache: Arc<MemoryCache>,
    ) -> Self {
        Self::build(catalog, provider, documents.clone(), documents, cache)
    }

    fn build(
        catalog: &FakeCatalog,
        provider: Arc<MemoryIdentityProvider>,
        store: Arc<dyn DocumentStore>,
        documents: Arc<MemoryDocumentStore>,
        cache: Arc<MemoryCache>,
    ) -> Self {
        let mut config = StorefrontConfig::default();
        config.catalog.base_url = catalog.base_url().to_string();
        config.catalog.timeout = Duration::from_secs(5);
        config.catalog.product_cache_ttl = Duration::ZERO;
        config.auto_hydrate = false;

        let storefront = Storefront::new(config, provider.clone(), store, cache.clone())
            .unwrap_or_else(|e| panic!("build storefront: {e}"));

        Self {
            storefront,
            provider,
            documents,
            cache,
        }
    }

    #[must_use]
    pub fn cart(&self) -> &CartEngine {
        self.storefront.cart()
    }

    /// Create an account directly with the provider.
    ///
    /// # Panics
    ///
    /// Panics if sign-up fails.
    pub async fn sign_up(&self, email: &str, password: &str) -> UserIdentity {
        self.provider
            .sign_up(&parse_email(email), &SecretString::from(password))
            .await
            .unwrap_or_else(|e| panic!("sign up {email}: {e}"))
    }

    /// Wait until the first session emission has been observed.
    pub async fn wait_for_auth_check(&self) {
        let observer = self.storefront.observer();
        eventually(|| observer.status() != AuthStatus::Unknown).await;
    }

    /// Wait until the cart reaches `state`.
    pub async fn wait_for_sync(&self, state: CartSyncState) {
        let cart = self.cart();
        eventually(|| cart.sync_state() == state).await;
    }
}

/// Document store that stalls before answering.
///
/// Reads wait for the configured read delay. A one-shot write delay applies
/// to the next write only, so a later write can overtake it.
pub struct SlowDocumentStore {
    inner: Arc<MemoryDocumentStore>,
    read_delay: Mutex<Duration>,
    next_write_delay: Mutex<Option<Duration>>,
}

impl SlowDocumentStore {
    #[must_use]
    pub fn new(inner: Arc<MemoryDocumentStore>) -> Self {
        Self {
            inner,
            read_delay: Mutex::new(Duration::ZERO),
            next_write_delay: Mutex::new(None),
        }
    }

    /// Delay every read by `delay`.
    pub fn delay_reads(&self, delay: Duration) {
        *self.read_delay.lock().unwrap_or_else(PoisonError::into_inner) = delay;
    }

    /// Delay only the next write by `delay`.
    pub fn delay_next_write(&self, delay: Duration) {
        *self
            .next_write_delay
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(delay);
    }
}

#[async_trait]
impl DocumentStore for SlowDocumentStore {
    async fn get_document(&self, collection: &str, key: &str) -> Result<Option<Value>, StoreError> {
        let delay = *self.read_delay.lock().unwrap_or_else(PoisonError::into_inner);
        tokio::time::sleep(delay).await;
        self.inner.get_document(collection, key).await
    }

    async fn set_document(
        &self,
        collection: &str,
        key: &str,
        blob: Value,
        merge: bool,
    ) -> Result<(), StoreError> {
        let delay = self
            .next_write_delay
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.inner.set_document(collection, key, blob, merge).await
    }
}

/// Parse a test email.
///
/// # Panics
///
/// Panics on a malformed address.
#[must_use]
pub fn parse_email(email: &str) -> Email {
    Email::parse(email).unwrap_or_else(|e| panic!("email {email}: {e}"))
}

/// Poll `ready` until it holds.
///
/// # Panics
///
/// Panics if it does not hold within [`SETTLE_TIMEOUT`].
pub async fn eventually(mut ready: impl FnMut() -> bool) {
    within(async {
        while !ready() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
}

/// Run `future` under [`SETTLE_TIMEOUT`].
///
/// # Panics
///
/// Panics on timeout.
pub async fn within<F: Future>(future: F) -> F::Output {
    tokio::time::timeout(SETTLE_TIMEOUT, future)
        .await
        .unwrap_or_else(|_| panic!("timed out after {SETTLE_TIMEOUT:?}"))
}
