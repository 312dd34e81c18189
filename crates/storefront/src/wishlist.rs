//! Wishlist: an ordered set of product ids per signed-in user.
//!
//! Unlike the cart, the wishlist lives only in the `wishlist/{uid}` remote
//! document. Nothing is cached locally, guests have no wishlist, and every
//! change is written before it is applied so the caller sees failures.
//! Changes run one at a time, each starting from the set the previous one
//! left behind.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde_json::{Value, json};
use storefront_core::{ProductId, UserUid};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::documents::{DocumentStore, StoreError};
use crate::identity::{AuthState, IdentityEvents};

/// Errors from wishlist changes.
#[derive(Debug, Clone, Error)]
pub enum WishlistError {
    /// Guests cannot keep a wishlist.
    #[error("wishlist requires a signed-in user")]
    NotAuthenticated,

    #[error("wishlist write failed: {0}")]
    Sync(#[from] StoreError),
}

/// What `add` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WishlistAdd {
    Added,
    AlreadyPresent,
}

/// The signed-in user's wishlist.
#[derive(Clone)]
pub struct Wishlist {
    inner: Arc<WishlistInner>,
}

struct WishlistInner {
    documents: Arc<dyn DocumentStore>,
    collection: String,
    state: Mutex<WishlistState>,
    /// Held from reading the current set until its write is applied.
    changes: tokio::sync::Mutex<()>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

#[derive(Default)]
struct WishlistState {
    uid: Option<UserUid>,
    items: Vec<ProductId>,
}

impl Wishlist {
    #[must_use]
    pub fn new(documents: Arc<dyn DocumentStore>, collection: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(WishlistInner {
                documents,
                collection: collection.into(),
                state: Mutex::new(WishlistState::default()),
                changes: tokio::sync::Mutex::new(()),
                listener: Mutex::new(None),
            }),
        }
    }

    /// Reload on every login, clear on logout.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn attach(&self, mut events: IdentityEvents) {
        let weak: Weak<WishlistInner> = Arc::downgrade(&self.inner);
        let listener = tokio::spawn(async move {
            while let Some(state) = events.next().await {
                let Some(inner) = weak.upgrade() else { break };
                match state {
                    AuthState::SignedIn(identity) => inner.load(identity.uid).await,
                    AuthState::SignedOut => inner.reset(None, Vec::new()),
                    AuthState::Unknown => {}
                }
            }
            debug!("Wishlist identity listener stopped");
        });
        if let Some(previous) = lock(&self.inner.listener).replace(listener) {
            previous.abort();
        }
    }

    pub fn detach(&self) {
        if let Some(listener) = lock(&self.inner.listener).take() {
            listener.abort();
        }
    }

    /// Add a product.
    ///
    /// # Errors
    ///
    /// Returns `WishlistError::NotAuthenticated` for guests and
    /// `WishlistError::Sync` if the remote write fails; the local set is
    /// unchanged on error.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn add(&self, id: &ProductId) -> Result<WishlistAdd, WishlistError> {
        let _change = self.inner.changes.lock().await;
        let (uid, mut items) = self.inner.current()?;
        if items.contains(id) {
            return Ok(WishlistAdd::AlreadyPresent);
        }
        items.push(id.clone());
        self.inner.write(&uid, items).await?;
        Ok(WishlistAdd::Added)
    }

    /// Remove a product. Returns whether it was present.
    ///
    /// # Errors
    ///
    /// Same as [`Wishlist::add`].
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn remove(&self, id: &ProductId) -> Result<bool, WishlistError> {
        let _change = self.inner.changes.lock().await;
        let (uid, mut items) = self.inner.current()?;
        let before = items.len();
        items.retain(|item| item != id);
        if items.len() == before {
            return Ok(false);
        }
        self.inner.write(&uid, items).await?;
        Ok(true)
    }

    /// Whether a signed-in user's wishlist has been loaded.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        lock(&self.inner.state).uid.is_some()
    }

    #[must_use]
    pub fn contains(&self, id: &ProductId) -> bool {
        lock(&self.inner.state).items.contains(id)
    }

    #[must_use]
    pub fn items(&self) -> Vec<ProductId> {
        lock(&self.inner.state).items.clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.inner.state).items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl WishlistInner {
    fn current(&self) -> Result<(UserUid, Vec<ProductId>), WishlistError> {
        let state = lock(&self.state);
        let uid = state.uid.clone().ok_or(WishlistError::NotAuthenticated)?;
        Ok((uid, state.items.clone()))
    }

    async fn write(&self, uid: &UserUid, items: Vec<ProductId>) -> Result<(), WishlistError> {
        self.documents
            .set_document(&self.collection, uid.as_str(), json!({ "items": &items }), true)
            .await
            .inspect_err(|e| warn!(uid = %uid, error = %e, "Failed to save wishlist"))?;

        let mut state = lock(&self.state);
        if state.uid.as_ref() == Some(uid) {
            state.items = items;
        }
        Ok(())
    }

    /// Fetch the uid's wishlist. Changes are refused until it arrives.
    async fn load(&self, uid: UserUid) {
        self.reset(None, Vec::new());
        let items = match self.documents.get_document(&self.collection, uid.as_str()).await {
            Ok(Some(document)) => decode_items(&document),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(uid = %uid, error = %e, "Failed to load wishlist, starting empty");
                Vec::new()
            }
        };
        info!(uid = %uid, items = items.len(), "Wishlist loaded");
        self.reset(Some(uid), items);
    }

    fn reset(&self, uid: Option<UserUid>, items: Vec<ProductId>) {
        *lock(&self.state) = WishlistState { uid, items };
    }
}

impl Drop for WishlistInner {
    fn drop(&mut self) {
        if let Some(listener) = self
            .listener
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            listener.abort();
        }
    }
}

/// Read `items`, skipping entries that are not strings and repeats.
fn decode_items(document: &Value) -> Vec<ProductId> {
    let mut items: Vec<ProductId> = Vec::new();
    for id in document
        .get("items")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
    {
        let id = ProductId::new(id);
        if !items.contains(&id) {
            items.push(id);
        }
    }
    items
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
