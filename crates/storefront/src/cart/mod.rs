//! Cart synchronization engine.
//!
//! Owns the shopper's [`CartSnapshot`] and keeps three copies of it in
//! step: the in-memory state, the local cache entry under
//! [`CART_CACHE_KEY`], and (while signed in) the `userCarts/{uid}` remote
//! document.
//!
//! # Sync states
//!
//! - `Guest` - no identity, the local cache is the only persistence
//! - `Syncing` - identity just appeared, remote fetch in flight
//! - `Synced` - local state matches the last remote read or write
//! - `Dirty` - a local mutation is not yet confirmed remotely
//!
//! On login the remote cart, if present and well-formed, replaces the
//! local one outright. If there is no usable remote cart the local one is
//! uploaded instead. Logout returns to `Guest` and keeps the local cart.
//!
//! # Concurrency
//!
//! Mutations apply locally under a short lock and return immediately; the
//! remote write runs on a spawned task. Remote writes go through a single
//! writer lock and always send the newest snapshot, so the remote document
//! never moves backwards. The login reconciliation holds the same lock, and
//! mutations made while `Syncing` are queued behind it: when the remote cart
//! replaces the local one they are replayed on top of it and written once.
//!
//! With auto-hydration enabled every snapshot change also spawns a
//! hydration. Hydrations are neither debounced nor cancelled, so two
//! overlapping ones may finish out of order and the older result can win
//! until the next change.

mod sync;

pub use sync::{Mutation, SyncError, SyncHandle, SyncResult};

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use futures::future::join_all;
use rust_decimal::Decimal;
use serde::Serialize;
use storefront_core::{CartLine, CartSnapshot, Price, ProductId, UserUid};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::cache::{CART_CACHE_KEY, LocalCache};
use crate::catalog::{Product, ProductCatalog};
use crate::documents::DocumentStore;
use crate::identity::{AuthState, IdentityEvents};
use sync::{decode_cart_document, encode_cart_document};

const EVENT_CAPACITY: usize = 64;

/// Where the cart stands relative to the remote copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum CartSyncState {
    #[default]
    Guest,
    Syncing,
    Synced,
    Dirty,
}

/// Change notification. Subscribers pull current state when they see one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartEvent {
    SnapshotChanged,
    SyncStateChanged(CartSyncState),
    Hydrated,
}

/// A cart line joined with live product detail. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HydratedCartItem {
    pub product: Product,
    pub quantity: u32,
}

impl HydratedCartItem {
    /// Unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.product.unit_price().times(self.quantity)
    }
}

/// Stream of cart change notifications.
#[derive(Debug)]
pub struct CartEvents {
    rx: broadcast::Receiver<CartEvent>,
}

impl CartEvents {
    /// Wait for the next notification. `None` once the engine is gone.
    ///
    /// A subscriber that falls behind skips the notifications it missed.
    pub async fn next(&mut self) -> Option<CartEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Cart subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Take a notification that is already queued, without waiting.
    pub fn try_next(&mut self) -> Option<CartEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => {}
                Err(_) => return None,
            }
        }
    }
}

/// Construction options for [`CartEngine`].
#[derive(Debug, Clone)]
pub struct CartEngineOptions {
    /// Remote collection holding one cart document per uid.
    pub collection: String,
    /// Re-hydrate after every snapshot change.
    pub auto_hydrate: bool,
}

impl Default for CartEngineOptions {
    fn default() -> Self {
        Self {
            collection: "userCarts".to_string(),
            auto_hydrate: false,
        }
    }
}

/// The cart synchronization engine.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct CartEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    catalog: Arc<dyn ProductCatalog>,
    documents: Arc<dyn DocumentStore>,
    cache: Arc<dyn LocalCache>,
    options: CartEngineOptions,
    state: Mutex<EngineState>,
    /// Held for every remote write and for the whole login reconciliation.
    writer: tokio::sync::Mutex<()>,
    events: broadcast::Sender<CartEvent>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

#[derive(Default)]
struct EngineState {
    snapshot: CartSnapshot,
    hydrated: Vec<HydratedCartItem>,
    sync: CartSyncState,
    uid: Option<UserUid>,
    /// Bumped by every signed-in change.
    write_seq: u64,
    /// Highest `write_seq` known to be in the remote document.
    landed_seq: u64,
    /// Changes made while `Syncing`, replayed onto a replacing remote cart.
    deferred: Vec<CartOp>,
}

/// A remote write captured under the state lock.
struct PendingWrite {
    uid: UserUid,
    seq: u64,
    snapshot: CartSnapshot,
}

/// A cart change, kept so it can be replayed after a login replace.
#[derive(Debug, Clone)]
enum CartOp {
    Add(ProductId, u32),
    SetQuantity(ProductId, i64),
    Remove(ProductId),
    Clear,
}

impl CartOp {
    /// Apply to the snapshot and hydrated list. Returns whether the
    /// snapshot changed.
    fn apply(&self, snapshot: &mut CartSnapshot, hydrated: &mut Vec<HydratedCartItem>) -> bool {
        match self {
            Self::Add(id, quantity) => snapshot.add(id, *quantity),
            Self::SetQuantity(id, quantity) => snapshot.set_quantity(id, *quantity),
            Self::Remove(id) => {
                hydrated.retain(|item| &item.product.id != id);
                snapshot.remove(id)
            }
            Self::Clear => {
                hydrated.clear();
                snapshot.clear()
            }
        }
    }
}

/// What the login reconciliation decided.
enum LoginOutcome {
    /// The remote cart replaced the local one and nothing is left to write.
    Replaced(CartSnapshot),
    /// The remote cart replaced the local one, then changes made while
    /// syncing were replayed on top; the result must be written.
    Replayed(CartSnapshot, usize),
    /// No usable remote cart; the local one must be uploaded.
    Upload(usize),
}

impl CartEngine {
    /// Create an engine seeded from the local cache.
    ///
    /// A missing or unreadable cache entry starts an empty cart.
    #[must_use]
    pub fn new(
        catalog: Arc<dyn ProductCatalog>,
        documents: Arc<dyn DocumentStore>,
        cache: Arc<dyn LocalCache>,
        options: CartEngineOptions,
    ) -> Self {
        let snapshot = load_cached_snapshot(cache.as_ref());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(EngineInner {
                catalog,
                documents,
                cache,
                options,
                state: Mutex::new(EngineState {
                    snapshot,
                    ..EngineState::default()
                }),
                writer: tokio::sync::Mutex::new(()),
                events,
                listener: Mutex::new(None),
            }),
        }
    }

    /// React to identity transitions from `events` until the stream ends.
    ///
    /// Replaces any previously attached listener.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn attach(&self, mut events: IdentityEvents) {
        let weak: Weak<EngineInner> = Arc::downgrade(&self.inner);
        let listener = tokio::spawn(async move {
            while let Some(state) = events.next().await {
                let Some(inner) = weak.upgrade() else { break };
                match state {
                    AuthState::SignedIn(identity) => inner.on_login(identity.uid).await,
                    AuthState::SignedOut => inner.on_logout(),
                    AuthState::Unknown => {}
                }
            }
            debug!("Cart identity listener stopped");
        });
        if let Some(previous) = lock(&self.inner.listener).replace(listener) {
            previous.abort();
        }
    }

    /// Stop reacting to identity transitions.
    pub fn detach(&self) {
        if let Some(listener) = lock(&self.inner.listener).take() {
            listener.abort();
        }
    }

    /// Add one unit of a product.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn add_one(&self, id: &ProductId) -> Mutation {
        self.add_to_cart(id, 1)
    }

    /// Add units of a product; an existing line accumulates.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    #[instrument(skip(self), fields(product_id = %id))]
    pub fn add_to_cart(&self, id: &ProductId, quantity: u32) -> Mutation {
        self.inner.mutate(CartOp::Add(id.clone(), quantity))
    }

    /// Drop a product's line from the cart and the hydrated list.
    ///
    /// Removing an absent product is a no-op.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    #[instrument(skip(self), fields(product_id = %id))]
    pub fn remove_from_cart(&self, id: &ProductId) -> Mutation {
        self.inner.mutate(CartOp::Remove(id.clone()))
    }

    /// Set a line's quantity exactly; zero or below removes the line.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    #[instrument(skip(self), fields(product_id = %id))]
    pub fn update_quantity(&self, id: &ProductId, quantity: i64) -> Mutation {
        if quantity <= 0 {
            return self.remove_from_cart(id);
        }
        self.inner.mutate(CartOp::SetQuantity(id.clone(), quantity))
    }

    /// Empty the cart and the hydrated list.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    #[instrument(skip(self))]
    pub fn clear_cart(&self) -> Mutation {
        self.inner.mutate(CartOp::Clear)
    }

    /// Join every line with live product detail.
    ///
    /// Products are fetched in parallel. Lines whose fetch fails are left
    /// out of the result and stay in the snapshot, so the next call retries
    /// them.
    pub async fn hydrate(&self) -> Vec<HydratedCartItem> {
        self.inner.hydrate().await
    }

    #[must_use]
    pub fn snapshot(&self) -> CartSnapshot {
        lock(&self.inner.state).snapshot.clone()
    }

    /// Result of the last hydration, minus lines removed since.
    #[must_use]
    pub fn hydrated(&self) -> Vec<HydratedCartItem> {
        lock(&self.inner.state).hydrated.clone()
    }

    #[must_use]
    pub fn sync_state(&self) -> CartSyncState {
        lock(&self.inner.state).sync
    }

    /// Uid whose remote cart the engine is tracking, if any.
    #[must_use]
    pub fn uid(&self) -> Option<UserUid> {
        lock(&self.inner.state).uid.clone()
    }

    /// Sum of line quantities.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        lock(&self.inner.state).snapshot.total_quantity()
    }

    /// Sum of hydrated line totals.
    #[must_use]
    pub fn subtotal(&self) -> Price {
        let state = lock(&self.inner.state);
        Price::store(
            state
                .hydrated
                .iter()
                .map(|item| item.line_total().amount)
                .sum::<Decimal>(),
        )
    }

    #[must_use]
    pub fn subscribe(&self) -> CartEvents {
        CartEvents {
            rx: self.inner.events.subscribe(),
        }
    }
}

impl EngineInner {
    /// Apply a local mutation, persist it, and start the remote write.
    fn mutate(self: &Arc<Self>, op: CartOp) -> Mutation {
        let (snapshot, uid, became_dirty) = {
            let mut guard = lock(&self.state);
            let state = &mut *guard;
            if !op.apply(&mut state.snapshot, &mut state.hydrated) {
                return Mutation {
                    changed: false,
                    sync: SyncHandle::skipped(),
                };
            }

            let mut became_dirty = false;
            if state.uid.is_some() {
                state.write_seq += 1;
                match state.sync {
                    CartSyncState::Syncing => state.deferred.push(op),
                    CartSyncState::Dirty => {}
                    CartSyncState::Guest | CartSyncState::Synced => {
                        state.sync = CartSyncState::Dirty;
                        became_dirty = true;
                    }
                }
            }
            (state.snapshot.clone(), state.uid.clone(), became_dirty)
        };

        self.persist_locally(&snapshot);
        self.publish(CartEvent::SnapshotChanged);
        if became_dirty {
            self.publish(CartEvent::SyncStateChanged(CartSyncState::Dirty));
        }
        self.spawn_auto_hydrate();

        let sync = uid.map_or_else(SyncHandle::skipped, |uid| {
            let inner = Arc::clone(self);
            SyncHandle::spawned(tokio::spawn(async move { inner.write_remote(uid).await }))
        });
        Mutation { changed: true, sync }
    }

    /// Wait for the writer lock, then bring the remote document up to date.
    async fn write_remote(&self, uid: UserUid) -> SyncResult {
        let _writer = self.writer.lock().await;
        self.write_latest(&uid).await
    }

    /// Write the newest snapshot to the uid's remote document unless it is
    /// already there. The caller holds the writer lock.
    ///
    /// A failure leaves the engine `Dirty`; the next queued write retries
    /// with whatever is newest by then.
    async fn write_latest(&self, uid: &UserUid) -> SyncResult {
        let write = {
            let state = lock(&self.state);
            if state.uid.as_ref() != Some(uid) {
                return SyncResult::Skipped;
            }
            if state.landed_seq >= state.write_seq {
                return SyncResult::Synced;
            }
            PendingWrite {
                uid: uid.clone(),
                seq: state.write_seq,
                snapshot: state.snapshot.clone(),
            }
        };

        let result = match encode_cart_document(&write.snapshot) {
            Ok(document) => self
                .documents
                .set_document(&self.options.collection, write.uid.as_str(), document, true)
                .await
                .map_err(SyncError::from),
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                let synced = {
                    let mut state = lock(&self.state);
                    let same_user = state.uid.as_ref() == Some(&write.uid);
                    if same_user {
                        state.landed_seq = state.landed_seq.max(write.seq);
                    }
                    let synced = same_user
                        && state.write_seq == write.seq
                        && state.sync != CartSyncState::Synced;
                    if synced {
                        state.sync = CartSyncState::Synced;
                    }
                    synced
                };
                if synced {
                    self.publish(CartEvent::SyncStateChanged(CartSyncState::Synced));
                }
                debug!(uid = %write.uid, seq = write.seq, "Cart written remotely");
                SyncResult::Synced
            }
            Err(e) => {
                warn!(uid = %write.uid, error = %e, "Failed to save cart remotely");
                SyncResult::Failed(e)
            }
        }
    }

    #[instrument(skip(self), fields(uid = %uid))]
    async fn on_login(self: &Arc<Self>, uid: UserUid) {
        let _writer = self.writer.lock().await;
        self.set_sync(Some(uid.clone()), CartSyncState::Syncing);

        let fetched = self
            .documents
            .get_document(&self.options.collection, uid.as_str())
            .await;

        let remote = match fetched {
            Ok(document) => document.as_ref().and_then(decode_cart_document),
            Err(e) => {
                warn!(error = %e, "Failed to load remote cart");
                let dirty = {
                    let mut state = lock(&self.state);
                    state.deferred.clear();
                    let dirty = state.uid.as_ref() == Some(&uid);
                    if dirty {
                        state.sync = CartSyncState::Dirty;
                    }
                    dirty
                };
                if dirty {
                    self.publish(CartEvent::SyncStateChanged(CartSyncState::Dirty));
                }
                return;
            }
        };

        let outcome = {
            let mut guard = lock(&self.state);
            let state = &mut *guard;
            if state.uid.as_ref() != Some(&uid) {
                debug!("Identity changed during cart fetch, discarding result");
                return;
            }

            let deferred = std::mem::take(&mut state.deferred);
            match remote {
                Some(remote) => {
                    state.snapshot = remote;
                    let replayed = deferred
                        .iter()
                        .filter(|op| op.apply(&mut state.snapshot, &mut state.hydrated))
                        .count();
                    if replayed == 0 {
                        state.landed_seq = state.write_seq;
                        state.sync = CartSyncState::Synced;
                        LoginOutcome::Replaced(state.snapshot.clone())
                    } else {
                        state.write_seq += 1;
                        state.sync = CartSyncState::Dirty;
                        LoginOutcome::Replayed(state.snapshot.clone(), replayed)
                    }
                }
                None => {
                    state.write_seq += 1;
                    state.sync = CartSyncState::Dirty;
                    LoginOutcome::Upload(state.snapshot.len())
                }
            }
        };

        match outcome {
            LoginOutcome::Replaced(snapshot) => {
                info!(lines = snapshot.len(), "Replaced local cart with remote cart");
                self.persist_locally(&snapshot);
                self.publish(CartEvent::SnapshotChanged);
                self.publish(CartEvent::SyncStateChanged(CartSyncState::Synced));
                self.spawn_auto_hydrate();
            }
            LoginOutcome::Replayed(snapshot, replayed) => {
                info!(
                    lines = snapshot.len(),
                    replayed,
                    "Replaced local cart with remote cart, reapplied changes made while syncing"
                );
                self.persist_locally(&snapshot);
                self.publish(CartEvent::SnapshotChanged);
                self.publish(CartEvent::SyncStateChanged(CartSyncState::Dirty));
                self.spawn_auto_hydrate();
                let _ = self.write_latest(&uid).await;
            }
            LoginOutcome::Upload(lines) => {
                info!(lines, "No remote cart, uploading local cart");
                self.publish(CartEvent::SyncStateChanged(CartSyncState::Dirty));
                let _ = self.write_latest(&uid).await;
            }
        }
    }

    fn on_logout(&self) {
        info!("Signed out, cart is local only");
        self.set_sync(None, CartSyncState::Guest);
    }

    fn set_sync(&self, uid: Option<UserUid>, sync: CartSyncState) {
        let changed = {
            let mut state = lock(&self.state);
            state.uid = uid;
            state.deferred.clear();
            let changed = state.sync != sync;
            state.sync = sync;
            changed
        };
        if changed {
            self.publish(CartEvent::SyncStateChanged(sync));
        }
    }

    async fn hydrate(&self) -> Vec<HydratedCartItem> {
        let lines: Vec<CartLine> = lock(&self.state).snapshot.lines().to_vec();

        let fetched = join_all(lines.into_iter().map(|line| async move {
            let result = self.catalog.get_product(&line.id).await;
            (line, result)
        }))
        .await;

        let items: Vec<HydratedCartItem> = fetched
            .into_iter()
            .filter_map(|(line, result)| match result {
                Ok(product) => Some(HydratedCartItem {
                    product,
                    quantity: line.quantity,
                }),
                Err(e) => {
                    warn!(
                        product_id = %line.id,
                        error = %e,
                        "Dropping cart line from hydrated view"
                    );
                    None
                }
            })
            .collect();

        lock(&self.state).hydrated.clone_from(&items);
        self.publish(CartEvent::Hydrated);
        items
    }

    fn spawn_auto_hydrate(self: &Arc<Self>) {
        if self.options.auto_hydrate {
            let inner = Arc::clone(self);
            tokio::spawn(async move {
                inner.hydrate().await;
            });
        }
    }

    fn persist_locally(&self, snapshot: &CartSnapshot) {
        let result = serde_json::to_string(snapshot)
            .map_err(|e| e.to_string())
            .and_then(|json| {
                self.cache
                    .set(CART_CACHE_KEY, &json)
                    .map_err(|e| e.to_string())
            });
        if let Err(e) = result {
            warn!(error = %e, "Failed to write cart to local cache");
        }
    }

    fn publish(&self, event: CartEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

impl Drop for EngineInner {
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

fn load_cached_snapshot(cache: &dyn LocalCache) -> CartSnapshot {
    match cache.get(CART_CACHE_KEY) {
        Ok(Some(json)) => serde_json::from_str(&json).unwrap_or_else(|e| {
            warn!(error = %e, "Discarding unreadable cached cart");
            CartSnapshot::new()
        }),
        Ok(None) => CartSnapshot::new(),
        Err(e) => {
            warn!(error = %e, "Failed to read cached cart");
            CartSnapshot::new()
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
