//! Per-user JSON document storage.
//!
//! The managed document store is an external collaborator; this module
//! defines the interface the cart engine, wishlist and auth service consume
//! and ships an in-memory implementation for tests and offline sessions.
//!
//! # Collections
//!
//! Documents are addressed by `(collection, key)`; the key is always the
//! user's uid. Collection names come from [`CollectionConfig`](crate::config::CollectionConfig).

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Errors from the document store.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The store could not be reached.
    #[error("document store unavailable: {0}")]
    Unavailable(String),

    /// The store refused the operation (permissions, quota).
    #[error("document store rejected {collection}/{key}: {reason}")]
    Rejected {
        collection: String,
        key: String,
        reason: String,
    },
}

/// Arbitrary JSON blob storage keyed by collection and document key.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read a document; `Ok(None)` if it does not exist.
    async fn get_document(&self, collection: &str, key: &str) -> Result<Option<Value>, StoreError>;

    /// Write a document.
    ///
    /// With `merge = true` the top-level fields of `blob` are merged into
    /// the existing document; otherwise the document is replaced.
    async fn set_document(
        &self,
        collection: &str,
        key: &str,
        blob: Value,
        merge: bool,
    ) -> Result<(), StoreError>;
}

/// In-memory document store.
///
/// Can be switched offline to exercise failure paths.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    documents: Mutex<HashMap<(String, String), Value>>,
    offline: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryDocumentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// When offline, every read and write fails with `StoreError::Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of successful writes so far.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Current content of a document, bypassing the offline switch.
    #[must_use]
    pub fn peek(&self, collection: &str, key: &str) -> Option<Value> {
        self.lock()
            .get(&(collection.to_string(), key.to_string()))
            .cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<(String, String), Value>> {
        self.documents
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store is offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get_document(&self, collection: &str, key: &str) -> Result<Option<Value>, StoreError> {
        self.check_online()?;
        Ok(self.peek(collection, key))
    }

    async fn set_document(
        &self,
        collection: &str,
        key: &str,
        blob: Value,
        merge: bool,
    ) -> Result<(), StoreError> {
        self.check_online()?;

        let mut documents = self.lock();
        let slot = documents
            .entry((collection.to_string(), key.to_string()))
            .or_insert(Value::Null);
        merge_into(slot, blob, merge);
        drop(documents);

        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Apply a write to an existing document value.
fn merge_into(existing: &mut Value, blob: Value, merge: bool) {
    match (existing, blob) {
        (Value::Object(current), Value::Object(fields)) if merge => {
            current.extend(fields);
        }
        (slot, blob) => *slot = blob,
    }
}
