//! Remote cart document encoding and background write results.
//!
//! Remote writes are fire-and-forget: a failed write is logged and the
//! engine stays `Dirty`. Only a later mutation's write carries the change
//! again, so the remote copy can lag behind the local cart until then.

use chrono::Utc;
use serde_json::{Value, json};
use storefront_core::CartSnapshot;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::documents::StoreError;

/// Why a background cart write did not land.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("cart document write failed: {0}")]
    Store(#[from] StoreError),

    #[error("cart could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),

    /// The write task panicked or was cancelled.
    #[error("cart write task aborted: {0}")]
    Aborted(String),
}

/// Outcome of the remote write that followed a mutation.
#[derive(Debug)]
pub enum SyncResult {
    /// Nothing was written remotely: no identity, or the user signed out
    /// before the write ran.
    Skipped,
    /// The remote document now holds this mutation's cart, written either
    /// by this write or by a later one that included it.
    Synced,
    /// The write failed and will not be retried.
    Failed(SyncError),
}

impl SyncResult {
    #[must_use]
    pub const fn is_synced(&self) -> bool {
        matches!(self, Self::Synced)
    }
}

/// Handle to a mutation's background write.
///
/// Dropping it does not cancel the write.
#[derive(Debug)]
pub struct SyncHandle(Option<JoinHandle<SyncResult>>);

impl SyncHandle {
    pub(crate) const fn skipped() -> Self {
        Self(None)
    }

    pub(crate) const fn spawned(task: JoinHandle<SyncResult>) -> Self {
        Self(Some(task))
    }

    /// Whether a remote write was started.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.0.is_some()
    }

    /// Wait for the write to finish.
    pub async fn outcome(self) -> SyncResult {
        match self.0 {
            None => SyncResult::Skipped,
            Some(task) => task
                .await
                .unwrap_or_else(|e| SyncResult::Failed(SyncError::Aborted(e.to_string()))),
        }
    }
}

/// Result of a local mutation.
///
/// Mutations always succeed locally; `changed` is false when the call left
/// the cart as it was (removing an absent product, for example).
#[derive(Debug)]
#[must_use = "await `sync.outcome()` to observe the remote write, or ignore it explicitly"]
pub struct Mutation {
    pub changed: bool,
    pub sync: SyncHandle,
}

/// Build the `{cart, updatedAt}` document for a snapshot.
pub(crate) fn encode_cart_document(snapshot: &CartSnapshot) -> Result<Value, SyncError> {
    Ok(json!({
        "cart": serde_json::to_value(snapshot)?,
        "updatedAt": Utc::now().to_rfc3339(),
    }))
}

/// Extract a well-formed cart from a remote document.
///
/// `None` when the `cart` field is missing, not an array, or breaks the
/// one-line-per-product rule.
pub(crate) fn decode_cart_document(document: &Value) -> Option<CartSnapshot> {
    let cart = document.get("cart").filter(|cart| cart.is_array())?;
    serde_json::from_value(cart.clone())
        .inspect_err(|e| warn!(error = %e, "Ignoring malformed remote cart"))
        .ok()
}
