//! Unified error type for the storefront client.
//!
//! Each concern has its own error enum; `StorefrontError` collects them for
//! callers that drive several concerns at once, such as start-up.

use thiserror::Error;

use crate::cache::CacheError;
use crate::catalog::CatalogError;
use crate::config::ConfigError;
use crate::documents::StoreError;
use crate::services::auth::AuthError;
use crate::wishlist::WishlistError;

/// Client-level error type.
#[derive(Debug, Error)]
pub enum StorefrontError {
    /// Configuration could not be loaded.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Product API call failed.
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Document store operation failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Local cache could not be opened or written.
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Wishlist change failed.
    #[error("Wishlist error: {0}")]
    Wishlist(#[from] WishlistError),
}

impl StorefrontError {
    /// Message suitable for showing to the shopper.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Auth(e) => e.user_message(),
            Self::Wishlist(WishlistError::NotAuthenticated) => {
                AuthError::NotSignedIn.user_message()
            }
            Self::Catalog(_) => "Failed to fetch products.".to_string(),
            Self::Config(_) | Self::Store(_) | Self::Cache(_) | Self::Wishlist(_) => {
                "Something went wrong. Please try again".to_string()
            }
        }
    }
}
