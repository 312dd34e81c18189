//! Product list screen.

use serde::Serialize;
use storefront_core::ProductId;
use tracing::{instrument, warn};

use super::{Notice, Route, trim_content};
use crate::cart::CartEngine;
use crate::catalog::{CatalogError, Product, ProductCatalog};
use crate::identity::SessionObserver;
use crate::wishlist::{Wishlist, WishlistAdd, WishlistError};

/// Words kept from a product name on its card.
pub const CARD_NAME_WORDS: usize = 8;

/// Shown when the catalog returns nothing.
pub const EMPTY_MESSAGE: &str = "No products found.";

/// One product card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductCardView {
    pub id: ProductId,
    /// Name trimmed for the card.
    pub name: String,
    /// Untrimmed name, for image alt text.
    pub full_name: String,
    pub price: String,
    pub image: String,
    pub link: String,
}

impl From<&Product> for ProductCardView {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id.clone(),
            name: trim_content(&product.name, CARD_NAME_WORDS),
            full_name: product.name.clone(),
            price: product.unit_price().display(),
            image: product.image.clone(),
            link: Route::Product(product.id.clone()).path(),
        }
    }
}

/// The product grid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProductListView {
    pub cards: Vec<ProductCardView>,
}

impl ProductListView {
    #[must_use]
    pub fn from_products(products: &[Product]) -> Self {
        Self {
            cards: products.iter().map(ProductCardView::from).collect(),
        }
    }

    /// Fetch the catalog and build the grid.
    ///
    /// # Errors
    ///
    /// Returns the catalog's error; the screen shows an alert and an empty
    /// grid.
    pub async fn load(catalog: &dyn ProductCatalog) -> Result<Self, CatalogError> {
        let products = catalog
            .list_products()
            .await
            .inspect_err(|e| warn!(error = %e, "Failed to fetch products"))?;
        Ok(Self::from_products(&products))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Text for the empty grid.
    #[must_use]
    pub fn empty_message(&self) -> Option<&'static str> {
        self.is_empty().then_some(EMPTY_MESSAGE)
    }
}

/// Result of pressing a card button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CardAction {
    Notice(Notice),
    Navigate(Route),
}

/// The card buttons: add to cart and add to wishlist.
#[derive(Clone)]
pub struct ProductListActions {
    cart: CartEngine,
    wishlist: Wishlist,
    observer: SessionObserver,
}

impl ProductListActions {
    #[must_use]
    pub const fn new(cart: CartEngine, wishlist: Wishlist, observer: SessionObserver) -> Self {
        Self {
            cart,
            wishlist,
            observer,
        }
    }

    /// Add one unit to the cart. Guests keep a local cart, so this always
    /// lands.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    #[must_use]
    pub fn add_to_cart(&self, id: &ProductId) -> CardAction {
        let _ = self.cart.add_one(id);
        CardAction::Notice(Notice::success("Added to cart!"))
    }

    /// Add to the wishlist, sending guests to the login screen.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn add_to_wishlist(&self, id: &ProductId) -> CardAction {
        if self.observer.current_uid().is_none() {
            return CardAction::Navigate(Route::Login);
        }
        match self.wishlist.add(id).await {
            Ok(WishlistAdd::Added) => CardAction::Notice(Notice::success("Added to wishlist!")),
            Ok(WishlistAdd::AlreadyPresent) => {
                CardAction::Notice(Notice::success("Already in wishlist!"))
            }
            Err(WishlistError::NotAuthenticated) => CardAction::Navigate(Route::Login),
            Err(WishlistError::Sync(_)) => {
                CardAction::Notice(Notice::error("Error adding to wishlist."))
            }
        }
    }

    /// Whether the card's heart should show as filled.
    #[must_use]
    pub fn in_wishlist(&self, id: &ProductId) -> bool {
        self.wishlist.contains(id)
    }
}
