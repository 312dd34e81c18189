//! Cart screen.

use rust_decimal::Decimal;
use serde::Serialize;
use storefront_core::{Price, ProductId};

use super::Route;
use crate::cart::{CartEngine, HydratedCartItem};

/// Shown when the cart has no lines.
pub const EMPTY_MESSAGE: &str = "Your cart is empty.";

/// Shown when the cart has lines but none have been hydrated yet.
pub const PENDING_MESSAGE: &str = "No detailed items to show yet.";

/// Cart item display data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartItemView {
    pub id: ProductId,
    pub name: String,
    pub image: String,
    pub link: String,
    pub quantity: u32,
    pub price: String,
    pub line_price: String,
}

impl From<&HydratedCartItem> for CartItemView {
    fn from(item: &HydratedCartItem) -> Self {
        Self {
            id: item.product.id.clone(),
            name: item.product.name.clone(),
            image: item.product.image.clone(),
            link: Route::Product(item.product.id.clone()).path(),
            quantity: item.quantity,
            price: item.product.unit_price().display(),
            line_price: item.line_total().display(),
        }
    }
}

/// Cart display data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub subtotal: String,
    /// Units across all snapshot lines, hydrated or not.
    pub item_count: u64,
    /// Lines in the snapshot.
    pub line_count: usize,
}

impl CartView {
    /// Create an empty cart.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            subtotal: Price::store(Decimal::ZERO).display(),
            item_count: 0,
            line_count: 0,
        }
    }

    /// Current engine state: snapshot counts plus the hydrated lines.
    #[must_use]
    pub fn from_engine(engine: &CartEngine) -> Self {
        let snapshot = engine.snapshot();
        let hydrated = engine.hydrated();
        Self {
            items: hydrated.iter().map(CartItemView::from).collect(),
            subtotal: engine.subtotal().display(),
            item_count: snapshot.total_quantity(),
            line_count: snapshot.len(),
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.line_count == 0
    }

    /// Placeholder text, if the screen has no items to list.
    #[must_use]
    pub const fn message(&self) -> Option<&'static str> {
        if self.is_empty() {
            Some(EMPTY_MESSAGE)
        } else if self.items.is_empty() {
            Some(PENDING_MESSAGE)
        } else {
            None
        }
    }
}

/// Parse the quantity field of a cart row.
///
/// An empty field counts as zero, which removes the line. Anything that is
/// not a whole number is ignored.
#[must_use]
pub fn parse_quantity_input(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Some(0);
    }
    raw.parse().ok()
}
