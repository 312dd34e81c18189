//! Cart snapshot: the product-id/quantity pairs for one shopper.
//!
//! A snapshot holds at most one [`CartLine`] per product and every line has
//! a quantity of at least one. Setting a quantity to zero or below removes
//! the line instead of storing it. The invariant is enforced both by the
//! mutation methods and on deserialization, so a snapshot read from the
//! local cache or a remote document is always well-formed.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ProductId;

/// Errors raised when building a snapshot from untrusted lines.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    /// The same product appears on more than one line.
    #[error("duplicate cart line for product {0}")]
    DuplicateLine(ProductId),
    /// A line carries a zero quantity.
    #[error("cart line for product {0} has zero quantity")]
    ZeroQuantity(ProductId),
}

/// One product in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// Catalog product identifier.
    pub id: ProductId,
    /// Number of units, always `>= 1` inside a snapshot.
    pub quantity: u32,
}

impl CartLine {
    #[must_use]
    pub const fn new(id: ProductId, quantity: u32) -> Self {
        Self { id, quantity }
    }
}

/// The authoritative set of cart lines for a user or guest session.
///
/// Line order is insertion order. Order carries no meaning but is kept
/// stable so displays do not reshuffle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<CartLine>", into = "Vec<CartLine>")]
pub struct CartSnapshot {
    lines: Vec<CartLine>,
}

impl CartSnapshot {
    /// Create an empty snapshot.
    #[must_use]
    pub const fn new() -> Self {
        Self { lines: Vec::new() }
    }

    /// Build a snapshot from lines, keeping their order.
    ///
    /// # Errors
    ///
    /// Returns [`CartError`] if a product repeats or a quantity is zero.
    pub fn from_lines(lines: Vec<CartLine>) -> Result<Self, CartError> {
        for (index, line) in lines.iter().enumerate() {
            if line.quantity == 0 {
                return Err(CartError::ZeroQuantity(line.id.clone()));
            }
            if lines.iter().take(index).any(|earlier| earlier.id == line.id) {
                return Err(CartError::DuplicateLine(line.id.clone()));
            }
        }
        Ok(Self { lines })
    }

    /// Add `quantity` units of a product.
    ///
    /// An existing line accumulates; otherwise a new line is appended.
    /// Adding zero units is a no-op. Returns whether the snapshot changed.
    pub fn add(&mut self, id: &ProductId, quantity: u32) -> bool {
        if quantity == 0 {
            return false;
        }
        if let Some(line) = self.lines.iter_mut().find(|line| &line.id == id) {
            line.quantity = line.quantity.saturating_add(quantity);
        } else {
            self.lines.push(CartLine::new(id.clone(), quantity));
        }
        true
    }

    /// Remove the line for a product. Returns whether a line was removed.
    pub fn remove(&mut self, id: &ProductId) -> bool {
        let before = self.lines.len();
        self.lines.retain(|line| &line.id != id);
        self.lines.len() != before
    }

    /// Replace a line's quantity exactly.
    ///
    /// A quantity of zero or below removes the line. Products not already in
    /// the cart are left out. Returns whether the snapshot changed.
    pub fn set_quantity(&mut self, id: &ProductId, quantity: i64) -> bool {
        if quantity <= 0 {
            return self.remove(id);
        }
        let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
        match self.lines.iter_mut().find(|line| &line.id == id) {
            Some(line) if line.quantity != quantity => {
                line.quantity = quantity;
                true
            }
            _ => false,
        }
    }

    /// Remove every line. Returns whether the snapshot changed.
    pub fn clear(&mut self) -> bool {
        let changed = !self.lines.is_empty();
        self.lines.clear();
        changed
    }

    /// Quantity for a product, if it is in the cart.
    #[must_use]
    pub fn quantity_of(&self, id: &ProductId) -> Option<u32> {
        self.lines
            .iter()
            .find(|line| &line.id == id)
            .map(|line| line.quantity)
    }

    /// Sum of all line quantities.
    #[must_use]
    pub fn total_quantity(&self) -> u64 {
        self.lines.iter().map(|line| u64::from(line.quantity)).sum()
    }

    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl TryFrom<Vec<CartLine>> for CartSnapshot {
    type Error = CartError;

    fn try_from(lines: Vec<CartLine>) -> Result<Self, Self::Error> {
        Self::from_lines(lines)
    }
}

impl From<CartSnapshot> for Vec<CartLine> {
    fn from(snapshot: CartSnapshot) -> Self {
        snapshot.lines
    }
}
