//! Domain types for the remote product API.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use storefront_core::{Price, ProductId};

/// A catalog product as returned by the product API.
///
/// Unknown fields in the payload are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Product identifier (`_id` on the wire).
    #[serde(rename = "_id")]
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// Unit price in the store currency. Accepts a JSON number or string.
    pub price: Decimal,
    /// Image URL.
    #[serde(default)]
    pub image: String,
    /// Long description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Category label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Units in stock, when the API reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock: Option<i64>,
}

impl Product {
    /// A product with only the fields every payload carries.
    #[must_use]
    pub fn new(id: impl Into<ProductId>, name: impl Into<String>, price: Decimal) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
            image: String::new(),
            description: None,
            category: None,
            stock: None,
        }
    }

    /// Unit price with currency.
    #[must_use]
    pub fn unit_price(&self) -> Price {
        Price::store(self.price)
    }

    /// Path of the product detail screen.
    #[must_use]
    pub fn detail_path(&self) -> String {
        format!("/product/{}", self.id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_product_from_api_payload() {
        let product: Product = serde_json::from_str(
            r#"{
                "_id": "66a1",
                "name": "Cotton Kurta",
                "price": 1299,
                "image": "https://cdn.example/kurta.jpg",
                "category": "apparel",
                "__v": 0
            }"#,
        )
        .unwrap();

        assert_eq!(product.id.as_str(), "66a1");
        assert_eq!(product.price, Decimal::new(1299, 0));
        assert_eq!(product.unit_price().display(), "₹1299");
        assert_eq!(product.category.as_deref(), Some("apparel"));
        assert_eq!(product.description, None);
        assert_eq!(product.detail_path(), "/product/66a1");
    }

    #[test]
    fn test_product_accepts_string_price() {
        let product: Product =
            serde_json::from_str(r#"{"_id":"1","name":"Mug","price":"249.50"}"#).unwrap();
        assert_eq!(product.price, Decimal::new(24950, 2));
        assert!(product.image.is_empty());
    }
}
