//! Presentation view models.
//!
//! Screen logic without markup: what each screen shows and what each user
//! action leads to. Renderers read these structs and call the actions; they
//! never touch the engine or the identity provider directly.

pub mod cart;
pub mod forms;
pub mod gate;
pub mod products;

pub use cart::{CartItemView, CartView};
pub use forms::{FormOutcome, LoginForm, RegisterForm};
pub use gate::RouteGate;
pub use products::{CardAction, ProductCardView, ProductListActions, ProductListView};

use std::fmt;

use serde::Serialize;
use storefront_core::ProductId;

/// Screens the client can navigate to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Route {
    Home,
    Login,
    Register,
    Cart,
    Product(ProductId),
}

impl Route {
    #[must_use]
    pub fn path(&self) -> String {
        match self {
            Self::Home => "/".to_string(),
            Self::Login => "/login".to_string(),
            Self::Register => "/register".to_string(),
            Self::Cart => "/cart".to_string(),
            Self::Product(id) => format!("/product/{id}"),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Success,
    Error,
}

/// Transient message shown after an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Success,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            message: message.into(),
        }
    }
}

/// Shorten text to at most `max_words` space-separated words.
///
/// Longer text is cut and gets a `...` suffix.
#[must_use]
pub fn trim_content(text: &str, max_words: usize) -> String {
    if text.split(' ').count() <= max_words {
        return text.to_string();
    }
    let head: Vec<&str> = text.split(' ').take(max_words).collect();
    format!("{}...", head.join(" "))
}
