//! Client-side storefront core.
//!
//! Keeps a shopper's cart in step across a local cache and a per-user
//! remote document while the identity provider signs users in and out,
//! and provides the product catalog client, wishlist, login and
//! registration flows, and the view models the screens render from.
//!
//! Start with [`Storefront`], which wires everything from a
//! [`StorefrontConfig`] plus the identity provider, document store and
//! local cache the host application supplies.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cache;
pub mod cart;
pub mod catalog;
pub mod config;
pub mod documents;
pub mod error;
pub mod identity;
pub mod services;
pub mod state;
pub mod telemetry;
pub mod views;
pub mod wishlist;

pub use config::StorefrontConfig;
pub use error::StorefrontError;
pub use state::Storefront;
