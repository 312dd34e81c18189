//! Storefront Core - Shared domain types.
//!
//! This crate provides the types shared by the storefront client and its
//! tests:
//! - Opaque identifiers for products and users
//! - Validated email addresses
//! - Catalog prices
//! - The cart snapshot and its line invariants
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients, no
//! persistence. Everything here is synchronous and deterministic.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers and the cart snapshot

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
