//! Business logic services for the storefront client.
//!
//! # Services
//!
//! - `auth` - Email/password login and registration against the identity
//!   provider, plus the profile document written on sign-up

pub mod auth;
