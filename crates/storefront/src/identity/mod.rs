//! Identity provider boundary and session observation.
//!
//! The identity provider (sign-up, sign-in, session listener) is an
//! external managed service. This module defines the interface the client
//! consumes, a [`SessionObserver`] that tracks the current identity, and an
//! in-memory provider for tests and offline sessions.
//!
//! # Session stream
//!
//! A provider pushes `Some(identity)` or `None` whenever its session
//! changes, starting with the current session right after subscription.
//! The observer turns those raw emissions into deduplicated
//! [`AuthState`] transitions for dependents.

mod memory;
mod observer;

pub use memory::MemoryIdentityProvider;
pub use observer::{IdentityEvents, SessionObserver};

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use storefront_core::{Email, UserUid};
use tokio::sync::mpsc;

use crate::services::auth::AuthError;

/// Raw session emissions from a provider. Dropping the receiver unsubscribes.
pub type SessionStream = mpsc::UnboundedReceiver<Option<UserIdentity>>;

/// An authenticated user as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    /// Provider-issued user id.
    pub uid: UserUid,
    /// Sign-in email, if the provider exposes it.
    pub email: Option<Email>,
    /// Profile display name.
    pub display_name: Option<String>,
}

impl UserIdentity {
    #[must_use]
    pub const fn new(uid: UserUid, email: Option<Email>) -> Self {
        Self {
            uid,
            email,
            display_name: None,
        }
    }
}

/// Session state as seen by the client.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthState {
    /// No emission received yet; the auth check is pending.
    #[default]
    Unknown,
    /// The provider reported no user.
    SignedOut,
    /// The provider reported a user.
    SignedIn(UserIdentity),
}

impl AuthState {
    #[must_use]
    pub const fn status(&self) -> AuthStatus {
        match self {
            Self::Unknown => AuthStatus::Unknown,
            Self::SignedOut => AuthStatus::Anonymous,
            Self::SignedIn(_) => AuthStatus::Authenticated,
        }
    }

    #[must_use]
    pub const fn identity(&self) -> Option<&UserIdentity> {
        match self {
            Self::SignedIn(identity) => Some(identity),
            Self::Unknown | Self::SignedOut => None,
        }
    }

    #[must_use]
    pub fn uid(&self) -> Option<&UserUid> {
        self.identity().map(|identity| &identity.uid)
    }

    /// Whether moving to `next` is a transition dependents must react to.
    ///
    /// A repeated emission for the same uid, or a repeated sign-out, is not.
    #[must_use]
    pub fn is_transition_to(&self, next: &Self) -> bool {
        match (self, next) {
            (Self::SignedIn(current), Self::SignedIn(next)) => current.uid != next.uid,
            (Self::SignedOut, Self::SignedOut) | (_, Self::Unknown) => false,
            _ => true,
        }
    }
}

impl From<Option<UserIdentity>> for AuthState {
    fn from(identity: Option<UserIdentity>) -> Self {
        identity.map_or(Self::SignedOut, Self::SignedIn)
    }
}

/// Tri-state authentication flag.
///
/// Consumers must treat `Unknown` as "check pending" and avoid redirecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    Unknown,
    Authenticated,
    Anonymous,
}

impl AuthStatus {
    /// `None` while unknown.
    #[must_use]
    pub const fn is_authenticated(self) -> Option<bool> {
        match self {
            Self::Unknown => None,
            Self::Authenticated => Some(true),
            Self::Anonymous => Some(false),
        }
    }
}

/// The identity provider boundary.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Subscribe to session changes. The current session is emitted first.
    fn session_changes(&self) -> SessionStream;

    /// Sign in with email and password.
    async fn sign_in(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<UserIdentity, AuthError>;

    /// Create an account; the new user is signed in.
    async fn sign_up(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<UserIdentity, AuthError>;

    /// Set the display name on the user's profile.
    async fn update_display_name(
        &self,
        uid: &UserUid,
        display_name: &str,
    ) -> Result<UserIdentity, AuthError>;

    /// End the current session.
    async fn sign_out(&self) -> Result<(), AuthError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signed_in(uid: &str) -> AuthState {
        AuthState::SignedIn(UserIdentity::new(UserUid::new(uid), None))
    }

    #[test]
    fn test_first_emission_is_always_a_transition() {
        assert!(AuthState::Unknown.is_transition_to(&AuthState::SignedOut));
        assert!(AuthState::Unknown.is_transition_to(&signed_in("a")));
    }

    #[test]
    fn test_same_uid_is_not_a_transition() {
        let mut renamed = UserIdentity::new(UserUid::new("a"), None);
        renamed.display_name = Some("Asha".to_string());
        assert!(!signed_in("a").is_transition_to(&AuthState::SignedIn(renamed)));
        assert!(!AuthState::SignedOut.is_transition_to(&AuthState::SignedOut));
    }

    #[test]
    fn test_uid_change_and_logout_are_transitions() {
        assert!(signed_in("a").is_transition_to(&signed_in("b")));
        assert!(signed_in("a").is_transition_to(&AuthState::SignedOut));
        assert!(AuthState::SignedOut.is_transition_to(&signed_in("a")));
    }

    #[test]
    fn test_status_tri_state() {
        assert_eq!(AuthState::Unknown.status().is_authenticated(), None);
        assert_eq!(AuthState::SignedOut.status().is_authenticated(), Some(false));
        assert_eq!(signed_in("a").status().is_authenticated(), Some(true));
    }
}
