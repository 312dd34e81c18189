//! Authentication service.
//!
//! Backs the login and registration screens. Sign-in and sign-up go to the
//! identity provider; the session observer picks up the resulting session
//! change, so callers never update identity state themselves.

mod error;

pub use error::AuthError;

use std::sync::Arc;

use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use storefront_core::Email;
use tracing::{info, instrument, warn};

use crate::documents::DocumentStore;
use crate::identity::{IdentityProvider, UserIdentity};

/// Authentication service.
#[derive(Clone)]
pub struct AuthService {
    provider: Arc<dyn IdentityProvider>,
    documents: Arc<dyn DocumentStore>,
    profiles: String,
}

impl AuthService {
    /// Create a new authentication service writing profiles to `profiles`.
    #[must_use]
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        documents: Arc<dyn DocumentStore>,
        profiles: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            documents,
            profiles: profiles.into(),
        }
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::EmailRequired` or `AuthError::PasswordRequired`
    /// for empty fields, `AuthError::InvalidEmail` for a malformed address,
    /// and the provider's error otherwise.
    #[instrument(skip(self, password))]
    pub async fn login(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<UserIdentity, AuthError> {
        let email = required_email(email)?;
        if password.expose_secret().is_empty() {
            return Err(AuthError::PasswordRequired);
        }

        let identity = self.provider.sign_in(&email, password).await?;
        info!(uid = %identity.uid, "User signed in");
        Ok(identity)
    }

    /// Create an account, set its display name and store its profile.
    ///
    /// The provider signs the new user in as part of sign-up.
    ///
    /// # Errors
    ///
    /// Returns the provider's `AuthError` for rejected sign-ups, or
    /// `AuthError::Profile` if the profile document cannot be written.
    #[instrument(skip(self, password))]
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &SecretString,
    ) -> Result<UserIdentity, AuthError> {
        let email = required_email(email)?;
        if password.expose_secret().is_empty() {
            return Err(AuthError::PasswordRequired);
        }
        let name = name.trim();

        let identity = self.provider.sign_up(&email, password).await?;
        let identity = if name.is_empty() {
            identity
        } else {
            self.provider.update_display_name(&identity.uid, name).await?
        };

        let profile = json!({
            "name": name,
            "email": email.as_str(),
            "createdAt": Utc::now().to_rfc3339(),
        });
        self.documents
            .set_document(&self.profiles, identity.uid.as_str(), profile, false)
            .await
            .inspect_err(|e| {
                warn!(uid = %identity.uid, error = %e, "Failed to write user profile");
            })?;

        info!(uid = %identity.uid, "User registered");
        Ok(identity)
    }
}

fn required_email(raw: &str) -> Result<Email, AuthError> {
    if raw.trim().is_empty() {
        return Err(AuthError::EmailRequired);
    }
    Email::parse(raw).map_err(|e| AuthError::InvalidEmail(e.to_string()))
}
