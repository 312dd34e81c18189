//! Authentication error types.

use thiserror::Error;

use crate::documents::StoreError;

/// Errors that can occur during authentication operations.
///
/// The provider variants mirror the identity provider's error codes so the
/// login and registration screens can show a distinct message per case.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// Email field left empty.
    #[error("email is required")]
    EmailRequired,

    /// Password field left empty.
    #[error("password is required")]
    PasswordRequired,

    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(String),

    /// Credentials rejected without saying which part was wrong.
    #[error("invalid credentials")]
    InvalidCredential,

    /// No account for this email.
    #[error("user not found")]
    UserNotFound,

    /// Account exists, password is wrong.
    #[error("wrong password")]
    WrongPassword,

    /// Provider is throttling this client.
    #[error("too many requests")]
    TooManyRequests,

    /// Email already registered.
    #[error("email already in use")]
    EmailAlreadyInUse,

    /// Password rejected by the provider's rules.
    #[error("weak password: {0}")]
    WeakPassword(String),

    /// Operation needs a signed-in user.
    #[error("not signed in")]
    NotSignedIn,

    /// Profile document could not be written after sign-up.
    #[error("profile store error: {0}")]
    Profile(#[from] StoreError),

    /// Any other provider failure (network, internal).
    #[error("identity provider error: {0}")]
    Provider(String),
}

impl AuthError {
    /// Map an identity provider error code (e.g. `auth/wrong-password`).
    ///
    /// Unknown codes become [`AuthError::Provider`] carrying `message`.
    #[must_use]
    pub fn from_provider_code(code: &str, message: &str) -> Self {
        match code.strip_prefix("auth/").unwrap_or(code) {
            "invalid-credential" | "invalid-login-credentials" => Self::InvalidCredential,
            "user-not-found" => Self::UserNotFound,
            "wrong-password" => Self::WrongPassword,
            "too-many-requests" => Self::TooManyRequests,
            "email-already-in-use" => Self::EmailAlreadyInUse,
            "weak-password" => Self::WeakPassword(message.to_string()),
            "invalid-email" | "missing-email" => Self::InvalidEmail(message.to_string()),
            _ if message.is_empty() => Self::Provider(code.to_string()),
            _ => Self::Provider(message.to_string()),
        }
    }

    /// Message shown on the login or registration screen.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::EmailRequired => "Email is required".to_string(),
            Self::PasswordRequired => "Password is required".to_string(),
            Self::InvalidEmail(_) => "Invalid email address".to_string(),
            Self::InvalidCredential => "Invalid email or password".to_string(),
            Self::UserNotFound => "No account found with this email".to_string(),
            Self::WrongPassword => "Incorrect password".to_string(),
            Self::TooManyRequests => "Too many attempts. Please try again later".to_string(),
            Self::EmailAlreadyInUse => "This email is already registered".to_string(),
            Self::WeakPassword(_) => "Password should be at least 6 characters".to_string(),
            Self::NotSignedIn => "Please log in to continue".to_string(),
            Self::Profile(_) => "Registration failed. Please try again".to_string(),
            Self::Provider(message) if message.is_empty() => {
                "Something went wrong. Please try again".to_string()
            }
            Self::Provider(message) => message.clone(),
        }
    }
}
