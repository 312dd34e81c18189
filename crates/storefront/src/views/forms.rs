//! Login and registration forms.

use secrecy::SecretString;
use serde::Serialize;
use tracing::warn;

use super::Route;
use crate::services::auth::{AuthError, AuthService};

/// Where a form submission leads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FormOutcome {
    /// Leave the form for another screen.
    Navigate(Route),
    /// Stay on the form and show this message.
    Error(String),
}

/// Login form state.
#[derive(Debug)]
pub struct LoginForm {
    pub email: String,
    pub password: SecretString,
    submitting: bool,
    error: Option<String>,
}

impl LoginForm {
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: SecretString::from(password.into()),
            submitting: false,
            error: None,
        }
    }

    /// Submit. Success goes home; failure keeps the form open with a
    /// message.
    pub async fn submit(&mut self, auth: &AuthService) -> FormOutcome {
        self.error = None;
        self.submitting = true;
        let result = auth.login(&self.email, &self.password).await;
        self.submitting = false;
        settle(&mut self.error, result.map(|_| Route::Home))
    }

    #[must_use]
    pub const fn is_submitting(&self) -> bool {
        self.submitting
    }

    /// Message from the last failed submission.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

/// Registration form state.
#[derive(Debug)]
pub struct RegisterForm {
    pub name: String,
    pub email: String,
    pub password: SecretString,
    submitting: bool,
    error: Option<String>,
}

impl RegisterForm {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            password: SecretString::from(password.into()),
            submitting: false,
            error: None,
        }
    }

    /// Submit. Success goes to the login screen.
    pub async fn submit(&mut self, auth: &AuthService) -> FormOutcome {
        self.error = None;
        self.submitting = true;
        let result = auth.register(&self.name, &self.email, &self.password).await;
        self.submitting = false;
        settle(&mut self.error, result.map(|_| Route::Login))
    }

    #[must_use]
    pub const fn is_submitting(&self) -> bool {
        self.submitting
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

fn settle(slot: &mut Option<String>, result: Result<Route, AuthError>) -> FormOutcome {
    match result {
        Ok(route) => FormOutcome::Navigate(route),
        Err(e) => {
            warn!(error = %e, "Form submission failed");
            let message = e.user_message();
            *slot = Some(message.clone());
            FormOutcome::Error(message)
        }
    }
}
