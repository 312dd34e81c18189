//! In-memory identity provider.
//!
//! Behaves like the managed provider as far as the client can observe:
//! distinct error codes for unknown accounts and wrong passwords, a
//! minimum password length, throttling after repeated failures, and a
//! session stream that emits the current session on subscription.
//! Passwords are stored as Argon2id hashes.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use storefront_core::{Email, UserUid};
use tokio::sync::mpsc;

use super::{IdentityProvider, SessionStream, UserIdentity};
use crate::services::auth::AuthError;

/// Minimum password length accepted on sign-up.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Consecutive failed sign-ins before the account is throttled.
const MAX_FAILED_ATTEMPTS: u32 = 5;

struct Account {
    identity: UserIdentity,
    password_hash: String,
    failed_attempts: u32,
}

#[derive(Default)]
struct ProviderState {
    accounts: HashMap<String, Account>,
    session: Option<UserIdentity>,
    listeners: Vec<mpsc::UnboundedSender<Option<UserIdentity>>>,
    next_uid: u64,
    fail_sign_out: bool,
}

impl ProviderState {
    fn emit(&mut self) {
        let session = self.session.clone();
        self.listeners
            .retain(|listener| listener.send(session.clone()).is_ok());
    }
}

/// Identity provider kept entirely in process memory.
#[derive(Default)]
pub struct MemoryIdentityProvider {
    state: Mutex<ProviderState>,
}

impl MemoryIdentityProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `sign_out` calls fail, to exercise error paths.
    pub fn set_sign_out_failure(&self, fail: bool) {
        self.lock().fail_sign_out = fail;
    }

    /// Emit a session directly, as if the provider restored or expired it.
    pub fn push_session(&self, session: Option<UserIdentity>) {
        let mut state = self.lock();
        state.session = session;
        state.emit();
    }

    fn lock(&self) -> MutexGuard<'_, ProviderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Accounts are keyed case-insensitively, like the managed provider.
fn account_key(email: &Email) -> String {
    email.as_str().to_ascii_lowercase()
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    fn session_changes(&self) -> SessionStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.lock();
        let _ = tx.send(state.session.clone());
        state.listeners.push(tx);
        rx
    }

    async fn sign_in(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<UserIdentity, AuthError> {
        let mut state = self.lock();
        let account = state
            .accounts
            .get_mut(&account_key(email))
            .ok_or(AuthError::UserNotFound)?;

        if account.failed_attempts >= MAX_FAILED_ATTEMPTS {
            return Err(AuthError::TooManyRequests);
        }

        if verify_password(password.expose_secret(), &account.password_hash).is_err() {
            account.failed_attempts += 1;
            return Err(AuthError::WrongPassword);
        }

        account.failed_attempts = 0;
        let identity = account.identity.clone();
        state.session = Some(identity.clone());
        state.emit();
        Ok(identity)
    }

    async fn sign_up(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<UserIdentity, AuthError> {
        if password.expose_secret().chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AuthError::WeakPassword(format!(
                "password must be at least {MIN_PASSWORD_LENGTH} characters"
            )));
        }

        let key = account_key(email);
        if self.lock().accounts.contains_key(&key) {
            return Err(AuthError::EmailAlreadyInUse);
        }

        let password_hash = hash_password(password.expose_secret())?;

        let mut state = self.lock();
        if state.accounts.contains_key(&key) {
            return Err(AuthError::EmailAlreadyInUse);
        }
        state.next_uid += 1;
        let identity = UserIdentity::new(
            UserUid::new(format!("uid-{:08}", state.next_uid)),
            Some(email.clone()),
        );
        state.accounts.insert(
            key,
            Account {
                identity: identity.clone(),
                password_hash,
                failed_attempts: 0,
            },
        );
        state.session = Some(identity.clone());
        state.emit();
        Ok(identity)
    }

    async fn update_display_name(
        &self,
        uid: &UserUid,
        display_name: &str,
    ) -> Result<UserIdentity, AuthError> {
        let mut state = self.lock();
        let account = state
            .accounts
            .values_mut()
            .find(|account| &account.identity.uid == uid)
            .ok_or(AuthError::UserNotFound)?;
        account.identity.display_name = Some(display_name.to_string());
        let identity = account.identity.clone();

        if state.session.as_ref().is_some_and(|s| &s.uid == uid) {
            state.session = Some(identity.clone());
        }
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let mut state = self.lock();
        if state.fail_sign_out {
            return Err(AuthError::Provider("network request failed".to_string()));
        }
        state.session = None;
        state.emit();
        Ok(())
    }
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Provider(format!("password hashing failed: {e}")))
}

/// Verify a password against a stored hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredential)?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| AuthError::WrongPassword)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn email(s: &str) -> Email {
        Email::parse(s).unwrap()
    }

    fn secret(s: &str) -> SecretString {
        SecretString::from(s)
    }

    #[tokio::test]
    async fn test_wrong_password_and_unknown_user_are_distinct() {
        let provider = MemoryIdentityProvider::new();
        provider.sign_up(&email("a@shop.in"), &secret("correct-horse")).await.unwrap();

        let wrong = provider.sign_in(&email("a@shop.in"), &secret("nope-nope")).await;
        assert!(matches!(wrong, Err(AuthError::WrongPassword)));

        let unknown = provider.sign_in(&email("z@shop.in"), &secret("whatever")).await;
        assert!(matches!(unknown, Err(AuthError::UserNotFound)));
    }

    #[tokio::test]
    async fn test_sign_up_rules() {
        let provider = MemoryIdentityProvider::new();
        assert!(matches!(
            provider.sign_up(&email("a@shop.in"), &secret("12345")).await,
            Err(AuthError::WeakPassword(_))
        ));

        provider.sign_up(&email("a@shop.in"), &secret("123456")).await.unwrap();
        assert!(matches!(
            provider.sign_up(&email("A@SHOP.IN"), &secret("abcdef")).await,
            Err(AuthError::EmailAlreadyInUse)
        ));
    }

    #[tokio::test]
    async fn test_repeated_failures_are_throttled() {
        let provider = MemoryIdentityProvider::new();
        provider.sign_up(&email("t@shop.in"), &secret("right-one")).await.unwrap();
        for _ in 0..MAX_FAILED_ATTEMPTS {
            let _ = provider.sign_in(&email("t@shop.in"), &secret("wrong-one")).await;
        }
        assert!(matches!(
            provider.sign_in(&email("t@shop.in"), &secret("right-one")).await,
            Err(AuthError::TooManyRequests)
        ));
    }

    #[tokio::test]
    async fn test_session_stream_starts_with_current_session() {
        let provider = MemoryIdentityProvider::new();
        let mut before = provider.session_changes();
        assert_eq!(before.recv().await.unwrap(), None);

        let user = provider.sign_up(&email("s@shop.in"), &secret("secret-pw")).await.unwrap();
        assert_eq!(before.recv().await.unwrap(), Some(user.clone()));

        let mut after = provider.session_changes();
        assert_eq!(after.recv().await.unwrap(), Some(user));

        provider.sign_out().await.unwrap();
        assert_eq!(before.recv().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_update_display_name_touches_session() {
        let provider = MemoryIdentityProvider::new();
        let user = provider.sign_up(&email("n@shop.in"), &secret("secret-pw")).await.unwrap();
        let renamed = provider.update_display_name(&user.uid, "Nila").await.unwrap();
        assert_eq!(renamed.display_name.as_deref(), Some("Nila"));

        let mut stream = provider.session_changes();
        let session = stream.recv().await.unwrap().unwrap();
        assert_eq!(session.display_name.as_deref(), Some("Nila"));
    }
}
