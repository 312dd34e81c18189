//! Session observer: the client's single view of who is signed in.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use storefront_core::UserUid;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

use super::{AuthState, AuthStatus, IdentityProvider, UserIdentity};
use crate::services::auth::AuthError;

/// Ordered stream of identity transitions for one dependent.
#[derive(Debug)]
pub struct IdentityEvents {
    rx: mpsc::UnboundedReceiver<AuthState>,
}

impl IdentityEvents {
    /// Wait for the next transition. `None` once the observer is gone.
    pub async fn next(&mut self) -> Option<AuthState> {
        self.rx.recv().await
    }

    /// Take a transition that is already queued, without waiting.
    pub fn try_next(&mut self) -> Option<AuthState> {
        self.rx.try_recv().ok()
    }
}

/// Tracks the provider's session and fans transitions out to dependents.
///
/// Holds exactly one subscription to the provider's session stream, never
/// polls, and delivers each transition once, in provider order.
#[derive(Clone)]
pub struct SessionObserver {
    inner: Arc<ObserverInner>,
}

struct ObserverInner {
    provider: Arc<dyn IdentityProvider>,
    shared: Mutex<Shared>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

#[derive(Default)]
struct Shared {
    state: AuthState,
    subscribers: Vec<mpsc::UnboundedSender<AuthState>>,
}

impl SessionObserver {
    /// Subscribe to the provider and start tracking its session.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    #[must_use]
    pub fn start(provider: Arc<dyn IdentityProvider>) -> Self {
        let mut session = provider.session_changes();
        let inner = Arc::new(ObserverInner {
            provider,
            shared: Mutex::new(Shared::default()),
            listener: Mutex::new(None),
        });

        // The task only holds a weak reference so dropping the last observer
        // handle tears the subscription down.
        let weak: Weak<ObserverInner> = Arc::downgrade(&inner);
        let listener = tokio::spawn(async move {
            while let Some(emission) = session.recv().await {
                let Some(inner) = weak.upgrade() else { break };
                inner.apply(emission);
            }
            debug!("Identity session stream closed");
        });
        *lock(&inner.listener) = Some(listener);

        Self { inner }
    }

    /// The signed-in user, if any.
    #[must_use]
    pub fn current_identity(&self) -> Option<UserIdentity> {
        lock(&self.inner.shared).state.identity().cloned()
    }

    /// The signed-in user's uid, if any.
    #[must_use]
    pub fn current_uid(&self) -> Option<UserUid> {
        lock(&self.inner.shared).state.uid().cloned()
    }

    /// Tri-state authentication flag.
    #[must_use]
    pub fn status(&self) -> AuthStatus {
        lock(&self.inner.shared).state.status()
    }

    #[must_use]
    pub fn state(&self) -> AuthState {
        lock(&self.inner.shared).state.clone()
    }

    /// Register a dependent. The current state is queued first when known.
    #[must_use]
    pub fn subscribe(&self) -> IdentityEvents {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut shared = lock(&self.inner.shared);
        if shared.state != AuthState::Unknown {
            let _ = tx.send(shared.state.clone());
        }
        shared.subscribers.push(tx);
        IdentityEvents { rx }
    }

    /// Sign out through the provider and clear the identity.
    ///
    /// # Errors
    ///
    /// Returns the provider's `AuthError`; the identity is left untouched.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<(), AuthError> {
        self.inner.provider.sign_out().await?;
        self.inner.apply(None);
        Ok(())
    }

    /// The provider this observer is subscribed to.
    #[must_use]
    pub fn provider(&self) -> &Arc<dyn IdentityProvider> {
        &self.inner.provider
    }

    /// Unsubscribe from the provider. Dependents see their stream end.
    pub fn shutdown(&self) {
        if let Some(listener) = lock(&self.inner.listener).take() {
            listener.abort();
        }
        lock(&self.inner.shared).subscribers.clear();
    }
}

impl ObserverInner {
    /// Record a provider emission and publish it if it is a transition.
    fn apply(&self, emission: Option<UserIdentity>) {
        let next = AuthState::from(emission);
        let mut shared = lock(&self.shared);
        let transition = shared.state.is_transition_to(&next);
        shared.state = next.clone();

        if transition {
            info!(uid = ?next.uid().map(UserUid::as_str), "Identity changed");
            shared
                .subscribers
                .retain(|subscriber| subscriber.send(next.clone()).is_ok());
        }
    }
}

impl Drop for ObserverInner {
    fn drop(&mut self) {
        if let Some(listener) = self
            .listener
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            listener.abort();
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
