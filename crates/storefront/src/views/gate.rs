//! Protected-route check.

use serde::Serialize;

use super::Route;
use crate::identity::{AuthStatus, SessionObserver};

/// What to do when a protected screen is requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RouteGate {
    /// The first session emission has not arrived; show a placeholder.
    Pending,
    /// Nobody is signed in.
    RedirectToLogin,
    Allow,
}

impl RouteGate {
    #[must_use]
    pub const fn for_status(status: AuthStatus) -> Self {
        match status {
            AuthStatus::Unknown => Self::Pending,
            AuthStatus::Anonymous => Self::RedirectToLogin,
            AuthStatus::Authenticated => Self::Allow,
        }
    }

    #[must_use]
    pub fn check(observer: &SessionObserver) -> Self {
        Self::for_status(observer.status())
    }

    /// Where to go instead of the protected screen, if anywhere.
    #[must_use]
    pub const fn redirect(&self) -> Option<Route> {
        match self {
            Self::RedirectToLogin => Some(Route::Login),
            Self::Pending | Self::Allow => None,
        }
    }

    /// Placeholder text while the check is pending.
    #[must_use]
    pub const fn placeholder(&self) -> Option<&'static str> {
        match self {
            Self::Pending => Some("Checking Authentication..."),
            Self::RedirectToLogin | Self::Allow => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_never_redirects() {
        let gate = RouteGate::for_status(AuthStatus::Unknown);
        assert_eq!(gate, RouteGate::Pending);
        assert_eq!(gate.redirect(), None);
        assert!(gate.placeholder().is_some());
    }

    #[test]
    fn test_anonymous_redirects_to_login() {
        let gate = RouteGate::for_status(AuthStatus::Anonymous);
        assert_eq!(gate.redirect(), Some(Route::Login));
        assert_eq!(RouteGate::for_status(AuthStatus::Authenticated), RouteGate::Allow);
    }
}
