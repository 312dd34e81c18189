//! Login, registration and protected-route flows through the view models.

#![allow(clippy::unwrap_used)]

use storefront_client::identity::AuthStatus;
use storefront_client::views::{FormOutcome, LoginForm, RegisterForm, Route, RouteGate};
use storefront_integration_tests::{FakeCatalog, TestStorefront, eventually};

#[tokio::test]
async fn test_wrong_password_and_unknown_account_differ() {
    let catalog = FakeCatalog::start(Vec::new()).await;
    let t = TestStorefront::new(&catalog);
    t.sign_up("asha@shop.in", "secret-pw").await;
    t.storefront.observer().logout().await.unwrap();

    let mut wrong = LoginForm::new("asha@shop.in", "not-it");
    let wrong_outcome = wrong.submit(t.storefront.auth()).await;

    let mut unknown = LoginForm::new("nobody@shop.in", "secret-pw");
    let unknown_outcome = unknown.submit(t.storefront.auth()).await;

    assert_eq!(wrong_outcome, FormOutcome::Error("Incorrect password".to_string()));
    assert_eq!(
        unknown_outcome,
        FormOutcome::Error("No account found with this email".to_string())
    );
    assert_ne!(wrong_outcome, unknown_outcome);

    // Neither failure navigates away or signs anyone in.
    eventually(|| t.storefront.observer().status() == AuthStatus::Anonymous).await;
    assert_eq!(t.storefront.gate(), RouteGate::RedirectToLogin);
}

#[tokio::test]
async fn test_register_writes_profile_and_goes_to_login() {
    let catalog = FakeCatalog::start(Vec::new()).await;
    let t = TestStorefront::new(&catalog);

    let mut form = RegisterForm::new("Ravi Kumar", "ravi@shop.in", "secret-pw");
    assert_eq!(
        form.submit(t.storefront.auth()).await,
        FormOutcome::Navigate(Route::Login)
    );

    eventually(|| t.storefront.observer().current_identity().is_some()).await;
    let identity = t.storefront.observer().current_identity().unwrap();
    let profile = t.documents.peek("users", identity.uid.as_str()).unwrap();
    assert_eq!(profile["name"], "Ravi Kumar");
    assert_eq!(profile["email"], "ravi@shop.in");
}

#[tokio::test]
async fn test_login_opens_protected_routes() {
    let catalog = FakeCatalog::start(Vec::new()).await;
    let t = TestStorefront::new(&catalog);
    t.sign_up("meera@shop.in", "secret-pw").await;
    t.storefront.observer().logout().await.unwrap();
    assert_eq!(t.storefront.gate(), RouteGate::RedirectToLogin);

    let mut form = LoginForm::new("meera@shop.in", "secret-pw");
    assert_eq!(
        form.submit(t.storefront.auth()).await,
        FormOutcome::Navigate(Route::Home)
    );
    eventually(|| t.storefront.gate() == RouteGate::Allow).await;
}
