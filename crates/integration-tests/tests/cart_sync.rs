//! End-to-end cart synchronization across login, mutation and logout.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use storefront_client::cache::{CART_CACHE_KEY, LocalCache};
use storefront_client::cart::{CartEvent, CartSyncState, SyncResult};
use storefront_client::documents::DocumentStore;
use storefront_core::{CartLine, ProductId};
use storefront_integration_tests::{FakeCatalog, TestStorefront, eventually, product_json, within};

fn pid(s: &str) -> ProductId {
    ProductId::new(s)
}

async fn catalog() -> FakeCatalog {
    FakeCatalog::start(vec![
        product_json("kurta", "Cotton Kurta", 1299),
        product_json("mug", "Clay Mug", 249),
        product_json("stole", "Silk Stole", 899),
    ])
    .await
}

#[tokio::test]
async fn test_login_replaces_guest_cart_with_remote_cart() {
    let catalog = catalog().await;
    let t = TestStorefront::new(&catalog);
    t.wait_for_auth_check().await;

    // Guest shopping stays local.
    let _ = t.cart().add_to_cart(&pid("mug"), 2);
    assert_eq!(t.cart().sync_state(), CartSyncState::Guest);
    assert_eq!(t.documents.write_count(), 0);

    // A previous session on another device left a cart behind.
    // The in-memory provider numbers accounts from one.
    t.documents
        .set_document(
            "userCarts",
            "uid-00000001",
            json!({"cart": [{"id": "stole", "quantity": 1}, {"id": "kurta", "quantity": 3}]}),
            false,
        )
        .await
        .unwrap();

    let user = t.sign_up("asha@shop.in", "secret-pw").await;
    assert_eq!(user.uid.as_str(), "uid-00000001");
    t.wait_for_sync(CartSyncState::Synced).await;

    assert_eq!(
        t.cart().snapshot().lines(),
        &[CartLine::new(pid("stole"), 1), CartLine::new(pid("kurta"), 3)]
    );
}

#[tokio::test]
async fn test_login_without_remote_cart_uploads_guest_cart() {
    let catalog = catalog().await;
    let t = TestStorefront::new(&catalog);
    t.wait_for_auth_check().await;

    let _ = t.cart().add_to_cart(&pid("kurta"), 1);
    let _ = t.cart().add_to_cart(&pid("kurta"), 1);
    let user = t.sign_up("ravi@shop.in", "secret-pw").await;
    t.wait_for_sync(CartSyncState::Synced).await;

    let document = t.documents.peek("userCarts", user.uid.as_str()).unwrap();
    assert_eq!(document["cart"], json!([{"id": "kurta", "quantity": 2}]));
    assert!(document["updatedAt"].is_string());
}

#[tokio::test]
async fn test_signed_in_changes_reach_remote_document() {
    let catalog = catalog().await;
    let t = TestStorefront::new(&catalog);
    let user = t.sign_up("meera@shop.in", "secret-pw").await;
    t.wait_for_sync(CartSyncState::Synced).await;

    let _ = t.cart().add_to_cart(&pid("mug"), 2);
    let _ = t.cart().add_one(&pid("kurta"));
    let last = t.cart().update_quantity(&pid("mug"), 5);
    assert!(last.sync.outcome().await.is_synced());

    let document = t.documents.peek("userCarts", user.uid.as_str()).unwrap();
    assert_eq!(
        document["cart"],
        json!([{"id": "mug", "quantity": 5}, {"id": "kurta", "quantity": 1}])
    );
    assert_eq!(t.cart().sync_state(), CartSyncState::Synced);
}

#[tokio::test]
async fn test_offline_store_keeps_local_change_and_stays_dirty() {
    let catalog = catalog().await;
    let t = TestStorefront::new(&catalog);
    t.sign_up("offline@shop.in", "secret-pw").await;
    t.wait_for_sync(CartSyncState::Synced).await;

    t.documents.set_offline(true);
    let mutation = t.cart().add_one(&pid("stole"));
    assert!(mutation.changed);
    assert!(matches!(mutation.sync.outcome().await, SyncResult::Failed(_)));

    assert_eq!(t.cart().sync_state(), CartSyncState::Dirty);
    assert_eq!(t.cart().snapshot().quantity_of(&pid("stole")), Some(1));
    assert_eq!(
        t.cache.get(CART_CACHE_KEY).unwrap().as_deref(),
        Some(r#"[{"id":"stole","quantity":1}]"#)
    );
}

#[tokio::test]
async fn test_cart_survives_restart_through_local_cache() {
    let catalog = catalog().await;
    let t = TestStorefront::new(&catalog);
    t.wait_for_auth_check().await;
    let _ = t.cart().add_to_cart(&pid("kurta"), 4);
    t.storefront.shutdown();

    let restarted = TestStorefront::with_backends(
        &catalog,
        Arc::clone(&t.provider),
        Arc::clone(&t.documents),
        Arc::clone(&t.cache),
    );
    assert_eq!(restarted.cart().snapshot().quantity_of(&pid("kurta")), Some(4));
}

#[tokio::test]
async fn test_logout_keeps_local_cart_and_stops_remote_writes() {
    let catalog = catalog().await;
    let t = TestStorefront::new(&catalog);
    t.sign_up("leaving@shop.in", "secret-pw").await;
    t.wait_for_sync(CartSyncState::Synced).await;
    let _ = t.cart().add_one(&pid("mug")).sync.outcome().await;

    t.storefront.observer().logout().await.unwrap();
    t.wait_for_sync(CartSyncState::Guest).await;

    let writes = t.documents.write_count();
    let _ = t.cart().add_one(&pid("mug"));
    assert_eq!(t.cart().snapshot().quantity_of(&pid("mug")), Some(2));
    assert_eq!(t.documents.write_count(), writes);
}

#[tokio::test]
async fn test_hydrate_omits_unreachable_product() {
    let catalog = catalog().await;
    let t = TestStorefront::new(&catalog);
    let _ = t.cart().add_one(&pid("kurta"));
    let _ = t.cart().add_one(&pid("mug"));
    let _ = t.cart().add_one(&pid("withdrawn"));
    catalog.break_product("mug");

    let items = t.cart().hydrate().await;
    let ids: Vec<&str> = items.iter().map(|item| item.product.id.as_str()).collect();
    assert_eq!(ids, ["kurta"]);
    assert_eq!(t.cart().snapshot().len(), 3);

    let view = t.storefront.cart_view();
    assert_eq!(view.items.len(), 1);
    assert_eq!(view.item_count, 3);
    assert_eq!(view.subtotal, "₹1299");
}

#[tokio::test]
async fn test_clear_then_hydrate_is_empty() {
    let catalog = catalog().await;
    let t = TestStorefront::new(&catalog);
    let _ = t.cart().add_to_cart(&pid("kurta"), 2);
    assert_eq!(t.cart().hydrate().await.len(), 1);

    let _ = t.cart().clear_cart();
    assert!(t.cart().hydrate().await.is_empty());
    assert!(t.storefront.cart_view().is_empty());
}

#[tokio::test]
async fn test_cart_events_follow_sync_states() {
    let catalog = catalog().await;
    let t = TestStorefront::new(&catalog);
    t.wait_for_auth_check().await;
    let mut events = t.cart().subscribe();

    t.sign_up("events@shop.in", "secret-pw").await;
    let mut seen = Vec::new();
    eventually(|| {
        while let Some(event) = events.try_next() {
            seen.push(event);
        }
        seen.contains(&CartEvent::SyncStateChanged(CartSyncState::Synced))
    })
    .await;
    assert_eq!(
        seen.first(),
        Some(&CartEvent::SyncStateChanged(CartSyncState::Syncing))
    );
}

#[tokio::test]
async fn test_overtaken_write_does_not_leave_older_cart_remotely() {
    let catalog = catalog().await;
    let (t, slow) = TestStorefront::with_slow_store(&catalog);
    let user = t.sign_up("overlap@shop.in", "secret-pw").await;
    t.wait_for_sync(CartSyncState::Synced).await;
    let writes = t.documents.write_count();

    // The first write stalls with [kurta] in flight while [kurta, mug] is
    // queued behind it.
    slow.delay_next_write(Duration::from_millis(200));
    let first = t.cart().add_one(&pid("kurta"));
    tokio::time::sleep(Duration::from_millis(20)).await;
    let second = t.cart().add_one(&pid("mug"));

    assert!(within(first.sync.outcome()).await.is_synced());
    assert!(within(second.sync.outcome()).await.is_synced());

    let document = t.documents.peek("userCarts", user.uid.as_str()).unwrap();
    assert_eq!(
        document["cart"],
        json!([{"id": "kurta", "quantity": 1}, {"id": "mug", "quantity": 1}])
    );
    assert_eq!(t.documents.write_count(), writes + 2);
    assert_eq!(t.cart().sync_state(), CartSyncState::Synced);
}

#[tokio::test]
async fn test_change_during_login_fetch_is_replayed_onto_remote_cart() {
    let catalog = catalog().await;
    let (t, slow) = TestStorefront::with_slow_store(&catalog);
    t.wait_for_auth_check().await;
    t.documents
        .set_document(
            "userCarts",
            "uid-00000001",
            json!({"cart": [{"id": "stole", "quantity": 1}]}),
            false,
        )
        .await
        .unwrap();
    let writes = t.documents.write_count();

    slow.delay_reads(Duration::from_millis(200));
    let user = t.sign_up("clicker@shop.in", "secret-pw").await;
    assert_eq!(user.uid.as_str(), "uid-00000001");
    t.wait_for_sync(CartSyncState::Syncing).await;

    let mutation = t.cart().add_one(&pid("kurta"));
    assert_eq!(t.cart().sync_state(), CartSyncState::Syncing);
    assert!(within(mutation.sync.outcome()).await.is_synced());

    let expected = [CartLine::new(pid("stole"), 1), CartLine::new(pid("kurta"), 1)];
    assert_eq!(t.cart().snapshot().lines(), &expected);
    let document = t.documents.peek("userCarts", user.uid.as_str()).unwrap();
    assert_eq!(
        document["cart"],
        json!([{"id": "stole", "quantity": 1}, {"id": "kurta", "quantity": 1}])
    );
    // One reconciled write, nothing written before the fetch resolved.
    assert_eq!(t.documents.write_count(), writes + 1);
    assert_eq!(t.cart().sync_state(), CartSyncState::Synced);
}

#[tokio::test]
async fn test_change_during_login_fetch_is_uploaded_without_remote_cart() {
    let catalog = catalog().await;
    let (t, slow) = TestStorefront::with_slow_store(&catalog);
    t.wait_for_auth_check().await;
    let _ = t.cart().add_one(&pid("mug"));

    slow.delay_reads(Duration::from_millis(200));
    let user = t.sign_up("late@shop.in", "secret-pw").await;
    t.wait_for_sync(CartSyncState::Syncing).await;
    let mutation = t.cart().add_one(&pid("stole"));
    assert!(within(mutation.sync.outcome()).await.is_synced());

    let document = t.documents.peek("userCarts", user.uid.as_str()).unwrap();
    assert_eq!(
        document["cart"],
        json!([{"id": "mug", "quantity": 1}, {"id": "stole", "quantity": 1}])
    );
    assert_eq!(t.documents.write_count(), 1);
}
