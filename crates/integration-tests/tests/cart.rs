//! Session cart.
//!
//! These tests require a running storefront and database (sessions are
//! stored in `PostgreSQL`).

use katana_forge_integration_tests::Browser;
use reqwest::{Method, StatusCode};
use serde_json::{Value, json};

fn item(id: &str, qty: u32) -> Value {
    json!({
        "id": id,
        "sku": "KATANA-CUSTOM",
        "name": "Katana sur mesure",
        "qty": qty,
        "unitCents": 45_000,
        "vatRatePct": 20,
    })
}

async fn cart(browser: &Browser) -> Value {
    browser
        .get("/api/cart")
        .send()
        .await
        .expect("Failed to get cart")
        .json()
        .await
        .expect("Invalid JSON")
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_cart_lifecycle() {
    let browser = Browser::new();
    assert_eq!(cart(&browser).await["totalQuantity"], 0);

    let resp = browser
        .mutate(Method::POST, "/api/cart/items")
        .await
        .json(&item("k1", 2))
        .send()
        .await
        .expect("Failed to add item");
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = browser
        .mutate(Method::PUT, "/api/cart/items/k1")
        .await
        .json(&json!({ "qty": 5 }))
        .send()
        .await
        .expect("Failed to update item");
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.expect("Invalid JSON");
    assert_eq!(body["totalQuantity"], 5);

    let resp = browser
        .mutate(Method::PUT, "/api/cart/items/missing")
        .await
        .json(&json!({ "qty": 1 }))
        .send()
        .await
        .expect("Failed to update item");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = browser
        .mutate(Method::DELETE, "/api/cart/items/k1")
        .await
        .send()
        .await
        .expect("Failed to remove item");
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(cart(&browser).await["items"], json!([]));
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_cart_survives_logout() {
    let browser = Browser::new();
    browser.register("tamahagane-steel").await;

    browser
        .mutate(Method::POST, "/api/cart/items")
        .await
        .json(&item("k1", 1))
        .send()
        .await
        .expect("Failed to add item");

    browser
        .mutate(Method::POST, "/api/auth/logout")
        .await
        .send()
        .await
        .expect("Failed to logout");

    assert_eq!(cart(&browser).await["totalQuantity"], 1);
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_invalid_item_rejected() {
    let browser = Browser::new();
    let resp = browser
        .mutate(Method::POST, "/api/cart/items")
        .await
        .json(&item("k1", 0))
        .send()
        .await
        .expect("Failed to add item");
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}
