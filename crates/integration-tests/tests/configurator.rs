//! Saved katanas, drafts and price estimates.
//!
//! These tests require a running storefront and database.

use katana_forge_integration_tests::{Browser, katana_config};
use reqwest::{Method, StatusCode};
use serde_json::{Value, json};

const PASSWORD: &str = "tamahagane-steel";

fn draft_body(quantity: u8) -> Value {
    let mut body = katana_config();
    body["quantity"] = json!(quantity);
    body
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_katana_crud() {
    let browser = Browser::new();
    browser.register(PASSWORD).await;

    let mut body = katana_config();
    body["name"] = json!("  Kage  ");
    let resp = browser
        .mutate(Method::POST, "/api/katanas")
        .await
        .json(&body)
        .send()
        .await
        .expect("Failed to create katana");
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Value = resp.json().await.expect("Invalid JSON");
    assert_eq!(created["katana"]["name"], "Kage");
    let id = created["katana"]["id"].as_str().expect("katana id").to_owned();

    body["name"] = json!("Tsuki");
    body["metalness"] = json!(0.1);
    let resp = browser
        .mutate(Method::PUT, &format!("/api/katanas/{id}"))
        .await
        .json(&body)
        .send()
        .await
        .expect("Failed to update katana");
    assert_eq!(resp.status(), StatusCode::OK);

    let list: Value = browser
        .get("/api/katanas")
        .send()
        .await
        .expect("Failed to list katanas")
        .json()
        .await
        .expect("Invalid JSON");
    assert_eq!(list["katanas"].as_array().map(Vec::len), Some(1));
    assert_eq!(list["katanas"][0]["name"], "Tsuki");

    let resp = browser
        .mutate(Method::DELETE, &format!("/api/katanas/{id}"))
        .await
        .send()
        .await
        .expect("Failed to delete katana");
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = browser
        .get(&format!("/api/katanas/{id}"))
        .send()
        .await
        .expect("Failed to fetch katana");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_other_users_katana_is_not_found() {
    let owner = Browser::new();
    owner.register(PASSWORD).await;
    let mut body = katana_config();
    body["name"] = json!("Kage");
    let created: Value = owner
        .mutate(Method::POST, "/api/katanas")
        .await
        .json(&body)
        .send()
        .await
        .expect("Failed to create katana")
        .json()
        .await
        .expect("Invalid JSON");
    let id = created["katana"]["id"].as_str().expect("katana id").to_owned();

    let stranger = Browser::new();
    stranger.register(PASSWORD).await;
    let resp = stranger
        .get(&format!("/api/katanas/{id}"))
        .send()
        .await
        .expect("Failed to fetch katana");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_guest_draft_merges_on_sign_in() {
    let browser = Browser::new();

    let resp = browser
        .mutate(Method::PUT, "/api/drafts")
        .await
        .json(&draft_body(3))
        .send()
        .await
        .expect("Failed to save guest draft");
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(browser.cookie("draft_id").is_some());

    let guest: Value = browser
        .get("/api/drafts")
        .send()
        .await
        .expect("Failed to get draft")
        .json()
        .await
        .expect("Invalid JSON");
    assert_eq!(guest["draft"]["quantity"], 3);

    browser.register(PASSWORD).await;
    let resp = browser
        .mutate(Method::POST, "/api/drafts/merge")
        .await
        .send()
        .await
        .expect("Failed to merge drafts");
    assert_eq!(resp.status(), StatusCode::OK);
    let merged: Value = resp.json().await.expect("Invalid JSON");
    assert_eq!(merged["draft"]["quantity"], 3);
    assert!(browser.cookie("draft_id").is_none());

    let owned: Value = browser
        .get("/api/drafts")
        .send()
        .await
        .expect("Failed to get draft")
        .json()
        .await
        .expect("Invalid JSON");
    assert_eq!(owned["draft"]["quantity"], 3);
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_draft_quantity_out_of_range() {
    let browser = Browser::new();
    let resp = browser
        .mutate(Method::PUT, "/api/drafts")
        .await
        .json(&draft_body(11))
        .send()
        .await
        .expect("Failed to save draft");
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_guest_price_estimate() {
    let browser = Browser::new();
    let resp = browser
        .mutate(Method::POST, "/api/quotes")
        .await
        .json(&katana_config())
        .send()
        .await
        .expect("Failed to estimate price");
    assert_eq!(resp.status(), StatusCode::OK);
    let estimate: Value = resp.json().await.expect("Invalid JSON");
    assert_eq!(estimate["currency"], "EUR");
    assert!(estimate["price"].as_u64().is_some_and(|p| p > 0));
    assert!(estimate["estimatedDeliveryWeeks"].as_u64().is_some());
}
