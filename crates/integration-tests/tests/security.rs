//! Health checks, security headers and CSRF enforcement.
//!
//! These tests require a running storefront (see the crate docs).

use katana_forge_integration_tests::{Browser, CSRF_COOKIE, base_url};
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_health_sets_security_headers_and_csrf_cookie() {
    let browser = Browser::new();
    let resp = browser.get("/health").send().await.expect("Failed to reach /health");

    assert_eq!(resp.status(), StatusCode::OK);
    let headers = resp.headers();
    assert_eq!(headers["x-frame-options"], "SAMEORIGIN");
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert!(headers.contains_key("x-request-id"));
    assert!(browser.cookie(CSRF_COOKIE).is_some_and(|t| t.len() == 64));
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_readiness_checks_database() {
    let resp = Client::new()
        .get(format!("{}/health/ready", base_url()))
        .send()
        .await
        .expect("Failed to reach /health/ready");
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_mutation_without_token_is_forbidden() {
    let resp = Client::new()
        .post(format!("{}/api/cart/items", base_url()))
        .json(&serde_json::json!({}))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body: Value = resp.json().await.expect("Invalid JSON");
    assert_eq!(body["error"], "CSRF token manquant");
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_foreign_origin_is_forbidden() {
    let browser = Browser::new();
    let resp = browser
        .mutate(Method::DELETE, "/api/cart")
        .await
        .header(reqwest::header::ORIGIN, "https://evil.example")
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_webhook_requires_signature() {
    let resp = Client::new()
        .post(format!("{}/api/stripe/webhook", base_url()))
        .body("{}")
        .send()
        .await
        .expect("Failed to send webhook");

    // Unsigned deliveries skip CSRF but never reach fulfillment.
    assert!(matches!(
        resp.status(),
        StatusCode::BAD_REQUEST | StatusCode::INTERNAL_SERVER_ERROR
    ));
}
