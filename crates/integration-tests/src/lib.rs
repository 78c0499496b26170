//! End-to-end tests for the Katana Forge storefront.
//!
//! The tests in `tests/` talk to a running server over HTTP and are
//! `#[ignore]`d by default.
//!
//! # Running Tests
//!
//! ```bash
//! kf-cli migrate
//! cargo run -p katana-forge-storefront &
//! STOREFRONT_BASE_URL=http://localhost:3000 cargo test -p katana-forge-integration-tests -- --ignored
//! ```

use std::sync::Arc;

use reqwest::cookie::{CookieStore, Jar};
use reqwest::{Client, Method, RequestBuilder, Url};

/// Cookie holding the CSRF token.
pub const CSRF_COOKIE: &str = "kf.csrf";
/// Header the token is echoed in.
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Base URL of the storefront under test.
#[must_use]
pub fn base_url() -> String {
    std::env::var("STOREFRONT_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

/// A browser-like client: keeps cookies and sends the CSRF token back.
pub struct Browser {
    client: Client,
    jar: Arc<Jar>,
    base: Url,
}

impl Browser {
    /// Fresh client with an empty cookie jar.
    ///
    /// # Panics
    ///
    /// Panics if `STOREFRONT_BASE_URL` is not a URL or the client cannot be built.
    #[must_use]
    pub fn new() -> Self {
        let jar = Arc::new(Jar::default());
        let client = Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("Failed to create HTTP client");
        let base = Url::parse(&base_url()).expect("STOREFRONT_BASE_URL must be a URL");
        Self { client, jar, base }
    }

    /// Absolute URL for `path`.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base.as_str().trim_end_matches('/'))
    }

    /// Value of a cookie currently in the jar.
    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<String> {
        let header = self.jar.cookies(&self.base)?;
        header
            .to_str()
            .ok()?
            .split("; ")
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.to_owned())
    }

    /// `GET` without any extra header.
    #[must_use]
    pub fn get(&self, path: &str) -> RequestBuilder {
        self.client.get(self.url(path))
    }

    /// A mutating request carrying the origin and the CSRF token.
    ///
    /// Fetches `/health` first when no token cookie is in the jar yet.
    ///
    /// # Panics
    ///
    /// Panics if the server cannot be reached.
    pub async fn mutate(&self, method: Method, path: &str) -> RequestBuilder {
        if self.cookie(CSRF_COOKIE).is_none() {
            self.get("/health")
                .send()
                .await
                .expect("Failed to fetch CSRF cookie");
        }
        let token = self.cookie(CSRF_COOKIE).unwrap_or_default();
        self.client
            .request(method, self.url(path))
            .header(reqwest::header::ORIGIN, self.base.origin().ascii_serialization())
            .header(CSRF_HEADER, token)
    }

    /// Register a throwaway account and stay signed in.
    ///
    /// # Panics
    ///
    /// Panics if registration does not answer 201.
    pub async fn register(&self, password: &str) -> String {
        let email = unique_email();
        let resp = self
            .mutate(Method::POST, "/api/auth/register")
            .await
            .json(&serde_json::json!({
                "email": email,
                "password": password,
                "name": "Forge Tester",
            }))
            .send()
            .await
            .expect("Failed to register");
        assert_eq!(resp.status(), reqwest::StatusCode::CREATED);
        email
    }
}

impl Default for Browser {
    fn default() -> Self {
        Self::new()
    }
}

/// An email address nobody registered yet.
#[must_use]
pub fn unique_email() -> String {
    format!("forge-{}@example.com", uuid::Uuid::new_v4().simple())
}

/// A valid katana configuration body.
#[must_use]
pub fn katana_config() -> serde_json::Value {
    serde_json::json!({
        "handleColor": "#1a1a1a",
        "bladeTint": "#c0c0c0",
        "metalness": 0.8,
        "roughness": 0.2,
    })
}
