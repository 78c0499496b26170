//! Katana Forge storefront library.
//!
//! The JSON API behind the katana configurator: accounts, saved katanas,
//! drafts, cart, quotes and Stripe payments. The binary in `main.rs` wires
//! configuration, Sentry and the database around [`app`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use axum::{
    Router,
    extract::State,
    http::{Request, StatusCode},
    middleware::{from_fn, from_fn_with_state},
    routing::get,
};
use tower_http::trace::TraceLayer;
use tower_sessions::SessionStore;

use crate::middleware::{
    CsrfConfig, csrf_middleware, request_id_middleware, security_headers_middleware,
    session_layer,
};
use crate::state::AppState;

/// Build the application router around a session store.
///
/// Sentry layers are added by the binary, outside of this stack.
pub fn app<S: SessionStore + Clone>(state: AppState, store: S) -> Router {
    let config = state.config();
    let csrf = CsrfConfig {
        allowed_origin: config.base_origin(),
        secure: config.is_secure(),
    };
    let sessions = session_layer(store, config);

    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(routes::routes())
        .layer(from_fn_with_state(csrf, csrf_middleware))
        .layer(sessions)
        .layer(from_fn(security_headers_middleware))
        .layer(from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<axum::body::Body>| {
            tracing::info_span!(
                "request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = tracing::field::Empty,
            )
        }))
        .with_state(state)
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
