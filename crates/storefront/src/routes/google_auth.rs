//! Google sign-in.
//!
//! - Login: store a random `state` in the session and redirect to Google
//! - Callback: check the state, exchange the code, sign the user in

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;

use crate::models::session_keys;
use crate::services::auth::{AuthService, generate_random_string};
use crate::state::AppState;

use super::auth::sign_in;

/// Where the browser lands after a failed sign-in.
const FAILURE_REDIRECT: &str = "/?auth_error=google";

/// Query parameters of the Google callback.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Start Google sign-in.
///
/// # Route
///
/// `GET /auth/google/login`
pub async fn login(State(state): State<AppState>, session: Session) -> Response {
    let Some(google) = state.google() else {
        tracing::warn!("Google sign-in requested but not configured");
        return Redirect::to(FAILURE_REDIRECT).into_response();
    };

    let oauth_state = generate_random_string(32);
    if let Err(e) = session
        .insert(session_keys::GOOGLE_OAUTH_STATE, &oauth_state)
        .await
    {
        tracing::error!(error = %e, "Failed to store OAuth state in session");
        return Redirect::to(FAILURE_REDIRECT).into_response();
    }

    Redirect::to(&google.authorization_url(&oauth_state)).into_response()
}

/// Finish Google sign-in.
///
/// # Route
///
/// `GET /auth/google/callback`
pub async fn callback(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let stored_state: Option<String> = session
        .remove(session_keys::GOOGLE_OAUTH_STATE)
        .await
        .ok()
        .flatten();

    if let Some(error) = query.error {
        tracing::warn!(%error, "Google sign-in denied");
        return Redirect::to(FAILURE_REDIRECT).into_response();
    }

    let (Some(code), Some(returned_state)) = (query.code, query.state) else {
        tracing::warn!("Google callback without code or state");
        return Redirect::to(FAILURE_REDIRECT).into_response();
    };

    if stored_state.as_deref() != Some(returned_state.as_str()) {
        tracing::warn!("Google OAuth state mismatch");
        return Redirect::to(FAILURE_REDIRECT).into_response();
    }

    let Some(google) = state.google() else {
        return Redirect::to(FAILURE_REDIRECT).into_response();
    };

    let profile = match google.fetch_profile(&code).await {
        Ok(profile) => profile,
        Err(e) => {
            tracing::error!(error = %e, "Failed to fetch Google profile");
            return Redirect::to(FAILURE_REDIRECT).into_response();
        }
    };

    let user = match AuthService::new(state.pool()).login_with_google(&profile).await {
        Ok(user) => user,
        Err(e) => {
            tracing::warn!(error = %e, "Google sign-in refused");
            return Redirect::to(FAILURE_REDIRECT).into_response();
        }
    };

    if let Err(e) = sign_in(&session, &user).await {
        tracing::error!(error = %e, "Failed to store user in session");
        return Redirect::to(FAILURE_REDIRECT).into_response();
    }

    tracing::info!(user_id = %user.id, "Signed in with Google");
    Redirect::to("/").into_response()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::{
        Router,
        body::Body,
        http::{Request, StatusCode, header},
        routing::get,
    };
    use tower::ServiceExt;
    use tower_sessions::{MemoryStore, SessionManagerLayer};

    use super::*;
    use crate::state::tests::test_state;

    fn app() -> Router {
        Router::new()
            .route("/auth/google/login", get(login))
            .route("/auth/google/callback", get(callback))
            .layer(SessionManagerLayer::new(MemoryStore::default()))
            .with_state(test_state())
    }

    #[tokio::test]
    async fn test_login_without_google_config_redirects_back() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/auth/google/login")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], FAILURE_REDIRECT);
    }

    #[tokio::test]
    async fn test_callback_rejects_unknown_state() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/auth/google/callback?code=abc&state=forged")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], FAILURE_REDIRECT);
    }
}
