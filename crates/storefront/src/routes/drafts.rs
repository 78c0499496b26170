//! Draft configurations.
//!
//! Signed-in users have one draft. Guests have one draft per browser,
//! found through the `draft_id` cookie.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, HeaderValue, header},
    response::{AppendHeaders, IntoResponse, Response},
};
use katana_forge_core::drafts::{DraftContentInput, DraftSnapshot, DraftSnapshotInput};
use serde::Serialize;
use tower_sessions::cookie::{Cookie, SameSite, time::Duration};

use crate::db::DraftRepository;
use crate::error::Result;
use crate::extract::{Valid, optional_body};
use crate::middleware::csrf::cookie_value;
use crate::middleware::{OptionalAuth, RequireAuth};
use crate::models::Draft;
use crate::state::AppState;

/// Guest token cookie.
pub const DRAFT_COOKIE: &str = "draft_id";

/// Lifetime of the guest cookie (30 days).
const DRAFT_COOKIE_MAX_AGE_DAYS: i64 = 30;

/// `{ "draft": .. }`, `null` when there is none.
#[derive(Debug, Serialize)]
pub struct DraftResponse {
    pub draft: Option<DraftSnapshot>,
}

impl DraftResponse {
    fn from_draft(draft: Option<&Draft>) -> Json<Self> {
        Json(Self {
            draft: draft.map(Draft::snapshot),
        })
    }
}

fn guest_cookie(token: &str, secure: bool) -> Option<HeaderValue> {
    let cookie = Cookie::build((DRAFT_COOKIE, token.to_owned()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(Duration::days(DRAFT_COOKIE_MAX_AGE_DAYS))
        .build();
    HeaderValue::from_str(&cookie.to_string()).ok()
}

fn expired_cookie() -> Option<HeaderValue> {
    let cookie = Cookie::build((DRAFT_COOKIE, ""))
        .path("/")
        .max_age(Duration::ZERO)
        .build();
    HeaderValue::from_str(&cookie.to_string()).ok()
}

fn with_cookie(body: Json<DraftResponse>, cookie: Option<HeaderValue>) -> Response {
    let headers = cookie.map(|value| (header::SET_COOKIE, value));
    (AppendHeaders(headers), body).into_response()
}

/// The caller's draft.
///
/// # Route
///
/// `GET /api/drafts`
pub async fn show(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    headers: HeaderMap,
) -> Result<Response> {
    let drafts = DraftRepository::new(state.pool());

    if let Some(user) = user {
        let draft = drafts.find_by_owner(user.id).await?;
        return Ok(DraftResponse::from_draft(draft.as_ref()).into_response());
    }

    let draft = match cookie_value(&headers, DRAFT_COOKIE) {
        Some(token) => drafts.find_by_guest(&token).await?,
        None => None,
    };

    let cookie = draft
        .as_ref()
        .and_then(|d| d.guest_token.as_deref())
        .and_then(|token| guest_cookie(token, state.config().is_secure()));

    Ok(with_cookie(
        DraftResponse::from_draft(draft.as_ref()),
        cookie,
    ))
}

/// Create or replace the caller's draft.
///
/// # Route
///
/// `PUT /api/drafts`
pub async fn save(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    headers: HeaderMap,
    Valid(content): Valid<DraftContentInput>,
) -> Result<Response> {
    let drafts = DraftRepository::new(state.pool());

    if let Some(user) = user {
        let draft = drafts.save_for_owner(user.id, &content).await?;
        return Ok(with_cookie(
            DraftResponse::from_draft(Some(&draft)),
            expired_cookie(),
        ));
    }

    let token = cookie_value(&headers, DRAFT_COOKIE);
    let draft = drafts.save_for_guest(token.as_deref(), &content).await?;
    let cookie = draft
        .guest_token
        .as_deref()
        .and_then(|token| guest_cookie(token, state.config().is_secure()));

    Ok(with_cookie(DraftResponse::from_draft(Some(&draft)), cookie))
}

/// Fold the guest draft and a browser copy into the user's draft.
///
/// The body is an optional local snapshot; an empty or unreadable body
/// means there is none.
///
/// # Route
///
/// `POST /api/drafts/merge`
pub async fn merge(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    let local = optional_body::<DraftSnapshotInput>(&body)?;
    let guest_token = cookie_value(&headers, DRAFT_COOKIE);

    let draft = DraftRepository::new(state.pool())
        .merge_into_owner(user.id, guest_token.as_deref(), local.as_ref())
        .await?;

    tracing::info!(
        user_id = %user.id,
        had_guest = guest_token.is_some(),
        had_local = local.is_some(),
        kept = draft.is_some(),
        "Drafts merged"
    );

    Ok(with_cookie(
        DraftResponse::from_draft(draft.as_ref()),
        expired_cookie(),
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_guest_cookie_attributes() {
        let value = guest_cookie("3b1d7c2e", true).unwrap();
        let value = value.to_str().unwrap();
        assert!(value.starts_with("draft_id=3b1d7c2e"));
        assert!(value.contains("HttpOnly"));
        assert!(value.contains("SameSite=Lax"));
        assert!(value.contains("Secure"));
        assert!(value.contains("Max-Age=2592000"));
    }

    #[test]
    fn test_expired_cookie_clears_token() {
        let value = expired_cookie().unwrap();
        let value = value.to_str().unwrap();
        assert!(value.starts_with("draft_id=;"));
        assert!(value.contains("Max-Age=0"));
    }
}
