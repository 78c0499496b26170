//! Double-submit CSRF protection for the JSON API.
//!
//! Mutating requests under `/api/` must come from the storefront origin and
//! echo the `kf.csrf` cookie in the `x-csrf-token` header. Responses to
//! browsers without the cookie set a fresh one that the frontend can read.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, Method, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use rand::RngCore;
use tower_sessions::cookie::{Cookie, SameSite};

use crate::error::AppError;

/// Cookie holding the token.
pub const CSRF_COOKIE: &str = "kf.csrf";
/// Header the frontend copies the token into.
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Mutations under `/api/` that skip the check. Stripe signs its webhook
/// instead; the Google OAuth endpoints live outside `/api/`.
const EXEMPT_PATHS: &[&str] = &["/api/stripe/webhook"];

/// Settings for [`csrf_middleware`].
#[derive(Debug, Clone)]
pub struct CsrfConfig {
    /// Origin accepted in the `Origin` header, e.g. `https://kfor.ge`.
    pub allowed_origin: String,
    /// Mark the cookie `Secure`.
    pub secure: bool,
}

/// Check mutating API calls and hand out the token cookie.
pub async fn csrf_middleware(
    State(config): State<CsrfConfig>,
    request: Request,
    next: Next,
) -> Response {
    let cookie_token = cookie_value(request.headers(), CSRF_COOKIE);

    if needs_check(request.method(), request.uri().path())
        && let Err(err) = check_request(request.headers(), cookie_token.as_deref(), &config)
    {
        tracing::warn!(
            path = %request.uri().path(),
            reason = %err,
            "Rejected cross-site request"
        );
        return err.into_response();
    }

    let mut response = next.run(request).await;

    if cookie_token.is_none() {
        let cookie = Cookie::build((CSRF_COOKIE, generate_token()))
            .path("/")
            .http_only(false)
            .same_site(SameSite::Lax)
            .secure(config.secure)
            .build();
        if let Ok(value) = HeaderValue::from_str(&cookie.to_string()) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }

    response
}

fn needs_check(method: &Method, path: &str) -> bool {
    let mutation = matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    );
    mutation && path.starts_with("/api/") && !EXEMPT_PATHS.contains(&path)
}

fn check_request(
    headers: &HeaderMap,
    cookie_token: Option<&str>,
    config: &CsrfConfig,
) -> Result<(), AppError> {
    if let Some(origin) = headers.get(header::ORIGIN)
        && origin.as_bytes() != config.allowed_origin.as_bytes()
    {
        return Err(AppError::Forbidden("Origine non autorisée".to_string()));
    }

    let header_token = headers
        .get(CSRF_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty());

    match (header_token, cookie_token.filter(|value| !value.is_empty())) {
        (Some(sent), Some(expected)) if constant_time_eq(sent, expected) => Ok(()),
        (Some(_), Some(_)) => Err(AppError::Forbidden("CSRF token invalide".to_string())),
        _ => Err(AppError::Forbidden("CSRF token manquant".to_string())),
    }
}

/// Read one cookie from every `Cookie` header of a request.
#[must_use]
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == name)
        .map(|cookie| cookie.value().to_owned())
}

/// 32 random bytes, hex encoded.
fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Constant-time string comparison.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}
