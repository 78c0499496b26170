//! Validated JSON request bodies.
//!
//! `Valid<T>` deserializes the body into an unvalidated input type and runs
//! its validation. Unreadable JSON answers 400, type mismatches and rule
//! violations answer 422 with the route's message and field-level issues.

use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
};
use katana_forge_core::account::{BackgroundInput, LoginInput, RegisterInput, Registration};
use katana_forge_core::cart::{CartItem, CartItemInput};
use katana_forge_core::checkout::{
    CheckoutPayload, CheckoutPayloadInput, PayNowPayload, PayNowPayloadInput,
};
use katana_forge_core::drafts::{
    DraftContent, DraftContentInput, DraftSnapshot, DraftSnapshotInput, parse_snapshot,
};
use katana_forge_core::katana::{KatanaConfig, KatanaConfigInput, NewKatana, NewKatanaInput};
use katana_forge_core::{HexColor, ValidationErrors};
use serde::de::DeserializeOwned;

use crate::error::{AppError, INVALID_JSON_MESSAGE};
use crate::services::auth::Credentials;

/// A request body type with its validation rules.
pub trait Payload: DeserializeOwned + Send {
    /// The validated form handed to the handler.
    type Valid;

    /// `error` message of the 422 response.
    const INVALID_MESSAGE: &'static str;

    /// Check every rule.
    ///
    /// # Errors
    ///
    /// Returns the issues found.
    fn validate(self) -> Result<Self::Valid, ValidationErrors>;
}

/// Extractor for a validated JSON body.
pub struct Valid<T: Payload>(pub T::Valid);

impl<T> std::fmt::Debug for Valid<T>
where
    T: Payload,
    T::Valid: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Valid").field(&self.0).finish()
    }
}

impl<S, T> FromRequest<S> for Valid<T>
where
    S: Send + Sync,
    T: Payload,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        validate_json::<T>(Json::<T>::from_request(req, state).await).map(Self)
    }
}

/// Validate a JSON body extracted as `Result<Json<T>, JsonRejection>`.
///
/// Handlers that must resolve a resource before judging the body take the
/// raw result and call this afterwards.
///
/// # Errors
///
/// Returns 400 for unreadable JSON and 422 for shape or rule violations.
pub fn validate_json<T: Payload>(
    body: Result<Json<T>, JsonRejection>,
) -> Result<T::Valid, AppError> {
    let Json(input) = body.map_err(|rejection| json_rejection(&rejection, T::INVALID_MESSAGE))?;
    input
        .validate()
        .map_err(|issues| AppError::invalid(T::INVALID_MESSAGE, issues))
}

/// Map a JSON rejection: shape errors are validation failures, anything
/// else means the body could not be read as JSON.
#[must_use]
pub fn json_rejection(rejection: &JsonRejection, invalid_message: &'static str) -> AppError {
    match rejection {
        JsonRejection::JsonDataError(err) => {
            let mut issues = ValidationErrors::new();
            issues.add_form(err.body_text());
            AppError::invalid(invalid_message, issues)
        }
        _ => AppError::BadRequest(INVALID_JSON_MESSAGE.to_string()),
    }
}

/// Parse an optional JSON object body.
///
/// Bodies that are empty, unreadable, `{}` or not a JSON object or array
/// mean "nothing".
///
/// # Errors
///
/// Returns 422 when a non-empty object fails to parse or validate.
pub fn optional_body<T: Payload>(body: &[u8]) -> Result<Option<T::Valid>, AppError> {
    let Ok(value) = serde_json::from_slice::<serde_json::Value>(body) else {
        return Ok(None);
    };

    let present = match &value {
        serde_json::Value::Object(map) => !map.is_empty(),
        serde_json::Value::Array(items) => !items.is_empty(),
        _ => false,
    };
    if !present {
        return Ok(None);
    }

    let input: T = serde_json::from_value(value).map_err(|err| {
        let mut issues = ValidationErrors::new();
        issues.add_form(err.to_string());
        AppError::invalid(T::INVALID_MESSAGE, issues)
    })?;
    input
        .validate()
        .map(Some)
        .map_err(|issues| AppError::invalid(T::INVALID_MESSAGE, issues))
}

// =============================================================================
// Payload implementations
// =============================================================================

impl Payload for RegisterInput {
    type Valid = Registration;
    const INVALID_MESSAGE: &'static str = "Donnees invalides";

    fn validate(self) -> Result<Self::Valid, ValidationErrors> {
        Self::validate(&self)
    }
}

impl Payload for LoginInput {
    type Valid = Credentials;
    const INVALID_MESSAGE: &'static str = "Identifiants invalides";

    fn validate(self) -> Result<Self::Valid, ValidationErrors> {
        let email = Self::validate(&self)?;
        Ok(Credentials {
            email,
            password: self.password,
        })
    }
}

impl Payload for BackgroundInput {
    type Valid = HexColor;
    const INVALID_MESSAGE: &'static str = "Couleur invalide";

    fn validate(self) -> Result<Self::Valid, ValidationErrors> {
        Self::validate(&self)
    }
}

impl Payload for NewKatanaInput {
    type Valid = NewKatana;
    const INVALID_MESSAGE: &'static str = "Configuration invalide";

    fn validate(self) -> Result<Self::Valid, ValidationErrors> {
        Self::validate(&self)
    }
}

impl Payload for KatanaConfigInput {
    type Valid = KatanaConfig;
    const INVALID_MESSAGE: &'static str = "Configuration invalide";

    fn validate(self) -> Result<Self::Valid, ValidationErrors> {
        Self::validate(&self)
    }
}

impl Payload for DraftContentInput {
    type Valid = DraftContent;
    const INVALID_MESSAGE: &'static str = "Brouillon invalide";

    fn validate(self) -> Result<Self::Valid, ValidationErrors> {
        Self::validate(&self)
    }
}

impl Payload for DraftSnapshotInput {
    type Valid = DraftSnapshot;
    const INVALID_MESSAGE: &'static str = "Brouillon invalide";

    fn validate(self) -> Result<Self::Valid, ValidationErrors> {
        parse_snapshot(&self, chrono::Utc::now())
    }
}

impl Payload for CartItemInput {
    type Valid = CartItem;
    const INVALID_MESSAGE: &'static str = "Article invalide";

    fn validate(self) -> Result<Self::Valid, ValidationErrors> {
        Self::validate(&self)
    }
}

impl Payload for CheckoutPayloadInput {
    type Valid = CheckoutPayload;
    const INVALID_MESSAGE: &'static str = "Payload invalide";

    fn validate(self) -> Result<Self::Valid, ValidationErrors> {
        Self::validate(&self)
    }
}

impl Payload for PayNowPayloadInput {
    type Valid = PayNowPayload;
    const INVALID_MESSAGE: &'static str = "Payload invalide";

    fn validate(self) -> Result<Self::Valid, ValidationErrors> {
        Self::validate(&self)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::{StatusCode, header};

    use super::*;

    fn json_request(body: &str) -> Request {
        Request::builder()
            .method("POST")
            .uri("/api/katanas")
            .header(header::CONTENT_TYPE, "application/json")
            .body(axum::body::Body::from(body.to_owned()))
            .unwrap()
    }

    async fn extract(body: &str) -> Result<Valid<NewKatanaInput>, AppError> {
        Valid::<NewKatanaInput>::from_request(json_request(body), &()).await
    }

    #[tokio::test]
    async fn test_valid_body() {
        let Valid(katana) = extract(
            r##"{"name":"  Kage ","handleColor":"#112233","bladeTint":"#DDDDDD","metalness":0.5,"roughness":0.2}"##,
        )
        .await
        .unwrap();
        assert_eq!(katana.name, "Kage");
        assert_eq!(katana.config.blade_tint.as_str(), "#dddddd");
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let err = extract("{not json").await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_type_mismatch_is_unprocessable() {
        let err = extract(
            r##"{"name":"Kage","handleColor":"#112233","bladeTint":"#dddddd","metalness":"shiny","roughness":0.2}"##,
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_rule_violation_lists_fields() {
        let err = extract(
            r##"{"name":"K","handleColor":"red","bladeTint":"#dddddd","metalness":2,"roughness":0.2}"##,
        )
        .await
        .unwrap_err();
        let AppError::Validation {
            message,
            issues: Some(issues),
        } = err
        else {
            panic!("expected validation error");
        };
        assert_eq!(message, "Configuration invalide");
        assert!(issues.has_field("name"));
        assert!(issues.has_field("handleColor"));
        assert!(issues.has_field("metalness"));
    }

    #[test]
    fn test_optional_body_empty_forms() {
        assert!(optional_body::<DraftSnapshotInput>(b"").unwrap().is_none());
        assert!(optional_body::<DraftSnapshotInput>(b"  null ").unwrap().is_none());
        assert!(optional_body::<DraftSnapshotInput>(b"{}").unwrap().is_none());
        assert!(optional_body::<DraftSnapshotInput>(b"{oops").unwrap().is_none());
        assert!(optional_body::<DraftSnapshotInput>(b"42").unwrap().is_none());
    }

    #[test]
    fn test_optional_body_invalid_snapshot() {
        let err = optional_body::<DraftSnapshotInput>(br##"{"quantity":3}"##).unwrap_err();
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let err = optional_body::<DraftSnapshotInput>(b"[1]").unwrap_err();
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_optional_body_snapshot_keeps_timestamp() {
        let snapshot = optional_body::<DraftSnapshotInput>(
            br##"{"handleColor":"#112233","bladeTint":"#445566","metalness":0.1,"roughness":0.9,"quantity":2,"updatedAt":"2025-03-01T10:00:00Z"}"##,
        )
        .unwrap()
        .unwrap();
        assert_eq!(snapshot.content.quantity, 2);
        assert_eq!(
            snapshot.updated_at.unwrap().to_rfc3339(),
            "2025-03-01T10:00:00+00:00"
        );
    }
}
