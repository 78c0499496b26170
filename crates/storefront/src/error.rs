//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server-side errors to
//! Sentry before responding to the client. All route handlers return
//! `Result<T, AppError>`; the body is always JSON:
//!
//! ```json
//! { "error": "Payload invalide", "issues": { "fieldErrors": {}, "formErrors": [] } }
//! ```

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use katana_forge_core::{MoneyError, ValidationErrors};
use serde::Serialize;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::services::email::EmailError;
use crate::services::pdf::PdfError;
use crate::services::storage::StorageError;
use crate::services::stripe::StripeError;

/// Generic message for anything that went wrong on our side.
pub const INTERNAL_ERROR_MESSAGE: &str = "Erreur interne du serveur";
/// Message for sign-in-required endpoints.
pub const UNAUTHENTICATED_MESSAGE: &str = "Non authentifie";
/// Message for unreadable request bodies.
pub const INVALID_JSON_MESSAGE: &str = "Payload JSON invalide";

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Stripe API call failed.
    #[error("Stripe error: {0}")]
    Stripe(#[from] StripeError),

    /// Quote PDF storage failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Sending an email failed.
    #[error("Email error: {0}")]
    Email(#[from] EmailError),

    /// Rendering a PDF failed.
    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),

    /// Amount arithmetic overflowed.
    #[error("Money error: {0}")]
    Money(#[from] MoneyError),

    /// Session store failure.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Request body parsed but failed validation.
    #[error("Validation failed: {message}")]
    Validation {
        message: &'static str,
        issues: Option<ValidationErrors>,
    },

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Caller may not touch this resource.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Resource already exists.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// A failure answered with a route-specific message.
    #[error("{message}: {source}")]
    Context {
        message: &'static str,
        #[source]
        source: Box<AppError>,
    },
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    issues: Option<&'a ValidationErrors>,
}

impl AppError {
    /// 422 with field-level issues.
    #[must_use]
    pub const fn invalid(message: &'static str, issues: ValidationErrors) -> Self {
        Self::Validation {
            message,
            issues: Some(issues),
        }
    }

    /// 401 for endpoints that need a signed-in user.
    #[must_use]
    pub fn unauthenticated() -> Self {
        Self::Unauthorized(UNAUTHENTICATED_MESSAGE.to_string())
    }

    /// Replace the client-facing message while keeping status and logging.
    #[must_use]
    pub fn context(self, message: &'static str) -> Self {
        Self::Context {
            message,
            source: Box::new(self),
        }
    }

    /// Turn any failure into a 500 with a route-specific message.
    ///
    /// The original error is kept as text for logs and Sentry.
    #[must_use]
    pub fn internal(self, message: &'static str) -> Self {
        Self::Context {
            message,
            source: Box::new(Self::Internal(self.to_string())),
        }
    }

    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Database(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
            Self::Database(RepositoryError::Ownership) => StatusCode::FORBIDDEN,
            Self::Database(RepositoryError::Conflict(_)) | Self::Conflict(_) => {
                StatusCode::CONFLICT
            }
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AuthError::UserAlreadyExists => StatusCode::CONFLICT,
                AuthError::InvalidOAuthState | AuthError::UnverifiedEmail => {
                    StatusCode::BAD_REQUEST
                }
                AuthError::OAuthNotConfigured => StatusCode::NOT_FOUND,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Context { source, .. } => source.status(),
            Self::Database(_)
            | Self::Stripe(_)
            | Self::Storage(_)
            | Self::Email(_)
            | Self::Pdf(_)
            | Self::Money(_)
            | Self::Session(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message. Server-side details never leave the process.
    fn public_message(&self) -> String {
        match self {
            Self::Auth(AuthError::InvalidCredentials) => "Identifiants invalides".to_string(),
            Self::Auth(AuthError::UserAlreadyExists) => {
                "Un compte existe deja avec cet email".to_string()
            }
            Self::Auth(AuthError::InvalidOAuthState) => "Session expirée, réessayez".to_string(),
            Self::Auth(AuthError::UnverifiedEmail) => "Email Google non vérifié".to_string(),
            Self::Auth(AuthError::OAuthNotConfigured) => {
                "Connexion Google indisponible".to_string()
            }
            Self::Validation { message, .. } | Self::Context { message, .. } => {
                (*message).to_string()
            }
            Self::BadRequest(msg)
            | Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::NotFound(msg)
            | Self::Conflict(msg) => msg.clone(),
            Self::Database(RepositoryError::NotFound) => "Ressource introuvable".to_string(),
            Self::Database(RepositoryError::Conflict(_)) => "Ressource déjà existante".to_string(),
            Self::Database(RepositoryError::Ownership) => {
                "Operation non autorisee sur ce katana".to_string()
            }
            Self::RateLimited => "Trop de requêtes".to_string(),
            _ => INTERNAL_ERROR_MESSAGE.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let message = self.public_message();
        let issues = match &self {
            Self::Validation { issues, .. } => issues.as_ref(),
            _ => None,
        };

        (
            status,
            Json(ErrorBody {
                error: &message,
                issues,
            }),
        )
            .into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for a shopper action.
///
/// ```rust,ignore
/// add_breadcrumb("checkout", "Quote created", Some(&[("quote_number", "Q-2025-000001")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    async fn body_json(err: AppError) -> serde_json::Value {
        let response = err.into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("Katana introuvable".to_string());
        assert_eq!(err.to_string(), "Not found: Katana introuvable");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("x".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(get_status(AppError::unauthenticated()), StatusCode::UNAUTHORIZED);
        assert_eq!(
            get_status(AppError::Forbidden("x".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::BadRequest("x".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::invalid("Payload invalide", ValidationErrors::new())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            get_status(AppError::Auth(AuthError::UserAlreadyExists)),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::Auth(AuthError::InvalidCredentials)),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(get_status(AppError::RateLimited), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            get_status(AppError::Money(MoneyError::Overflow)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_validation_body_carries_issues() {
        let mut issues = ValidationErrors::new();
        issues.add("email", "Email invalide");
        let body = body_json(AppError::invalid("Payload invalide", issues)).await;
        assert_eq!(body["error"], "Payload invalide");
        assert_eq!(body["issues"]["fieldErrors"]["email"][0], "Email invalide");
    }

    #[tokio::test]
    async fn test_internal_details_are_hidden() {
        let body = body_json(AppError::Internal("connection refused to 10.0.0.3".to_string())).await;
        assert_eq!(body["error"], INTERNAL_ERROR_MESSAGE);
        assert!(body.get("issues").is_none());
    }

    #[tokio::test]
    async fn test_context_replaces_message_keeps_status() {
        let err = AppError::Internal("smtp down".to_string())
            .context("Erreur lors de la création du devis");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(err).await;
        assert_eq!(body["error"], "Erreur lors de la création du devis");
    }

    #[tokio::test]
    async fn test_internal_context_forces_server_error() {
        let err = AppError::Conflict("numéro de devis déjà pris".to_string())
            .internal("Erreur lors de la création du devis");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().contains("numéro de devis déjà pris"));
        let body = body_json(err).await;
        assert_eq!(body["error"], "Erreur lors de la création du devis");
    }
}
