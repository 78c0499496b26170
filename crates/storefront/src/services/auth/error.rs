//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid credentials (wrong password or user not found).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// User already exists.
    #[error("user already exists")]
    UserAlreadyExists,

    /// OAuth `state` missing from the session or not matching the callback.
    #[error("invalid oauth state")]
    InvalidOAuthState,

    /// Google reported the account email as unverified.
    #[error("google account email is not verified")]
    UnverifiedEmail,

    /// Google sign-in is not configured.
    #[error("google oauth is not configured")]
    OAuthNotConfigured,

    /// Google answered with an error or an unexpected payload.
    #[error("oauth error: {0}")]
    OAuth(String),

    /// Transport failure while talking to Google.
    #[error("oauth request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error: {0}")]
    PasswordHash(String),
}
