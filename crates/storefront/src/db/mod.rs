//! Database operations for storefront `PostgreSQL`.
//!
//! ## Tables (schema `storefront`)
//!
//! - `user` - Shoppers with password or Google sign-in
//! - `katana` - Named configurations saved by a user
//! - `draft` - In-progress configuration per user or guest token
//! - `katana_quote` - Price estimates handed out by `POST /api/quotes`
//! - `customer`, `address` - Checkout identities (keyed by lowercased email)
//! - `quote_counter`, `quote`, `quote_item` - Numbered quotes and their lines
//! - `order` - Paid Stripe checkouts
//!
//! Sessions live in `tower_sessions.session`.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p katana-forge-cli -- migrate
//! ```

pub mod customers;
pub mod drafts;
pub mod katana_quotes;
pub mod katanas;
pub mod orders;
pub mod quotes;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use customers::CustomerRepository;
pub use drafts::DraftRepository;
pub use katana_quotes::KatanaQuoteRepository;
pub use katanas::KatanaRepository;
pub use orders::OrderRepository;
pub use quotes::QuoteRepository;
pub use users::UserRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// The entity belongs to someone else.
    #[error("operation not allowed for this owner")]
    Ownership,
}

impl RepositoryError {
    /// Map a unique violation to `Conflict`, anything else to `Database`.
    pub(crate) fn unique_violation(e: sqlx::Error, what: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_unique_violation()
        {
            return Self::Conflict(format!("{what} already exists"));
        }
        Self::Database(e)
    }

    /// Wrap a decode failure of a stored value.
    pub(crate) fn corrupt(what: &str, err: impl std::fmt::Display) -> Self {
        Self::DataCorruption(format!("invalid {what} in database: {err}"))
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Convert a stored BIGINT amount.
pub(crate) fn cents(what: &str, value: i64) -> Result<katana_forge_core::Cents, RepositoryError> {
    katana_forge_core::Cents::try_from(value).map_err(|e| RepositoryError::corrupt(what, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cents_rejects_negative() {
        assert!(matches!(
            cents("total_cents", -1),
            Err(RepositoryError::DataCorruption(_))
        ));
        assert_eq!(cents("total_cents", 2500).map(|c| c.get()).ok(), Some(2500));
    }

    #[test]
    fn test_non_unique_errors_stay_database_errors() {
        let err = RepositoryError::unique_violation(sqlx::Error::RowNotFound, "email");
        assert!(matches!(err, RepositoryError::Database(_)));
    }
}
