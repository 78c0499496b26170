//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::StorefrontConfig;
use crate::services::auth::google::GoogleClient;
use crate::services::email::EmailService;
use crate::services::storage::{self, PdfStorage};
use crate::services::stripe::StripeClient;

/// Error building the application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("SMTP transport error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    stripe: StripeClient,
    storage: Arc<dyn PdfStorage>,
    email: EmailService,
    google: Option<GoogleClient>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the SMTP transport cannot be built.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, StateError> {
        let storage = storage::from_config(&config.storage);
        Self::with_storage(config, pool, storage)
    }

    /// Create the state around an explicit PDF store.
    ///
    /// # Errors
    ///
    /// Returns an error if the SMTP transport cannot be built.
    pub fn with_storage(
        config: StorefrontConfig,
        pool: PgPool,
        storage: Arc<dyn PdfStorage>,
    ) -> Result<Self, StateError> {
        let stripe = StripeClient::new(&config.stripe);
        let email = EmailService::new(&config.email)?;
        let google = config
            .google
            .as_ref()
            .map(|google| GoogleClient::new(google, &config.base_url));

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                stripe,
                storage,
                email,
                google,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the Stripe API client.
    #[must_use]
    pub fn stripe(&self) -> &StripeClient {
        &self.inner.stripe
    }

    /// Get the quote PDF store.
    #[must_use]
    pub fn storage(&self) -> &dyn PdfStorage {
        self.inner.storage.as_ref()
    }

    /// Get a reference to the SMTP mailer.
    #[must_use]
    pub fn email(&self) -> &EmailService {
        &self.inner.email
    }

    /// Google sign-in client, when configured.
    #[must_use]
    pub fn google(&self) -> Option<&GoogleClient> {
        self.inner.google.as_ref()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use sqlx::postgres::PgPoolOptions;

    use super::*;
    use crate::config::tests::test_config;

    /// State whose pool never connects until a query runs.
    pub(crate) fn test_state() -> AppState {
        let config = test_config();
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/katana_forge_test")
            .unwrap();
        AppState::new(config, pool).unwrap()
    }

    #[tokio::test]
    async fn test_state_without_google() {
        let state = test_state();
        assert!(state.google().is_none());
        assert_eq!(state.config().port, 3000);
    }
}
