//! Price estimates handed out by the configurator.

use sqlx::PgPool;
use sqlx::types::Json;

use katana_forge_core::katana::KatanaConfig;
use katana_forge_core::pricing::PriceEstimate;
use katana_forge_core::{KatanaQuoteId, UserId};

use super::RepositoryError;

/// Repository for `katana_quote` rows.
pub struct KatanaQuoteRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> KatanaQuoteRepository<'a> {
    /// Create a new repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Record an estimate and the configuration it was computed for.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn record(
        &self,
        user_id: Option<UserId>,
        config: &KatanaConfig,
        estimate: &PriceEstimate,
    ) -> Result<KatanaQuoteId, RepositoryError> {
        let id = KatanaQuoteId::random();
        let price = i64::try_from(estimate.price)
            .map_err(|e| RepositoryError::DataCorruption(format!("price out of range: {e}")))?;
        let weeks = i32::try_from(estimate.estimated_delivery_weeks)
            .map_err(|e| RepositoryError::DataCorruption(format!("lead time out of range: {e}")))?;

        sqlx::query(
            r"
            INSERT INTO storefront.katana_quote
                (id, user_id, price, currency, estimated_delivery_weeks, config)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(id)
        .bind(user_id)
        .bind(price)
        .bind(estimate.currency)
        .bind(weeks)
        .bind(Json(config))
        .execute(self.pool)
        .await?;

        Ok(id)
    }
}
