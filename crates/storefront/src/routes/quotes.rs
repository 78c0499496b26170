//! Configurator price estimates.

use axum::{Json, extract::State};
use katana_forge_core::katana::KatanaConfigInput;
use katana_forge_core::pricing::{PriceEstimate, estimate};

use crate::db::KatanaQuoteRepository;
use crate::error::Result;
use crate::extract::Valid;
use crate::middleware::OptionalAuth;
use crate::state::AppState;

/// Price and lead time for a configuration. Every estimate is recorded.
///
/// # Route
///
/// `POST /api/quotes`
pub async fn estimate_price(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    Valid(config): Valid<KatanaConfigInput>,
) -> Result<Json<PriceEstimate>> {
    let estimate = estimate(&config, state.config().pricing.base_price_eur);

    KatanaQuoteRepository::new(state.pool())
        .record(user.map(|u| u.id), &config, &estimate)
        .await?;

    Ok(Json(estimate))
}
