//! User preferences.

use axum::{Json, extract::State};
use katana_forge_core::HexColor;
use katana_forge_core::account::BackgroundInput;
use serde::Serialize;

use crate::db::{RepositoryError, UserRepository};
use crate::error::{AppError, Result};
use crate::extract::Valid;
use crate::middleware::RequireAuth;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackgroundResponse {
    pub background_color: HexColor,
}

/// Store the configurator background color.
///
/// # Route
///
/// `PUT /api/preferences/background`
pub async fn set_background(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Valid(color): Valid<BackgroundInput>,
) -> Result<Json<BackgroundResponse>> {
    let updated = UserRepository::new(state.pool())
        .set_background_color(user.id, &color)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => AppError::unauthenticated(),
            other => other.into(),
        })?;

    Ok(Json(BackgroundResponse {
        background_color: updated.background_color,
    }))
}
