//! Saved katanas of the signed-in user.

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use katana_forge_core::KatanaId;
use katana_forge_core::katana::NewKatanaInput;
use serde::Serialize;

use crate::db::{KatanaRepository, RepositoryError};
use crate::error::{AppError, Result};
use crate::extract::{Valid, validate_json};
use crate::middleware::RequireAuth;
use crate::models::Katana;
use crate::state::AppState;

use super::auth::SuccessResponse;

const NOT_FOUND_MESSAGE: &str = "Katana introuvable";

#[derive(Debug, Serialize)]
pub struct KatanaListResponse {
    pub katanas: Vec<Katana>,
}

#[derive(Debug, Serialize)]
pub struct KatanaResponse {
    pub katana: Katana,
}

/// Unknown ids, malformed ids and katanas of other users all look the same.
fn not_found(err: RepositoryError) -> AppError {
    match err {
        RepositoryError::NotFound => AppError::NotFound(NOT_FOUND_MESSAGE.to_string()),
        other => other.into(),
    }
}

fn parse_id(raw: &str) -> Result<KatanaId> {
    raw.parse()
        .map_err(|_| AppError::NotFound(NOT_FOUND_MESSAGE.to_string()))
}

/// `GET /api/katanas`
pub async fn list(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<KatanaListResponse>> {
    let katanas = KatanaRepository::new(state.pool())
        .list_by_owner(user.id)
        .await?;
    Ok(Json(KatanaListResponse { katanas }))
}

/// `POST /api/katanas`
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Valid(katana): Valid<NewKatanaInput>,
) -> Result<(StatusCode, Json<KatanaResponse>)> {
    let katana = KatanaRepository::new(state.pool())
        .create(user.id, &katana)
        .await?;
    tracing::info!(katana_id = %katana.id, "Katana saved");
    Ok((StatusCode::CREATED, Json(KatanaResponse { katana })))
}

/// `GET /api/katanas/{id}`
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<String>,
) -> Result<Json<KatanaResponse>> {
    let katana = KatanaRepository::new(state.pool())
        .find_owned(parse_id(&id)?, user.id)
        .await
        .map_err(not_found)?;
    Ok(Json(KatanaResponse { katana }))
}

/// `PUT /api/katanas/{id}`
///
/// A katana the user cannot see answers 404 whatever the body holds.
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<String>,
    body: std::result::Result<Json<NewKatanaInput>, JsonRejection>,
) -> Result<Json<KatanaResponse>> {
    let katanas = KatanaRepository::new(state.pool());
    let existing = katanas
        .find_owned(parse_id(&id)?, user.id)
        .await
        .map_err(not_found)?;

    let katana = validate_json::<NewKatanaInput>(body)?;
    let katana = katanas
        .update(existing.id, user.id, &katana)
        .await
        .map_err(not_found)?;
    Ok(Json(KatanaResponse { katana }))
}

/// `DELETE /api/katanas/{id}`
pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>> {
    KatanaRepository::new(state.pool())
        .remove(parse_id(&id)?, user.id)
        .await
        .map_err(not_found)?;
    Ok(Json(SuccessResponse { success: true }))
}
