//! Stripe webhook endpoint.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use secrecy::ExposeSecret;
use serde_json::json;

use crate::error::{AppError, INVALID_JSON_MESSAGE, Result};
use crate::services::fulfillment::FulfillmentService;
use crate::services::stripe::webhook::{Event, verify_signature};
use crate::state::AppState;

/// Header carrying `t=..,v1=..`.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Receive a Stripe event.
///
/// Only `checkout.session.completed` is acted upon; other verified events
/// are acknowledged and ignored.
///
/// # Route
///
/// `POST /api/stripe/webhook`
pub async fn receive(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    let Some(secret) = state.config().stripe.webhook_secret.as_ref() else {
        return Err(
            AppError::Internal("STRIPE_WEBHOOK_SECRET is not set".to_string())
                .context("Webhook non configuré"),
        );
    };

    let Some(signature) = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
    else {
        return Err(AppError::BadRequest("Signature manquante".to_string()));
    };

    if let Err(err) = verify_signature(
        &body,
        signature,
        secret.expose_secret(),
        Utc::now().timestamp(),
    ) {
        tracing::warn!(error = %err, "Rejected Stripe webhook");
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Signature invalide", "details": err.to_string() })),
        )
            .into_response());
    }

    let event: Event = serde_json::from_slice(&body)
        .map_err(|_| AppError::BadRequest(INVALID_JSON_MESSAGE.to_string()))?;

    let session = event.completed_session().map_err(|e| {
        AppError::Internal(format!("unreadable checkout session in {:?}: {e}", event.id))
    })?;

    match session {
        Some(session) => {
            FulfillmentService::new(state.pool())
                .complete_session(&session)
                .await?;
        }
        None => tracing::debug!(kind = %event.kind, "Ignoring Stripe event"),
    }

    Ok(Json(json!({ "received": true })).into_response())
}
