//! Checkout: quote-and-pay, pay-now and quote PDF downloads.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use katana_forge_core::QuoteId;
use katana_forge_core::checkout::{CheckoutPayloadInput, PayNowPayloadInput};
use serde::{Deserialize, Serialize};

use crate::db::{CustomerRepository, QuoteRepository};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::extract::Valid;
use crate::services::checkout::CheckoutService;
use crate::services::storage::PDF_CONTENT_TYPE;
use crate::state::AppState;

const QUOTE_NOT_FOUND: &str = "Devis introuvable";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteCreatedResponse {
    pub ok: bool,
    pub quote_id: QuoteId,
    pub number: String,
}

#[derive(Debug, Serialize)]
pub struct PaymentUrlResponse {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct PdfQuery {
    pub email: Option<String>,
}

/// Create a numbered quote, email it with its PDF and a payment link.
///
/// # Route
///
/// `POST /api/checkout/quote`
pub async fn create_quote(
    State(state): State<AppState>,
    Valid(payload): Valid<CheckoutPayloadInput>,
) -> Result<Json<QuoteCreatedResponse>> {
    let created = CheckoutService::new(&state)
        .create_quote(&payload, Utc::now())
        .await
        .map_err(|e| e.internal("Erreur lors de la création du devis"))?;

    let number = created.number.to_string();
    add_breadcrumb("checkout", "Quote created", Some(&[("quote_number", &number)]));

    Ok(Json(QuoteCreatedResponse {
        ok: true,
        quote_id: created.quote_id,
        number,
    }))
}

/// Open a Stripe Checkout session for an immediate payment.
///
/// # Route
///
/// `POST /api/checkout/pay`
pub async fn pay_now(
    State(state): State<AppState>,
    Valid(payload): Valid<PayNowPayloadInput>,
) -> Result<Json<PaymentUrlResponse>> {
    let url = CheckoutService::new(&state).pay_now(&payload).await?;
    Ok(Json(PaymentUrlResponse { url }))
}

/// Download a quote PDF. The customer's email acts as the key.
///
/// # Route
///
/// `GET /api/quote/{id}/pdf?email=`
pub async fn quote_pdf(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<PdfQuery>,
) -> Result<Response> {
    let not_found = || AppError::NotFound(QUOTE_NOT_FOUND.to_string());

    let quote_id: QuoteId = id.parse().map_err(|_| not_found())?;
    let quote = QuoteRepository::new(state.pool())
        .get_by_id(quote_id)
        .await?
        .ok_or_else(not_found)?;
    let pdf_path = quote.pdf_path.as_deref().ok_or_else(not_found)?;

    let customer = CustomerRepository::new(state.pool())
        .get_by_id(quote.customer_id)
        .await?
        .ok_or_else(not_found)?;

    if !email_matches(query.email.as_deref(), customer.email.as_str()) {
        tracing::warn!(quote_id = %quote.id, "Quote PDF requested with a foreign email");
        return Err(AppError::Forbidden(
            "Accès non autorisé à ce devis".to_string(),
        ));
    }

    let bytes = state
        .storage()
        .load(pdf_path)
        .await
        .map_err(|e| AppError::from(e).context("Impossible de charger le PDF"))?;

    Ok((
        [
            (header::CONTENT_TYPE, PDF_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{}.pdf\"", quote.number),
            ),
            (
                header::CACHE_CONTROL,
                "private, max-age=86400".to_string(),
            ),
        ],
        bytes,
    )
        .into_response())
}

/// Case-insensitive comparison with the stored (lowercased) email.
fn email_matches(given: Option<&str>, stored: &str) -> bool {
    given.is_some_and(|email| email.trim().to_lowercase() == stored)
}
