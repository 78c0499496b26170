//! Checkout flows.
//!
//! Two ways to pay:
//! - **Quote**: persist a numbered quote, open a Stripe session for it,
//!   render and store the PDF, then mail it with the pay link.
//! - **Pay now**: open a Stripe session straight from the basket; the
//!   order is only recorded when the webhook reports the payment.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use katana_forge_core::checkout::{CheckoutPayload, PayNowPayload};
use katana_forge_core::pricing::{CalculatedLine, Recalculated, recalculate_totals};
use katana_forge_core::{AddressKind, Cents, QuoteId, QuoteNumber};

use super::email::{EmailService, QuoteEmail};
use super::pdf::{QuoteDocument, render_quote};
use super::storage::PdfStorage;
use super::stripe::{LineItem, NewCheckoutSession, StripeClient, StripeError};
use crate::config::CompanyConfig;
use crate::db::customers::CustomerDetails;
use crate::db::quotes::NewQuote;
use crate::db::{CustomerRepository, QuoteRepository, RepositoryError};
use crate::error::AppError;
use crate::state::AppState;

const SUCCESS_PATH: &str = "/checkout/success";
const CANCEL_PATH: &str = "/checkout";

/// Identity of a freshly sent quote.
#[derive(Debug, Clone)]
pub struct QuoteCreated {
    pub quote_id: QuoteId,
    pub number: QuoteNumber,
}

/// Runs both checkout flows.
pub struct CheckoutService<'a> {
    pool: &'a PgPool,
    stripe: &'a StripeClient,
    storage: &'a dyn PdfStorage,
    email: &'a EmailService,
    company: &'a CompanyConfig,
    base_url: &'a str,
}

impl<'a> CheckoutService<'a> {
    /// Borrow everything the flows need from the application state.
    #[must_use]
    pub fn new(state: &'a AppState) -> Self {
        Self {
            pool: state.pool(),
            stripe: state.stripe(),
            storage: state.storage(),
            email: state.email(),
            company: &state.config().company,
            base_url: &state.config().base_url,
        }
    }

    // =========================================================================
    // Quote
    // =========================================================================

    /// Create, price, render, store and send a quote.
    ///
    /// Totals are recomputed from the items; the database work runs in one
    /// transaction, the external calls after it commits.
    ///
    /// # Errors
    ///
    /// Returns the first failing step. A quote whose transaction committed
    /// stays in the DRAFT state when a later step fails.
    #[tracing::instrument(skip_all, fields(items = payload.items.len()))]
    pub async fn create_quote(
        &self,
        payload: &CheckoutPayload,
        now: DateTime<Utc>,
    ) -> Result<QuoteCreated, AppError> {
        let Recalculated { lines, totals } =
            recalculate_totals(&payload.items, payload.shipping_cents)?;
        let billing = payload.billing_address();

        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        let customer = CustomerRepository::upsert(
            &mut tx,
            CustomerDetails {
                email: &payload.email,
                first_name: &payload.first_name,
                last_name: &payload.last_name,
                phone: payload.phone.as_deref(),
            },
        )
        .await?;
        let shipping_address = CustomerRepository::create_address(
            &mut tx,
            customer.id,
            AddressKind::Shipping,
            &payload.ship,
        )
        .await?;
        let billing_address =
            CustomerRepository::create_address(&mut tx, customer.id, AddressKind::Billing, billing)
                .await?;

        let number = QuoteRepository::allocate_number(&mut tx, now).await?;
        let quote = QuoteRepository::create(
            &mut tx,
            &NewQuote {
                number,
                customer_id: customer.id,
                shipping_address_id: shipping_address.id,
                billing_address_id: billing_address.id,
                totals,
                consent_at: payload.consent_at.unwrap_or(now),
                policy_version: payload.policy_version.as_deref(),
            },
        )
        .await?;
        QuoteRepository::create_items(&mut tx, quote.id, &lines).await?;

        tx.commit().await.map_err(RepositoryError::from)?;
        tracing::info!(quote_id = %quote.id, number = %quote.number, "Quote created");

        let session = quote_session(
            self.base_url,
            payload.email.as_str(),
            quote.id,
            &lines,
            totals.shipping_cents,
        )?;
        let pay_link = self
            .stripe
            .create_checkout_session(&session)
            .await?
            .into_url()?;

        let number_text = quote.number.to_string();
        let customer_name = format!("{} {}", payload.first_name, payload.last_name);
        let pdf = render_quote(&QuoteDocument {
            number: &number_text,
            issue_date: now.date_naive(),
            customer_name: &customer_name,
            customer_email: payload.email.as_str(),
            customer_phone: payload.phone.as_deref(),
            shipping: &payload.ship,
            billing,
            company: self.company,
            lines: &lines,
            totals: &totals,
            pay_link: Some(&pay_link),
        })?;

        let stored = self.storage.store(&number_text, pdf.clone()).await?;
        QuoteRepository::new(self.pool)
            .mark_sent(quote.id, &pay_link, &stored.path)
            .await?;

        let quote_id = quote.id.to_string();
        self.email
            .send_quote(&QuoteEmail {
                to: payload.email.as_str(),
                name: &customer_name,
                quote_number: &number_text,
                pay_link: &pay_link,
                pdf: &pdf,
                tags: &[("quoteId", &quote_id)],
            })
            .await?;

        Ok(QuoteCreated {
            quote_id: quote.id,
            number: quote.number,
        })
    }

    // =========================================================================
    // Pay now
    // =========================================================================

    /// Open a Stripe session for an immediate payment and return its URL.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Stripe` if Stripe rejects the session.
    #[tracing::instrument(skip_all, fields(items = payload.items.len()))]
    pub async fn pay_now(&self, payload: &PayNowPayload) -> Result<String, AppError> {
        let Recalculated { lines, totals } =
            recalculate_totals(&payload.items, payload.shipping_cents)?;

        let session = pay_now_session(
            self.base_url,
            payload.email.as_str(),
            &lines,
            totals.shipping_cents,
        )?;

        Ok(self
            .stripe
            .create_checkout_session(&session)
            .await?
            .into_url()?)
    }
}

// =============================================================================
// Session builders
// =============================================================================

fn line_items(lines: &[CalculatedLine]) -> Result<Vec<LineItem>, StripeError> {
    lines.iter().map(LineItem::from_line).collect()
}

/// Session paying a quote. The delivery line is always present.
fn quote_session(
    base_url: &str,
    email: &str,
    quote_id: QuoteId,
    lines: &[CalculatedLine],
    shipping: Cents,
) -> Result<NewCheckoutSession, StripeError> {
    let mut items = line_items(lines)?;
    items.push(LineItem::shipping(shipping));

    Ok(NewCheckoutSession {
        customer_email: email.to_string(),
        success_url: format!(
            "{base_url}{SUCCESS_PATH}?session_id={{CHECKOUT_SESSION_ID}}&quote={quote_id}"
        ),
        cancel_url: format!("{base_url}{CANCEL_PATH}"),
        metadata: vec![("quoteId".to_string(), quote_id.to_string())],
        line_items: items,
    })
}

/// Session for a direct payment. Delivery is only charged when non-zero.
fn pay_now_session(
    base_url: &str,
    email: &str,
    lines: &[CalculatedLine],
    shipping: Cents,
) -> Result<NewCheckoutSession, StripeError> {
    let mut items = line_items(lines)?;
    if shipping > Cents::ZERO {
        items.push(LineItem::shipping(shipping));
    }

    Ok(NewCheckoutSession {
        customer_email: email.to_string(),
        success_url: format!("{base_url}{SUCCESS_PATH}?session_id={{CHECKOUT_SESSION_ID}}"),
        cancel_url: format!("{base_url}{CANCEL_PATH}"),
        metadata: vec![("origin".to_string(), "direct".to_string())],
        line_items: items,
    })
}
