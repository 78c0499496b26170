//! Order recording from completed Stripe checkouts.
//!
//! A session carrying `metadata.quoteId` converts that quote into a paid
//! order; any other session records a direct order keyed by its payment id.
//! Both paths are idempotent so Stripe may redeliver events freely.

use sqlx::PgPool;

use katana_forge_core::{Cents, Email, OrderId, QuoteId, QuoteStatus};

use super::stripe::webhook::CompletedSession;
use crate::db::orders::{NewOrder, OrderRepository};
use crate::db::quotes::QuoteRepository;
use crate::db::{CustomerRepository, RepositoryError};

/// First name used when Stripe has no payer name.
pub const DEFAULT_FIRST_NAME: &str = "Client";
/// Last name used when Stripe has no payer name.
pub const DEFAULT_LAST_NAME: &str = "Stripe";

/// What a completed session led to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fulfillment {
    /// The quote is now CONVERTED with a paid order.
    QuoteConverted { quote_id: QuoteId, order_id: OrderId },
    /// `metadata.quoteId` named no known quote.
    UnknownQuote,
    /// A direct order was created or refreshed.
    DirectOrder { order_id: OrderId },
    /// No usable payer email on the session.
    NoPayerEmail,
}

/// Records orders for completed checkouts.
pub struct FulfillmentService<'a> {
    pool: &'a PgPool,
}

impl<'a> FulfillmentService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Handle a `checkout.session.completed` payload.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the transaction fails; nothing is
    /// written in that case.
    #[tracing::instrument(skip_all, fields(session_id = %session.id))]
    pub async fn complete_session(
        &self,
        session: &CompletedSession,
    ) -> Result<Fulfillment, RepositoryError> {
        let outcome = match session.quote_id() {
            Some(raw) => match raw.parse::<QuoteId>() {
                Ok(quote_id) => self.convert_quote(quote_id, session).await?,
                Err(_) => Fulfillment::UnknownQuote,
            },
            None => self.record_direct_order(session).await?,
        };

        tracing::info!(outcome = ?outcome, "Checkout session fulfilled");
        Ok(outcome)
    }

    async fn convert_quote(
        &self,
        quote_id: QuoteId,
        session: &CompletedSession,
    ) -> Result<Fulfillment, RepositoryError> {
        let payment_id = session.payment_id();
        let mut tx = self.pool.begin().await?;

        let Some(quote) = QuoteRepository::lock(&mut tx, quote_id).await? else {
            return Ok(Fulfillment::UnknownQuote);
        };

        let order_id = match OrderRepository::find_by_quote(&mut tx, quote.id).await? {
            Some(order) => {
                OrderRepository::mark_paid(&mut tx, order.id, payment_id).await?;
                QuoteRepository::set_status(&mut tx, quote.id, QuoteStatus::Converted).await?;
                order.id
            }
            None => {
                QuoteRepository::set_status(&mut tx, quote.id, QuoteStatus::Converted).await?;
                OrderRepository::create_paid(
                    &mut tx,
                    &NewOrder {
                        customer_id: quote.customer_id,
                        quote_id: Some(quote.id),
                        stripe_payment_id: payment_id,
                        currency: &quote.currency,
                        total_cents: quote.totals.total_cents,
                    },
                )
                .await?
                .id
            }
        };

        tx.commit().await?;
        Ok(Fulfillment::QuoteConverted {
            quote_id: quote.id,
            order_id,
        })
    }

    async fn record_direct_order(
        &self,
        session: &CompletedSession,
    ) -> Result<Fulfillment, RepositoryError> {
        let Some(email) = session.payer_email().and_then(|raw| Email::parse(raw).ok()) else {
            return Ok(Fulfillment::NoPayerEmail);
        };

        let (first_name, last_name) = split_name(session.payer_name());
        let payment_id = session.payment_id();
        let currency = session.currency();
        let total_cents = Cents::try_from(session.amount_total.unwrap_or(0)).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Unusable amount_total on session, recording zero");
            Cents::ZERO
        });

        let mut tx = self.pool.begin().await?;

        let customer = CustomerRepository::upsert_name(
            &mut tx,
            &email,
            first_name.unwrap_or(DEFAULT_FIRST_NAME),
            last_name.unwrap_or(DEFAULT_LAST_NAME),
        )
        .await?;

        let order_id = match OrderRepository::find_by_payment_id(&mut tx, payment_id).await? {
            Some(order) => {
                OrderRepository::mark_paid_with_amount(&mut tx, order.id, &currency, total_cents)
                    .await?;
                order.id
            }
            None => {
                OrderRepository::create_paid(
                    &mut tx,
                    &NewOrder {
                        customer_id: customer.id,
                        quote_id: None,
                        stripe_payment_id: payment_id,
                        currency: &currency,
                        total_cents,
                    },
                )
                .await?
                .id
            }
        };

        tx.commit().await?;
        Ok(Fulfillment::DirectOrder { order_id })
    }
}

/// Split a full name at the first run of whitespace.
///
/// Empty parts come back as `None` so callers can substitute defaults.
#[must_use]
pub fn split_name(value: &str) -> (Option<&str>, Option<&str>) {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return (None, None);
    }
    match trimmed.split_once(char::is_whitespace) {
        Some((first, rest)) => {
            let rest = rest.trim_start();
            (Some(first), (!rest.is_empty()).then_some(rest))
        }
        None => (Some(trimmed), None),
    }
}
