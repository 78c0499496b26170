//! Quote repository: numbering, quotes and quote lines.

use chrono::{DateTime, Datelike, Utc};
use sqlx::{PgConnection, PgPool};

use katana_forge_core::pricing::{CalculatedLine, QuoteTotals};
use katana_forge_core::{
    AddressId, CustomerId, QuoteId, QuoteItemId, QuoteNumber, QuoteStatus, pricing::CURRENCY,
};

use super::{RepositoryError, cents};
use crate::models::Quote;

const QUOTE_COLUMNS: &str = "id, number, customer_id, shipping_address_id, billing_address_id, \
    status, currency, subtotal_cents, tax_cents, shipping_cents, total_cents, consent_at, \
    policy_version, pay_link, pdf_path, sent_at, created_at";

#[derive(sqlx::FromRow)]
struct QuoteRow {
    id: QuoteId,
    number: String,
    customer_id: CustomerId,
    shipping_address_id: AddressId,
    billing_address_id: AddressId,
    status: QuoteStatus,
    currency: String,
    subtotal_cents: i64,
    tax_cents: i64,
    shipping_cents: i64,
    total_cents: i64,
    consent_at: Option<DateTime<Utc>>,
    policy_version: Option<String>,
    pay_link: Option<String>,
    pdf_path: Option<String>,
    sent_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<QuoteRow> for Quote {
    type Error = RepositoryError;

    fn try_from(row: QuoteRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            number: QuoteNumber::parse(&row.number)
                .map_err(|e| RepositoryError::corrupt("quote number", e))?,
            customer_id: row.customer_id,
            shipping_address_id: row.shipping_address_id,
            billing_address_id: row.billing_address_id,
            status: row.status,
            currency: row.currency,
            totals: QuoteTotals {
                subtotal_cents: cents("subtotal_cents", row.subtotal_cents)?,
                tax_cents: cents("tax_cents", row.tax_cents)?,
                shipping_cents: cents("shipping_cents", row.shipping_cents)?,
                total_cents: cents("total_cents", row.total_cents)?,
            },
            consent_at: row.consent_at,
            policy_version: row.policy_version,
            pay_link: row.pay_link,
            pdf_path: row.pdf_path,
            sent_at: row.sent_at,
            created_at: row.created_at,
        })
    }
}

/// Everything needed to create a quote.
#[derive(Debug, Clone)]
pub struct NewQuote<'a> {
    pub number: QuoteNumber,
    pub customer_id: CustomerId,
    pub shipping_address_id: AddressId,
    pub billing_address_id: AddressId,
    pub totals: QuoteTotals,
    pub consent_at: DateTime<Utc>,
    pub policy_version: Option<&'a str>,
}

/// Repository for quotes.
pub struct QuoteRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> QuoteRepository<'a> {
    /// Create a new quote repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a quote by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: QuoteId) -> Result<Option<Quote>, RepositoryError> {
        let row: Option<QuoteRow> = sqlx::query_as(&format!(
            "SELECT {QUOTE_COLUMNS} FROM storefront.quote WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(Quote::try_from).transpose()
    }

    /// Record the pay link and stored PDF, and flag the quote as sent.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the quote vanished.
    pub async fn mark_sent(
        &self,
        id: QuoteId,
        pay_link: &str,
        pdf_path: &str,
    ) -> Result<Quote, RepositoryError> {
        let row: Option<QuoteRow> = sqlx::query_as(&format!(
            r"
            UPDATE storefront.quote
            SET pay_link = $2, pdf_path = $3, status = 'sent', sent_at = NOW(), updated_at = NOW()
            WHERE id = $1
            RETURNING {QUOTE_COLUMNS}
            "
        ))
        .bind(id)
        .bind(pay_link)
        .bind(pdf_path)
        .fetch_optional(self.pool)
        .await?;

        row.ok_or(RepositoryError::NotFound)?.try_into()
    }

    /// Allocate the next number of the year.
    ///
    /// Runs inside the caller's transaction so a rolled back checkout does
    /// not burn a number.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::DataCorruption` if the counter is not
    /// positive.
    pub async fn allocate_number(
        conn: &mut PgConnection,
        now: DateTime<Utc>,
    ) -> Result<QuoteNumber, RepositoryError> {
        let year = now.year();
        let counter: i64 = sqlx::query_scalar(
            r"
            INSERT INTO storefront.quote_counter (year, counter)
            VALUES ($1, 1)
            ON CONFLICT (year) DO UPDATE SET counter = storefront.quote_counter.counter + 1
            RETURNING counter
            ",
        )
        .bind(year)
        .fetch_one(conn)
        .await?;

        QuoteNumber::format(year, counter).map_err(|e| RepositoryError::corrupt("quote counter", e))
    }

    /// Insert a DRAFT quote.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` on a duplicate number.
    pub async fn create(
        conn: &mut PgConnection,
        quote: &NewQuote<'_>,
    ) -> Result<Quote, RepositoryError> {
        let row: QuoteRow = sqlx::query_as(&format!(
            r"
            INSERT INTO storefront.quote
                (id, number, customer_id, shipping_address_id, billing_address_id, status,
                 currency, subtotal_cents, tax_cents, shipping_cents, total_cents,
                 consent_at, policy_version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {QUOTE_COLUMNS}
            "
        ))
        .bind(QuoteId::random())
        .bind(quote.number.to_string())
        .bind(quote.customer_id)
        .bind(quote.shipping_address_id)
        .bind(quote.billing_address_id)
        .bind(QuoteStatus::Draft)
        .bind(CURRENCY)
        .bind(quote.totals.subtotal_cents)
        .bind(quote.totals.tax_cents)
        .bind(quote.totals.shipping_cents)
        .bind(quote.totals.total_cents)
        .bind(quote.consent_at)
        .bind(quote.policy_version)
        .fetch_one(conn)
        .await
        .map_err(|e| RepositoryError::unique_violation(e, "quote number"))?;

        row.try_into()
    }

    /// Insert the computed lines of a quote.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if an insert fails.
    pub async fn create_items(
        conn: &mut PgConnection,
        quote_id: QuoteId,
        lines: &[CalculatedLine],
    ) -> Result<(), RepositoryError> {
        for (position, line) in lines.iter().enumerate() {
            let position = i32::try_from(position)
                .map_err(|e| RepositoryError::DataCorruption(format!("too many lines: {e}")))?;
            let qty = i32::try_from(line.item.qty)
                .map_err(|e| RepositoryError::DataCorruption(format!("qty out of range: {e}")))?;

            sqlx::query(
                r"
                INSERT INTO storefront.quote_item
                    (id, quote_id, position, sku, name, qty, unit_cents, vat_rate_pct,
                     net_cents, tax_cents, gross_cents)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                ",
            )
            .bind(QuoteItemId::random())
            .bind(quote_id)
            .bind(position)
            .bind(&line.item.sku)
            .bind(&line.item.name)
            .bind(qty)
            .bind(line.item.unit_cents)
            .bind(i16::from(line.item.vat_rate_pct))
            .bind(line.net_cents)
            .bind(line.tax_cents)
            .bind(line.gross_cents)
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    }

    /// Lock a quote row for the rest of the transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lock(conn: &mut PgConnection, id: QuoteId) -> Result<Option<Quote>, RepositoryError> {
        let row: Option<QuoteRow> = sqlx::query_as(&format!(
            "SELECT {QUOTE_COLUMNS} FROM storefront.quote WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(conn)
        .await?;

        row.map(Quote::try_from).transpose()
    }

    /// Change the status of a quote.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn set_status(
        conn: &mut PgConnection,
        id: QuoteId,
        status: QuoteStatus,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE storefront.quote SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(conn)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn row(number: &str, total: i64) -> QuoteRow {
        QuoteRow {
            id: QuoteId::random(),
            number: number.to_owned(),
            customer_id: CustomerId::random(),
            shipping_address_id: AddressId::random(),
            billing_address_id: AddressId::random(),
            status: QuoteStatus::Sent,
            currency: "EUR".to_owned(),
            subtotal_cents: 10_000,
            tax_cents: 2_000,
            shipping_cents: 2_500,
            total_cents: total,
            consent_at: None,
            policy_version: Some("2024-05".to_owned()),
            pay_link: None,
            pdf_path: None,
            sent_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_quote_row_into_quote() {
        let quote = Quote::try_from(row("Q-2025-000042", 14_500)).unwrap();
        assert_eq!(quote.number.counter(), 42);
        assert_eq!(quote.totals.total_cents.get(), 14_500);
    }

    #[test]
    fn test_quote_row_corruption() {
        assert!(matches!(
            Quote::try_from(row("42", 14_500)),
            Err(RepositoryError::DataCorruption(_))
        ));
        assert!(matches!(
            Quote::try_from(row("Q-2025-000042", -5)),
            Err(RepositoryError::DataCorruption(_))
        ));
    }
}
