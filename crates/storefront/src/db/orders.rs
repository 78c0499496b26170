//! Order repository.
//!
//! Orders are only written by the Stripe webhook, always inside a
//! transaction.

use sqlx::PgConnection;

use katana_forge_core::{Cents, CustomerId, OrderId, OrderStatus, QuoteId};

use super::{RepositoryError, cents};
use crate::models::Order;

const ORDER_COLUMNS: &str =
    "id, customer_id, quote_id, stripe_payment_id, status, currency, total_cents";

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    customer_id: CustomerId,
    quote_id: Option<QuoteId>,
    stripe_payment_id: Option<String>,
    status: OrderStatus,
    currency: String,
    total_cents: i64,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            customer_id: row.customer_id,
            quote_id: row.quote_id,
            stripe_payment_id: row.stripe_payment_id,
            status: row.status,
            currency: row.currency,
            total_cents: cents("total_cents", row.total_cents)?,
        })
    }
}

/// A paid order to insert.
#[derive(Debug, Clone)]
pub struct NewOrder<'a> {
    pub customer_id: CustomerId,
    pub quote_id: Option<QuoteId>,
    pub stripe_payment_id: &'a str,
    pub currency: &'a str,
    pub total_cents: Cents,
}

/// Repository for orders.
pub struct OrderRepository;

impl OrderRepository {
    /// The order created from a quote, if any.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_quote(
        conn: &mut PgConnection,
        quote_id: QuoteId,
    ) -> Result<Option<Order>, RepositoryError> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            r#"SELECT {ORDER_COLUMNS} FROM storefront."order" WHERE quote_id = $1 FOR UPDATE"#
        ))
        .bind(quote_id)
        .fetch_optional(conn)
        .await?;

        row.map(Order::try_from).transpose()
    }

    /// The order paid by a Stripe payment, if any.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_payment_id(
        conn: &mut PgConnection,
        payment_id: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            r#"SELECT {ORDER_COLUMNS} FROM storefront."order" WHERE stripe_payment_id = $1 FOR UPDATE"#
        ))
        .bind(payment_id)
        .fetch_optional(conn)
        .await?;

        row.map(Order::try_from).transpose()
    }

    /// Insert a PAID order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the quote or payment already
    /// has an order.
    pub async fn create_paid(
        conn: &mut PgConnection,
        order: &NewOrder<'_>,
    ) -> Result<Order, RepositoryError> {
        let row: OrderRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO storefront."order"
                (id, customer_id, quote_id, stripe_payment_id, status, currency, total_cents)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(OrderId::random())
        .bind(order.customer_id)
        .bind(order.quote_id)
        .bind(order.stripe_payment_id)
        .bind(OrderStatus::Paid)
        .bind(order.currency)
        .bind(order.total_cents)
        .fetch_one(conn)
        .await
        .map_err(|e| RepositoryError::unique_violation(e, "order"))?;

        row.try_into()
    }

    /// Flag an order as paid by `payment_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn mark_paid(
        conn: &mut PgConnection,
        id: OrderId,
        payment_id: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            UPDATE storefront."order"
            SET status = $2, stripe_payment_id = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(OrderStatus::Paid)
        .bind(payment_id)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Flag an order as paid and refresh its amount.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn mark_paid_with_amount(
        conn: &mut PgConnection,
        id: OrderId,
        currency: &str,
        total_cents: Cents,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            UPDATE storefront."order"
            SET status = $2, currency = $3, total_cents = $4, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(OrderStatus::Paid)
        .bind(currency)
        .bind(total_cents)
        .execute(conn)
        .await?;
        Ok(())
    }
}
