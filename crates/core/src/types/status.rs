//! Status enums for quotes, orders and addresses.

use serde::{Deserialize, Serialize};

/// Lifecycle of a quote.
///
/// A quote is created as `Draft` inside the checkout transaction, moves to
/// `Sent` once the PDF is stored and the email goes out, and ends as
/// `Converted` when Stripe reports the payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "storefront.quote_status", rename_all = "snake_case")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuoteStatus {
    #[default]
    Draft,
    Sent,
    Converted,
}

impl QuoteStatus {
    /// Whether a payment has already turned this quote into an order.
    #[must_use]
    pub const fn is_converted(self) -> bool {
        matches!(self, Self::Converted)
    }
}

/// Order payment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "storefront.order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    Pending,
    Paid,
}

/// Role of an address attached to a customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "storefront.address_kind", rename_all = "snake_case")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AddressKind {
    Shipping,
    Billing,
}

impl std::fmt::Display for QuoteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Draft => write!(f, "DRAFT"),
            Self::Sent => write!(f, "SENT"),
            Self::Converted => write!(f, "CONVERTED"),
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Paid => write!(f, "PAID"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_upper_case() {
        assert_eq!(
            serde_json::to_string(&QuoteStatus::Converted).unwrap(),
            "\"CONVERTED\""
        );
        assert_eq!(serde_json::to_string(&OrderStatus::Paid).unwrap(), "\"PAID\"");
        assert_eq!(
            serde_json::to_string(&AddressKind::Billing).unwrap(),
            "\"BILLING\""
        );
    }

    #[test]
    fn test_defaults() {
        assert_eq!(QuoteStatus::default(), QuoteStatus::Draft);
        assert_eq!(OrderStatus::default(), OrderStatus::Pending);
        assert!(!QuoteStatus::Sent.is_converted());
        assert!(QuoteStatus::Converted.is_converted());
    }
}
