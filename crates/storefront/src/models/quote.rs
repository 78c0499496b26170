//! Checkout domain types: customers, quotes and orders.

use chrono::{DateTime, Utc};

use katana_forge_core::checkout::Address;
use katana_forge_core::pricing::QuoteTotals;
use katana_forge_core::{
    AddressId, AddressKind, Cents, CustomerId, Email, OrderId, OrderStatus, QuoteId, QuoteNumber,
    QuoteStatus,
};

/// A buyer identified by email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Customer {
    pub id: CustomerId,
    pub email: Email,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
}

impl Customer {
    /// "First Last", as printed on documents.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_owned()
    }
}

/// An address attached to a customer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAddress {
    pub id: AddressId,
    pub kind: AddressKind,
    pub address: Address,
}

/// A numbered quote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    pub id: QuoteId,
    pub number: QuoteNumber,
    pub customer_id: CustomerId,
    pub shipping_address_id: AddressId,
    pub billing_address_id: AddressId,
    pub status: QuoteStatus,
    pub currency: String,
    pub totals: QuoteTotals,
    pub consent_at: Option<DateTime<Utc>>,
    pub policy_version: Option<String>,
    pub pay_link: Option<String>,
    pub pdf_path: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A paid (or pending) order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: CustomerId,
    pub quote_id: Option<QuoteId>,
    pub stripe_payment_id: Option<String>,
    pub status: OrderStatus,
    pub currency: String,
    pub total_cents: Cents,
}
