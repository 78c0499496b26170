//! Minimal Stripe REST client.
//!
//! Only Checkout Sessions are used: the storefront creates a hosted payment
//! page and learns about the outcome through the webhook.

pub mod webhook;

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

use katana_forge_core::Cents;
use katana_forge_core::money::MoneyError;
use katana_forge_core::pricing::{CalculatedLine, unit_amount_with_vat};

use crate::config::StripeConfig;

/// API version pinned on every request.
pub const API_VERSION: &str = "2024-06-20";

/// Name of the extra line charging delivery.
pub const SHIPPING_LINE_NAME: &str = "Frais de livraison";

/// Errors from the Stripe API.
#[derive(Debug, Error)]
pub enum StripeError {
    /// Transport failure.
    #[error("stripe request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Stripe answered with an error status.
    #[error("stripe api error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The session came back without a hosted page URL.
    #[error("stripe session {0} has no url")]
    MissingUrl(String),

    /// A line amount could not be computed.
    #[error("invalid line amount: {0}")]
    Amount(#[from] MoneyError),
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
}

// =============================================================================
// Checkout Sessions
// =============================================================================

/// One line of a checkout session, priced in EUR cents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineItem {
    pub name: String,
    pub quantity: u32,
    pub unit_amount: Cents,
    pub metadata: Vec<(String, String)>,
}

impl LineItem {
    /// Line for a priced item, VAT included in the unit amount.
    ///
    /// # Errors
    ///
    /// Returns `StripeError::Amount` if the amount overflows.
    pub fn from_line(line: &CalculatedLine) -> Result<Self, StripeError> {
        Ok(Self {
            name: line.item.name.clone(),
            quantity: line.item.qty,
            unit_amount: unit_amount_with_vat(line.item.unit_cents, line.item.vat_rate_pct)?,
            metadata: vec![
                ("sku".to_string(), line.item.sku.clone()),
                ("vatRate".to_string(), line.item.vat_rate_pct.to_string()),
            ],
        })
    }

    /// Delivery line.
    #[must_use]
    pub fn shipping(amount: Cents) -> Self {
        Self {
            name: SHIPPING_LINE_NAME.to_string(),
            quantity: 1,
            unit_amount: amount,
            metadata: Vec::new(),
        }
    }
}

/// Parameters of `POST /v1/checkout/sessions` (mode `payment`).
#[derive(Debug, Clone, Default)]
pub struct NewCheckoutSession {
    pub customer_email: String,
    pub success_url: String,
    pub cancel_url: String,
    pub metadata: Vec<(String, String)>,
    pub line_items: Vec<LineItem>,
}

impl NewCheckoutSession {
    /// Form fields in Stripe's bracket notation.
    #[must_use]
    pub fn form_fields(&self) -> Vec<(String, String)> {
        let mut fields = vec![
            ("mode".to_string(), "payment".to_string()),
            ("customer_email".to_string(), self.customer_email.clone()),
            ("success_url".to_string(), self.success_url.clone()),
            ("cancel_url".to_string(), self.cancel_url.clone()),
        ];

        for (key, value) in &self.metadata {
            fields.push((format!("metadata[{key}]"), value.clone()));
        }

        for (i, item) in self.line_items.iter().enumerate() {
            let prefix = format!("line_items[{i}]");
            fields.push((format!("{prefix}[quantity]"), item.quantity.to_string()));
            fields.push((format!("{prefix}[price_data][currency]"), "eur".to_string()));
            fields.push((
                format!("{prefix}[price_data][unit_amount]"),
                item.unit_amount.get().to_string(),
            ));
            fields.push((
                format!("{prefix}[price_data][product_data][name]"),
                item.name.clone(),
            ));
            for (key, value) in &item.metadata {
                fields.push((
                    format!("{prefix}[price_data][product_data][metadata][{key}]"),
                    value.clone(),
                ));
            }
        }

        fields
    }
}

/// A created checkout session.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

impl CheckoutSession {
    /// Hosted payment page URL.
    ///
    /// # Errors
    ///
    /// Returns `StripeError::MissingUrl` if Stripe did not return one.
    pub fn into_url(self) -> Result<String, StripeError> {
        self.url.ok_or(StripeError::MissingUrl(self.id))
    }
}

// =============================================================================
// Client
// =============================================================================

/// Stripe API client.
#[derive(Debug, Clone)]
pub struct StripeClient {
    inner: Arc<StripeClientInner>,
}

#[derive(Debug)]
struct StripeClientInner {
    client: reqwest::Client,
    secret_key: SecretString,
    api_base: String,
}

impl StripeClient {
    /// Create a new client.
    #[must_use]
    pub fn new(config: &StripeConfig) -> Self {
        Self {
            inner: Arc::new(StripeClientInner {
                client: reqwest::Client::new(),
                secret_key: config.secret_key.clone(),
                api_base: config.api_base.clone(),
            }),
        }
    }

    /// Create a checkout session.
    ///
    /// # Errors
    ///
    /// Returns `StripeError::Api` when Stripe rejects the request.
    #[tracing::instrument(skip(self, session), fields(lines = session.line_items.len()))]
    pub async fn create_checkout_session(
        &self,
        session: &NewCheckoutSession,
    ) -> Result<CheckoutSession, StripeError> {
        let url = format!("{}/v1/checkout/sessions", self.inner.api_base);

        let response = self
            .inner
            .client
            .post(&url)
            .bearer_auth(self.inner.secret_key.expose_secret())
            .header("Stripe-Version", API_VERSION)
            .form(&session.form_fields())
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&text)
                .ok()
                .and_then(|body| body.error.message)
                .unwrap_or(text);
            return Err(StripeError::Api { status, message });
        }

        let created: CheckoutSession = response.json().await?;
        tracing::info!(session_id = %created.id, "Stripe checkout session created");
        Ok(created)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use katana_forge_core::checkout::CheckoutItem;
    use katana_forge_core::pricing::recalculate_totals;

    use super::*;

    fn field<'a>(fields: &'a [(String, String)], key: &str) -> Option<&'a str> {
        fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_line_item_includes_vat() {
        let recalculated = recalculate_totals(
            &[CheckoutItem {
                sku: "KF-TACHI".to_string(),
                name: "Tachi".to_string(),
                qty: 2,
                unit_cents: Cents::new(10_001).unwrap(),
                vat_rate_pct: 20,
            }],
            Cents::ZERO,
        )
        .unwrap();
        let item = LineItem::from_line(&recalculated.lines[0]).unwrap();
        assert_eq!(item.unit_amount, Cents::new(12_001).unwrap());
        assert_eq!(item.quantity, 2);
        assert!(item.metadata.contains(&("vatRate".to_string(), "20".to_string())));
    }

    #[test]
    fn test_form_fields() {
        let session = NewCheckoutSession {
            customer_email: "aiko@example.com".to_string(),
            success_url: "http://localhost:3000/checkout/success".to_string(),
            cancel_url: "http://localhost:3000/checkout".to_string(),
            metadata: vec![("quoteId".to_string(), "abc".to_string())],
            line_items: vec![
                LineItem {
                    name: "Katana".to_string(),
                    quantity: 1,
                    unit_amount: Cents::new(50_400).unwrap(),
                    metadata: vec![("sku".to_string(), "KF-1".to_string())],
                },
                LineItem::shipping(Cents::new(2500).unwrap()),
            ],
        };
        let fields = session.form_fields();
        assert_eq!(field(&fields, "mode"), Some("payment"));
        assert_eq!(field(&fields, "metadata[quoteId]"), Some("abc"));
        assert_eq!(field(&fields, "line_items[0][price_data][unit_amount]"), Some("50400"));
        assert_eq!(
            field(&fields, "line_items[0][price_data][product_data][metadata][sku]"),
            Some("KF-1")
        );
        assert_eq!(
            field(&fields, "line_items[1][price_data][product_data][name]"),
            Some(SHIPPING_LINE_NAME)
        );
        assert_eq!(field(&fields, "line_items[1][price_data][currency]"), Some("eur"));
    }

    #[test]
    fn test_session_without_url() {
        let session = CheckoutSession {
            id: "cs_test_1".to_string(),
            url: None,
        };
        assert!(matches!(session.into_url(), Err(StripeError::MissingUrl(id)) if id == "cs_test_1"));
    }

    #[test]
    fn test_client_debug_redacts_secret_key() {
        let client = StripeClient::new(&StripeConfig {
            secret_key: SecretString::from("sk_test_4eC39HqLyjWDarjtT1zdp7dc"),
            webhook_secret: None,
            api_base: "http://localhost:12111".to_string(),
        });
        let debug = format!("{client:?}");
        assert!(!debug.contains("sk_test_4eC39HqLyjWDarjtT1zdp7dc"));
        assert!(debug.contains("localhost:12111"));
    }
}
