//! Webhook signature verification and event payloads.

use std::collections::HashMap;

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Maximum age of a signed payload, in seconds.
pub const TOLERANCE_SECONDS: i64 = 300;

/// Event type handled by the storefront.
pub const CHECKOUT_SESSION_COMPLETED: &str = "checkout.session.completed";

/// Why a `Stripe-Signature` header was rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("unable to extract timestamp and signatures from header")]
    MalformedHeader,

    #[error("no signatures found matching the expected signature for payload")]
    NoMatch,

    #[error("timestamp outside the tolerance zone")]
    Expired,
}

/// Check a `Stripe-Signature: t=<unix>,v1=<hex>[,v1=<hex>..]` header.
///
/// The expected signature is HMAC-SHA256 of `"{t}.{payload}"` keyed by the
/// endpoint secret; any `v1` entry may match. Comparison is constant time.
///
/// # Errors
///
/// Returns a [`SignatureError`] describing the first failed check.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    now: i64,
) -> Result<(), SignatureError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => {
                if let Ok(bytes) = hex::decode(value) {
                    signatures.push(bytes);
                }
            }
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::MalformedHeader)?;
    if signatures.is_empty() {
        return Err(SignatureError::MalformedHeader);
    }

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::NoMatch)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);

    let matched = signatures
        .iter()
        .any(|candidate| mac.clone().verify_slice(candidate).is_ok());
    if !matched {
        return Err(SignatureError::NoMatch);
    }

    if timestamp < now - TOLERANCE_SECONDS {
        return Err(SignatureError::Expired);
    }

    Ok(())
}

// =============================================================================
// Payloads
// =============================================================================

/// Webhook event envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

impl Event {
    /// The completed checkout session carried by this event, if that is
    /// what it is.
    ///
    /// # Errors
    ///
    /// Returns the deserialization error when the object does not look
    /// like a checkout session.
    pub fn completed_session(&self) -> Result<Option<CompletedSession>, serde_json::Error> {
        if self.kind != CHECKOUT_SESSION_COMPLETED {
            return Ok(None);
        }
        serde_json::from_value(self.data.object.clone()).map(Some)
    }
}

/// The fields of a checkout session the storefront reads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompletedSession {
    pub id: String,
    pub customer_email: Option<String>,
    pub customer_details: Option<CustomerDetails>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub payment_intent: Option<PaymentIntentRef>,
    pub currency: Option<String>,
    pub amount_total: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerDetails {
    pub email: Option<String>,
    pub name: Option<String>,
}

/// `payment_intent` is an id unless Stripe was asked to expand it.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PaymentIntentRef {
    Id(String),
    Expanded { id: String },
}

impl CompletedSession {
    /// Quote paid by this session, from `metadata.quoteId`.
    #[must_use]
    pub fn quote_id(&self) -> Option<&str> {
        self.metadata
            .get("quoteId")
            .map(String::as_str)
            .filter(|id| !id.is_empty())
    }

    /// Payer email: customer details, then the prefilled email, then
    /// `metadata.email`.
    #[must_use]
    pub fn payer_email(&self) -> Option<&str> {
        self.customer_details
            .as_ref()
            .and_then(|details| details.email.as_deref())
            .or(self.customer_email.as_deref())
            .or_else(|| self.metadata.get("email").map(String::as_str))
    }

    /// Payer name as typed on the payment page.
    #[must_use]
    pub fn payer_name(&self) -> &str {
        self.customer_details
            .as_ref()
            .and_then(|details| details.name.as_deref())
            .unwrap_or_default()
    }

    /// Payment intent id, or the session id when there is none.
    #[must_use]
    pub fn payment_id(&self) -> &str {
        match &self.payment_intent {
            Some(PaymentIntentRef::Id(id) | PaymentIntentRef::Expanded { id }) => id,
            None => &self.id,
        }
    }

    /// Upper-cased currency, `EUR` by default.
    #[must_use]
    pub fn currency(&self) -> String {
        self.currency
            .as_deref()
            .map_or_else(|| "EUR".to_string(), str::to_uppercase)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_3f9a7c1e5b2d8a4f";
    const PAYLOAD: &[u8] = br#"{"type":"checkout.session.completed"}"#;

    fn sign(payload: &[u8], secret: &str, timestamp: i64) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{timestamp}.").as_bytes());
        mac.update(payload);
        format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn test_valid_signature() {
        let header = sign(PAYLOAD, SECRET, 1_700_000_000);
        assert_eq!(verify_signature(PAYLOAD, &header, SECRET, 1_700_000_010), Ok(()));
    }

    #[test]
    fn test_any_v1_may_match() {
        let good = sign(PAYLOAD, SECRET, 1_700_000_000);
        let good_sig = good.split_once(",v1=").unwrap().1;
        let header = format!("t=1700000000,v1={},v1={good_sig}", "00".repeat(32));
        assert_eq!(verify_signature(PAYLOAD, &header, SECRET, 1_700_000_000), Ok(()));
    }

    #[test]
    fn test_wrong_secret_or_payload() {
        let header = sign(PAYLOAD, "whsec_other", 1_700_000_000);
        assert_eq!(
            verify_signature(PAYLOAD, &header, SECRET, 1_700_000_000),
            Err(SignatureError::NoMatch)
        );
        let header = sign(PAYLOAD, SECRET, 1_700_000_000);
        assert_eq!(
            verify_signature(br#"{"tampered":true}"#, &header, SECRET, 1_700_000_000),
            Err(SignatureError::NoMatch)
        );
    }

    #[test]
    fn test_expired_timestamp() {
        let header = sign(PAYLOAD, SECRET, 1_700_000_000);
        assert_eq!(
            verify_signature(PAYLOAD, &header, SECRET, 1_700_000_000 + TOLERANCE_SECONDS + 1),
            Err(SignatureError::Expired)
        );
    }

    #[test]
    fn test_malformed_headers() {
        for header in ["garbage", "t=1700000000", "v1=abcd", "t=abc,v1=abcd"] {
            assert_eq!(
                verify_signature(PAYLOAD, header, SECRET, 1_700_000_000),
                Err(SignatureError::MalformedHeader),
                "{header}"
            );
        }
    }

    #[test]
    fn test_completed_session_fields() {
        let event: Event = serde_json::from_str(
            r#"{
                "id": "evt_1",
                "type": "checkout.session.completed",
                "data": {"object": {
                    "id": "cs_1",
                    "customer_email": "prefill@example.com",
                    "customer_details": {"email": "Payer@Example.com", "name": "Musashi Miyamoto"},
                    "metadata": {"quoteId": "q-1"},
                    "payment_intent": {"id": "pi_1", "object": "payment_intent"},
                    "currency": "eur",
                    "amount_total": 52900
                }}
            }"#,
        )
        .unwrap();
        let session = event.completed_session().unwrap().unwrap();
        assert_eq!(session.quote_id(), Some("q-1"));
        assert_eq!(session.payer_email(), Some("Payer@Example.com"));
        assert_eq!(session.payer_name(), "Musashi Miyamoto");
        assert_eq!(session.payment_id(), "pi_1");
        assert_eq!(session.currency(), "EUR");
    }

    #[test]
    fn test_session_defaults() {
        let session: CompletedSession = serde_json::from_str(
            r#"{"id": "cs_2", "metadata": {"email": "meta@example.com"}, "payment_intent": null}"#,
        )
        .unwrap();
        assert_eq!(session.quote_id(), None);
        assert_eq!(session.payer_email(), Some("meta@example.com"));
        assert_eq!(session.payer_name(), "");
        assert_eq!(session.payment_id(), "cs_2");
        assert_eq!(session.currency(), "EUR");
    }

    #[test]
    fn test_other_events_are_not_sessions() {
        let event: Event =
            serde_json::from_str(r#"{"type": "invoice.paid", "data": {"object": {}}}"#).unwrap();
        assert!(event.completed_session().unwrap().is_none());
    }
}
