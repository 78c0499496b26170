//! Checkout payload validation.
//!
//! Request bodies deserialize into the `*Input` structs (unknown fields are
//! rejected at that stage) and are then validated into the typed payloads
//! used by the checkout service.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::money::Cents;
use crate::types::Email;
use crate::validation::{ValidationErrors, optional_trimmed, trimmed_len};

/// Highest VAT rate accepted on a line, in percent.
pub const MAX_VAT_RATE_PCT: u8 = 25;

static PHONE_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[0-9+().\-\s]{6,32}$").ok());

fn is_valid_phone(phone: &str) -> bool {
    PHONE_RE.as_ref().is_some_and(|re| re.is_match(phone))
}

// =============================================================================
// Addresses
// =============================================================================

/// Address as received from the checkout form.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AddressInput {
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub vat_number: Option<String>,
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

/// A validated postal address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub company: Option<String>,
    pub vat_number: Option<String>,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub postal_code: String,
    /// ISO 3166-1 alpha-2, uppercase.
    pub country: String,
}

impl AddressInput {
    /// Validate into an [`Address`].
    ///
    /// # Errors
    ///
    /// Returns every invalid field.
    pub fn validate(&self) -> Result<Address, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let company = optional_trimmed(&mut errors, "company", self.company.as_deref(), 120);
        let vat_number = optional_trimmed(&mut errors, "vatNumber", self.vat_number.as_deref(), 32);
        let line1 = trimmed_len(&mut errors, "line1", &self.line1, 1, 200);
        let line2 = optional_trimmed(&mut errors, "line2", self.line2.as_deref(), 200);
        let city = trimmed_len(&mut errors, "city", &self.city, 1, 120);
        let postal_code = trimmed_len(&mut errors, "postalCode", &self.postal_code, 2, 16);

        let country = self.country.trim().to_uppercase();
        let country = if country.chars().count() == 2 {
            Some(country)
        } else {
            errors.add("country", "Code pays sur 2 lettres attendu");
            None
        };

        match (line1, city, postal_code, country) {
            (Some(line1), Some(city), Some(postal_code), Some(country)) if errors.is_empty() => {
                Ok(Address {
                    company,
                    vat_number,
                    line1,
                    line2,
                    city,
                    postal_code,
                    country,
                })
            }
            _ => Err(errors),
        }
    }
}

impl Address {
    /// Lines as printed on a quote, without empty entries.
    #[must_use]
    pub fn printable_lines(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(5);
        if let Some(company) = &self.company {
            lines.push(company.clone());
        }
        lines.push(self.line1.clone());
        if let Some(line2) = &self.line2 {
            lines.push(line2.clone());
        }
        lines.push(format!("{} {}", self.postal_code, self.city));
        lines.push(self.country.clone());
        if let Some(vat) = &self.vat_number {
            lines.push(format!("TVA: {vat}"));
        }
        lines
    }
}

// =============================================================================
// Items
// =============================================================================

/// Line item as received from the client.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CheckoutItemInput {
    pub sku: String,
    pub name: String,
    pub qty: i64,
    pub unit_cents: i64,
    pub vat_rate_pct: i64,
}

/// A validated line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutItem {
    pub sku: String,
    pub name: String,
    pub qty: u32,
    pub unit_cents: Cents,
    pub vat_rate_pct: u8,
}

impl CheckoutItemInput {
    /// Validate a single line.
    ///
    /// # Errors
    ///
    /// Returns every invalid field.
    pub fn validate(&self) -> Result<CheckoutItem, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let item = self.validate_into(&mut errors);
        match item {
            Some(item) if errors.is_empty() => Ok(item),
            _ => Err(errors),
        }
    }

    fn validate_into(&self, errors: &mut ValidationErrors) -> Option<CheckoutItem> {
        let sku = trimmed_len(errors, "sku", &self.sku, 1, 64);
        let name = trimmed_len(errors, "name", &self.name, 1, 160);

        let qty = u32::try_from(self.qty).ok().filter(|qty| *qty >= 1);
        if qty.is_none() {
            errors.add("qty", "La quantité doit être un entier positif");
        }

        let unit_cents = Cents::try_from(self.unit_cents).ok();
        if unit_cents.is_none() {
            errors.add("unitCents", "Le prix unitaire doit être positif ou nul");
        }

        let vat_rate_pct = u8::try_from(self.vat_rate_pct)
            .ok()
            .filter(|rate| *rate <= MAX_VAT_RATE_PCT);
        if vat_rate_pct.is_none() {
            errors.add(
                "vatRatePct",
                format!("Le taux de TVA doit être compris entre 0 et {MAX_VAT_RATE_PCT}"),
            );
        }

        Some(CheckoutItem {
            sku: sku?,
            name: name?,
            qty: qty?,
            unit_cents: unit_cents?,
            vat_rate_pct: vat_rate_pct?,
        })
    }
}

fn validate_items(errors: &mut ValidationErrors, items: &[CheckoutItemInput]) -> Vec<CheckoutItem> {
    if items.is_empty() {
        errors.add("items", "Au moins un article requis");
        return Vec::new();
    }

    let mut valid = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let mut item_errors = ValidationErrors::new();
        if let Some(item) = item.validate_into(&mut item_errors) {
            valid.push(item);
        }
        if !item_errors.is_empty() {
            errors.extend_nested(&format!("items.{index}"), item_errors);
        }
    }
    valid
}

fn validate_shipping(errors: &mut ValidationErrors, shipping_cents: i64) -> Cents {
    Cents::try_from(shipping_cents).unwrap_or_else(|_| {
        errors.add("shippingCents", "Frais de livraison invalides");
        Cents::ZERO
    })
}

fn validate_email(errors: &mut ValidationErrors, email: &str) -> Option<Email> {
    Email::parse(email)
        .map_err(|_| errors.add("email", "Email invalide"))
        .ok()
}

// =============================================================================
// Quote checkout
// =============================================================================

/// Body of `POST /api/checkout/quote`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CheckoutPayloadInput {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub ship: AddressInput,
    pub bill_same: bool,
    #[serde(default)]
    pub bill: Option<AddressInput>,
    pub items: Vec<CheckoutItemInput>,
    pub shipping_cents: i64,
    pub consent: bool,
    #[serde(default)]
    pub consent_at: Option<String>,
    #[serde(default)]
    pub policy_version: Option<String>,
}

/// A validated quote checkout request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutPayload {
    pub email: Email,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub ship: Address,
    pub bill_same: bool,
    pub bill: Option<Address>,
    pub items: Vec<CheckoutItem>,
    pub shipping_cents: Cents,
    pub consent_at: Option<DateTime<Utc>>,
    pub policy_version: Option<String>,
}

impl CheckoutPayload {
    /// The billing address: the shipping address when `bill_same` is set.
    #[must_use]
    pub fn billing_address(&self) -> &Address {
        match (&self.bill, self.bill_same) {
            (Some(bill), false) => bill,
            _ => &self.ship,
        }
    }
}

impl CheckoutPayloadInput {
    /// Validate the whole payload.
    ///
    /// # Errors
    ///
    /// Returns every invalid field, with nested fields as `ship.line1` or
    /// `items.0.qty`.
    pub fn validate(&self) -> Result<CheckoutPayload, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let email = validate_email(&mut errors, &self.email);
        let first_name = trimmed_len(&mut errors, "firstName", &self.first_name, 1, 120);
        let last_name = trimmed_len(&mut errors, "lastName", &self.last_name, 1, 120);

        let phone = self.phone.as_deref().map(str::trim).and_then(|phone| {
            if is_valid_phone(phone) {
                Some(phone.to_owned())
            } else {
                errors.add("phone", "Numéro de téléphone invalide");
                None
            }
        });

        let ship = self
            .ship
            .validate()
            .map_err(|e| errors.extend_nested("ship", e))
            .ok();

        let bill = if self.bill_same {
            None
        } else {
            match &self.bill {
                Some(bill) => bill
                    .validate()
                    .map_err(|e| errors.extend_nested("bill", e))
                    .ok(),
                None => {
                    errors.add("bill", "Adresse de facturation requise");
                    None
                }
            }
        };

        let items = validate_items(&mut errors, &self.items);
        let shipping_cents = validate_shipping(&mut errors, self.shipping_cents);

        if !self.consent {
            errors.add("consent", "Le consentement RGPD est obligatoire");
        }

        let consent_at = self.consent_at.as_deref().and_then(|raw| {
            DateTime::parse_from_rfc3339(raw.trim())
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|_| errors.add("consentAt", "Date invalide"))
                .ok()
        });

        let policy_version =
            optional_trimmed(&mut errors, "policyVersion", self.policy_version.as_deref(), 32);

        match (email, first_name, last_name, ship) {
            (Some(email), Some(first_name), Some(last_name), Some(ship)) if errors.is_empty() => {
                Ok(CheckoutPayload {
                    email,
                    first_name,
                    last_name,
                    phone,
                    ship,
                    bill_same: self.bill_same,
                    bill,
                    items,
                    shipping_cents,
                    consent_at,
                    policy_version,
                })
            }
            _ => Err(errors),
        }
    }
}

// =============================================================================
// Pay now
// =============================================================================

/// Body of `POST /api/checkout/pay`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PayNowPayloadInput {
    pub email: String,
    pub items: Vec<CheckoutItemInput>,
    #[serde(default)]
    pub shipping_cents: i64,
}

/// A validated direct payment request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayNowPayload {
    pub email: Email,
    pub items: Vec<CheckoutItem>,
    pub shipping_cents: Cents,
}

impl PayNowPayloadInput {
    /// Validate the payload.
    ///
    /// # Errors
    ///
    /// Returns every invalid field.
    pub fn validate(&self) -> Result<PayNowPayload, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let email = validate_email(&mut errors, &self.email);
        let items = validate_items(&mut errors, &self.items);
        let shipping_cents = validate_shipping(&mut errors, self.shipping_cents);

        match email {
            Some(email) if errors.is_empty() => Ok(PayNowPayload {
                email,
                items,
                shipping_cents,
            }),
            _ => Err(errors),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_body() -> serde_json::Value {
        json!({
            "email": "  Aiko@Example.com ",
            "firstName": "Aiko",
            "lastName": "Tanaka",
            "phone": "+33 6 12 34 56 78",
            "ship": {
                "line1": "1 Rue de la Paix",
                "city": "Paris",
                "postalCode": "75002",
                "country": "fr",
                "company": "   "
            },
            "billSame": true,
            "items": [
                {"sku": "KATANA-001", "name": "Katana Kage", "qty": 1, "unitCents": 42000, "vatRatePct": 20}
            ],
            "shippingCents": 2500,
            "consent": true,
            "consentAt": "2024-05-01T10:00:00.000Z",
            "policyVersion": "2024-05"
        })
    }

    fn parse(body: serde_json::Value) -> Result<CheckoutPayload, ValidationErrors> {
        serde_json::from_value::<CheckoutPayloadInput>(body)
            .unwrap()
            .validate()
    }

    #[test]
    fn test_valid_payload_normalizes() {
        let payload = parse(valid_body()).unwrap();
        assert_eq!(payload.email.as_str(), "aiko@example.com");
        assert_eq!(payload.ship.country, "FR");
        assert_eq!(payload.ship.company, None);
        assert_eq!(payload.billing_address(), &payload.ship);
        assert_eq!(payload.items[0].unit_cents.get(), 42000);
        assert!(payload.consent_at.is_some());
    }

    #[test]
    fn test_consent_required() {
        let mut body = valid_body();
        body["consent"] = json!(false);
        let errors = parse(body).unwrap_err();
        assert_eq!(
            errors.field("consent"),
            ["Le consentement RGPD est obligatoire"]
        );
    }

    #[test]
    fn test_bill_required_when_not_same() {
        let mut body = valid_body();
        body["billSame"] = json!(false);
        let errors = parse(body).unwrap_err();
        assert_eq!(errors.field("bill"), ["Adresse de facturation requise"]);
    }

    #[test]
    fn test_separate_billing_address() {
        let mut body = valid_body();
        body["billSame"] = json!(false);
        body["bill"] = json!({
            "line1": "9 Quai du Port",
            "city": "Marseille",
            "postalCode": "13002",
            "country": "FR",
            "vatNumber": "FR12345678901"
        });
        let payload = parse(body).unwrap();
        assert_eq!(payload.billing_address().city, "Marseille");
    }

    #[test]
    fn test_item_errors_are_nested() {
        let mut body = valid_body();
        body["items"] = json!([
            {"sku": "", "name": "X", "qty": 0, "unitCents": -5, "vatRatePct": 30}
        ]);
        let errors = parse(body).unwrap_err();
        assert!(errors.has_field("items.0.sku"));
        assert!(errors.has_field("items.0.qty"));
        assert!(errors.has_field("items.0.unitCents"));
        assert!(errors.has_field("items.0.vatRatePct"));
    }

    #[test]
    fn test_empty_items_rejected() {
        let mut body = valid_body();
        body["items"] = json!([]);
        let errors = parse(body).unwrap_err();
        assert_eq!(errors.field("items"), ["Au moins un article requis"]);
    }

    #[test]
    fn test_invalid_phone_and_address() {
        let mut body = valid_body();
        body["phone"] = json!("call me");
        body["ship"]["country"] = json!("FRA");
        body["ship"]["postalCode"] = json!("7");
        let errors = parse(body).unwrap_err();
        assert!(errors.has_field("phone"));
        assert!(errors.has_field("ship.country"));
        assert!(errors.has_field("ship.postalCode"));
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let mut body = valid_body();
        body["coupon"] = json!("FREE");
        assert!(serde_json::from_value::<CheckoutPayloadInput>(body).is_err());
    }

    #[test]
    fn test_bad_consent_date() {
        let mut body = valid_body();
        body["consentAt"] = json!("yesterday");
        let errors = parse(body).unwrap_err();
        assert!(errors.has_field("consentAt"));
    }

    #[test]
    fn test_pay_now_defaults_shipping() {
        let input: PayNowPayloadInput = serde_json::from_value(json!({
            "email": "kenji@example.com",
            "items": [{"sku": "S", "name": "Saya", "qty": 2, "unitCents": 5000, "vatRatePct": 20}]
        }))
        .unwrap();
        let payload = input.validate().unwrap();
        assert_eq!(payload.shipping_cents, Cents::ZERO);
        assert_eq!(payload.items.len(), 1);
    }

    #[test]
    fn test_pay_now_rejects_negative_shipping() {
        let input: PayNowPayloadInput = serde_json::from_value(json!({
            "email": "kenji@example.com",
            "items": [{"sku": "S", "name": "Saya", "qty": 1, "unitCents": 5000, "vatRatePct": 20}],
            "shippingCents": -1
        }))
        .unwrap();
        assert!(input.validate().unwrap_err().has_field("shippingCents"));
    }

    #[test]
    fn test_printable_lines() {
        let address = Address {
            company: Some("Dojo SARL".to_owned()),
            vat_number: None,
            line1: "1 Rue".to_owned(),
            line2: None,
            city: "Lyon".to_owned(),
            postal_code: "69001".to_owned(),
            country: "FR".to_owned(),
        };
        assert_eq!(
            address.printable_lines(),
            ["Dojo SARL", "1 Rue", "69001 Lyon", "FR"]
        );
    }
}
