//! Shopping cart kept in the visitor's session.

use serde::{Deserialize, Serialize};

use crate::checkout::{CheckoutItem, CheckoutItemInput};
use crate::money::{Cents, MoneyError};
use crate::pricing::{QuoteTotals, recalculate_totals};
use crate::validation::{ValidationErrors, trimmed_len};

/// Largest quantity of a single item.
pub const MAX_ITEM_QTY: u32 = 99;

/// Most distinct lines a cart may hold.
pub const MAX_CART_LINES: usize = 50;

/// Shipping charged when nothing else was chosen.
pub const DEFAULT_SHIPPING_CENTS: Cents = match Cents::new(2500) {
    Ok(cents) => cents,
    Err(_) => Cents::ZERO,
};

/// One line in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    /// Client chosen identifier, unique within the cart.
    pub id: String,
    pub sku: String,
    pub name: String,
    pub qty: u32,
    pub unit_cents: Cents,
    pub vat_rate_pct: u8,
}

/// Body of `POST /api/cart/items`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CartItemInput {
    pub id: String,
    pub sku: String,
    pub name: String,
    pub qty: i64,
    pub unit_cents: i64,
    pub vat_rate_pct: i64,
}

impl CartItemInput {
    /// Validate the item with the same rules as a checkout line.
    ///
    /// # Errors
    ///
    /// Returns every invalid field.
    pub fn validate(&self) -> Result<CartItem, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let id = trimmed_len(&mut errors, "id", &self.id, 1, 64);
        let line = CheckoutItemInput {
            sku: self.sku.clone(),
            name: self.name.clone(),
            qty: self.qty,
            unit_cents: self.unit_cents,
            vat_rate_pct: self.vat_rate_pct,
        }
        .validate()
        .map_err(|e| errors.extend_flat(e))
        .ok();

        match (id, line) {
            (Some(id), Some(line)) if errors.is_empty() => Ok(CartItem {
                id,
                sku: line.sku,
                name: line.name,
                qty: line.qty,
                unit_cents: line.unit_cents,
                vat_rate_pct: line.vat_rate_pct,
            }),
            _ => Err(errors),
        }
    }
}

/// The cart: items plus the shipping amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub items: Vec<CartItem>,
    pub shipping_cents: Cents,
}

impl Default for Cart {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            shipping_cents: DEFAULT_SHIPPING_CENTS,
        }
    }
}

impl Cart {
    /// Add an item, merging quantities with an existing line of the same id.
    ///
    /// # Errors
    ///
    /// Returns a form issue when a new line would go past [`MAX_CART_LINES`].
    pub fn add_item(&mut self, item: CartItem) -> Result<(), ValidationErrors> {
        if self.merge(item) {
            return Ok(());
        }
        let mut errors = ValidationErrors::new();
        errors.add_form(format!(
            "Le panier ne peut pas contenir plus de {MAX_CART_LINES} articles"
        ));
        Err(errors)
    }

    /// Returns `false` when the item needed a new line and the cart is full.
    fn merge(&mut self, item: CartItem) -> bool {
        if item.qty == 0 {
            return true;
        }
        if let Some(existing) = self.items.iter_mut().find(|i| i.id == item.id) {
            existing.qty = existing.qty.saturating_add(item.qty).min(MAX_ITEM_QTY);
        } else if self.items.len() < MAX_CART_LINES {
            self.items.push(CartItem {
                qty: item.qty.min(MAX_ITEM_QTY),
                ..item
            });
        } else {
            return false;
        }
        true
    }

    /// Set the quantity of a line; zero or less removes it.
    ///
    /// Returns `false` when no line has this id.
    pub fn set_item_quantity(&mut self, id: &str, qty: i64) -> bool {
        if !self.items.iter().any(|i| i.id == id) {
            return false;
        }
        match u32::try_from(qty) {
            Ok(qty) if qty > 0 => {
                for item in self.items.iter_mut().filter(|i| i.id == id) {
                    item.qty = qty.min(MAX_ITEM_QTY);
                }
            }
            _ => self.remove_item(id),
        }
        true
    }

    pub fn remove_item(&mut self, id: &str) {
        self.items.retain(|i| i.id != id);
    }

    pub fn set_shipping(&mut self, shipping_cents: Cents) {
        self.shipping_cents = shipping_cents;
    }

    /// Empty the cart and restore the default shipping.
    pub fn clear(&mut self) {
        self.items.clear();
        self.shipping_cents = DEFAULT_SHIPPING_CENTS;
    }

    #[must_use]
    pub fn total_quantity(&self) -> u32 {
        self.items.iter().map(|i| i.qty).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Repair a cart restored from storage: drop empty lines, merge
    /// duplicate ids, cap quantities and drop lines past [`MAX_CART_LINES`].
    #[must_use]
    pub fn normalize(self) -> Self {
        let mut cart = Self {
            items: Vec::with_capacity(self.items.len()),
            shipping_cents: self.shipping_cents,
        };
        for item in self.items {
            cart.merge(item);
        }
        cart
    }

    /// Lines in the shape checkout expects.
    #[must_use]
    pub fn to_checkout_items(&self) -> Vec<CheckoutItem> {
        self.items
            .iter()
            .map(|i| CheckoutItem {
                sku: i.sku.clone(),
                name: i.name.clone(),
                qty: i.qty,
                unit_cents: i.unit_cents,
                vat_rate_pct: i.vat_rate_pct,
            })
            .collect()
    }

    /// Totals of the current content.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Overflow`] for absurd amounts.
    pub fn totals(&self) -> Result<QuoteTotals, MoneyError> {
        if self.items.is_empty() {
            return Ok(QuoteTotals {
                shipping_cents: self.shipping_cents,
                total_cents: self.shipping_cents,
                ..QuoteTotals::default()
            });
        }
        recalculate_totals(&self.to_checkout_items(), self.shipping_cents).map(|r| r.totals)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn item(id: &str, qty: u32) -> CartItem {
        CartItem {
            id: id.to_owned(),
            sku: format!("SKU-{id}"),
            name: format!("Katana {id}"),
            qty,
            unit_cents: Cents::new(10_000).unwrap(),
            vat_rate_pct: 20,
        }
    }

    #[test]
    fn test_default_shipping() {
        assert_eq!(Cart::default().shipping_cents.get(), 2500);
    }

    #[test]
    fn test_add_merges_by_id() {
        let mut cart = Cart::default();
        cart.add_item(item("a", 1)).unwrap();
        cart.add_item(item("b", 2)).unwrap();
        cart.add_item(item("a", 3)).unwrap();
        assert_eq!(cart.items.len(), 2);
        assert_eq!(cart.items[0].qty, 4);
        assert_eq!(cart.total_quantity(), 6);
    }

    #[test]
    fn test_add_caps_quantity() {
        let mut cart = Cart::default();
        cart.add_item(item("a", 98)).unwrap();
        cart.add_item(item("a", 5)).unwrap();
        assert_eq!(cart.items[0].qty, MAX_ITEM_QTY);
        cart.add_item(item("b", 500)).unwrap();
        assert_eq!(cart.items[1].qty, MAX_ITEM_QTY);
    }

    #[test]
    fn test_set_quantity() {
        let mut cart = Cart::default();
        cart.add_item(item("a", 1)).unwrap();
        assert!(cart.set_item_quantity("a", 7));
        assert_eq!(cart.items[0].qty, 7);
        assert!(cart.set_item_quantity("a", 1000));
        assert_eq!(cart.items[0].qty, MAX_ITEM_QTY);
        assert!(cart.set_item_quantity("a", -1));
        assert!(cart.is_empty());
        assert!(!cart.set_item_quantity("missing", 1));
    }

    #[test]
    fn test_remove_and_clear() {
        let mut cart = Cart::default();
        cart.add_item(item("a", 1)).unwrap();
        cart.add_item(item("b", 1)).unwrap();
        cart.remove_item("a");
        assert_eq!(cart.items.len(), 1);
        cart.set_shipping(Cents::ZERO);
        cart.clear();
        assert!(cart.is_empty());
        assert_eq!(cart.shipping_cents, DEFAULT_SHIPPING_CENTS);
    }

    #[test]
    fn test_normalize() {
        let cart = Cart {
            items: vec![item("a", 0), item("b", 150), item("b", 1)],
            shipping_cents: Cents::new(900).unwrap(),
        }
        .normalize();
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].qty, MAX_ITEM_QTY);
        assert_eq!(cart.shipping_cents.get(), 900);
    }

    #[test]
    fn test_totals() {
        let mut cart = Cart::default();
        assert_eq!(cart.totals().unwrap().total_cents.get(), 2500);
        cart.add_item(item("a", 2)).unwrap();
        let totals = cart.totals().unwrap();
        assert_eq!(totals.subtotal_cents.get(), 20_000);
        assert_eq!(totals.tax_cents.get(), 4_000);
        assert_eq!(totals.total_cents.get(), 26_500);
    }

    #[test]
    fn test_item_input_validation() {
        let input: CartItemInput = serde_json::from_str(
            r#"{"id":"k1","sku":"KATANA","name":"Kage","qty":1,"unitCents":42000,"vatRatePct":20}"#,
        )
        .unwrap();
        assert_eq!(input.validate().unwrap().qty, 1);

        let input: CartItemInput = serde_json::from_str(
            r#"{"id":"","sku":"KATANA","name":"Kage","qty":0,"unitCents":42000,"vatRatePct":20}"#,
        )
        .unwrap();
        let errors = input.validate().unwrap_err();
        assert!(errors.has_field("id"));
        assert!(errors.has_field("qty"));
    }

    #[test]
    fn test_line_count_is_bounded() {
        let mut cart = Cart::default();
        for n in 0..MAX_CART_LINES {
            cart.add_item(item(&n.to_string(), 1)).unwrap();
        }
        let err = cart.add_item(item("extra", 1)).unwrap_err();
        assert!(!err.is_empty());
        assert_eq!(cart.items.len(), MAX_CART_LINES);

        // Existing lines still merge.
        cart.add_item(item("0", 2)).unwrap();
        assert_eq!(cart.items[0].qty, 3);
    }

    #[test]
    fn test_normalize_drops_lines_past_limit() {
        let cart = Cart {
            items: (0..MAX_CART_LINES + 5).map(|n| item(&n.to_string(), 1)).collect(),
            shipping_cents: DEFAULT_SHIPPING_CENTS,
        }
        .normalize();
        assert_eq!(cart.items.len(), MAX_CART_LINES);
    }
}
