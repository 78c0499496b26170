//! Price estimates for configured katanas and checkout totals.

use std::collections::BTreeMap;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::checkout::CheckoutItem;
use crate::katana::KatanaConfig;
use crate::money::{Cents, LineTotals, MoneyError, compute_line_totals};

/// Base price of a katana in euros when none is configured.
pub const DEFAULT_BASE_PRICE_EUR: f64 = 420.0;

/// Currency of every price in the shop.
pub const CURRENCY: &str = "EUR";

/// Answer of the configurator price endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceEstimate {
    /// Whole euros.
    pub price: u64,
    pub currency: &'static str,
    pub estimated_delivery_weeks: u32,
}

/// Estimate price and lead time for a configuration.
///
/// `price = round(base + metalness * 50 + roughness * 35)` and
/// `weeks = 4 + round(metalness * 2 + roughness * 1.5)`.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::suboptimal_flops
)]
pub fn estimate(config: &KatanaConfig, base_price_eur: f64) -> PriceEstimate {
    let price = (base_price_eur + config.metalness * 50.0 + config.roughness * 35.0)
        .round()
        .max(0.0);
    let extra_weeks = (config.metalness * 2.0 + config.roughness * 1.5).round().max(0.0);

    PriceEstimate {
        price: price as u64,
        currency: CURRENCY,
        estimated_delivery_weeks: 4 + extra_weeks as u32,
    }
}

/// A checkout item with its computed totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculatedLine {
    #[serde(flatten)]
    pub item: CheckoutItem,
    pub net_cents: Cents,
    pub tax_cents: Cents,
    pub gross_cents: Cents,
}

/// Totals of a quote or cart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteTotals {
    pub subtotal_cents: Cents,
    pub tax_cents: Cents,
    pub shipping_cents: Cents,
    pub total_cents: Cents,
}

/// Result of [`recalculate_totals`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recalculated {
    pub lines: Vec<CalculatedLine>,
    pub totals: QuoteTotals,
}

/// Recompute every line and the grand total server side.
///
/// Client supplied totals are never trusted; this is the only place the
/// amounts charged are computed.
///
/// # Errors
///
/// Returns a [`MoneyError`] when a line is invalid or a sum overflows.
pub fn recalculate_totals(
    items: &[CheckoutItem],
    shipping_cents: Cents,
) -> Result<Recalculated, MoneyError> {
    let lines = items
        .iter()
        .map(|item| {
            let LineTotals { net, tax, gross } =
                compute_line_totals(item.unit_cents, item.qty, Decimal::from(item.vat_rate_pct))?;
            Ok(CalculatedLine {
                item: item.clone(),
                net_cents: net,
                tax_cents: tax,
                gross_cents: gross,
            })
        })
        .collect::<Result<Vec<_>, MoneyError>>()?;

    let subtotal_cents = Cents::sum(lines.iter().map(|l| l.net_cents))?;
    let tax_cents = Cents::sum(lines.iter().map(|l| l.tax_cents))?;
    let total_cents = Cents::sum([subtotal_cents, tax_cents, shipping_cents])?;

    Ok(Recalculated {
        lines,
        totals: QuoteTotals {
            subtotal_cents,
            tax_cents,
            shipping_cents,
            total_cents,
        },
    })
}

/// VAT inclusive unit price: `unit + round(unit * rate / 100)`.
///
/// # Errors
///
/// Returns [`MoneyError::Overflow`] when the amount leaves the safe range.
pub fn unit_amount_with_vat(unit: Cents, vat_rate_pct: u8) -> Result<Cents, MoneyError> {
    let tax = unit.percentage(Decimal::from(vat_rate_pct))?;
    unit.checked_add(tax)
}

/// Net and tax amounts for one VAT rate, derived back from gross totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VatBreakdown {
    pub rate_pct: u8,
    pub net: Cents,
    pub tax: Cents,
}

/// Split gross line totals per VAT rate, ordered by rate.
///
/// For each line `net = round(gross / (1 + rate))` and `tax = gross - net`.
///
/// # Errors
///
/// Returns [`MoneyError::Overflow`] when a sum leaves the safe range.
pub fn vat_breakdown<I>(lines: I) -> Result<Vec<VatBreakdown>, MoneyError>
where
    I: IntoIterator<Item = (Cents, u8)>,
{
    let mut per_rate: BTreeMap<u8, (Cents, Cents)> = BTreeMap::new();

    for (gross, rate_pct) in lines {
        let divisor = Decimal::ONE_HUNDRED + Decimal::from(rate_pct);
        let net = (Decimal::from(gross.get()) * Decimal::ONE_HUNDRED / divisor)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_u64()
            .ok_or(MoneyError::Overflow)?;
        let net = Cents::new(net)?;
        let tax = Cents::new(gross.get().saturating_sub(net.get()))?;

        let entry = per_rate.entry(rate_pct).or_default();
        entry.0 = entry.0.checked_add(net)?;
        entry.1 = entry.1.checked_add(tax)?;
    }

    Ok(per_rate
        .into_iter()
        .map(|(rate_pct, (net, tax))| VatBreakdown { rate_pct, net, tax })
        .collect())
}
