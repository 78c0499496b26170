//! Money in integer euro cents and per-line VAT arithmetic.
//!
//! All amounts are whole cents bounded by `2^53 - 1` so they survive a trip
//! through JSON numbers in browsers and Stripe. Arithmetic is checked; an
//! overflow is an error, never a wrap.

use core::fmt;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize};

/// Errors from money arithmetic.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    /// An amount is above the safe integer range.
    #[error("amount {0} exceeds the maximum of {max} cents", max = Cents::MAX_SAFE)]
    OutOfRange(u64),
    /// An amount is negative, NaN or infinite.
    #[error("amount must be a finite, non-negative number")]
    NotFinite,
    /// A computation overflowed.
    #[error("amount overflow")]
    Overflow,
    /// A line quantity was zero.
    #[error("quantity must be at least 1")]
    InvalidQuantity,
    /// A VAT rate was negative.
    #[error("VAT rate must be non-negative")]
    InvalidVatRate,
}

/// An amount of money in euro cents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Cents(u64);

impl Cents {
    /// Largest amount that is still exactly representable as an IEEE double.
    pub const MAX_SAFE: u64 = (1 << 53) - 1;

    /// Zero cents.
    pub const ZERO: Self = Self(0);

    /// Create an amount, rejecting values beyond [`Self::MAX_SAFE`].
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::OutOfRange`] for values above the safe range.
    pub const fn new(cents: u64) -> Result<Self, MoneyError> {
        if cents > Self::MAX_SAFE {
            return Err(MoneyError::OutOfRange(cents));
        }
        Ok(Self(cents))
    }

    /// Convert a euro amount, rounding to the nearest cent.
    ///
    /// # Errors
    ///
    /// Returns an error for negative, non-finite or out of range amounts.
    pub fn from_euros(euros: f64) -> Result<Self, MoneyError> {
        if !euros.is_finite() || euros < 0.0 {
            return Err(MoneyError::NotFinite);
        }
        let cents = (euros * 100.0).round();
        #[allow(clippy::cast_precision_loss)]
        let limit = Self::MAX_SAFE as f64;
        if cents > limit {
            return Err(MoneyError::Overflow);
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let whole = cents as u64;
        Self::new(whole)
    }

    /// Raw number of cents.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Checked addition.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Overflow`] when the result leaves the safe range.
    pub fn checked_add(self, other: Self) -> Result<Self, MoneyError> {
        let sum = self.0.checked_add(other.0).ok_or(MoneyError::Overflow)?;
        Self::new(sum).map_err(|_| MoneyError::Overflow)
    }

    /// Checked multiplication by a quantity.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Overflow`] when the result leaves the safe range.
    pub fn checked_mul(self, qty: u32) -> Result<Self, MoneyError> {
        let product = self
            .0
            .checked_mul(u64::from(qty))
            .ok_or(MoneyError::Overflow)?;
        Self::new(product).map_err(|_| MoneyError::Overflow)
    }

    /// Sum a sequence of amounts.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Overflow`] when the total leaves the safe range.
    pub fn sum<I: IntoIterator<Item = Self>>(amounts: I) -> Result<Self, MoneyError> {
        amounts
            .into_iter()
            .try_fold(Self::ZERO, |acc, amount| acc.checked_add(amount))
    }

    /// Percentage of this amount, rounded half away from zero to a whole cent.
    ///
    /// # Errors
    ///
    /// Returns an error for a negative rate or an overflowing result.
    pub fn percentage(self, rate_pct: Decimal) -> Result<Self, MoneyError> {
        if rate_pct.is_sign_negative() && !rate_pct.is_zero() {
            return Err(MoneyError::InvalidVatRate);
        }
        let raw = Decimal::from(self.0)
            .checked_mul(rate_pct)
            .and_then(|v| v.checked_div(Decimal::ONE_HUNDRED))
            .ok_or(MoneyError::Overflow)?;
        let rounded = raw.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        let cents = rounded.to_u64().ok_or(MoneyError::Overflow)?;
        Self::new(cents).map_err(|_| MoneyError::Overflow)
    }

    /// Amount as a decimal number of euros.
    #[must_use]
    pub fn to_euros(self) -> Decimal {
        Decimal::new(i64::try_from(self.0).unwrap_or(i64::MAX), 2)
    }
}

impl<'de> Deserialize<'de> for Cents {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = u64::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}

impl TryFrom<i64> for Cents {
    type Error = MoneyError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        let value = u64::try_from(value).map_err(|_| MoneyError::NotFinite)?;
        Self::new(value)
    }
}

impl From<Cents> for i64 {
    fn from(cents: Cents) -> Self {
        // MAX_SAFE fits comfortably in an i64.
        Self::try_from(cents.0).unwrap_or(Self::MAX)
    }
}

impl fmt::Display for Cents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_eur(*self))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Cents {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <i64 as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <i64 as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Cents {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let raw = <i64 as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self::try_from(raw)?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Cents {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <i64 as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&i64::from(*self), buf)
    }
}

/// Net, tax and gross amounts of a single line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineTotals {
    pub net: Cents,
    pub tax: Cents,
    pub gross: Cents,
}

/// Compute the totals of one line: `net = unit * qty`,
/// `tax = round(net * rate / 100)`, `gross = net + tax`.
///
/// # Errors
///
/// Returns an error for a zero quantity, a negative rate, or overflow.
pub fn compute_line_totals(
    unit: Cents,
    qty: u32,
    vat_rate_pct: Decimal,
) -> Result<LineTotals, MoneyError> {
    if qty == 0 {
        return Err(MoneyError::InvalidQuantity);
    }
    let net = unit.checked_mul(qty)?;
    let tax = net.percentage(vat_rate_pct)?;
    let gross = net.checked_add(tax)?;
    Ok(LineTotals { net, tax, gross })
}

/// Format cents the French way: `1 234,56 €`.
///
/// Thousands are grouped with a plain space so the text survives the
/// built-in PDF fonts.
#[must_use]
pub fn format_eur(amount: Cents) -> String {
    let euros = amount.0 / 100;
    let cents = amount.0 % 100;

    let digits = euros.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(ch);
    }

    format!("{grouped},{cents:02} €")
}
