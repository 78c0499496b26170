//! Human readable quote numbers: `Q-2024-000042`.

use core::fmt;

use serde::Serialize;

/// Errors from building or parsing a quote number.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum QuoteNumberError {
    /// The yearly counter must start at 1.
    #[error("quote counter must be positive, got {0}")]
    InvalidCounter(i64),
    /// The year is outside 0..=9999.
    #[error("invalid quote year {0}")]
    InvalidYear(i32),
    /// The string is not a quote number.
    #[error("malformed quote number: {0}")]
    Malformed(String),
}

/// A quote number made of the year and a per-year counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(into = "String")]
pub struct QuoteNumber {
    year: i32,
    counter: u32,
}

impl QuoteNumber {
    /// Build a number from a counter value returned by the database.
    ///
    /// # Errors
    ///
    /// Returns an error when the counter is not in `1..=u32::MAX` or the year
    /// does not have four digits at most.
    pub fn format(year: i32, counter: i64) -> Result<Self, QuoteNumberError> {
        if !(0..=9999).contains(&year) {
            return Err(QuoteNumberError::InvalidYear(year));
        }
        let counter = u32::try_from(counter)
            .ok()
            .filter(|c| *c >= 1)
            .ok_or(QuoteNumberError::InvalidCounter(counter))?;
        Ok(Self { year, counter })
    }

    /// Parse a stored number such as `Q-2024-000042`.
    ///
    /// # Errors
    ///
    /// Returns [`QuoteNumberError::Malformed`] for anything else.
    pub fn parse(s: &str) -> Result<Self, QuoteNumberError> {
        let malformed = || QuoteNumberError::Malformed(s.to_owned());
        let rest = s.strip_prefix("Q-").ok_or_else(malformed)?;
        let (year, counter) = rest.split_once('-').ok_or_else(malformed)?;
        if year.len() != 4 || counter.len() < 6 {
            return Err(malformed());
        }
        if !year.bytes().chain(counter.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
        let year: i32 = year.parse().map_err(|_| malformed())?;
        let counter: i64 = counter.parse().map_err(|_| malformed())?;
        Self::format(year, counter)
    }

    #[must_use]
    pub const fn year(&self) -> i32 {
        self.year
    }

    #[must_use]
    pub const fn counter(&self) -> u32 {
        self.counter
    }
}

impl fmt::Display for QuoteNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Q-{:04}-{:06}", self.year, self.counter)
    }
}

impl From<QuoteNumber> for String {
    fn from(number: QuoteNumber) -> Self {
        number.to_string()
    }
}
