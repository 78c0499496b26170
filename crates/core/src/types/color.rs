//! Hex color type used for katana parts and the background preference.

use core::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Error returned when a string is not a `#rrggbb` color.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("color must be in #rrggbb format")]
pub struct HexColorError;

/// A six digit hex color such as `#8b1e1e`, always stored lowercase.
///
/// ```
/// use katana_forge_core::HexColor;
///
/// let color = HexColor::parse("#8B1E1E").unwrap();
/// assert_eq!(color.as_str(), "#8b1e1e");
/// assert!(HexColor::parse("8b1e1e").is_err());
/// assert!(HexColor::parse("#fff").is_err());
/// ```
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct HexColor(String);

impl HexColor {
    /// Default scene background.
    pub const DEFAULT_BACKGROUND: &'static str = "#040405";

    /// Parse a `#rrggbb` color.
    ///
    /// # Errors
    ///
    /// Returns [`HexColorError`] unless the input is `#` followed by exactly
    /// six hex digits.
    pub fn parse(s: &str) -> Result<Self, HexColorError> {
        let digits = s.strip_prefix('#').ok_or(HexColorError)?;
        if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(HexColorError);
        }
        Ok(Self(s.to_ascii_lowercase()))
    }

    /// The background used when a user has not picked one.
    #[must_use]
    pub fn default_background() -> Self {
        Self::from_static(Self::DEFAULT_BACKGROUND)
    }

    /// Wrap a literal that is already a valid lowercase color.
    pub(crate) fn from_static(color: &'static str) -> Self {
        Self(color.to_owned())
    }

    /// Returns the color as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the color and returns the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl<'de> Deserialize<'de> for HexColor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for HexColor {
    type Err = HexColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
