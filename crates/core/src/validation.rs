//! Field-level validation errors shared by every request payload.
//!
//! Payloads are deserialized into plain input structs first, then checked
//! with the helpers here. All problems are collected so a form can show
//! every invalid field at once.

use std::collections::BTreeMap;

use serde::Serialize;

/// Validation failures, grouped per field plus form-level messages.
///
/// Serializes as `{"fieldErrors": {"email": ["..."]}, "formErrors": []}`.
#[derive(thiserror::Error, Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
#[error("validation failed")]
pub struct ValidationErrors {
    field_errors: BTreeMap<String, Vec<String>>,
    form_errors: Vec<String>,
}

impl ValidationErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message against a field.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.field_errors
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    /// Record a message that is not tied to a single field.
    pub fn add_form(&mut self, message: impl Into<String>) {
        self.form_errors.push(message.into());
    }

    /// Fold the errors of a nested object in under `prefix.`.
    pub fn extend_nested(&mut self, prefix: &str, other: Self) {
        for (field, messages) in other.field_errors {
            self.field_errors
                .entry(format!("{prefix}.{field}"))
                .or_default()
                .extend(messages);
        }
        for message in other.form_errors {
            self.add(prefix, message);
        }
    }

    /// Fold another set of errors in unchanged.
    pub fn extend_flat(&mut self, other: Self) {
        for (field, messages) in other.field_errors {
            self.field_errors.entry(field).or_default().extend(messages);
        }
        self.form_errors.extend(other.form_errors);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.field_errors.is_empty() && self.form_errors.is_empty()
    }

    /// Messages recorded for `field`.
    #[must_use]
    pub fn field(&self, field: &str) -> &[String] {
        self.field_errors.get(field).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn has_field(&self, field: &str) -> bool {
        self.field_errors.contains_key(field)
    }

    #[must_use]
    pub fn form_errors(&self) -> &[String] {
        &self.form_errors
    }

    /// `Ok(value)` when nothing was recorded.
    ///
    /// # Errors
    ///
    /// Returns `self` when at least one message was recorded.
    pub fn finish<T>(self, value: T) -> Result<T, Self> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

/// Trim `value` and check its length (in characters) is within `min..=max`.
///
/// Returns the trimmed string, or records an error and returns `None`.
pub fn trimmed_len(
    errors: &mut ValidationErrors,
    field: &str,
    value: &str,
    min: usize,
    max: usize,
) -> Option<String> {
    let trimmed = value.trim();
    let len = trimmed.chars().count();
    if len < min {
        if min == 1 {
            errors.add(field, "Champ requis");
        } else {
            errors.add(field, format!("Au moins {min} caractères"));
        }
        return None;
    }
    if len > max {
        errors.add(field, format!("Au plus {max} caractères"));
        return None;
    }
    Some(trimmed.to_owned())
}

/// Optional variant of [`trimmed_len`]: blank strings become `None`.
pub fn optional_trimmed(
    errors: &mut ValidationErrors,
    field: &str,
    value: Option<&str>,
    max: usize,
) -> Option<String> {
    let trimmed = value.map(str::trim).filter(|v| !v.is_empty())?;
    if trimmed.chars().count() > max {
        errors.add(field, format!("Au plus {max} caractères"));
        return None;
    }
    Some(trimmed.to_owned())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_collects_messages_per_field() {
        let mut errors = ValidationErrors::new();
        errors.add("email", "Email invalide");
        errors.add("email", "Autre");
        errors.add_form("Au moins un article requis");

        assert_eq!(errors.field("email").len(), 2);
        assert!(errors.field("name").is_empty());
        assert_eq!(errors.form_errors(), ["Au moins un article requis"]);
        assert!(errors.finish(()).is_err());
    }

    #[test]
    fn test_finish_ok_when_empty() {
        assert_eq!(ValidationErrors::new().finish(7).unwrap(), 7);
    }

    #[test]
    fn test_nested_prefix() {
        let mut inner = ValidationErrors::new();
        inner.add("line1", "Champ requis");
        let mut outer = ValidationErrors::new();
        outer.extend_nested("ship", inner);
        assert!(outer.has_field("ship.line1"));
    }

    #[test]
    fn test_serialized_shape() {
        let mut errors = ValidationErrors::new();
        errors.add("name", "Nom requis");
        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(json["fieldErrors"]["name"][0], "Nom requis");
        assert!(json["formErrors"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_trimmed_len() {
        let mut errors = ValidationErrors::new();
        assert_eq!(
            trimmed_len(&mut errors, "city", "  Paris ", 1, 120).as_deref(),
            Some("Paris")
        );
        assert_eq!(trimmed_len(&mut errors, "city", "   ", 1, 120), None);
        assert_eq!(trimmed_len(&mut errors, "zip", "1234567", 2, 4), None);
        assert!(errors.has_field("city"));
        assert!(errors.has_field("zip"));
    }

    #[test]
    fn test_optional_trimmed() {
        let mut errors = ValidationErrors::new();
        assert_eq!(optional_trimmed(&mut errors, "company", Some("  "), 10), None);
        assert_eq!(optional_trimmed(&mut errors, "company", None, 10), None);
        assert_eq!(
            optional_trimmed(&mut errors, "company", Some(" Forge "), 10).as_deref(),
            Some("Forge")
        );
        assert!(errors.is_empty());
        assert_eq!(
            optional_trimmed(&mut errors, "company", Some("much too long"), 4),
            None
        );
        assert!(errors.has_field("company"));
    }
}
