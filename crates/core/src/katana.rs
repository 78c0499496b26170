//! The katana configuration object bound to the 3D configurator.

use serde::{Deserialize, Serialize};

use crate::types::HexColor;
use crate::validation::ValidationErrors;

/// A validated katana appearance.
///
/// Colors are `#rrggbb`; `metalness` and `roughness` are material factors
/// in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KatanaConfig {
    pub handle_color: HexColor,
    pub blade_tint: HexColor,
    pub metalness: f64,
    pub roughness: f64,
}

impl Default for KatanaConfig {
    fn default() -> Self {
        Self {
            handle_color: HexColor::from_static("#8b1e1e"),
            blade_tint: HexColor::from_static("#d9d2c5"),
            metalness: 0.6,
            roughness: 0.35,
        }
    }
}

/// Unvalidated configuration as received from a client.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KatanaConfigInput {
    pub handle_color: String,
    pub blade_tint: String,
    pub metalness: f64,
    pub roughness: f64,
}

impl KatanaConfigInput {
    /// Validate into a [`KatanaConfig`].
    ///
    /// # Errors
    ///
    /// Returns every invalid field.
    pub fn validate(&self) -> Result<KatanaConfig, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let config = self.validate_into(&mut errors);
        match config {
            Some(config) if errors.is_empty() => Ok(config),
            _ => Err(errors),
        }
    }

    pub(crate) fn validate_into(&self, errors: &mut ValidationErrors) -> Option<KatanaConfig> {
        let handle_color = HexColor::parse(&self.handle_color)
            .map_err(|_| {
                errors.add(
                    "handleColor",
                    "La couleur du tsuka doit être un code hex valide.",
                );
            })
            .ok();
        let blade_tint = HexColor::parse(&self.blade_tint)
            .map_err(|_| {
                errors.add(
                    "bladeTint",
                    "La couleur de la lame doit être un code hex valide.",
                );
            })
            .ok();
        let metalness = unit_factor(errors, "metalness", "Metalness", self.metalness);
        let roughness = unit_factor(errors, "roughness", "Roughness", self.roughness);

        Some(KatanaConfig {
            handle_color: handle_color?,
            blade_tint: blade_tint?,
            metalness: metalness?,
            roughness: roughness?,
        })
    }
}

impl From<&KatanaConfig> for KatanaConfigInput {
    fn from(config: &KatanaConfig) -> Self {
        Self {
            handle_color: config.handle_color.to_string(),
            blade_tint: config.blade_tint.to_string(),
            metalness: config.metalness,
            roughness: config.roughness,
        }
    }
}

fn unit_factor(errors: &mut ValidationErrors, field: &str, label: &str, value: f64) -> Option<f64> {
    if !value.is_finite() {
        errors.add(field, format!("{label} invalide"));
        return None;
    }
    if value < 0.0 {
        errors.add(field, format!("{label} minimal 0"));
        return None;
    }
    if value > 1.0 {
        errors.add(field, format!("{label} maximal 1"));
        return None;
    }
    Some(value)
}

/// A named katana saved by a user.
#[derive(Debug, Clone, PartialEq)]
pub struct NewKatana {
    pub name: String,
    pub config: KatanaConfig,
}

/// Unvalidated create/update body: the configuration plus a name.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewKatanaInput {
    pub name: String,
    #[serde(flatten)]
    pub config: KatanaConfigInput,
}

impl NewKatanaInput {
    /// Validate; the name is trimmed and must keep at least two characters.
    ///
    /// # Errors
    ///
    /// Returns every invalid field.
    pub fn validate(&self) -> Result<NewKatana, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let name = Some(self.name.trim())
            .filter(|name| (2..=120).contains(&name.chars().count()))
            .map(str::to_owned);
        if name.is_none() {
            errors.add("name", "Nom de katana requis");
        }
        let config = self.config.validate_into(&mut errors);
        match (name, config) {
            (Some(name), Some(config)) if errors.is_empty() => Ok(NewKatana { name, config }),
            _ => Err(errors),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn input(handle: &str, blade: &str, metalness: f64, roughness: f64) -> KatanaConfigInput {
        KatanaConfigInput {
            handle_color: handle.to_owned(),
            blade_tint: blade.to_owned(),
            metalness,
            roughness,
        }
    }

    #[test]
    fn test_default_config() {
        let config = KatanaConfig::default();
        assert_eq!(config.handle_color.as_str(), "#8b1e1e");
        assert_eq!(config.blade_tint.as_str(), "#d9d2c5");
        assert!((config.metalness - 0.6).abs() < f64::EPSILON);
        assert!((config.roughness - 0.35).abs() < f64::EPSILON);
    }

    #[test]
    fn test_validate_accepts_bounds() {
        assert!(input("#000000", "#FFFFFF", 0.0, 1.0).validate().is_ok());
    }

    #[test]
    fn test_validate_reports_every_field() {
        let errors = input("red", "#12345", 1.5, -0.1).validate().unwrap_err();
        assert!(errors.has_field("handleColor"));
        assert!(errors.has_field("bladeTint"));
        assert_eq!(errors.field("metalness"), ["Metalness maximal 1"]);
        assert_eq!(errors.field("roughness"), ["Roughness minimal 0"]);
    }

    #[test]
    fn test_validate_rejects_non_finite() {
        assert!(input("#000000", "#000000", f64::NAN, 0.5).validate().is_err());
    }

    #[test]
    fn test_deserialize_rejects_wrong_types() {
        let json = r##"{"handleColor":"#000000","bladeTint":"#000000","metalness":"high","roughness":0.2}"##;
        assert!(serde_json::from_str::<KatanaConfigInput>(json).is_err());
    }

    #[test]
    fn test_new_katana_trims_name() {
        let json = r##"{"name":"  Kage  ","handleColor":"#8B1E1E","bladeTint":"#d9d2c5","metalness":0.5,"roughness":0.5}"##;
        let katana = serde_json::from_str::<NewKatanaInput>(json)
            .unwrap()
            .validate()
            .unwrap();
        assert_eq!(katana.name, "Kage");
        assert_eq!(katana.config.handle_color.as_str(), "#8b1e1e");
    }

    #[test]
    fn test_new_katana_rejects_short_name() {
        let body = NewKatanaInput {
            name: " K ".to_owned(),
            config: input("#000000", "#000000", 0.1, 0.1),
        };
        let errors = body.validate().unwrap_err();
        assert_eq!(errors.field("name"), ["Nom de katana requis"]);
    }

    #[test]
    fn test_serialize_camel_case() {
        let json = serde_json::to_value(KatanaConfig::default()).unwrap();
        assert_eq!(json["handleColor"], "#8b1e1e");
        assert_eq!(json["bladeTint"], "#d9d2c5");
    }
}
