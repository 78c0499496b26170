//! Account payloads: registration, login and the background preference.

use serde::Deserialize;

use crate::types::{Email, HexColor};
use crate::validation::ValidationErrors;

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Body of `POST /api/auth/register`.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterInput {
    pub email: String,
    pub password: String,
    pub name: String,
}

/// A validated registration.
#[derive(Clone)]
pub struct Registration {
    pub email: Email,
    pub password: String,
    pub name: String,
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("name", &self.name)
            .finish()
    }
}

impl RegisterInput {
    /// Validate email, password length and name.
    ///
    /// # Errors
    ///
    /// Returns every invalid field.
    pub fn validate(&self) -> Result<Registration, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let email = Email::parse(&self.email)
            .map_err(|_| errors.add("email", "Email invalide"))
            .ok();

        if self.password.chars().count() < MIN_PASSWORD_LENGTH {
            errors.add("password", "Mot de passe minimal 8 caracteres");
        }

        let name = self.name.trim();
        if name.chars().count() < 2 {
            errors.add("name", "Nom requis");
        }

        match email {
            Some(email) if errors.is_empty() => Ok(Registration {
                email,
                password: self.password.clone(),
                name: name.to_owned(),
            }),
            _ => Err(errors),
        }
    }
}

/// Body of `POST /api/auth/login`.
#[derive(Clone, Deserialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for LoginInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginInput")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl LoginInput {
    /// Validate the shape of the credentials (not their correctness).
    ///
    /// # Errors
    ///
    /// Returns every invalid field.
    pub fn validate(&self) -> Result<Email, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let email = Email::parse(&self.email)
            .map_err(|_| errors.add("email", "Email invalide"))
            .ok();
        if self.password.is_empty() {
            errors.add("password", "Mot de passe requis");
        }
        match email {
            Some(email) if errors.is_empty() => Ok(email),
            _ => Err(errors),
        }
    }
}

/// Body of `PUT /api/preferences/background`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackgroundInput {
    pub background_color: String,
}

impl BackgroundInput {
    /// Validate and lowercase the color.
    ///
    /// # Errors
    ///
    /// Returns an error on `backgroundColor` unless it is `#rrggbb`.
    pub fn validate(&self) -> Result<HexColor, ValidationErrors> {
        HexColor::parse(self.background_color.trim()).map_err(|_| {
            let mut errors = ValidationErrors::new();
            errors.add("backgroundColor", "La couleur doit etre un hex valide.");
            errors
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_register_valid() {
        let input = RegisterInput {
            email: "Miyamoto@Example.com".to_owned(),
            password: "correct horse".to_owned(),
            name: "  Musashi ".to_owned(),
        };
        let registration = input.validate().unwrap();
        assert_eq!(registration.email.as_str(), "miyamoto@example.com");
        assert_eq!(registration.name, "Musashi");
    }

    #[test]
    fn test_register_invalid() {
        let input = RegisterInput {
            email: "nope".to_owned(),
            password: "short".to_owned(),
            name: "M".to_owned(),
        };
        let errors = input.validate().unwrap_err();
        assert_eq!(errors.field("email"), ["Email invalide"]);
        assert_eq!(errors.field("password"), ["Mot de passe minimal 8 caracteres"]);
        assert_eq!(errors.field("name"), ["Nom requis"]);
    }

    #[test]
    fn test_registration_debug_redacts_password() {
        let registration = RegisterInput {
            email: "a@b.co".to_owned(),
            password: "super-secret-password".to_owned(),
            name: "Ab".to_owned(),
        }
        .validate()
        .unwrap();
        let debug = format!("{registration:?}");
        assert!(!debug.contains("super-secret-password"));
    }

    #[test]
    fn test_login_requires_password() {
        let input = LoginInput {
            email: "a@b.co".to_owned(),
            password: String::new(),
        };
        assert_eq!(
            input.validate().unwrap_err().field("password"),
            ["Mot de passe requis"]
        );
    }

    #[test]
    fn test_background_lowercases() {
        let input = BackgroundInput {
            background_color: "#ABCDEF".to_owned(),
        };
        assert_eq!(input.validate().unwrap().as_str(), "#abcdef");

        let input = BackgroundInput {
            background_color: "blue".to_owned(),
        };
        assert!(input.validate().unwrap_err().has_field("backgroundColor"));
    }
}
