//! Seed the storefront with demo data.
//!
//! The YAML file lists users (with their saved katanas) and guest drafts:
//!
//! ```yaml
//! users:
//!   - email: demo@kfor.ge
//!     name: Demo
//!     password: tamahagane-steel
//!     katanas:
//!       - name: Kage
//!         handleColor: "#1a1a1a"
//!         bladeTint: "#c0c0c0"
//!         metalness: 0.8
//!         roughness: 0.2
//! guestDrafts:
//!   - token: demo-guest
//!     handleColor: "#8b1e1e"
//!     bladeTint: "#d9d2c5"
//!     metalness: 0.6
//!     roughness: 0.4
//!     quantity: 2
//! ```
//!
//! Every entry is validated before the database is touched. Running the same
//! file twice leaves the same data: users are upserted by email, katanas by
//! owner and name, guest drafts by token.

use serde::Deserialize;

use katana_forge_core::Email;
use katana_forge_core::drafts::{DraftContent, DraftContentInput};
use katana_forge_core::katana::{NewKatana, NewKatanaInput};
use katana_forge_storefront::db::{DraftRepository, KatanaRepository, UserRepository};
use katana_forge_storefront::services::auth::hash_password;

use super::{CommandError, connect};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct SeedFile {
    #[serde(default)]
    users: Vec<SeedUser>,
    #[serde(default)]
    guest_drafts: Vec<SeedGuestDraft>,
}

#[derive(Debug, Deserialize)]
struct SeedUser {
    email: String,
    name: String,
    password: String,
    #[serde(default)]
    katanas: Vec<NewKatanaInput>,
}

#[derive(Debug, Deserialize)]
struct SeedGuestDraft {
    token: String,
    #[serde(flatten)]
    content: DraftContentInput,
}

/// Validated seed data.
#[derive(Debug)]
struct Seed {
    users: Vec<ValidUser>,
    guest_drafts: Vec<(String, DraftContent)>,
}

#[derive(Debug)]
struct ValidUser {
    email: Email,
    name: String,
    password: String,
    katanas: Vec<NewKatana>,
}

/// Rows written by a seed run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub users: usize,
    pub katanas: usize,
    pub drafts: usize,
}

fn invalid(entry: impl Into<String>, message: impl std::fmt::Display) -> CommandError {
    CommandError::InvalidEntry {
        entry: entry.into(),
        message: message.to_string(),
    }
}

fn parse(content: &str) -> Result<Seed, CommandError> {
    let file: SeedFile = serde_yaml::from_str(content)?;

    let mut users = Vec::with_capacity(file.users.len());
    for user in file.users {
        let email = Email::parse(&user.email).map_err(|e| invalid(&user.email, e))?;
        if user.password.chars().count() < 8 {
            return Err(invalid(&user.email, "password must be at least 8 characters"));
        }
        let name = user.name.trim().to_owned();
        if name.is_empty() {
            return Err(invalid(&user.email, "name is required"));
        }
        let katanas = user
            .katanas
            .iter()
            .map(|k| {
                k.validate()
                    .map_err(|e| invalid(format!("{}/{}", user.email, k.name), format!("{e:?}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        users.push(ValidUser {
            email,
            name,
            password: user.password,
            katanas,
        });
    }

    let guest_drafts = file
        .guest_drafts
        .into_iter()
        .map(|draft| {
            if draft.token.trim().is_empty() {
                return Err(invalid("guestDrafts", "token is required"));
            }
            let content = draft
                .content
                .validate()
                .map_err(|e| invalid(&draft.token, format!("{e:?}")))?;
            Ok((draft.token, content))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Seed {
        users,
        guest_drafts,
    })
}

/// Upsert the demo data described in `file_path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or has an invalid entry, or
/// if a database write fails.
pub async fn from_file(file_path: &str) -> Result<SeedSummary, CommandError> {
    let content = tokio::fs::read_to_string(file_path)
        .await
        .map_err(|source| CommandError::Io {
            path: file_path.to_owned(),
            source,
        })?;
    let seed = parse(&content)?;
    tracing::info!(
        path = %file_path,
        users = seed.users.len(),
        guest_drafts = seed.guest_drafts.len(),
        "Seed file validated"
    );

    let pool = connect().await?;
    let users = UserRepository::new(&pool);
    let katanas = KatanaRepository::new(&pool);
    let drafts = DraftRepository::new(&pool);
    let mut summary = SeedSummary::default();

    for seed_user in &seed.users {
        let hash = hash_password(&seed_user.password)?;
        let user = users
            .upsert_with_password(&seed_user.email, &seed_user.name, &hash)
            .await?;
        summary.users += 1;

        let existing = katanas.list_by_owner(user.id).await?;
        for katana in &seed_user.katanas {
            match existing.iter().find(|k| k.name == katana.name) {
                Some(saved) => katanas.update(saved.id, user.id, katana).await?,
                None => katanas.create(user.id, katana).await?,
            };
            summary.katanas += 1;
        }
        tracing::info!(email = %seed_user.email.as_str(), katanas = seed_user.katanas.len(), "User seeded");
    }

    for (token, content) in &seed.guest_drafts {
        drafts.save_for_guest(Some(token.as_str()), content).await?;
        summary.drafts += 1;
    }

    Ok(summary)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const DEMO: &str = r##"
users:
  - email: Demo@KFor.ge
    name: " Demo "
    password: tamahagane-steel
    katanas:
      - name: Kage
        handleColor: "#1a1a1a"
        bladeTint: "#c0c0c0"
        metalness: 0.8
        roughness: 0.2
guestDrafts:
  - token: demo-guest
    handleColor: "#8b1e1e"
    bladeTint: "#d9d2c5"
    metalness: 0.6
    roughness: 0.4
    quantity: 2
"##;

    #[test]
    fn test_parse_demo_file() {
        let seed = parse(DEMO).unwrap();
        assert_eq!(seed.users.len(), 1);
        let user = &seed.users[0];
        assert_eq!(user.email.as_str(), "demo@kfor.ge");
        assert_eq!(user.name, "Demo");
        assert_eq!(user.katanas[0].name, "Kage");
        assert_eq!(seed.guest_drafts[0].0, "demo-guest");
        assert_eq!(seed.guest_drafts[0].1.quantity, 2);
    }

    #[test]
    fn test_empty_file_sections_default() {
        let seed = parse("users: []\n").unwrap();
        assert!(seed.users.is_empty());
        assert!(seed.guest_drafts.is_empty());
    }

    #[test]
    fn test_rejects_bad_katana_color() {
        let yaml = DEMO.replace("\"#1a1a1a\"", "\"black\"");
        let err = parse(&yaml).unwrap_err();
        assert!(matches!(err, CommandError::InvalidEntry { ref entry, .. } if entry == "Demo@KFor.ge/Kage"));
    }

    #[test]
    fn test_rejects_short_password() {
        let yaml = DEMO.replace("tamahagane-steel", "short");
        assert!(matches!(
            parse(&yaml),
            Err(CommandError::InvalidEntry { .. })
        ));
    }

    #[test]
    fn test_rejects_draft_quantity_out_of_range() {
        let yaml = DEMO.replace("quantity: 2", "quantity: 11");
        assert!(matches!(
            parse(&yaml),
            Err(CommandError::InvalidEntry { ref entry, .. }) if entry == "demo-guest"
        ));
    }

    #[test]
    fn test_rejects_unknown_section() {
        assert!(matches!(
            parse("admins: []\n"),
            Err(CommandError::Yaml(_))
        ));
    }
}
