//! User domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use katana_forge_core::{Email, HexColor, UserId};

/// A storefront user (domain type).
///
/// The password hash never leaves the repository.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Normalized email address.
    pub email: Email,
    /// Display name.
    pub name: String,
    /// Preferred configurator background.
    pub background_color: HexColor,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
    /// When the user was last updated.
    pub updated_at: DateTime<Utc>,
}
