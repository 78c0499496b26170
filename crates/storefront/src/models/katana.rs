//! Saved katanas and drafts.

use chrono::{DateTime, Utc};
use serde::Serialize;

use katana_forge_core::drafts::{DraftContent, DraftSnapshot};
use katana_forge_core::katana::KatanaConfig;
use katana_forge_core::{DraftId, KatanaId, UserId};

/// A named configuration owned by a user.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Katana {
    pub id: KatanaId,
    pub owner_id: UserId,
    pub name: String,
    #[serde(flatten)]
    pub config: KatanaConfig,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The in-progress configuration of a user or a guest.
#[derive(Debug, Clone, PartialEq)]
pub struct Draft {
    pub id: DraftId,
    pub owner_id: Option<UserId>,
    pub guest_token: Option<String>,
    pub content: DraftContent,
    pub updated_at: DateTime<Utc>,
}

impl Draft {
    /// The draft as a timestamped snapshot, ready for merging.
    #[must_use]
    pub fn snapshot(&self) -> DraftSnapshot {
        DraftSnapshot {
            content: self.content.clone(),
            updated_at: Some(self.updated_at),
        }
    }
}
