//! Draft repository.
//!
//! A draft belongs either to a user (`owner_id`) or to a guest browser
//! (`guest_token`, mirrored in the `draft_id` cookie). Each owner and each
//! token has at most one draft.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use katana_forge_core::drafts::{DraftContent, DraftSnapshot, merge_snapshots};
use katana_forge_core::{DraftId, UserId};

use super::RepositoryError;
use super::katanas::stored_config;
use crate::models::Draft;

const DRAFT_COLUMNS: &str = "id, owner_id, guest_token, handle_color, blade_tint, metalness, roughness, quantity, updated_at";

#[derive(sqlx::FromRow)]
struct DraftRow {
    id: DraftId,
    owner_id: Option<UserId>,
    guest_token: Option<String>,
    handle_color: String,
    blade_tint: String,
    metalness: f64,
    roughness: f64,
    quantity: i16,
    updated_at: DateTime<Utc>,
}

impl TryFrom<DraftRow> for Draft {
    type Error = RepositoryError;

    fn try_from(row: DraftRow) -> Result<Self, Self::Error> {
        let quantity =
            u8::try_from(row.quantity).map_err(|e| RepositoryError::corrupt("draft quantity", e))?;
        Ok(Self {
            id: row.id,
            owner_id: row.owner_id,
            guest_token: row.guest_token,
            content: DraftContent {
                config: stored_config(
                    row.handle_color,
                    row.blade_tint,
                    row.metalness,
                    row.roughness,
                )?,
                quantity,
            },
            updated_at: row.updated_at,
        })
    }
}

/// Repository for drafts.
pub struct DraftRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> DraftRepository<'a> {
    /// Create a new draft repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// The signed-in user's draft.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_owner(&self, owner_id: UserId) -> Result<Option<Draft>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        find_by_owner(&mut conn, owner_id, false).await
    }

    /// A guest's draft.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_guest(&self, token: &str) -> Result<Option<Draft>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        find_by_guest(&mut conn, token, false).await
    }

    /// Create or replace the user's draft, dropping any guest token on it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the upsert fails.
    pub async fn save_for_owner(
        &self,
        owner_id: UserId,
        content: &DraftContent,
    ) -> Result<Draft, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let draft = upsert_owner(&mut tx, owner_id, content).await?;
        tx.commit().await?;
        Ok(draft)
    }

    /// Create or replace a guest draft.
    ///
    /// Without a token (or with a token nobody holds) a new draft is created;
    /// a fresh random token is minted when none was given.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the upsert fails.
    pub async fn save_for_guest(
        &self,
        token: Option<&str>,
        content: &DraftContent,
    ) -> Result<Draft, RepositoryError> {
        let token = token.map_or_else(|| Uuid::new_v4().to_string(), str::to_owned);
        let mut tx = self.pool.begin().await?;

        let row: DraftRow = sqlx::query_as(&format!(
            r"
            INSERT INTO storefront.draft
                (id, guest_token, handle_color, blade_tint, metalness, roughness, quantity)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (guest_token) DO UPDATE
                SET handle_color = EXCLUDED.handle_color,
                    blade_tint = EXCLUDED.blade_tint,
                    metalness = EXCLUDED.metalness,
                    roughness = EXCLUDED.roughness,
                    quantity = EXCLUDED.quantity,
                    updated_at = NOW()
            RETURNING {DRAFT_COLUMNS}
            "
        ))
        .bind(DraftId::random())
        .bind(&token)
        .bind(content.config.handle_color.as_str())
        .bind(content.config.blade_tint.as_str())
        .bind(content.config.metalness)
        .bind(content.config.roughness)
        .bind(i16::from(content.quantity))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        row.try_into()
    }

    /// Fold the guest draft and a browser-local snapshot into the user's
    /// draft.
    ///
    /// The result is `user <- (guest <- local)`. The guest draft is always
    /// deleted; the user draft is written, or deleted when nothing is left.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any statement fails; nothing is
    /// changed in that case.
    pub async fn merge_into_owner(
        &self,
        owner_id: UserId,
        guest_token: Option<&str>,
        local: Option<&DraftSnapshot>,
    ) -> Result<Option<Draft>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let user_draft = find_by_owner(&mut tx, owner_id, true).await?;
        let guest_draft = match guest_token {
            Some(token) => find_by_guest(&mut tx, token, true).await?,
            None => None,
        };

        let guest_snapshot = guest_draft.as_ref().map(Draft::snapshot);
        let user_snapshot = user_draft.as_ref().map(Draft::snapshot);
        let merged = merge_snapshots(
            user_snapshot.as_ref(),
            merge_snapshots(guest_snapshot.as_ref(), local).as_ref(),
        );

        if let Some(guest) = &guest_draft
            && guest.owner_id != Some(owner_id)
        {
            delete(&mut tx, guest.id).await?;
        }

        let persisted = match merged {
            Some(snapshot) => Some(upsert_owner(&mut tx, owner_id, &snapshot.content).await?),
            None => {
                if let Some(user) = &user_draft {
                    delete(&mut tx, user.id).await?;
                }
                None
            }
        };

        tx.commit().await?;
        Ok(persisted)
    }
}

// =============================================================================
// Connection-level helpers
// =============================================================================

async fn find_by_owner(
    conn: &mut PgConnection,
    owner_id: UserId,
    lock: bool,
) -> Result<Option<Draft>, RepositoryError> {
    let row: Option<DraftRow> = sqlx::query_as(&format!(
        "SELECT {DRAFT_COLUMNS} FROM storefront.draft WHERE owner_id = $1{}",
        if lock { " FOR UPDATE" } else { "" }
    ))
    .bind(owner_id)
    .fetch_optional(conn)
    .await?;

    row.map(Draft::try_from).transpose()
}

async fn find_by_guest(
    conn: &mut PgConnection,
    token: &str,
    lock: bool,
) -> Result<Option<Draft>, RepositoryError> {
    let row: Option<DraftRow> = sqlx::query_as(&format!(
        "SELECT {DRAFT_COLUMNS} FROM storefront.draft WHERE guest_token = $1{}",
        if lock { " FOR UPDATE" } else { "" }
    ))
    .bind(token)
    .fetch_optional(conn)
    .await?;

    row.map(Draft::try_from).transpose()
}

async fn upsert_owner(
    conn: &mut PgConnection,
    owner_id: UserId,
    content: &DraftContent,
) -> Result<Draft, RepositoryError> {
    let row: DraftRow = sqlx::query_as(&format!(
        r"
        INSERT INTO storefront.draft
            (id, owner_id, handle_color, blade_tint, metalness, roughness, quantity)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (owner_id) DO UPDATE
            SET handle_color = EXCLUDED.handle_color,
                blade_tint = EXCLUDED.blade_tint,
                metalness = EXCLUDED.metalness,
                roughness = EXCLUDED.roughness,
                quantity = EXCLUDED.quantity,
                guest_token = NULL,
                updated_at = NOW()
        RETURNING {DRAFT_COLUMNS}
        "
    ))
    .bind(DraftId::random())
    .bind(owner_id)
    .bind(content.config.handle_color.as_str())
    .bind(content.config.blade_tint.as_str())
    .bind(content.config.metalness)
    .bind(content.config.roughness)
    .bind(i16::from(content.quantity))
    .fetch_one(conn)
    .await?;

    row.try_into()
}

async fn delete(conn: &mut PgConnection, id: DraftId) -> Result<(), RepositoryError> {
    sqlx::query("DELETE FROM storefront.draft WHERE id = $1")
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}
