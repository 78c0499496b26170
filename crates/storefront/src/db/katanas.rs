//! Katana repository.
//!
//! Every read and write is scoped to the owner; a katana belonging to
//! someone else behaves exactly like a missing one.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use katana_forge_core::katana::{KatanaConfig, KatanaConfigInput, NewKatana};
use katana_forge_core::{KatanaId, UserId};

use super::RepositoryError;
use crate::models::Katana;

const KATANA_COLUMNS: &str =
    "id, owner_id, name, handle_color, blade_tint, metalness, roughness, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct KatanaRow {
    id: KatanaId,
    owner_id: UserId,
    name: String,
    handle_color: String,
    blade_tint: String,
    metalness: f64,
    roughness: f64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<KatanaRow> for Katana {
    type Error = RepositoryError;

    fn try_from(row: KatanaRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            owner_id: row.owner_id,
            name: row.name,
            config: stored_config(row.handle_color, row.blade_tint, row.metalness, row.roughness)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Rebuild a configuration from its stored columns.
pub(crate) fn stored_config(
    handle_color: String,
    blade_tint: String,
    metalness: f64,
    roughness: f64,
) -> Result<KatanaConfig, RepositoryError> {
    KatanaConfigInput {
        handle_color,
        blade_tint,
        metalness,
        roughness,
    }
    .validate()
    .map_err(|e| RepositoryError::corrupt("katana config", format!("{e:?}")))
}

/// Repository for saved katanas.
pub struct KatanaRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> KatanaRepository<'a> {
    /// Create a new katana repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List the owner's katanas, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_by_owner(&self, owner_id: UserId) -> Result<Vec<Katana>, RepositoryError> {
        let rows: Vec<KatanaRow> = sqlx::query_as(&format!(
            "SELECT {KATANA_COLUMNS} FROM storefront.katana WHERE owner_id = $1 ORDER BY created_at DESC"
        ))
        .bind(owner_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(Katana::try_from).collect()
    }

    /// Get a katana the owner holds.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` when missing or owned by someone else.
    pub async fn find_owned(
        &self,
        id: KatanaId,
        owner_id: UserId,
    ) -> Result<Katana, RepositoryError> {
        let row: Option<KatanaRow> = sqlx::query_as(&format!(
            "SELECT {KATANA_COLUMNS} FROM storefront.katana WHERE id = $1 AND owner_id = $2"
        ))
        .bind(id)
        .bind(owner_id)
        .fetch_optional(self.pool)
        .await?;

        row.ok_or(RepositoryError::NotFound)?.try_into()
    }

    /// Save a new katana.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(
        &self,
        owner_id: UserId,
        katana: &NewKatana,
    ) -> Result<Katana, RepositoryError> {
        let row: KatanaRow = sqlx::query_as(&format!(
            r"
            INSERT INTO storefront.katana
                (id, owner_id, name, handle_color, blade_tint, metalness, roughness)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {KATANA_COLUMNS}
            "
        ))
        .bind(KatanaId::random())
        .bind(owner_id)
        .bind(katana.name.trim())
        .bind(katana.config.handle_color.as_str())
        .bind(katana.config.blade_tint.as_str())
        .bind(katana.config.metalness)
        .bind(katana.config.roughness)
        .fetch_one(self.pool)
        .await?;

        row.try_into()
    }

    /// Replace name and configuration of an owned katana.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` when missing or owned by someone else.
    pub async fn update(
        &self,
        id: KatanaId,
        owner_id: UserId,
        katana: &NewKatana,
    ) -> Result<Katana, RepositoryError> {
        let row: Option<KatanaRow> = sqlx::query_as(&format!(
            r"
            UPDATE storefront.katana
            SET name = $3, handle_color = $4, blade_tint = $5,
                metalness = $6, roughness = $7, updated_at = NOW()
            WHERE id = $1 AND owner_id = $2
            RETURNING {KATANA_COLUMNS}
            "
        ))
        .bind(id)
        .bind(owner_id)
        .bind(katana.name.trim())
        .bind(katana.config.handle_color.as_str())
        .bind(katana.config.blade_tint.as_str())
        .bind(katana.config.metalness)
        .bind(katana.config.roughness)
        .fetch_optional(self.pool)
        .await?;

        row.ok_or(RepositoryError::NotFound)?.try_into()
    }

    /// Delete an owned katana.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` when nothing was deleted.
    pub async fn remove(&self, id: KatanaId, owner_id: UserId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM storefront.katana WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Hand a katana over to another user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` when the katana does not exist and
    /// `RepositoryError::Ownership` when `current_owner` does not hold it.
    pub async fn transfer_ownership(
        &self,
        id: KatanaId,
        current_owner: UserId,
        new_owner: UserId,
    ) -> Result<Katana, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let owner: Option<UserId> =
            sqlx::query_scalar("SELECT owner_id FROM storefront.katana WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;

        check_transfer(owner, current_owner)?;

        let row: KatanaRow = sqlx::query_as(&format!(
            r"
            UPDATE storefront.katana
            SET owner_id = $2, updated_at = NOW()
            WHERE id = $1 AND owner_id = $3
            RETURNING {KATANA_COLUMNS}
            "
        ))
        .bind(id)
        .bind(new_owner)
        .bind(current_owner)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        row.try_into()
    }
}

/// A transfer is allowed only from the katana's current owner.
fn check_transfer(owner: Option<UserId>, current_owner: UserId) -> Result<(), RepositoryError> {
    match owner {
        None => Err(RepositoryError::NotFound),
        Some(owner) if owner != current_owner => Err(RepositoryError::Ownership),
        Some(_) => Ok(()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_from_current_owner() {
        let owner = UserId::random();
        assert!(check_transfer(Some(owner), owner).is_ok());
    }

    #[test]
    fn test_transfer_from_someone_else_is_ownership_error() {
        assert!(matches!(
            check_transfer(Some(UserId::random()), UserId::random()),
            Err(RepositoryError::Ownership)
        ));
    }

    #[test]
    fn test_transfer_of_missing_katana_is_not_found() {
        assert!(matches!(
            check_transfer(None, UserId::random()),
            Err(RepositoryError::NotFound)
        ));
    }

    #[test]
    fn test_stored_config_round_trip() {
        let config =
            stored_config("#8B1E1E".to_owned(), "#d9d2c5".to_owned(), 0.6, 0.35).unwrap();
        assert_eq!(config, KatanaConfig::default());
    }

    #[test]
    fn test_stored_config_out_of_range_is_corruption() {
        assert!(matches!(
            stored_config("#8b1e1e".to_owned(), "#d9d2c5".to_owned(), 1.5, 0.35),
            Err(RepositoryError::DataCorruption(_))
        ));
    }
}
