//! User repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use katana_forge_core::{Email, HexColor, UserId};

use super::RepositoryError;
use crate::models::User;

const USER_COLUMNS: &str =
    "id, email, name, password_hash, background_color, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: UserId,
    email: String,
    name: String,
    password_hash: String,
    background_color: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn into_user(self) -> Result<(User, String), RepositoryError> {
        let email = Email::parse(&self.email).map_err(|e| RepositoryError::corrupt("email", e))?;
        let background_color = HexColor::parse(&self.background_color)
            .map_err(|e| RepositoryError::corrupt("background color", e))?;

        Ok((
            User {
                id: self.id,
                email,
                name: self.name,
                background_color,
                created_at: self.created_at,
                updated_at: self.updated_at,
            },
            self.password_hash,
        ))
    }
}

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user by their ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a stored value is invalid.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM storefront.user WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(|r| r.into_user().map(|(user, _)| user)).transpose()
    }

    /// Get a user and their password hash by email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a stored value is invalid.
    pub async fn get_with_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM storefront.user WHERE email = $1"
        ))
        .bind(email.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.map(UserRow::into_user).transpose()
    }

    /// Create a new user with a password hash.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(
        &self,
        email: &Email,
        name: &str,
        password_hash: &str,
    ) -> Result<User, RepositoryError> {
        let row: UserRow = sqlx::query_as(&format!(
            r"
            INSERT INTO storefront.user (id, email, name, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(UserId::random())
        .bind(email.as_str())
        .bind(name)
        .bind(password_hash)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::unique_violation(e, "email"))?;

        row.into_user().map(|(user, _)| user)
    }

    /// Find or create the user behind a Google account.
    ///
    /// Existing users keep their password and get the Google id linked;
    /// new users get `unusable_password_hash`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the Google id is linked to
    /// another email.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn upsert_google(
        &self,
        email: &Email,
        name: &str,
        google_id: &str,
        unusable_password_hash: &str,
    ) -> Result<User, RepositoryError> {
        let row: UserRow = sqlx::query_as(&format!(
            r"
            INSERT INTO storefront.user (id, email, name, password_hash, google_id)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (email) DO UPDATE
                SET google_id = COALESCE(storefront.user.google_id, EXCLUDED.google_id),
                    updated_at = NOW()
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(UserId::random())
        .bind(email.as_str())
        .bind(name)
        .bind(unusable_password_hash)
        .bind(google_id)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::unique_violation(e, "google account"))?;

        row.into_user().map(|(user, _)| user)
    }

    /// Create the user or reset their name and password.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the upsert fails.
    pub async fn upsert_with_password(
        &self,
        email: &Email,
        name: &str,
        password_hash: &str,
    ) -> Result<User, RepositoryError> {
        let row: UserRow = sqlx::query_as(&format!(
            r"
            INSERT INTO storefront.user (id, email, name, password_hash)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (email) DO UPDATE
                SET name = EXCLUDED.name,
                    password_hash = EXCLUDED.password_hash,
                    updated_at = NOW()
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(UserId::random())
        .bind(email.as_str())
        .bind(name)
        .bind(password_hash)
        .fetch_one(self.pool)
        .await?;

        row.into_user().map(|(user, _)| user)
    }

    /// Store the background preference.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user no longer exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn set_background_color(
        &self,
        id: UserId,
        color: &HexColor,
    ) -> Result<User, RepositoryError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            r"
            UPDATE storefront.user
            SET background_color = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(color.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.ok_or(RepositoryError::NotFound)?
            .into_user()
            .map(|(user, _)| user)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn row(email: &str, color: &str) -> UserRow {
        UserRow {
            id: UserId::random(),
            email: email.to_owned(),
            name: "Aiko".to_owned(),
            password_hash: "$argon2id$stub".to_owned(),
            background_color: color.to_owned(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_row_into_user() {
        let (user, hash) = row("aiko@example.com", "#040405").into_user().unwrap();
        assert_eq!(user.email.as_str(), "aiko@example.com");
        assert_eq!(user.background_color.as_str(), "#040405");
        assert_eq!(hash, "$argon2id$stub");
    }

    #[test]
    fn test_row_with_bad_color_is_corruption() {
        assert!(matches!(
            row("aiko@example.com", "black").into_user(),
            Err(RepositoryError::DataCorruption(_))
        ));
    }
}
