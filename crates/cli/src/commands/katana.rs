//! Katana maintenance commands.
//!
//! # Usage
//!
//! ```bash
//! # Hand a saved katana over to another account
//! kf-cli katana transfer 6f1c...e2 --from aiko@example.com --to kenji@example.com
//! ```

use katana_forge_core::{Email, KatanaId};
use katana_forge_storefront::db::{KatanaRepository, UserRepository};
use katana_forge_storefront::models::User;

use super::{CommandError, connect};

async fn user_by_email(users: &UserRepository<'_>, email: &str) -> Result<User, CommandError> {
    let email = Email::parse(email).map_err(|e| CommandError::InvalidEntry {
        entry: email.to_owned(),
        message: e.to_string(),
    })?;
    users
        .get_with_password_hash(&email)
        .await?
        .map(|(user, _)| user)
        .ok_or_else(|| CommandError::InvalidEntry {
            entry: email.as_str().to_owned(),
            message: "no such user".to_owned(),
        })
}

/// Move a katana from one account to another.
///
/// # Errors
///
/// Returns `InvalidEntry` for an unknown account and a repository error
/// when `from` does not own the katana.
pub async fn transfer(id: KatanaId, from: &str, to: &str) -> Result<(), CommandError> {
    let pool = connect().await?;
    let users = UserRepository::new(&pool);
    let current = user_by_email(&users, from).await?;
    let next = user_by_email(&users, to).await?;

    let katana = KatanaRepository::new(&pool)
        .transfer_ownership(id, current.id, next.id)
        .await?;

    tracing::info!(
        katana_id = %katana.id,
        from = %current.email.as_str(),
        to = %next.email.as_str(),
        "Katana transferred"
    );
    Ok(())
}
