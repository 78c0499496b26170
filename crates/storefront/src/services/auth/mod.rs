//! Authentication service.
//!
//! Provides password authentication and Google sign-in.

mod error;
pub mod google;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use rand::Rng;
use sqlx::PgPool;

use katana_forge_core::Email;
use katana_forge_core::account::Registration;

use self::google::GoogleProfile;
use crate::db::RepositoryError;
use crate::db::users::UserRepository;
use crate::models::User;

/// Validated login form.
#[derive(Clone)]
pub struct Credentials {
    pub email: Email,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Authentication service.
///
/// Handles user registration, login, and Google account linking.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            users: UserRepository::new(pool),
        }
    }

    // =========================================================================
    // Password Authentication
    // =========================================================================

    /// Register a new user with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    pub async fn register(&self, registration: &Registration) -> Result<User, AuthError> {
        let password_hash = hash_password(&registration.password)?;

        self.users
            .create(&registration.email, &registration.name, &password_hash)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })
    }

    /// Login with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    pub async fn login(&self, credentials: &Credentials) -> Result<User, AuthError> {
        let (user, password_hash) = self
            .users
            .get_with_password_hash(&credentials.email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(&credentials.password, &password_hash)?;

        Ok(user)
    }

    // =========================================================================
    // Google
    // =========================================================================

    /// Find or create the user behind a Google profile.
    ///
    /// New accounts get a random password nobody knows, so they can only
    /// sign in through Google until they reset it.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UnverifiedEmail` unless Google vouches for the
    /// address.
    pub async fn login_with_google(&self, profile: &GoogleProfile) -> Result<User, AuthError> {
        if !profile.is_verified() {
            return Err(AuthError::UnverifiedEmail);
        }
        let email = profile
            .email
            .as_deref()
            .and_then(|raw| Email::parse(raw).ok())
            .ok_or(AuthError::UnverifiedEmail)?;

        let name = profile.display_name(&email);
        let unusable_hash = hash_password(&generate_random_string(96))?;

        Ok(self
            .users
            .upsert_google(&email, &name, &profile.sub, &unusable_hash)
            .await?)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::PasswordHash(e.to_string()))
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

/// Random alphanumeric string, for OAuth `state` values and throwaway
/// passwords.
#[must_use]
pub fn generate_random_string(length: usize) -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::rng();
    (0..length)
        .map(|_| {
            let idx = rng.random_range(0..CHARSET.len());
            char::from(CHARSET.get(idx).copied().unwrap_or(b'0'))
        })
        .collect()
}
