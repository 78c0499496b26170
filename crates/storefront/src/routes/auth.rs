//! Account route handlers: registration, password login, logout and the
//! current user.

use axum::{Json, extract::State, http::StatusCode};
use katana_forge_core::account::{LoginInput, RegisterInput};
use serde::Serialize;
use tower_sessions::Session;

use crate::db::UserRepository;
use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::extract::Valid;
use crate::middleware::{RequireAuth, clear_current_user, set_current_user};
use crate::models::{CurrentUser, User};
use crate::services::auth::AuthService;
use crate::state::AppState;

/// `{ "user": .. }` envelope.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user: User,
}

/// `{ "success": true }`.
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Create an account and sign it in.
///
/// # Route
///
/// `POST /api/auth/register`
#[tracing::instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Valid(registration): Valid<RegisterInput>,
) -> Result<(StatusCode, Json<UserResponse>)> {
    let user = AuthService::new(state.pool())
        .register(&registration)
        .await?;

    sign_in(&session, &user).await?;
    tracing::info!(user_id = %user.id, "Account registered");

    Ok((StatusCode::CREATED, Json(UserResponse { user })))
}

/// Sign in with email and password.
///
/// # Route
///
/// `POST /api/auth/login`
#[tracing::instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Valid(credentials): Valid<LoginInput>,
) -> Result<Json<UserResponse>> {
    let user = AuthService::new(state.pool())
        .login(&credentials)
        .await?;

    sign_in(&session, &user).await?;

    Ok(Json(UserResponse { user }))
}

/// Sign out. Succeeds for anonymous callers too.
///
/// # Route
///
/// `POST /api/auth/logout`
pub async fn logout(session: Session) -> Result<Json<SuccessResponse>> {
    clear_current_user(&session).await?;
    clear_sentry_user();
    Ok(Json(SuccessResponse { success: true }))
}

/// The signed-in user, read fresh from the database.
///
/// # Route
///
/// `GET /api/auth/me`
pub async fn me(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(current): RequireAuth,
) -> Result<Json<UserResponse>> {
    let Some(user) = UserRepository::new(state.pool()).get_by_id(current.id).await? else {
        // Account deleted while the session lived on.
        clear_current_user(&session).await?;
        return Err(AppError::unauthenticated());
    };

    Ok(Json(UserResponse { user }))
}

/// Put the user in the session and tag Sentry events with them.
pub(crate) async fn sign_in(session: &Session, user: &User) -> Result<()> {
    set_current_user(session, &CurrentUser::from(user)).await?;
    set_sentry_user(&user.id, Some(user.email.as_str()));
    Ok(())
}
