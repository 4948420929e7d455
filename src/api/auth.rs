//! Registration, login and session endpoints.

use axum::{extract::State, Json};

use super::{required, success, ApiResult};
use crate::auth::{hash_password, verify_password, ActingUser};
use crate::errors::AppError;
use crate::models::{LoginRequest, LoginResponse, NewUser, RegisterRequest, Role, User};
use crate::AppState;

/// POST /api/auth/register - Self-register as a student.
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<User> {
    let new_user = student_from_registration(&request)?;
    let user = state.repo.create_user(&new_user).await?;
    tracing::info!("Registered student {} ({})", user.username, user.id);
    success(user)
}

/// POST /api/auth/login - Exchange credentials for a session token.
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<LoginResponse> {
    let username = normalize_username(&request.username);
    let invalid = || AppError::Unauthenticated("Invalid credentials".to_string());

    let user = state
        .repo
        .find_user_by_username(&username)
        .await?
        .ok_or_else(invalid)?;
    if !verify_password(&request.password, &user.password_hash) {
        return Err(invalid());
    }

    let ttl = chrono::Duration::hours(state.config.session_ttl_hours);
    let (token, expires_at) = state.repo.create_session(user.id, ttl).await?;
    tracing::info!("{} logged in as {}", user.username, user.role.as_str());

    success(LoginResponse {
        token,
        expires_at,
        user,
    })
}

/// POST /api/auth/logout - End the current session.
pub async fn logout(State(state): State<AppState>, actor: ActingUser) -> ApiResult<()> {
    state.repo.delete_session(&actor.token).await?;
    success(())
}

/// GET /api/me - The acting user's profile.
pub async fn me(actor: ActingUser) -> ApiResult<User> {
    success(actor.user)
}

/// Usernames are case-insensitive and stored lowercased.
pub(crate) fn normalize_username(username: &str) -> String {
    username.trim().to_lowercase()
}

/// Build a student insert from a registration form.
///
/// Register numbers are trimmed and sections uppercased.
pub(crate) fn student_from_registration(request: &RegisterRequest) -> Result<NewUser, AppError> {
    let username = normalize_username(&request.username);
    if username.is_empty() {
        return Err(AppError::Validation("Username is required".to_string()));
    }
    if request.password.is_empty() {
        return Err(AppError::Validation("Password is required".to_string()));
    }

    Ok(NewUser {
        username,
        name: required(&request.name, "Name")?,
        register_number: required(&request.register_number, "Register number")?,
        section: required(&request.section, "Section")?.to_uppercase(),
        dept: required(&request.dept, "Department")?,
        sigbed_team: required(&request.sigbed_team, "SIGBED team")?,
        role: Role::Student,
        password_hash: hash_password(&request.password)?,
    })
}
