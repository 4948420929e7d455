//! Session authentication and password hashing.
//!
//! Clients present `Authorization: Bearer <token>` (or `x-session-token`).
//! The middleware resolves the token to an [`ActingUser`] that handlers
//! receive explicitly; secrets are compared in constant time.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;

use crate::errors::AppError;
use crate::models::{Role, User};
use crate::AppState;

/// Alternate header carrying the session token.
pub const SESSION_HEADER: &str = "x-session-token";

/// The authenticated user on whose behalf an operation runs.
#[derive(Debug, Clone)]
pub struct ActingUser {
    pub user: User,
    /// Raw token of the current session, used by logout.
    pub token: String,
}

impl ActingUser {
    pub fn id(&self) -> i64 {
        self.user.id
    }

    pub fn role(&self) -> Role {
        self.user.role
    }

    /// Fail unless the acting user is an admin.
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.role() == Role::Admin {
            Ok(())
        } else {
            Err(AppError::Unauthorized("Admin access required.".to_string()))
        }
    }

    /// Fail unless the acting user is a student.
    pub fn require_student(&self) -> Result<(), AppError> {
        if self.role() == Role::Student {
            Ok(())
        } else {
            Err(AppError::Unauthorized(
                "This action is only available to students.".to_string(),
            ))
        }
    }
}

impl<S> FromRequestParts<S> for ActingUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<ActingUser>()
            .cloned()
            .ok_or_else(|| AppError::Unauthenticated("Login required.".to_string()))
    }
}

/// Session layer: resolve the bearer token and attach the [`ActingUser`].
pub async fn session_auth_layer(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = extract_token(&request) else {
        return AppError::Unauthenticated("Missing session token.".to_string()).into_response();
    };

    match state.repo.resolve_session(&token).await {
        Ok(Some(user)) => {
            request.extensions_mut().insert(ActingUser { user, token });
            next.run(request).await
        }
        Ok(None) => {
            AppError::Unauthenticated("Invalid or expired session.".to_string()).into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// Pull the session token from the bearer header or the session header.
fn extract_token(request: &Request) -> Option<String> {
    let headers = request.headers();

    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .or_else(|| headers.get(SESSION_HEADER).and_then(|v| v.to_str().ok()))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Hash a password into a PHC string using Argon2.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
}

/// Verify a password against a stored PHC string. Malformed hashes never match.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Perform constant-time string comparison.
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_constant_time_compare_equal() {
        assert!(constant_time_compare("test-key-123", "test-key-123"));
    }

    #[test]
    fn test_constant_time_compare_not_equal() {
        assert!(!constant_time_compare("test-key-123", "test-key-124"));
    }

    #[test]
    fn test_constant_time_compare_different_lengths() {
        assert!(!constant_time_compare("short", "much-longer-key"));
    }

    #[test]
    fn test_password_hash_roundtrip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
        assert!(!verify_password("correct horse", "not-a-phc-string"));
    }

    #[test]
    fn test_extract_token_prefers_bearer() {
        let request = Request::builder()
            .header(header::AUTHORIZATION, "Bearer abc.def")
            .header(SESSION_HEADER, "other.token")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_token(&request).as_deref(), Some("abc.def"));

        let request = Request::builder()
            .header(SESSION_HEADER, " abc.def ")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_token(&request).as_deref(), Some("abc.def"));

        let request = Request::builder()
            .header(header::AUTHORIZATION, "Basic Zm9v")
            .body(Body::empty())
            .unwrap();
        assert!(extract_token(&request).is_none());
    }
}
