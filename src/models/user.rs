//! User accounts and the request bodies that create or authenticate them.

use serde::{Deserialize, Serialize};

/// Account role. Students pair up; admins assemble teams.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Admin => "admin",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Some(Role::Student),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

/// A registered user.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub username: String,
    pub name: String,
    pub register_number: String,
    pub section: String,
    pub dept: String,
    pub sigbed_team: String,
    pub role: Role,
    pub pair_id: Option<i64>,
    pub created_at: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Public view of another student, used in listings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub name: String,
    pub register_number: String,
    pub section: String,
    pub dept: String,
}

/// Insert payload for the users table, already normalized and hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub name: String,
    pub register_number: String,
    pub section: String,
    pub dept: String,
    pub sigbed_team: String,
    pub role: Role,
    pub password_hash: String,
}

/// Request body for public student self-registration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub name: String,
    pub username: String,
    pub register_number: String,
    pub section: String,
    pub dept: String,
    pub sigbed_team: String,
    pub password: String,
}

/// Request body for admin enrollment of a student or another admin.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollRequest {
    pub role: String,
    pub name: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub register_number: Option<String>,
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub dept: Option<String>,
    #[serde(default)]
    pub sigbed_team: Option<String>,
}

/// Request body for login.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Successful login: the bearer token and who it belongs to.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: String,
    pub user: User,
}

/// Request body for an admin password reset.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResetPasswordRequest {
    #[serde(default)]
    pub password: Option<String>,
}
