//! Database repository for accounts, sessions and shared row mapping.
//!
//! Pairing and team operations live in sibling modules as further `impl Repository` blocks.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tokio::sync::Mutex;

use crate::auth::constant_time_compare;
use crate::errors::AppError;
use crate::models::{AdminDashboard, NewUser, Pair, Role, User, UserSummary};

pub(super) const USER_COLUMNS: &str = "id, username, password_hash, name, register_number, section, dept, sigbed_team, role, pair_id, created_at";

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pub(super) pool: SqlitePool,
    /// Serializes every state-changing pairing/team transaction.
    pub(super) write_lock: Arc<Mutex<()>>,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    // ==================== USER OPERATIONS ====================

    /// Create a user. Duplicate usernames or register numbers are a conflict.
    pub async fn create_user(&self, new_user: &NewUser) -> Result<User, AppError> {
        let now = Utc::now().to_rfc3339();

        let result = sqlx::query(
            "INSERT INTO users (username, password_hash, name, register_number, section, dept, sigbed_team, role, pair_id, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, NULL, ?)"
        )
        .bind(&new_user.username)
        .bind(&new_user.password_hash)
        .bind(&new_user.name)
        .bind(&new_user.register_number)
        .bind(&new_user.section)
        .bind(&new_user.dept)
        .bind(&new_user.sigbed_team)
        .bind(new_user.role.as_str())
        .bind(&now)
        .execute(&self.pool)
        .await;

        let result = match result {
            Ok(result) => result,
            Err(err) if is_unique_violation(&err) => {
                return Err(AppError::Conflict(
                    "Username or Register Number already exists.".to_string(),
                ))
            }
            Err(err) => return Err(err.into()),
        };

        Ok(User {
            id: result.last_insert_rowid(),
            username: new_user.username.clone(),
            name: new_user.name.clone(),
            register_number: new_user.register_number.clone(),
            section: new_user.section.clone(),
            dept: new_user.dept.clone(),
            sigbed_team: new_user.sigbed_team.clone(),
            role: new_user.role,
            pair_id: None,
            created_at: now,
            password_hash: new_user.password_hash.clone(),
        })
    }

    /// Get a user by ID.
    pub async fn get_user(&self, id: i64) -> Result<Option<User>, AppError> {
        let mut conn = self.pool.acquire().await?;
        load_user(&mut conn, id).await
    }

    /// Get a user by (already normalized) username.
    pub async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM users WHERE username = ?",
            USER_COLUMNS
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    /// List all students, ordered by name.
    pub async fn list_students(&self) -> Result<Vec<User>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM users WHERE role = 'student' ORDER BY name, id",
            USER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(user_from_row).collect())
    }

    /// Delete a user. Paired users must be unpaired first.
    ///
    /// Pending requests and sessions belonging to the user go with the account.
    pub async fn delete_user(&self, id: i64) -> Result<User, AppError> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let user = load_user(&mut tx, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))?;

        if user.pair_id.is_some() {
            return Err(AppError::AlreadyPaired(format!(
                "Cannot delete {} while paired. Unpair them first.",
                user.username
            )));
        }

        sqlx::query("DELETE FROM requests WHERE sender_id = ? OR receiver_id = ?")
            .bind(id)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM sessions WHERE user_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::info!("Deleted user {} ({})", user.username, user.id);
        Ok(user)
    }

    /// Replace a user's password hash and end all of their sessions.
    pub async fn set_password_hash(&self, id: i64, password_hash: &str) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
            .bind(password_hash)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("User {} not found", id)));
        }

        sqlx::query("DELETE FROM sessions WHERE user_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Create the bootstrap admin account if no `admin` user exists.
    ///
    /// Returns whether an account was created.
    pub async fn ensure_admin(&self, password_hash: &str) -> Result<bool, AppError> {
        if self.find_user_by_username("admin").await?.is_some() {
            return Ok(false);
        }

        self.create_user(&NewUser {
            username: "admin".to_string(),
            name: "System Admin".to_string(),
            register_number: "ADMIN001".to_string(),
            section: "MAIN".to_string(),
            dept: "ADMINISTRATION".to_string(),
            sigbed_team: "CORE".to_string(),
            role: Role::Admin,
            password_hash: password_hash.to_string(),
        })
        .await?;

        Ok(true)
    }

    /// Headline counts for the admin dashboard.
    pub async fn admin_dashboard(&self) -> Result<AdminDashboard, AppError> {
        let row = sqlx::query(
            r#"SELECT
                (SELECT COUNT(*) FROM users WHERE role = 'student') AS total_students,
                (SELECT COUNT(*) FROM users WHERE role = 'student' AND pair_id IS NULL) AS unpaired_students,
                (SELECT COUNT(*) FROM teams) AS total_teams"#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(AdminDashboard {
            total_students: row.get("total_students"),
            unpaired_students: row.get("unpaired_students"),
            total_teams: row.get("total_teams"),
        })
    }

    // ==================== SESSION OPERATIONS ====================

    /// Start a session for a user. Returns the bearer token and its expiry.
    pub async fn create_session(
        &self,
        user_id: i64,
        ttl: Duration,
    ) -> Result<(String, String), AppError> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let secret = uuid::Uuid::new_v4().simple().to_string();
        let now = Utc::now();
        let expires_at = (now + ttl).to_rfc3339();

        sqlx::query(
            "INSERT INTO sessions (id, secret, user_id, created_at, expires_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&secret)
        .bind(user_id)
        .bind(now.to_rfc3339())
        .bind(&expires_at)
        .execute(&self.pool)
        .await?;

        Ok((format!("{}.{}", id, secret), expires_at))
    }

    /// Resolve a bearer token to its user. Expired sessions are purged.
    pub async fn resolve_session(&self, token: &str) -> Result<Option<User>, AppError> {
        let Some((id, secret)) = token.split_once('.') else {
            return Ok(None);
        };

        let row = sqlx::query("SELECT secret, user_id, expires_at FROM sessions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let stored_secret: String = row.get("secret");
        if !constant_time_compare(secret, &stored_secret) {
            return Ok(None);
        }

        let expires_at: String = row.get("expires_at");
        let expired = DateTime::parse_from_rfc3339(&expires_at)
            .map(|t| t.with_timezone(&Utc) <= Utc::now())
            .unwrap_or(true);
        if expired {
            sqlx::query("DELETE FROM sessions WHERE id = ?")
                .bind(id)
                .execute(&self.pool)
                .await?;
            return Ok(None);
        }

        self.get_user(row.get("user_id")).await
    }

    /// End a session. Unknown tokens are ignored.
    pub async fn delete_session(&self, token: &str) -> Result<(), AppError> {
        if let Some((id, _)) = token.split_once('.') {
            sqlx::query("DELETE FROM sessions WHERE id = ?")
                .bind(id)
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }
}

// ==================== ROW MAPPING ====================

pub(super) fn user_from_row(row: &SqliteRow) -> User {
    let role: String = row.get("role");
    User {
        id: row.get("id"),
        username: row.get("username"),
        name: row.get("name"),
        register_number: row.get("register_number"),
        section: row.get("section"),
        dept: row.get("dept"),
        sigbed_team: row.get("sigbed_team"),
        role: Role::from_str(&role).unwrap_or(Role::Student),
        pair_id: row.get("pair_id"),
        created_at: row.get("created_at"),
        password_hash: row.get("password_hash"),
    }
}

/// Map a row carrying summary columns under a column prefix (`""`, `"s_"`, ...).
pub(super) fn summary_from_row(row: &SqliteRow, prefix: &str) -> UserSummary {
    UserSummary {
        id: row.get(format!("{}id", prefix).as_str()),
        username: row.get(format!("{}username", prefix).as_str()),
        name: row.get(format!("{}name", prefix).as_str()),
        register_number: row.get(format!("{}register_number", prefix).as_str()),
        section: row.get(format!("{}section", prefix).as_str()),
        dept: row.get(format!("{}dept", prefix).as_str()),
    }
}

pub(super) async fn load_user(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<User>, AppError> {
    let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(row.as_ref().map(user_from_row))
}

/// Load a pair with its members.
pub(super) async fn load_pair(
    conn: &mut SqliteConnection,
    pair_id: i64,
) -> Result<Option<Pair>, AppError> {
    let row = sqlx::query("SELECT id, team_id, created_at FROM pairs WHERE id = ?")
        .bind(pair_id)
        .fetch_optional(&mut *conn)
        .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let members = pair_members(conn, pair_id).await?;
    Ok(Some(Pair {
        id: row.get("id"),
        team_id: row.get("team_id"),
        created_at: row.get("created_at"),
        members,
    }))
}

pub(super) async fn pair_members(
    conn: &mut SqliteConnection,
    pair_id: i64,
) -> Result<Vec<UserSummary>, AppError> {
    let rows = sqlx::query(
        "SELECT id, username, name, register_number, section, dept FROM users WHERE pair_id = ? ORDER BY id",
    )
    .bind(pair_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.iter().map(|row| summary_from_row(row, "")).collect())
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|db| db.is_unique_violation())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::TestDb;

    #[tokio::test]
    async fn test_duplicate_username_is_conflict() {
        let db = TestDb::new().await;
        db.student("alice").await;

        let err = db
            .repo
            .create_user(&NewUser {
                username: "alice".to_string(),
                name: "Other Alice".to_string(),
                register_number: "REG-other".to_string(),
                section: "B".to_string(),
                dept: "ECE".to_string(),
                sigbed_team: "Core".to_string(),
                role: Role::Student,
                password_hash: "x".to_string(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_delete_blocked_while_paired() {
        let db = TestDb::new().await;
        let (alice, bob, _) = db.paired("alice", "bob").await;

        let err = db.repo.delete_user(alice.id).await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyPaired(_)));

        db.repo.unpair(bob.id).await.unwrap();
        db.repo.delete_user(alice.id).await.unwrap();
        assert!(db.repo.get_user(alice.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_removes_pending_requests() {
        let db = TestDb::new().await;
        let alice = db.student("alice").await;
        let bob = db.student("bob").await;
        db.repo.send_request(alice.id, bob.id).await.unwrap();

        db.repo.delete_user(alice.id).await.unwrap();

        assert!(db.repo.incoming_requests(bob.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_session_roundtrip_and_tamper() {
        let db = TestDb::new().await;
        let alice = db.student("alice").await;

        let (token, _) = db
            .repo
            .create_session(alice.id, Duration::hours(1))
            .await
            .unwrap();
        let resolved = db.repo.resolve_session(&token).await.unwrap().unwrap();
        assert_eq!(resolved.id, alice.id);

        let (id, _) = token.split_once('.').unwrap();
        let forged = format!("{}.{}", id, "0".repeat(32));
        assert!(db.repo.resolve_session(&forged).await.unwrap().is_none());
        assert!(db.repo.resolve_session("garbage").await.unwrap().is_none());

        db.repo.delete_session(&token).await.unwrap();
        assert!(db.repo.resolve_session(&token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_session_rejected() {
        let db = TestDb::new().await;
        let alice = db.student("alice").await;

        let (token, _) = db
            .repo
            .create_session(alice.id, Duration::seconds(-5))
            .await
            .unwrap();
        assert!(db.repo.resolve_session(&token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_password_reset_ends_sessions() {
        let db = TestDb::new().await;
        let alice = db.student("alice").await;
        let (token, _) = db
            .repo
            .create_session(alice.id, Duration::hours(1))
            .await
            .unwrap();

        db.repo.set_password_hash(alice.id, "new-hash").await.unwrap();

        assert!(db.repo.resolve_session(&token).await.unwrap().is_none());
        let reloaded = db.repo.get_user(alice.id).await.unwrap().unwrap();
        assert_eq!(reloaded.password_hash, "new-hash");
    }

    #[tokio::test]
    async fn test_ensure_admin_is_idempotent() {
        let db = TestDb::new().await;
        assert!(db.repo.ensure_admin("hash").await.unwrap());
        assert!(!db.repo.ensure_admin("hash").await.unwrap());

        let admin = db.repo.find_user_by_username("admin").await.unwrap().unwrap();
        assert!(admin.is_admin());
        assert_eq!(admin.register_number, "ADMIN001");
    }

    #[tokio::test]
    async fn test_admin_dashboard_counts() {
        let db = TestDb::new().await;
        db.paired("alice", "bob").await;
        db.student("carol").await;
        db.user("boss", Role::Admin).await;

        let stats = db.repo.admin_dashboard().await.unwrap();
        assert_eq!(
            stats,
            AdminDashboard {
                total_students: 3,
                unpaired_students: 1,
                total_teams: 0,
            }
        );
    }
}
