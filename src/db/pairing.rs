//! Pairing engine: directed requests and the pairs formed by accepting them.
//!
//! Every state-changing operation runs under the repository write lock and
//! re-reads pairing status inside its own transaction, so two racing
//! acceptances can never pair the same student twice.

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use super::repository::{load_pair, load_user, pair_members, summary_from_row};
use super::Repository;
use crate::errors::AppError;
use crate::models::{
    Pair, PairingRequest, RequestView, Role, StudentDashboard, UnpairOutcome, User, UserSummary,
    REQUEST_PENDING,
};

const REQUEST_VIEW_SELECT: &str = r#"
    SELECT r.id, r.created_at,
           s.id AS s_id, s.username AS s_username, s.name AS s_name,
           s.register_number AS s_register_number, s.section AS s_section, s.dept AS s_dept,
           v.id AS v_id, v.username AS v_username, v.name AS v_name,
           v.register_number AS v_register_number, v.section AS v_section, v.dept AS v_dept
    FROM requests r
    JOIN users s ON s.id = r.sender_id
    JOIN users v ON v.id = r.receiver_id
"#;

impl Repository {
    // ==================== REQUEST LIFECYCLE ====================

    /// Propose a pairing from `sender_id` to `receiver_id`.
    pub async fn send_request(
        &self,
        sender_id: i64,
        receiver_id: i64,
    ) -> Result<PairingRequest, AppError> {
        if sender_id == receiver_id {
            return Err(AppError::InvalidSelection(
                "You cannot send a pairing request to yourself.".to_string(),
            ));
        }

        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let sender = load_user(&mut tx, sender_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", sender_id)))?;
        if sender.role != Role::Student {
            return Err(AppError::Unauthorized(
                "Only students can send pairing requests.".to_string(),
            ));
        }

        let receiver = load_user(&mut tx, receiver_id)
            .await?
            .filter(|u| u.role == Role::Student)
            .ok_or_else(|| AppError::NotFound(format!("Student {} not found", receiver_id)))?;

        if sender.pair_id.is_some() {
            return Err(AppError::AlreadyPaired("You are already paired.".to_string()));
        }
        if receiver.pair_id.is_some() {
            return Err(AppError::AlreadyPaired(format!(
                "{} is no longer available.",
                receiver.name
            )));
        }

        let existing = sqlx::query(
            "SELECT id FROM requests WHERE sender_id = ? AND receiver_id = ? AND status = ?",
        )
        .bind(sender_id)
        .bind(receiver_id)
        .bind(REQUEST_PENDING)
        .fetch_optional(&mut *tx)
        .await?;
        if existing.is_some() {
            return Err(AppError::DuplicateRequest(
                "Request already pending.".to_string(),
            ));
        }

        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            "INSERT INTO requests (sender_id, receiver_id, status, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(sender_id)
        .bind(receiver_id)
        .bind(REQUEST_PENDING)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(
            "Pairing request {} -> {} recorded",
            sender.username,
            receiver.username
        );

        Ok(PairingRequest {
            id: result.last_insert_rowid(),
            sender_id,
            receiver_id,
            status: REQUEST_PENDING.to_string(),
            created_at: now,
        })
    }

    /// Accept a request on behalf of its receiver and form the pair.
    ///
    /// Pair creation, both users' pair references and the removal of every
    /// other request touching either student commit together or not at all.
    /// A request overtaken by another pairing is deleted and reported stale.
    pub async fn accept_request(
        &self,
        request_id: i64,
        acting_user_id: i64,
    ) -> Result<Pair, AppError> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let request = load_request(&mut tx, request_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Request {} not found", request_id)))?;

        if request.receiver_id != acting_user_id {
            return Err(AppError::Unauthorized(
                "Only the receiver can accept this request.".to_string(),
            ));
        }

        let sender = load_user(&mut tx, request.sender_id).await?;
        let receiver = load_user(&mut tx, request.receiver_id).await?;
        let (sender, receiver) = match (sender, receiver) {
            (Some(s), Some(r)) if s.pair_id.is_none() && r.pair_id.is_none() => (s, r),
            _ => {
                sqlx::query("DELETE FROM requests WHERE id = ?")
                    .bind(request_id)
                    .execute(&mut *tx)
                    .await?;
                tx.commit().await?;
                tracing::info!("Purged stale pairing request {}", request_id);
                return Err(AppError::StaleRequest(
                    "Request expired: one of you is already paired.".to_string(),
                ));
            }
        };

        let pair_id = match form_pair(&mut tx, sender.id, receiver.id).await {
            Ok(pair_id) => pair_id,
            Err(e) => {
                tracing::error!("Pair creation for request {} failed: {}", request_id, e);
                return Err(AppError::PairCreationFailed(
                    "Error creating pair.".to_string(),
                ));
            }
        };

        let pair = load_pair(&mut tx, pair_id).await?.ok_or_else(|| {
            AppError::PairCreationFailed("Pair vanished before commit.".to_string())
        })?;

        tx.commit().await.map_err(|e| {
            tracing::error!("Pair commit for request {} failed: {:?}", request_id, e);
            AppError::PairCreationFailed("Error creating pair.".to_string())
        })?;

        tracing::info!(
            "Pair {} formed: {} + {}",
            pair.id,
            sender.username,
            receiver.username
        );
        Ok(pair)
    }

    /// Decline (receiver) or withdraw (sender) a pending request.
    pub async fn decline_request(
        &self,
        request_id: i64,
        acting_user_id: i64,
    ) -> Result<(), AppError> {
        let _guard = self.write_lock.lock().await;
        let mut conn = self.pool.acquire().await?;

        let request = load_request(&mut conn, request_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Request {} not found", request_id)))?;

        if request.sender_id != acting_user_id && request.receiver_id != acting_user_id {
            return Err(AppError::Unauthorized(
                "Only the sender or receiver can remove this request.".to_string(),
            ));
        }

        sqlx::query("DELETE FROM requests WHERE id = ?")
            .bind(request_id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    // ==================== PAIR LIFECYCLE ====================

    /// Dissolve a user's pair, releasing both members.
    ///
    /// A pair that belongs to a team cannot be dissolved until the team is disbanded.
    pub async fn unpair(&self, user_id: i64) -> Result<UnpairOutcome, AppError> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let user = load_user(&mut tx, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;
        let pair_id = user
            .pair_id
            .ok_or_else(|| AppError::NotPaired(format!("{} is not paired.", user.name)))?;

        let team_id: Option<i64> = sqlx::query("SELECT team_id FROM pairs WHERE id = ?")
            .bind(pair_id)
            .fetch_optional(&mut *tx)
            .await?
            .and_then(|row| row.get("team_id"));
        if let Some(team_id) = team_id {
            return Err(AppError::PairUnavailable(format!(
                "Pair {} belongs to team {}. Disband the team first.",
                pair_id, team_id
            )));
        }

        let partner_id: Option<i64> =
            sqlx::query("SELECT id FROM users WHERE pair_id = ? AND id != ?")
                .bind(pair_id)
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?
                .map(|row| row.get("id"));

        sqlx::query("UPDATE users SET pair_id = NULL WHERE pair_id = ?")
            .bind(pair_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM pairs WHERE id = ?")
            .bind(pair_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::info!("Pair {} dissolved by unpairing {}", pair_id, user.username);

        Ok(UnpairOutcome {
            pair_id,
            user_id,
            partner_id,
        })
    }

    // ==================== READ SIDE ====================

    /// Get a pair with its members.
    pub async fn get_pair(&self, pair_id: i64) -> Result<Option<Pair>, AppError> {
        let mut conn = self.pool.acquire().await?;
        load_pair(&mut conn, pair_id).await
    }

    /// List pairs, optionally only those not yet attached to a team.
    pub async fn list_pairs(&self, available_only: bool) -> Result<Vec<Pair>, AppError> {
        let mut conn = self.pool.acquire().await?;
        let sql = if available_only {
            "SELECT id, team_id, created_at FROM pairs WHERE team_id IS NULL ORDER BY id"
        } else {
            "SELECT id, team_id, created_at FROM pairs ORDER BY id"
        };
        let rows = sqlx::query(sql).fetch_all(&mut *conn).await?;

        let mut pairs = Vec::with_capacity(rows.len());
        for row in rows {
            let id: i64 = row.get("id");
            pairs.push(Pair {
                id,
                team_id: row.get("team_id"),
                created_at: row.get("created_at"),
                members: pair_members(&mut conn, id).await?,
            });
        }
        Ok(pairs)
    }

    /// The other member of a user's pair, if any.
    pub async fn partner_of(&self, user: &User) -> Result<Option<UserSummary>, AppError> {
        let Some(pair_id) = user.pair_id else {
            return Ok(None);
        };
        let mut conn = self.pool.acquire().await?;
        let members = pair_members(&mut conn, pair_id).await?;
        Ok(members.into_iter().find(|m| m.id != user.id))
    }

    /// Pending requests addressed to a user.
    pub async fn incoming_requests(&self, user_id: i64) -> Result<Vec<RequestView>, AppError> {
        let rows = sqlx::query(&format!(
            "{} WHERE r.receiver_id = ? AND r.status = ? ORDER BY r.created_at, r.id",
            REQUEST_VIEW_SELECT
        ))
        .bind(user_id)
        .bind(REQUEST_PENDING)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(request_view_from_row).collect())
    }

    /// Pending requests a user has sent.
    pub async fn outgoing_requests(&self, user_id: i64) -> Result<Vec<RequestView>, AppError> {
        let rows = sqlx::query(&format!(
            "{} WHERE r.sender_id = ? AND r.status = ? ORDER BY r.created_at, r.id",
            REQUEST_VIEW_SELECT
        ))
        .bind(user_id)
        .bind(REQUEST_PENDING)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(request_view_from_row).collect())
    }

    /// Unpaired students a user could still propose to.
    ///
    /// Excludes the user and anyone they already have a pending request with.
    pub async fn available_students(&self, user_id: i64) -> Result<Vec<UserSummary>, AppError> {
        let rows = sqlx::query(
            r#"SELECT id, username, name, register_number, section, dept
               FROM users
               WHERE role = 'student'
                 AND pair_id IS NULL
                 AND id != ?
                 AND id NOT IN (SELECT receiver_id FROM requests WHERE sender_id = ?)
               ORDER BY name, id"#,
        )
        .bind(user_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|row| summary_from_row(row, "")).collect())
    }

    /// Assemble the student dashboard.
    pub async fn student_dashboard(&self, user: User) -> Result<StudentDashboard, AppError> {
        let partner = self.partner_of(&user).await?;
        let incoming_requests = self.incoming_requests(user.id).await?;
        let outgoing_requests = self.outgoing_requests(user.id).await?;
        let available_students = if user.pair_id.is_some() {
            Vec::new()
        } else {
            self.available_students(user.id).await?
        };

        Ok(StudentDashboard {
            user,
            partner,
            incoming_requests,
            outgoing_requests,
            available_students,
        })
    }
}

/// Create the pair, link both students and clear every request touching either.
async fn form_pair(
    conn: &mut SqliteConnection,
    sender_id: i64,
    receiver_id: i64,
) -> Result<i64, AppError> {
    let pair_id = sqlx::query("INSERT INTO pairs (team_id, created_at) VALUES (NULL, ?)")
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();

    let linked = sqlx::query(
        "UPDATE users SET pair_id = ? WHERE id IN (?, ?) AND pair_id IS NULL",
    )
    .bind(pair_id)
    .bind(sender_id)
    .bind(receiver_id)
    .execute(&mut *conn)
    .await?
    .rows_affected();
    if linked != 2 {
        return Err(AppError::Internal(format!(
            "Linked {} users to pair {}, expected 2",
            linked, pair_id
        )));
    }

    sqlx::query(
        "DELETE FROM requests WHERE sender_id IN (?, ?) OR receiver_id IN (?, ?)",
    )
    .bind(sender_id)
    .bind(receiver_id)
    .bind(sender_id)
    .bind(receiver_id)
    .execute(&mut *conn)
    .await?;

    Ok(pair_id)
}

async fn load_request(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<PairingRequest>, AppError> {
    let row = sqlx::query(
        "SELECT id, sender_id, receiver_id, status, created_at FROM requests WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(|row| PairingRequest {
        id: row.get("id"),
        sender_id: row.get("sender_id"),
        receiver_id: row.get("receiver_id"),
        status: row.get("status"),
        created_at: row.get("created_at"),
    }))
}

fn request_view_from_row(row: &SqliteRow) -> RequestView {
    RequestView {
        id: row.get("id"),
        sender: summary_from_row(row, "s_"),
        receiver: summary_from_row(row, "v_"),
        created_at: row.get("created_at"),
    }
}
