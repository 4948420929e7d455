//! Team assembler: combining free pairs into teams, missions, and disbanding.

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use super::repository::{load_pair, pair_members};
use super::Repository;
use crate::errors::AppError;
use crate::models::{DisbandReport, MaterialCleanup, Mission, Pair, Team, TeamDetail, User};
use crate::storage::{MaterialStore, MaterialUpload, Removal};

const TEAM_COLUMNS: &str =
    "id, team_name, created_at, school_name, outreach_date, time_interval, topic, material_filename";

impl Repository {
    /// Combine two distinct, unattached pairs into a new team.
    pub async fn create_team(
        &self,
        team_name: &str,
        pair_a: i64,
        pair_b: i64,
    ) -> Result<TeamDetail, AppError> {
        let team_name = team_name.trim();
        if team_name.is_empty() {
            return Err(AppError::Validation("Team name is required".to_string()));
        }
        if pair_a == pair_b {
            return Err(AppError::InvalidSelection(
                "You must select two different pairs!".to_string(),
            ));
        }

        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        for pair_id in [pair_a, pair_b] {
            let row = sqlx::query("SELECT team_id FROM pairs WHERE id = ?")
                .bind(pair_id)
                .fetch_optional(&mut *tx)
                .await?;
            match row.map(|r| r.get::<Option<i64>, _>("team_id")) {
                None => {
                    return Err(AppError::PairUnavailable(format!(
                        "Pair {} does not exist",
                        pair_id
                    )))
                }
                Some(Some(team_id)) => {
                    return Err(AppError::PairUnavailable(format!(
                        "Pair {} already belongs to team {}",
                        pair_id, team_id
                    )))
                }
                Some(None) => {}
            }
        }

        let team_id = sqlx::query("INSERT INTO teams (team_name, created_at) VALUES (?, ?)")
            .bind(team_name)
            .bind(Utc::now().to_rfc3339())
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();

        let attached =
            sqlx::query("UPDATE pairs SET team_id = ? WHERE id IN (?, ?) AND team_id IS NULL")
                .bind(team_id)
                .bind(pair_a)
                .bind(pair_b)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        if attached != 2 {
            return Err(AppError::PairUnavailable(
                "One of the selected pairs was taken by another team".to_string(),
            ));
        }

        let detail = load_team_detail(&mut tx, team_id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("Team {} vanished before commit", team_id)))?;

        tx.commit().await?;
        tracing::info!(
            "Team {} ({}) assembled from pairs {} and {}",
            detail.team.team_name,
            team_id,
            pair_a,
            pair_b
        );
        Ok(detail)
    }

    /// Disband a team: release its pairs, remove its material, delete the record.
    ///
    /// Pairs and their members stay intact. A material file that is missing or
    /// cannot be deleted is reported in the result without failing the disband.
    pub async fn disband_team(
        &self,
        team_id: i64,
        store: &MaterialStore,
    ) -> Result<DisbandReport, AppError> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let team = load_team(&mut tx, team_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Team {} not found", team_id)))?;

        let released_pair_ids: Vec<i64> =
            sqlx::query("SELECT id FROM pairs WHERE team_id = ? ORDER BY id")
                .bind(team_id)
                .fetch_all(&mut *tx)
                .await?
                .iter()
                .map(|row| row.get("id"))
                .collect();

        sqlx::query("UPDATE pairs SET team_id = NULL WHERE team_id = ?")
            .bind(team_id)
            .execute(&mut *tx)
            .await?;

        let material = match team.material_filename {
            None => MaterialCleanup::NoMaterial,
            Some(filename) => match store.delete(&filename).await {
                Ok(Removal::Removed) => MaterialCleanup::Removed { filename },
                Ok(Removal::NotFound) => {
                    tracing::warn!(
                        "Material {} for team {} was already gone",
                        filename,
                        team_id
                    );
                    MaterialCleanup::AlreadyAbsent { filename }
                }
                Err(e) => {
                    tracing::warn!(
                        "Could not delete material {} for team {}: {}",
                        filename,
                        team_id,
                        e
                    );
                    MaterialCleanup::Failed {
                        filename,
                        message: e.message(),
                    }
                }
            },
        };

        sqlx::query("DELETE FROM teams WHERE id = ?")
            .bind(team_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::info!(
            "Team {} ({}) disbanded, released pairs {:?}",
            team.team_name,
            team_id,
            released_pair_ids
        );

        Ok(DisbandReport {
            team_id,
            team_name: team.team_name,
            released_pair_ids,
            material,
        })
    }

    /// Set a team's mission and, when supplied, store a new material file.
    ///
    /// The previous material file is left in place on disk.
    pub async fn assign_mission(
        &self,
        team_id: i64,
        mission: &Mission,
        upload: Option<&MaterialUpload>,
        store: &MaterialStore,
    ) -> Result<Team, AppError> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let team = load_team(&mut tx, team_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Team {} not found", team_id)))?;

        let material_filename = match upload {
            Some(upload) => Some(store.store(team_id, upload).await?),
            None => team.material_filename,
        };

        sqlx::query(
            "UPDATE teams SET school_name = ?, outreach_date = ?, time_interval = ?, topic = ?, material_filename = ? WHERE id = ?",
        )
        .bind(&mission.school_name)
        .bind(&mission.outreach_date)
        .bind(&mission.time_interval)
        .bind(&mission.topic)
        .bind(&material_filename)
        .bind(team_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!("Mission updated for team {} ({})", team.team_name, team_id);

        Ok(Team {
            id: team.id,
            team_name: team.team_name,
            created_at: team.created_at,
            mission: mission.clone(),
            material_filename,
        })
    }

    // ==================== READ SIDE ====================

    /// Get a team with its pairs and members.
    pub async fn get_team_detail(&self, team_id: i64) -> Result<Option<TeamDetail>, AppError> {
        let mut conn = self.pool.acquire().await?;
        load_team_detail(&mut conn, team_id).await
    }

    /// List all teams with their pairs and members.
    pub async fn list_team_details(&self) -> Result<Vec<TeamDetail>, AppError> {
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query(&format!("SELECT {} FROM teams ORDER BY id", TEAM_COLUMNS))
            .fetch_all(&mut *conn)
            .await?;

        let mut teams = Vec::with_capacity(rows.len());
        for row in &rows {
            let team = team_from_row(row);
            let pairs = team_pairs(&mut conn, team.id).await?;
            teams.push(TeamDetail { team, pairs });
        }
        Ok(teams)
    }

    /// The team a student belongs to through their pair.
    pub async fn team_for_user(&self, user: &User) -> Result<TeamDetail, AppError> {
        let pair_id = user.pair_id.ok_or_else(|| {
            AppError::NotPaired("You need a partner before joining a team.".to_string())
        })?;

        let mut conn = self.pool.acquire().await?;
        let team_id = load_pair(&mut conn, pair_id)
            .await?
            .and_then(|pair| pair.team_id)
            .ok_or_else(|| {
                AppError::NotFound(
                    "Your 4-member outreach team has not been formed yet. Please wait for faculty assignment."
                        .to_string(),
                )
            })?;

        load_team_detail(&mut conn, team_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Team {} not found", team_id)))
    }
}

async fn load_team(conn: &mut SqliteConnection, team_id: i64) -> Result<Option<Team>, AppError> {
    let row = sqlx::query(&format!("SELECT {} FROM teams WHERE id = ?", TEAM_COLUMNS))
        .bind(team_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(row.as_ref().map(team_from_row))
}

async fn load_team_detail(
    conn: &mut SqliteConnection,
    team_id: i64,
) -> Result<Option<TeamDetail>, AppError> {
    let Some(team) = load_team(conn, team_id).await? else {
        return Ok(None);
    };
    let pairs = team_pairs(conn, team_id).await?;
    Ok(Some(TeamDetail { team, pairs }))
}

async fn team_pairs(conn: &mut SqliteConnection, team_id: i64) -> Result<Vec<Pair>, AppError> {
    let rows = sqlx::query("SELECT id, team_id, created_at FROM pairs WHERE team_id = ? ORDER BY id")
        .bind(team_id)
        .fetch_all(&mut *conn)
        .await?;

    let mut pairs = Vec::with_capacity(rows.len());
    for row in rows {
        let id: i64 = row.get("id");
        pairs.push(Pair {
            id,
            team_id: row.get("team_id"),
            created_at: row.get("created_at"),
            members: pair_members(conn, id).await?,
        });
    }
    Ok(pairs)
}

fn team_from_row(row: &SqliteRow) -> Team {
    Team {
        id: row.get("id"),
        team_name: row.get("team_name"),
        created_at: row.get("created_at"),
        mission: Mission {
            school_name: row.get("school_name"),
            outreach_date: row.get("outreach_date"),
            time_interval: row.get("time_interval"),
            topic: row.get("topic"),
        },
        material_filename: row.get("material_filename"),
    }
}
