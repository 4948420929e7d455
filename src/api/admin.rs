//! Admin endpoints: enrollment, pair repair and team management.

use axum::{
    extract::{multipart::Field, Multipart, Path, Query, State},
    Json,
};

use super::{optional, required, success, ApiResult};
use crate::api::auth::{normalize_username, student_from_registration};
use crate::auth::{hash_password, ActingUser};
use crate::errors::AppError;
use crate::models::{
    AdminDashboard, CreateTeamRequest, DisbandReport, EnrollRequest, Mission, NewUser, Pair,
    PairListQuery, RegisterRequest, ResetPasswordRequest, Role, Team, TeamDetail, UnpairOutcome,
    User,
};
use crate::storage::MaterialUpload;
use crate::AppState;

/// GET /api/admin/dashboard - Headline counts.
pub async fn admin_dashboard(
    State(state): State<AppState>,
    actor: ActingUser,
) -> ApiResult<AdminDashboard> {
    actor.require_admin()?;
    success(state.repo.admin_dashboard().await?)
}

/// GET /api/admin/students - All students.
pub async fn list_students(
    State(state): State<AppState>,
    actor: ActingUser,
) -> ApiResult<Vec<User>> {
    actor.require_admin()?;
    success(state.repo.list_students().await?)
}

/// POST /api/admin/users - Enroll a student or an admin.
pub async fn enroll_user(
    State(state): State<AppState>,
    actor: ActingUser,
    Json(request): Json<EnrollRequest>,
) -> ApiResult<User> {
    actor.require_admin()?;

    let new_user = user_from_enrollment(&request)?;
    let user = state.repo.create_user(&new_user).await?;
    tracing::info!(
        "{} enrolled {} as {}",
        actor.user.username,
        user.username,
        user.role.as_str()
    );
    success(user)
}

/// DELETE /api/admin/users/:id - Remove an unpaired account.
pub async fn delete_user(
    State(state): State<AppState>,
    actor: ActingUser,
    Path(id): Path<i64>,
) -> ApiResult<User> {
    actor.require_admin()?;
    if id == actor.id() {
        return Err(AppError::Validation(
            "You cannot delete your own account.".to_string(),
        ));
    }
    success(state.repo.delete_user(id).await?)
}

/// POST /api/admin/users/:id/reset-password - Reset to the given or default password.
pub async fn reset_password(
    State(state): State<AppState>,
    actor: ActingUser,
    Path(id): Path<i64>,
    body: Option<Json<ResetPasswordRequest>>,
) -> ApiResult<()> {
    actor.require_admin()?;

    let password = body
        .and_then(|Json(request)| request.password)
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| state.config.reset_password.clone());

    state
        .repo
        .set_password_hash(id, &hash_password(&password)?)
        .await?;
    tracing::info!("{} reset the password of user {}", actor.user.username, id);
    success(())
}

/// POST /api/admin/users/:id/unpair - Dissolve the user's pair.
pub async fn unpair_user(
    State(state): State<AppState>,
    actor: ActingUser,
    Path(id): Path<i64>,
) -> ApiResult<UnpairOutcome> {
    actor.require_admin()?;
    success(state.repo.unpair(id).await?)
}

/// GET /api/admin/pairs - All pairs, or only those not in a team.
pub async fn list_pairs(
    State(state): State<AppState>,
    actor: ActingUser,
    Query(query): Query<PairListQuery>,
) -> ApiResult<Vec<Pair>> {
    actor.require_admin()?;
    success(state.repo.list_pairs(query.available).await?)
}

/// GET /api/admin/teams - All teams with their pairs.
pub async fn list_teams(
    State(state): State<AppState>,
    actor: ActingUser,
) -> ApiResult<Vec<TeamDetail>> {
    actor.require_admin()?;
    success(state.repo.list_team_details().await?)
}

/// POST /api/admin/teams - Combine two pairs into a team.
pub async fn create_team(
    State(state): State<AppState>,
    actor: ActingUser,
    Json(request): Json<CreateTeamRequest>,
) -> ApiResult<TeamDetail> {
    actor.require_admin()?;
    success(
        state
            .repo
            .create_team(&request.team_name, request.pair1_id, request.pair2_id)
            .await?,
    )
}

/// DELETE /api/admin/teams/:id - Disband a team.
pub async fn disband_team(
    State(state): State<AppState>,
    actor: ActingUser,
    Path(id): Path<i64>,
) -> ApiResult<DisbandReport> {
    actor.require_admin()?;
    success(state.repo.disband_team(id, &state.store).await?)
}

/// PUT /api/admin/teams/:id/mission - Assign mission details and material.
///
/// Multipart fields: `school_name`, `outreach_date`, `time_interval`, `topic`,
/// `material_file`. A file part with an empty filename is ignored.
pub async fn assign_mission(
    State(state): State<AppState>,
    actor: ActingUser,
    Path(id): Path<i64>,
    mut multipart: Multipart,
) -> ApiResult<Team> {
    actor.require_admin()?;

    let mut mission = Mission::default();
    let mut upload = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "school_name" => mission.school_name = text_field(field).await?,
            "outreach_date" => mission.outreach_date = text_field(field).await?,
            "time_interval" => mission.time_interval = text_field(field).await?,
            "topic" => mission.topic = text_field(field).await?,
            "material_file" => {
                let original_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Failed to read file: {}", e)))?;
                if !original_name.is_empty() {
                    upload = Some(MaterialUpload {
                        original_name,
                        bytes: bytes.to_vec(),
                    });
                }
            }
            other => tracing::debug!("Ignoring unknown mission field {}", other),
        }
    }

    let team = state
        .repo
        .assign_mission(id, &mission, upload.as_ref(), &state.store)
        .await?;
    tracing::info!("{} assigned a mission to team {}", actor.user.username, team.id);
    success(team)
}

async fn text_field(field: Field<'_>) -> Result<Option<String>, AppError> {
    let text = field
        .text()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid form field: {}", e)))?;
    Ok(optional(Some(&text)))
}

/// Build an insert from an admin enrollment form.
///
/// Students need the full registration profile. Admin profile fields fall
/// back to fixed values and a register number derived from the username.
pub(crate) fn user_from_enrollment(request: &EnrollRequest) -> Result<NewUser, AppError> {
    let role = Role::from_str(&request.role)
        .ok_or_else(|| AppError::Validation(format!("Unknown role '{}'", request.role)))?;

    match role {
        Role::Student => student_from_registration(&RegisterRequest {
            name: request.name.clone(),
            username: request.username.clone(),
            register_number: request.register_number.clone().unwrap_or_default(),
            section: request.section.clone().unwrap_or_default(),
            dept: request.dept.clone().unwrap_or_default(),
            sigbed_team: request.sigbed_team.clone().unwrap_or_default(),
            password: request.password.clone(),
        }),
        Role::Admin => {
            let username = normalize_username(&request.username);
            if username.is_empty() {
                return Err(AppError::Validation("Username is required".to_string()));
            }
            if request.password.is_empty() {
                return Err(AppError::Validation("Password is required".to_string()));
            }

            Ok(NewUser {
                name: required(&request.name, "Name")?,
                register_number: optional(request.register_number.as_deref())
                    .unwrap_or_else(|| format!("ADMIN-{}", username)),
                section: optional(request.section.as_deref())
                    .map(|s| s.to_uppercase())
                    .unwrap_or_else(|| "ADMIN".to_string()),
                dept: optional(request.dept.as_deref())
                    .unwrap_or_else(|| "ADMINISTRATION".to_string()),
                sigbed_team: optional(request.sigbed_team.as_deref())
                    .unwrap_or_else(|| "CORE".to_string()),
                username,
                role: Role::Admin,
                password_hash: hash_password(&request.password)?,
            })
        }
    }
}
