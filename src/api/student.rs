//! Student endpoints: dashboard, pairing requests and team view.

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};

use super::{success, ApiResult};
use crate::auth::ActingUser;
use crate::errors::AppError;
use crate::models::{Pair, PairingRequest, SendRequestBody, StudentDashboard, TeamDetail};
use crate::AppState;

/// GET /api/student/dashboard - Partner, incoming requests and available students.
pub async fn student_dashboard(
    State(state): State<AppState>,
    actor: ActingUser,
) -> ApiResult<StudentDashboard> {
    actor.require_student()?;
    success(state.repo.student_dashboard(actor.user).await?)
}

/// POST /api/requests - Propose a partner.
pub async fn send_request(
    State(state): State<AppState>,
    actor: ActingUser,
    Json(body): Json<SendRequestBody>,
) -> ApiResult<PairingRequest> {
    actor.require_student()?;
    success(state.repo.send_request(actor.id(), body.receiver_id).await?)
}

/// POST /api/requests/:id/accept - Accept a request addressed to the acting student.
pub async fn accept_request(
    State(state): State<AppState>,
    actor: ActingUser,
    Path(id): Path<i64>,
) -> ApiResult<Pair> {
    actor.require_student()?;
    success(state.repo.accept_request(id, actor.id()).await?)
}

/// DELETE /api/requests/:id - Decline or withdraw a request.
pub async fn decline_request(
    State(state): State<AppState>,
    actor: ActingUser,
    Path(id): Path<i64>,
) -> ApiResult<()> {
    state.repo.decline_request(id, actor.id()).await?;
    success(())
}

/// GET /api/student/team - The acting student's team.
pub async fn my_team(State(state): State<AppState>, actor: ActingUser) -> ApiResult<TeamDetail> {
    actor.require_student()?;
    success(state.repo.team_for_user(&actor.user).await?)
}

/// GET /api/teams/:id/material - Download a team's mission material.
///
/// Available to members of the team and to admins.
pub async fn download_material(
    State(state): State<AppState>,
    actor: ActingUser,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let detail = state
        .repo
        .get_team_detail(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Team {} not found", id)))?;

    if !actor.user.is_admin() && !detail.has_member(actor.id()) {
        return Err(AppError::Unauthorized(
            "Only members of this team can download its material.".to_string(),
        ));
    }

    let filename = detail
        .team
        .material_filename
        .ok_or_else(|| AppError::NotFound("No material has been uploaded for this team.".to_string()))?;
    let bytes = state.store.read(&filename).await?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        bytes,
    )
        .into_response())
}
