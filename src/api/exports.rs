//! CSV export endpoints.

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use chrono::Utc;

use crate::auth::ActingUser;
use crate::errors::AppError;
use crate::export;
use crate::AppState;

fn csv_download(filename: String, body: String) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
        .into_response()
}

/// GET /api/admin/export/students - Student roster as CSV.
pub async fn export_students(
    State(state): State<AppState>,
    actor: ActingUser,
) -> Result<Response, AppError> {
    actor.require_admin()?;
    let students = state.repo.list_students().await?;
    Ok(csv_download(
        export::students_filename(Utc::now()),
        export::students_csv(&students),
    ))
}

/// GET /api/admin/export/teams - Team roster as CSV.
pub async fn export_teams(
    State(state): State<AppState>,
    actor: ActingUser,
) -> Result<Response, AppError> {
    actor.require_admin()?;
    let teams = state.repo.list_team_details().await?;
    Ok(csv_download(
        export::teams_filename(Utc::now()),
        export::teams_csv(&teams),
    ))
}
