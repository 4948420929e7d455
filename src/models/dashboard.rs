//! Dashboard payloads for students and admins.

use serde::Serialize;

use super::{RequestView, User, UserSummary};

/// Everything a student needs to find or confirm a partner.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentDashboard {
    pub user: User,
    pub partner: Option<UserSummary>,
    pub incoming_requests: Vec<RequestView>,
    pub outgoing_requests: Vec<RequestView>,
    pub available_students: Vec<UserSummary>,
}

/// Headline counts for the admin dashboard.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AdminDashboard {
    pub total_students: i64,
    pub unpaired_students: i64,
    pub total_teams: i64,
}
