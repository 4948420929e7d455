//! Pairing requests and the pairs they produce.

use serde::{Deserialize, Serialize};

use super::UserSummary;

/// Status stored on every live request row. Resolution is by deletion.
pub const REQUEST_PENDING: &str = "pending";

/// A directed pairing proposal from one student to another.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PairingRequest {
    pub id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub status: String,
    pub created_at: String,
}

/// A pending request joined with the names of both parties.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestView {
    pub id: i64,
    pub sender: UserSummary,
    pub receiver: UserSummary,
    pub created_at: String,
}

/// Request body for proposing a partner.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequestBody {
    pub receiver_id: i64,
}

/// A committed two-student partnership.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pair {
    pub id: i64,
    pub team_id: Option<i64>,
    pub created_at: String,
    pub members: Vec<UserSummary>,
}

/// Result of dissolving a pair.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnpairOutcome {
    pub pair_id: i64,
    pub user_id: i64,
    pub partner_id: Option<i64>,
}

/// Query string for pair listings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PairListQuery {
    #[serde(default)]
    pub available: bool,
}
