//! Teams of two pairs and their outreach missions.

use serde::{Deserialize, Serialize};

use super::Pair;

/// Outreach engagement details. Every field may be left unset.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Mission {
    pub school_name: Option<String>,
    pub outreach_date: Option<String>,
    pub time_interval: Option<String>,
    pub topic: Option<String>,
}

/// A four-student team.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: i64,
    pub team_name: String,
    pub created_at: String,
    pub mission: Mission,
    pub material_filename: Option<String>,
}

/// A team together with its pairs and their members.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamDetail {
    #[serde(flatten)]
    pub team: Team,
    pub pairs: Vec<Pair>,
}

impl TeamDetail {
    pub fn student_count(&self) -> usize {
        self.pairs.iter().map(|p| p.members.len()).sum()
    }

    pub fn has_member(&self, user_id: i64) -> bool {
        self.pairs
            .iter()
            .any(|p| p.members.iter().any(|m| m.id == user_id))
    }
}

/// Request body for assembling a team.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTeamRequest {
    pub team_name: String,
    pub pair1_id: i64,
    pub pair2_id: i64,
}

/// What happened to a team's material file during disband.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum MaterialCleanup {
    /// The team never had a material file
    NoMaterial,
    Removed { filename: String },
    AlreadyAbsent { filename: String },
    /// Deletion failed; the team record was still removed
    Failed { filename: String, message: String },
}

/// Summary returned after a team is disbanded.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisbandReport {
    pub team_id: i64,
    pub team_name: String,
    pub released_pair_ids: Vec<i64>,
    pub material: MaterialCleanup,
}
