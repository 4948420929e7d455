//! CSV renderings of the student and team rosters.

use chrono::{DateTime, Utc};

use crate::models::{TeamDetail, User};

const STUDENT_HEADERS: [&str; 7] = [
    "Register Number",
    "Name",
    "Department",
    "Section",
    "SIGBED Team",
    "Username",
    "Date Joined",
];

const TEAM_HEADERS: [&str; 8] = [
    "Team ID",
    "Team Name",
    "School",
    "Outreach Date",
    "Topic",
    "Total Pairs",
    "Total Students",
    "Status",
];

fn csv_quote(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

fn push_record<S: AsRef<str>>(out: &mut String, fields: &[S]) {
    let line = fields
        .iter()
        .map(|f| csv_quote(f.as_ref()))
        .collect::<Vec<_>>()
        .join(",");
    out.push_str(&line);
    out.push_str("\r\n");
}

/// Render an RFC 3339 timestamp as `YYYY-mm-dd HH:MM:SS`, passing other text through.
fn joined_at(created_at: &str) -> String {
    DateTime::parse_from_rfc3339(created_at)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|_| created_at.to_string())
}

/// One row per student.
pub fn students_csv(students: &[User]) -> String {
    let mut out = String::new();
    push_record(&mut out, &STUDENT_HEADERS);
    for s in students {
        push_record(
            &mut out,
            &[
                s.register_number.as_str(),
                s.name.as_str(),
                s.dept.as_str(),
                s.section.as_str(),
                s.sigbed_team.as_str(),
                s.username.as_str(),
                joined_at(&s.created_at).as_str(),
            ],
        );
    }
    out
}

/// One row per team with pair and student counts.
pub fn teams_csv(teams: &[TeamDetail]) -> String {
    let mut out = String::new();
    push_record(&mut out, &TEAM_HEADERS);
    for detail in teams {
        let mission = &detail.team.mission;
        let status = if detail.pairs.is_empty() {
            "Inactive"
        } else {
            "Active"
        };
        push_record(
            &mut out,
            &[
                detail.team.id.to_string(),
                detail.team.team_name.clone(),
                mission.school_name.clone().unwrap_or_default(),
                mission.outreach_date.clone().unwrap_or_default(),
                mission.topic.clone().unwrap_or_default(),
                detail.pairs.len().to_string(),
                detail.student_count().to_string(),
                status.to_string(),
            ],
        );
    }
    out
}

/// Download name for the students export taken at `now`.
pub fn students_filename(now: DateTime<Utc>) -> String {
    format!("acm_sigbed_students_{}.csv", now.format("%Y%m%d_%H%M%S"))
}

/// Download name for the teams export taken at `now`.
pub fn teams_filename(now: DateTime<Utc>) -> String {
    format!("acm_sigbed_teams_{}.csv", now.format("%Y%m%d_%H%M%S"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    use crate::models::{Mission, Pair, Role, Team, UserSummary};

    fn student(name: &str) -> User {
        User {
            id: 1,
            username: "alice".to_string(),
            name: name.to_string(),
            register_number: "21CS001".to_string(),
            section: "A".to_string(),
            dept: "CSE".to_string(),
            sigbed_team: "Robotics".to_string(),
            role: Role::Student,
            pair_id: None,
            created_at: "2024-03-05T09:15:30+00:00".to_string(),
            password_hash: String::new(),
        }
    }

    fn member(id: i64) -> UserSummary {
        UserSummary {
            id,
            username: format!("user{}", id),
            name: format!("User {}", id),
            register_number: format!("R{}", id),
            section: "A".to_string(),
            dept: "CSE".to_string(),
        }
    }

    #[test]
    fn test_csv_quote() {
        assert_eq!(csv_quote("plain"), "plain");
        assert_eq!(csv_quote("a,b"), "\"a,b\"");
        assert_eq!(csv_quote("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_students_csv_rows() {
        let csv = students_csv(&[student("Liddell, Alice")]);
        let lines: Vec<&str> = csv.split("\r\n").collect();
        assert_eq!(
            lines[0],
            "Register Number,Name,Department,Section,SIGBED Team,Username,Date Joined"
        );
        assert_eq!(
            lines[1],
            "21CS001,\"Liddell, Alice\",CSE,A,Robotics,alice,2024-03-05 09:15:30"
        );
    }

    #[test]
    fn test_teams_csv_status() {
        let active = TeamDetail {
            team: Team {
                id: 7,
                team_name: "Blue".to_string(),
                created_at: String::new(),
                mission: Mission {
                    school_name: Some("Hill School".to_string()),
                    outreach_date: Some("2024-04-01".to_string()),
                    time_interval: None,
                    topic: Some("Sensors".to_string()),
                },
                material_filename: None,
            },
            pairs: vec![
                Pair {
                    id: 1,
                    team_id: Some(7),
                    created_at: String::new(),
                    members: vec![member(1), member(2)],
                },
                Pair {
                    id: 2,
                    team_id: Some(7),
                    created_at: String::new(),
                    members: vec![member(3), member(4)],
                },
            ],
        };
        let mut empty = active.clone();
        empty.team.id = 8;
        empty.team.mission = Mission::default();
        empty.pairs.clear();

        let csv = teams_csv(&[active, empty]);
        let lines: Vec<&str> = csv.split("\r\n").collect();
        assert_eq!(lines[1], "7,Blue,Hill School,2024-04-01,Sensors,2,4,Active");
        assert_eq!(lines[2], "8,Blue,,,,0,0,Inactive");
    }

    #[test]
    fn test_export_filenames() {
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 9, 15, 30).unwrap();
        assert_eq!(
            students_filename(now),
            "acm_sigbed_students_20240305_091530.csv"
        );
        assert_eq!(teams_filename(now), "acm_sigbed_teams_20240305_091530.csv");
    }
}
