use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

/// A competition known to the upstream API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct League {
    pub id: i64,
    pub name: String,
    pub country: Option<String>,
    /// "League" | "Cup"
    pub kind: Option<String>,
    pub logo: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: i64,
    pub name: String,
    pub country: Option<String>,
    pub founded: Option<i32>,
    pub logo: Option<String>,
}

/// A validated player row ready for upsert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: i64,
    pub name: String,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub nationality: Option<String>,
    pub birthdate: Option<String>,
    pub photo: Option<String>,
    pub height: Option<String>,
    pub weight: Option<String>,
    pub team_id: i64,
    pub league_id: i64,
    pub position: Option<String>,
    pub last_season: Option<i32>,
}

/// Durable progress marker, one row per import type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportCheckpoint {
    /// e.g. "players"
    pub import_type: String,
    /// Last batch index fully committed
    pub last_batch: u32,
    pub updated_at: DateTime<Utc>,
}

/// Review state of an imported historical league.
///
/// The only transition is `Staging -> Validated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeagueStatus {
    Staging,
    Validated,
}

impl LeagueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeagueStatus::Staging => "staging",
            LeagueStatus::Validated => "validated",
        }
    }

    /// Status after promotion, or `None` if already promoted.
    pub fn promote(self) -> Option<LeagueStatus> {
        match self {
            LeagueStatus::Staging => Some(LeagueStatus::Validated),
            LeagueStatus::Validated => None,
        }
    }
}

impl ToSql for LeagueStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for LeagueStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "staging" => Ok(LeagueStatus::Staging),
            "validated" => Ok(LeagueStatus::Validated),
            other => Err(FromSqlError::Other(
                format!("unknown league status '{}'", other).into(),
            )),
        }
    }
}

/// Header of a historical season import
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagedLeague {
    pub id: i64,
    pub name: String,
    /// "YYYY-YY", e.g. "2023-24"
    pub season: String,
    pub source_file: String,
    pub status: LeagueStatus,
    pub created_at: DateTime<Utc>,
    pub match_count: i64,
}

/// One played fixture from a historical season file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalMatch {
    pub round: Option<String>,
    pub match_date: Option<NaiveDate>,
    pub home_team_name: String,
    pub away_team_name: String,
    pub home_score: u32,
    pub away_score: u32,
}

/// A past meeting between two named teams
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadToHeadMatch {
    pub home_team_name: String,
    pub away_team_name: String,
    pub home_score: u32,
    pub away_score: u32,
}

#[cfg(test)]
impl HeadToHeadMatch {
    pub fn new(home: &str, away: &str, home_score: u32, away_score: u32) -> Self {
        HeadToHeadMatch {
            home_team_name: home.to_string(),
            away_team_name: away.to_string(),
            home_score,
            away_score,
        }
    }
}

/// Outcome of staging a league together with its matches
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome {
    Staged { league_id: i64, match_count: usize },
    /// `(name, season)` already present; nothing was written
    Duplicate,
}

/// Outcome of promoting a staged league
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromoteOutcome {
    Promoted,
    AlreadyValidated,
    NotFound,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_promotes_once() {
        assert_eq!(LeagueStatus::Staging.promote(), Some(LeagueStatus::Validated));
        assert_eq!(LeagueStatus::Validated.promote(), None);
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&LeagueStatus::Staging).unwrap();
        assert_eq!(json, "\"staging\"");
    }
}
