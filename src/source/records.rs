//! Raw API-Football entity payloads (players, leagues, teams).

use serde::Deserialize;

use super::stats::Loose;
use crate::db::models::{League, Team};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawBirth {
    pub date: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPlayer {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub nationality: Option<String>,
    pub birth: Option<RawBirth>,
    pub photo: Option<String>,
    pub height: Option<String>,
    pub weight: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawIdRef {
    pub id: Option<i64>,
    pub season: Option<Loose>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawGames {
    pub position: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPlayerStatistics {
    pub team: Option<RawIdRef>,
    pub league: Option<RawIdRef>,
    pub games: Option<RawGames>,
}

/// One element of the `GET /players` response array
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPlayerRecord {
    #[serde(default)]
    pub player: RawPlayer,
    #[serde(default)]
    pub statistics: Vec<RawPlayerStatistics>,
}

impl RawPlayerRecord {
    pub fn id(&self) -> Option<i64> {
        self.player.id
    }

    /// Team and league of the first statistics entry, where the upstream puts
    /// the player's current club.
    pub fn primary_refs(&self) -> (Option<i64>, Option<i64>) {
        let first = self.statistics.first();
        (
            first.and_then(|s| s.team.as_ref()).and_then(|t| t.id),
            first.and_then(|s| s.league.as_ref()).and_then(|l| l.id),
        )
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawLeagueInfo {
    pub id: Option<i64>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub logo: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCountry {
    pub name: Option<String>,
}

/// One element of the `GET /leagues` response array
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawLeagueEntry {
    #[serde(default)]
    pub league: RawLeagueInfo,
    pub country: Option<RawCountry>,
}

impl RawLeagueEntry {
    pub fn into_league(self) -> Option<League> {
        let id = self.league.id.filter(|id| *id > 0)?;
        let name = self.league.name.filter(|n| !n.trim().is_empty())?;
        Some(League {
            id,
            name,
            country: self.country.and_then(|c| c.name),
            kind: self.league.kind,
            logo: self.league.logo,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTeamInfo {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub country: Option<String>,
    pub founded: Option<i32>,
    pub logo: Option<String>,
}

/// One element of the `GET /teams` response array
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTeamEntry {
    #[serde(default)]
    pub team: RawTeamInfo,
}

impl RawTeamEntry {
    pub fn into_team(self) -> Option<Team> {
        let id = self.team.id.filter(|id| *id > 0)?;
        let name = self.team.name.filter(|n| !n.trim().is_empty())?;
        Some(Team {
            id,
            name,
            country: self.team.country,
            founded: self.team.founded,
            logo: self.team.logo,
        })
    }
}
