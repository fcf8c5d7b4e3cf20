//! Historical season files in the openfootball `football.json` layout.
//! Docs: <https://github.com/openfootball/football.json>

use anyhow::Context;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use super::provider::LeagueFileSource;
use crate::db::models::HistoricalMatch;
use crate::error::SourceError;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawScore {
    /// Full-time score `[home, away]`
    pub ft: Option<[u32; 2]>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawHistoricalMatch {
    pub round: Option<String>,
    pub date: Option<String>,
    pub team1: Option<String>,
    pub team2: Option<String>,
    pub score: Option<RawScore>,
    /// Older files carry flat scores instead of `score.ft`
    pub score1: Option<u32>,
    pub score2: Option<u32>,
}

impl RawHistoricalMatch {
    /// `None` for fixtures that have not been played or lack a team name.
    pub fn into_match(self) -> Option<HistoricalMatch> {
        let (home_score, away_score) = match (self.score.and_then(|s| s.ft), self.score1, self.score2) {
            (Some([h, a]), _, _) => (h, a),
            (None, Some(h), Some(a)) => (h, a),
            _ => return None,
        };
        let home = self.team1.filter(|t| !t.trim().is_empty())?;
        let away = self.team2.filter(|t| !t.trim().is_empty())?;
        Some(HistoricalMatch {
            round: self.round,
            match_date: self
                .date
                .as_deref()
                .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()),
            home_team_name: home,
            away_team_name: away,
            home_score,
            away_score,
        })
    }
}

/// A whole season file: league name plus fixtures in file order
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawHistoricalLeague {
    pub name: Option<String>,
    #[serde(default)]
    pub matches: Vec<RawHistoricalMatch>,
}

pub fn parse_league_file(text: &str) -> Result<RawHistoricalLeague, SourceError> {
    serde_json::from_str(text).map_err(|e| SourceError::Decode(e.to_string()))
}

/// Read a user-supplied season file from disk.
pub async fn read_local_league_file(path: &Path) -> Result<RawHistoricalLeague, SourceError> {
    let text = tokio::fs::read_to_string(path).await?;
    parse_league_file(&text)
}

/// Fetches season files from the openfootball GitHub mirror.
pub struct OpenFootballClient {
    http: Client,
    base_url: String,
}

impl OpenFootballClient {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(OpenFootballClient {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl LeagueFileSource for OpenFootballClient {
    async fn fetch_league_file(
        &self,
        season: &str,
        league_file: &str,
    ) -> Result<RawHistoricalLeague, SourceError> {
        let url = format!("{}/{}/{}", self.base_url, season, league_file);
        debug!("Fetching historical league file {}", url);

        let resp = self.http.get(&url).send().await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(SourceError::Http { status, body });
        }
        let text = resp.text().await?;
        parse_league_file(&text)
    }
}
