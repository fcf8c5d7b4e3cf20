use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::budget::RequestBudget;
use super::provider::StatSource;
use super::records::{RawLeagueEntry, RawPlayerRecord, RawTeamEntry};
use super::stats::{RawTeamStatistics, TeamSeasonStatistics};
use crate::error::SourceError;

const REMAINING_HEADER: &str = "x-ratelimit-requests-remaining";

/// Client for the API-Football v3 REST API.
///
/// Construct once at startup and share; the request budget lives inside.
#[derive(Clone)]
pub struct ApiFootballClient {
    http: Client,
    base_url: Url,
    api_key: String,
    /// Season used when paging through players
    players_season: i32,
    budget: Arc<RequestBudget>,
}

impl ApiFootballClient {
    pub fn new(
        base_url: &str,
        api_key: &str,
        players_season: i32,
        timeout: Duration,
        budget: Arc<RequestBudget>,
    ) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        let base_url = Url::parse(&format!("{}/", base_url.trim_end_matches('/')))
            .with_context(|| format!("invalid API-Football URL '{}'", base_url))?;
        Ok(ApiFootballClient {
            http,
            base_url,
            api_key: api_key.to_string(),
            players_season,
            budget,
        })
    }

    pub fn budget(&self) -> &RequestBudget {
        &self.budget
    }

    fn endpoint(&self, path: &str, query: &[(&str, String)]) -> Result<Url, SourceError> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| SourceError::Rejected(format!("bad endpoint '{}': {}", path, e)))?;
        url.query_pairs_mut()
            .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
        Ok(url)
    }

    /// GET an endpoint and return its `response` member.
    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value, SourceError> {
        self.budget.acquire().await?;
        let url = self.endpoint(path, query)?;
        debug!("API-Football GET {}", url);

        let resp = self
            .http
            .get(url)
            .header("x-apisports-key", &self.api_key)
            .send()
            .await?;

        if let Some(remaining) = resp
            .headers()
            .get(REMAINING_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<i64>().ok())
        {
            self.budget.observe_daily_remaining(remaining);
        }

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(SourceError::RateLimited);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SourceError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = resp.json().await?;
        if let Some(err) = api_error(&body) {
            if matches!(err, SourceError::QuotaExceeded) {
                self.budget.exhaust_daily();
            }
            warn!("API-Football {} refused: {}", path, err);
            return Err(err);
        }
        Ok(body.get("response").cloned().unwrap_or(Value::Null))
    }
}

#[async_trait]
impl StatSource for ApiFootballClient {
    fn name(&self) -> &str {
        "API-Football"
    }

    async fn team_statistics(
        &self,
        team_id: i64,
        league_id: i64,
        season: i32,
    ) -> Result<Option<TeamSeasonStatistics>, SourceError> {
        let response = self
            .get(
                "teams/statistics",
                &[
                    ("team", team_id.to_string()),
                    ("league", league_id.to_string()),
                    ("season", season.to_string()),
                ],
            )
            .await?;
        parse_statistics_response(response)
    }

    async fn players_batch(
        &self,
        batch_index: u32,
        batch_size: u32,
    ) -> Result<Vec<RawPlayerRecord>, SourceError> {
        // Upstream pages are 1-based.
        let response = self
            .get(
                "players",
                &[
                    ("season", self.players_season.to_string()),
                    ("page", (batch_index + 1).to_string()),
                    ("per_page", batch_size.to_string()),
                ],
            )
            .await?;
        parse_list(response)
    }

    async fn leagues(&self, league_id: i64, season: i32) -> Result<Vec<RawLeagueEntry>, SourceError> {
        let response = self
            .get(
                "leagues",
                &[("id", league_id.to_string()), ("season", season.to_string())],
            )
            .await?;
        parse_list(response)
    }

    async fn teams(&self, league_id: i64, season: i32) -> Result<Vec<RawTeamEntry>, SourceError> {
        let response = self
            .get(
                "teams",
                &[("league", league_id.to_string()), ("season", season.to_string())],
            )
            .await?;
        parse_list(response)
    }
}

// ── Parsing helpers ────────────────────────────────────────────────────────────

/// API-Football reports many failures as HTTP 200 with a non-empty `errors`
/// member, either an object or an array.
fn api_error(body: &Value) -> Option<SourceError> {
    let errors = body.get("errors")?;
    match errors {
        Value::Object(map) if !map.is_empty() => {
            if map.contains_key("requests") {
                Some(SourceError::QuotaExceeded)
            } else if map.contains_key("rateLimit") {
                Some(SourceError::RateLimited)
            } else {
                Some(SourceError::Rejected(errors.to_string()))
            }
        }
        Value::Array(items) if !items.is_empty() => Some(SourceError::Rejected(errors.to_string())),
        _ => None,
    }
}

fn parse_statistics_response(response: Value) -> Result<Option<TeamSeasonStatistics>, SourceError> {
    match &response {
        Value::Null => return Ok(None),
        Value::Array(items) if items.is_empty() => return Ok(None),
        _ => {}
    }
    let raw: RawTeamStatistics =
        serde_json::from_value(response).map_err(|e| SourceError::Decode(e.to_string()))?;
    TeamSeasonStatistics::try_from(raw).map(Some)
}

fn parse_list<T: DeserializeOwned>(response: Value) -> Result<Vec<T>, SourceError> {
    match response {
        Value::Null => Ok(vec![]),
        Value::Array(items) => items
            .into_iter()
            .map(|item| serde_json::from_value(item).map_err(|e| SourceError::Decode(e.to_string())))
            .collect(),
        other => Err(SourceError::Decode(format!(
            "expected a list, got {}",
            other
        ))),
    }
}
