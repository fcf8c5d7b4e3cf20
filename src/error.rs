use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures talking to an upstream statistics source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("upstream returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Per-minute throttling (HTTP 429 or an in-body `rateLimit` error).
    #[error("upstream rate limit hit")]
    RateLimited,

    /// The daily request ceiling. Nothing recovers this within a run.
    #[error("daily request quota exceeded")]
    QuotaExceeded,

    /// The upstream answered but refused the request (bad key, bad parameters).
    #[error("upstream rejected request: {0}")]
    Rejected(String),

    #[error("malformed upstream payload: {0}")]
    Decode(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl SourceError {
    /// Whether the same request may succeed if simply retried.
    pub fn is_transient(&self) -> bool {
        match self {
            SourceError::Timeout | SourceError::Transport(_) => true,
            SourceError::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SourceError::Timeout
        } else if err.is_decode() {
            SourceError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            SourceError::Http {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else {
            SourceError::Transport(err.to_string())
        }
    }
}

/// Tag for an error recorded in `ImportProgress::errors`. None of these stop a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A single record was malformed or referenced an unknown team/league.
    Validation,
    /// A batch could not be fetched within the retry budget and was skipped.
    BatchFetch,
    /// The bulk upsert of a batch failed; its valid records count as failed.
    BatchUpsert,
}

/// Run-level import failures surfaced to the caller.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("daily request quota exceeded, import aborted at batch {batch}")]
    QuotaExceeded { batch: u32 },

    #[error("failed to persist checkpoint for batch {batch}: {source}")]
    Checkpoint {
        batch: u32,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to load reference data: {0}")]
    ReferenceData(#[source] anyhow::Error),

    #[error("league '{name}' season {season} has already been imported")]
    DuplicateImport { name: String, season: String },

    #[error("historical league {0} not found")]
    LeagueNotFound(i64),

    #[error("historical league {0} is already validated")]
    AlreadyValidated(i64),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

/// Reasons a prediction could not be produced.
#[derive(Debug, Error)]
pub enum PredictionError {
    /// Missing team/league identifiers. Raised before any network call.
    #[error("match data is incomplete for prediction: {0}")]
    IncompleteMatchData(String),

    #[error("no season statistics for team {team_id} in league {league_id} ({season})")]
    StatisticsUnavailable {
        team_id: i64,
        league_id: i64,
        season: i32,
    },

    #[error("head-to-head fixture {home} vs {away} does not involve exactly one side named '{reference}'")]
    InvalidHeadToHead {
        home: String,
        away: String,
        reference: String,
    },

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl PredictionError {
    /// True when the inputs were missing rather than an upstream call failing.
    pub fn is_missing_input(&self) -> bool {
        matches!(
            self,
            PredictionError::IncompleteMatchData(_) | PredictionError::StatisticsUnavailable { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(SourceError::Timeout.is_transient());
        assert!(SourceError::Transport("reset".into()).is_transient());
        assert!(SourceError::Http { status: 503, body: String::new() }.is_transient());
        assert!(!SourceError::Http { status: 404, body: String::new() }.is_transient());
        assert!(!SourceError::RateLimited.is_transient());
        assert!(!SourceError::QuotaExceeded.is_transient());
        assert!(!SourceError::Decode("bad".into()).is_transient());
    }

    #[test]
    fn missing_input_is_distinguished_from_upstream_failure() {
        assert!(PredictionError::IncompleteMatchData("no league".into()).is_missing_input());
        assert!(!PredictionError::Source(SourceError::Timeout).is_missing_input());
    }
}
