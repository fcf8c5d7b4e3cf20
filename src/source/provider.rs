use async_trait::async_trait;

use super::openfootball::RawHistoricalLeague;
use super::records::{RawLeagueEntry, RawPlayerRecord, RawTeamEntry};
use super::stats::TeamSeasonStatistics;
use crate::error::SourceError;

/// Live statistics provider (API-Football or a test double).
#[async_trait]
pub trait StatSource: Send + Sync {
    /// Season statistics for one team in one league, `None` when the
    /// upstream has nothing for that combination.
    async fn team_statistics(
        &self,
        team_id: i64,
        league_id: i64,
        season: i32,
    ) -> Result<Option<TeamSeasonStatistics>, SourceError>;

    /// One page of players. An empty page means there is no more data.
    async fn players_batch(
        &self,
        batch_index: u32,
        batch_size: u32,
    ) -> Result<Vec<RawPlayerRecord>, SourceError>;

    async fn leagues(&self, league_id: i64, season: i32) -> Result<Vec<RawLeagueEntry>, SourceError>;

    async fn teams(&self, league_id: i64, season: i32) -> Result<Vec<RawTeamEntry>, SourceError>;

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}

/// Provider of whole historical season files.
#[async_trait]
pub trait LeagueFileSource: Send + Sync {
    async fn fetch_league_file(
        &self,
        season: &str,
        league_file: &str,
    ) -> Result<RawHistoricalLeague, SourceError>;
}

#[cfg(test)]
pub(crate) mod fake {
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    use super::*;

    /// Scripted source for importer and prediction tests. Player pages are
    /// answered from per-batch queues; an unscripted batch is an empty page.
    #[derive(Default)]
    pub struct FakeSource {
        pub stats: HashMap<i64, TeamSeasonStatistics>,
        pub leagues: Vec<RawLeagueEntry>,
        pub teams: Vec<RawTeamEntry>,
        pub pages: Mutex<HashMap<u32, VecDeque<Result<Vec<RawPlayerRecord>, SourceError>>>>,
        pub fetched: Mutex<Vec<u32>>,
        pub stats_requests: Mutex<Vec<i64>>,
    }

    impl FakeSource {
        pub fn with_stats(stats: Vec<TeamSeasonStatistics>) -> Self {
            FakeSource {
                stats: stats.into_iter().map(|s| (s.team.id, s)).collect(),
                ..Default::default()
            }
        }

        /// Queue one response for `batch`; queued responses are served in order.
        pub fn script(&self, batch: u32, response: Result<Vec<RawPlayerRecord>, SourceError>) {
            self.pages
                .lock()
                .unwrap()
                .entry(batch)
                .or_default()
                .push_back(response);
        }

        /// Batch indexes requested so far, in call order
        pub fn fetched(&self) -> Vec<u32> {
            self.fetched.lock().unwrap().clone()
        }

        /// Team ids whose statistics were requested, in call order
        pub fn stats_requested(&self) -> Vec<i64> {
            self.stats_requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl StatSource for FakeSource {
        fn name(&self) -> &str {
            "fake"
        }

        async fn team_statistics(
            &self,
            team_id: i64,
            _league_id: i64,
            _season: i32,
        ) -> Result<Option<TeamSeasonStatistics>, SourceError> {
            self.stats_requests.lock().unwrap().push(team_id);
            Ok(self.stats.get(&team_id).cloned())
        }

        async fn players_batch(
            &self,
            batch_index: u32,
            _batch_size: u32,
        ) -> Result<Vec<RawPlayerRecord>, SourceError> {
            self.fetched.lock().unwrap().push(batch_index);
            self.pages
                .lock()
                .unwrap()
                .get_mut(&batch_index)
                .and_then(|q| q.pop_front())
                .unwrap_or_else(|| Ok(vec![]))
        }

        async fn leagues(&self, _league_id: i64, _season: i32) -> Result<Vec<RawLeagueEntry>, SourceError> {
            Ok(self.leagues.clone())
        }

        async fn teams(&self, _league_id: i64, _season: i32) -> Result<Vec<RawTeamEntry>, SourceError> {
            Ok(self.teams.clone())
        }
    }
}
