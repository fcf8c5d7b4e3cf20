use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::engine::{predict, PredictionResult};
use crate::db::Database;
use crate::error::PredictionError;
use crate::source::stats::{TeamRef, TeamSeasonStatistics};
use crate::source::StatSource;

/// A prediction request as it arrives from a caller. Every field is required;
/// `Option` lets a partial request reach validation instead of failing to
/// parse.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FixtureRequest {
    #[serde(alias = "home")]
    pub home_team_id: Option<i64>,
    #[serde(alias = "away")]
    pub away_team_id: Option<i64>,
    #[serde(alias = "league")]
    pub league_id: Option<i64>,
    pub season: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fixture {
    home_team_id: i64,
    away_team_id: i64,
    league_id: i64,
    season: i32,
}

impl FixtureRequest {
    fn resolve(&self) -> Result<Fixture, PredictionError> {
        let mut missing = Vec::new();
        if self.home_team_id.is_none() {
            missing.push("home team");
        }
        if self.away_team_id.is_none() {
            missing.push("away team");
        }
        if self.league_id.is_none() {
            missing.push("league");
        }
        if self.season.is_none() {
            missing.push("season");
        }
        match (self.home_team_id, self.away_team_id, self.league_id, self.season) {
            (Some(home_team_id), Some(away_team_id), Some(league_id), Some(season)) => Ok(Fixture {
                home_team_id,
                away_team_id,
                league_id,
                season,
            }),
            _ => Err(PredictionError::IncompleteMatchData(format!(
                "missing {}",
                missing.join(", ")
            ))),
        }
    }
}

/// Prediction plus the context it was computed from
#[derive(Debug, Clone, Serialize)]
pub struct FixturePrediction {
    pub home: TeamRef,
    pub away: TeamRef,
    pub league_id: i64,
    pub season: i32,
    pub h2h_matches: usize,
    #[serde(flatten)]
    pub result: PredictionResult,
}

/// Resolves a fixture's inputs and runs the engine.
#[derive(Clone)]
pub struct PredictionService {
    source: Arc<dyn StatSource>,
    db: Database,
}

impl PredictionService {
    pub fn new(source: Arc<dyn StatSource>, db: Database) -> Self {
        PredictionService { source, db }
    }

    pub async fn predict_fixture(&self, request: &FixtureRequest) -> Result<FixturePrediction, PredictionError> {
        let fixture = request.resolve()?;
        debug!(
            "Predicting {} vs {} (league {}, {}) via {}",
            fixture.home_team_id,
            fixture.away_team_id,
            fixture.league_id,
            fixture.season,
            self.source.name()
        );

        // Both teams are fetched together; head-to-head needs their names.
        let (home, away) = futures_util::future::try_join(
            self.team_statistics(fixture.home_team_id, &fixture),
            self.team_statistics(fixture.away_team_id, &fixture),
        )
        .await?;

        let history = self.db.head_to_head_history(&home.team.name, &away.team.name)?;
        let result = predict(&home, &away, &history)?;

        info!(
            "Prediction {} vs {}: {}/{}/{} ({} h2h)",
            home.team.name,
            away.team.name,
            result.win_probability.home,
            result.win_probability.draw,
            result.win_probability.away,
            history.len()
        );

        Ok(FixturePrediction {
            home: home.team,
            away: away.team,
            league_id: fixture.league_id,
            season: fixture.season,
            h2h_matches: history.len(),
            result,
        })
    }

    async fn team_statistics(&self, team_id: i64, fixture: &Fixture) -> Result<TeamSeasonStatistics, PredictionError> {
        self.source
            .team_statistics(team_id, fixture.league_id, fixture.season)
            .await?
            .ok_or(PredictionError::StatisticsUnavailable {
                team_id,
                league_id: fixture.league_id,
                season: fixture.season,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::HistoricalMatch;
    use crate::source::provider::fake::FakeSource;
    use crate::source::stats::fixtures::team_stats;

    fn source() -> Arc<FakeSource> {
        Arc::new(FakeSource::with_stats(vec![
            team_stats(42, "Arsenal", (19, 19), (14, 14), (3, 2), (48, 43), (16, 13), (2.53, 2.26)),
            team_stats(49, "Chelsea", (19, 19), (9, 9), (5, 4), (44, 33), (26, 37), (2.32, 1.74)),
        ]))
    }

    fn service(db: Database) -> PredictionService {
        PredictionService::new(source(), db)
    }

    fn request(home: i64, away: i64) -> FixtureRequest {
        FixtureRequest {
            home_team_id: Some(home),
            away_team_id: Some(away),
            league_id: Some(39),
            season: Some(2023),
        }
    }

    fn played(home: &str, away: &str, hs: u32, aws: u32) -> HistoricalMatch {
        HistoricalMatch {
            round: None,
            match_date: None,
            home_team_name: home.into(),
            away_team_name: away.into(),
            home_score: hs,
            away_score: aws,
        }
    }

    #[tokio::test]
    async fn incomplete_request_fails_before_fetching() {
        let source = source();
        let svc = PredictionService::new(source.clone(), Database::open_in_memory().unwrap());
        let err = svc
            .predict_fixture(&FixtureRequest {
                home_team_id: Some(42),
                ..Default::default()
            })
            .await
            .unwrap_err();
        match err {
            PredictionError::IncompleteMatchData(msg) => {
                assert_eq!(msg, "missing away team, league, season");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(source.stats_requested().is_empty());
    }

    #[tokio::test]
    async fn unknown_team_is_statistics_unavailable() {
        let svc = service(Database::open_in_memory().unwrap());
        let err = svc.predict_fixture(&request(42, 7)).await.unwrap_err();
        assert!(matches!(err, PredictionError::StatisticsUnavailable { team_id: 7, .. }));
        assert!(err.is_missing_input());
    }

    #[tokio::test]
    async fn uses_only_validated_history() {
        let db = Database::open_in_memory().unwrap();
        let svc = service(db.clone());

        let first = svc.predict_fixture(&request(42, 49)).await.unwrap();
        assert_eq!(first.h2h_matches, 0);
        assert_eq!(first.result.key_factors.len(), 4);

        let outcome = db
            .stage_league(
                "Premier League 2022/23",
                "2022-23",
                "en.1.json",
                &[played("Arsenal", "Chelsea", 3, 1), played("Chelsea", "Arsenal", 0, 1)],
            )
            .unwrap();
        let crate::db::models::StageOutcome::Staged { league_id, .. } = outcome else {
            panic!("expected a staged league");
        };

        let staged_only = svc.predict_fixture(&request(42, 49)).await.unwrap();
        assert_eq!(staged_only.h2h_matches, 0);

        db.promote_league_to_validated(league_id).unwrap();
        let validated = svc.predict_fixture(&request(42, 49)).await.unwrap();
        assert_eq!(validated.h2h_matches, 2);
        assert_eq!(validated.home.name, "Arsenal");
        assert_eq!(
            validated.result.key_factors.last().map(String::as_str),
            Some("Head-to-head (2 matches): Arsenal wins: 2, Chelsea wins: 0, Draws: 0.")
        );
    }
}
