use serde::Serialize;

use crate::db::models::HeadToHeadMatch;
use crate::error::PredictionError;

/// Head-to-head record seen from one reference team
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct H2HAggregate {
    pub total: u32,
    pub wins_for_reference: u32,
    pub wins_for_opponent: u32,
    pub draws: u32,
    pub avg_goals_reference: f64,
    pub avg_goals_opponent: f64,
    pub win_rate_reference: f64,
    pub win_rate_opponent: f64,
}

/// Reduce past meetings to rates relative to `reference`.
///
/// Each fixture must name the reference team on exactly one side. Order of
/// `matches` does not matter.
pub fn analyze(matches: &[HeadToHeadMatch], reference: &str) -> Result<H2HAggregate, PredictionError> {
    let mut agg = H2HAggregate::default();
    let mut goals_reference = 0u64;
    let mut goals_opponent = 0u64;

    for m in matches {
        let (ours, theirs) = match (m.home_team_name == reference, m.away_team_name == reference) {
            (true, false) => (m.home_score, m.away_score),
            (false, true) => (m.away_score, m.home_score),
            _ => {
                return Err(PredictionError::InvalidHeadToHead {
                    home: m.home_team_name.clone(),
                    away: m.away_team_name.clone(),
                    reference: reference.to_string(),
                })
            }
        };
        goals_reference += u64::from(ours);
        goals_opponent += u64::from(theirs);
        if ours > theirs {
            agg.wins_for_reference += 1;
        } else if theirs > ours {
            agg.wins_for_opponent += 1;
        } else {
            agg.draws += 1;
        }
        agg.total += 1;
    }

    if agg.total > 0 {
        let n = f64::from(agg.total);
        agg.avg_goals_reference = goals_reference as f64 / n;
        agg.avg_goals_opponent = goals_opponent as f64 / n;
        agg.win_rate_reference = f64::from(agg.wins_for_reference) / n;
        agg.win_rate_opponent = f64::from(agg.wins_for_opponent) / n;
    }
    Ok(agg)
}
