use serde::Serialize;

use super::h2h::{self, H2HAggregate};
use super::power::power;
use crate::db::models::HeadToHeadMatch;
use crate::error::PredictionError;
use crate::source::stats::{TeamSeasonStatistics, Venue};

/// Weight of the season goal average in the predicted scoreline; the
/// remainder comes from the head-to-head goal average.
const SEASON_GOALS_WEIGHT: f64 = 0.7;
const H2H_DRAW_SCALE: f64 = 20.0;

/// Percentages, each rounded on its own. The sum may be off 100 by one or two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WinProbability {
    pub home: u32,
    pub away: u32,
    pub draw: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PredictedScore {
    pub home: u32,
    pub away: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    pub win_probability: WinProbability,
    pub predicted_score: PredictedScore,
    /// Display order is insertion order
    pub key_factors: Vec<String>,
}

/// Predict a fixture from both teams' season statistics and their shared
/// history. Pure; callers resolve and validate inputs beforehand.
pub fn predict(
    home: &TeamSeasonStatistics,
    away: &TeamSeasonStatistics,
    h2h_matches: &[HeadToHeadMatch],
) -> Result<PredictionResult, PredictionError> {
    let h2h = h2h::analyze(h2h_matches, &home.team.name)?;

    let home_power = power(home, Venue::Home, h2h.win_rate_reference);
    let away_power = power(away, Venue::Away, h2h.win_rate_opponent);

    let total_power = home_power + away_power;
    let mut home_win = home_power / total_power * 100.0;
    let mut away_win = away_power / total_power * 100.0;

    let h2h_draw_rate = f64::from(h2h.draws) / f64::from(h2h.total.max(1));
    let draw = home_win.min(away_win) * 0.5 + h2h_draw_rate * H2H_DRAW_SCALE;

    home_win = (home_win - draw / 2.0).max(0.0);
    away_win = (away_win - draw / 2.0).max(0.0);

    let total = home_win + away_win + draw;
    let win_probability = WinProbability {
        home: percent(home_win, total),
        away: percent(away_win, total),
        draw: percent(draw, total),
    };

    let home_avg = home.goals.scored.average.home;
    let away_avg = away.goals.scored.average.away;
    let predicted_score = PredictedScore {
        home: expected_goals(home_avg, h2h.avg_goals_reference),
        away: expected_goals(away_avg, h2h.avg_goals_opponent),
    };

    Ok(PredictionResult {
        win_probability,
        predicted_score,
        key_factors: key_factors(home, away, &h2h),
    })
}

fn percent(part: f64, total: f64) -> u32 {
    (part / total * 100.0).round() as u32
}

fn expected_goals(season_avg: f64, h2h_avg: f64) -> u32 {
    (season_avg * SEASON_GOALS_WEIGHT + h2h_avg * (1.0 - SEASON_GOALS_WEIGHT))
        .max(0.0)
        .round() as u32
}

fn key_factors(home: &TeamSeasonStatistics, away: &TeamSeasonStatistics, h2h: &H2HAggregate) -> Vec<String> {
    let mut factors = vec![
        format!("Home team form: {}", home.form),
        format!("Away team form: {}", away.form),
        format!(
            "Home team scores {} goals on average at home.",
            home.goals.scored.average_label(Venue::Home)
        ),
        format!(
            "Away team scores {} goals on average away.",
            away.goals.scored.average_label(Venue::Away)
        ),
    ];
    if h2h.total > 0 {
        factors.push(format!(
            "Head-to-head ({} matches): {} wins: {}, {} wins: {}, Draws: {}.",
            h2h.total, home.team.name, h2h.wins_for_reference, away.team.name, h2h.wins_for_opponent, h2h.draws
        ));
    }
    factors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::stats::fixtures::team_stats;

    fn arsenal() -> TeamSeasonStatistics {
        team_stats(42, "Arsenal", (19, 19), (14, 14), (3, 2), (48, 43), (16, 13), (2.53, 2.26))
    }

    fn chelsea() -> TeamSeasonStatistics {
        team_stats(49, "Chelsea", (19, 19), (9, 9), (5, 4), (44, 33), (26, 37), (2.32, 1.74))
    }

    fn assert_normalised(p: &WinProbability) {
        let sum = p.home + p.away + p.draw;
        assert!((98..=102).contains(&sum), "sum {} out of slack", sum);
        assert!(p.home <= 100 && p.away <= 100 && p.draw <= 100);
    }

    #[test]
    fn scoreline_from_season_averages_without_history() {
        let home = team_stats(1, "Home FC", (10, 10), (5, 5), (2, 2), (20, 10), (10, 10), (2.0, 1.0));
        let away = team_stats(2, "Away FC", (10, 10), (5, 5), (2, 2), (20, 10), (10, 10), (2.0, 1.0));
        let result = predict(&home, &away, &[]).unwrap();
        // 2.0·0.7 = 1.4 and 1.0·0.7 = 0.7 both round to 1
        assert_eq!(result.predicted_score, PredictedScore { home: 1, away: 1 });
        assert_normalised(&result.win_probability);
    }

    #[test]
    fn key_factors_without_history() {
        let result = predict(&arsenal(), &chelsea(), &[]).unwrap();
        assert_eq!(
            result.key_factors,
            vec![
                "Home team form: WDLWW".to_string(),
                "Away team form: WDLWW".to_string(),
                "Home team scores 2.53 goals on average at home.".to_string(),
                "Away team scores 1.74 goals on average away.".to_string(),
            ]
        );
    }

    #[test]
    fn key_factors_quote_upstream_averages_verbatim() {
        let mut home = arsenal();
        home.goals.scored.average_text.home = "2.5".into();
        let mut away = chelsea();
        away.goals.scored.average_text.away = "1".into();
        let result = predict(&home, &away, &[]).unwrap();
        assert_eq!(result.key_factors[2], "Home team scores 2.5 goals on average at home.");
        assert_eq!(result.key_factors[3], "Away team scores 1 goals on average away.");
    }

    #[test]
    fn head_to_head_summary_is_appended_last() {
        let history = vec![
            HeadToHeadMatch::new("Arsenal", "Chelsea", 3, 1),
            HeadToHeadMatch::new("Chelsea", "Arsenal", 0, 1),
            HeadToHeadMatch::new("Arsenal", "Chelsea", 2, 2),
        ];
        let result = predict(&arsenal(), &chelsea(), &history).unwrap();
        assert_eq!(result.key_factors.len(), 5);
        assert_eq!(
            result.key_factors[4],
            "Head-to-head (3 matches): Arsenal wins: 2, Chelsea wins: 0, Draws: 1."
        );
        assert_normalised(&result.win_probability);
    }

    #[test]
    fn stronger_side_is_favoured() {
        let result = predict(&arsenal(), &chelsea(), &[]).unwrap();
        assert!(result.win_probability.home > result.win_probability.away);
    }

    #[test]
    fn history_shifts_the_odds() {
        let without = predict(&arsenal(), &chelsea(), &[]).unwrap();
        let history: Vec<HeadToHeadMatch> = (0..4)
            .map(|_| HeadToHeadMatch::new("Chelsea", "Arsenal", 3, 0))
            .collect();
        let with = predict(&arsenal(), &chelsea(), &history).unwrap();
        assert!(with.win_probability.away > without.win_probability.away);
    }

    #[test]
    fn probabilities_stay_normalised_across_inputs() {
        let records = [
            ((0, 0), (0, 0), (0, 0), (0, 0), (0.0, 0.0)),
            ((10, 10), (10, 0), (0, 0), (30, 2), (2.8, 0.2)),
            ((10, 10), (0, 0), (0, 0), (1, 1), (0.1, 0.1)),
            ((5, 7), (2, 3), (1, 2), (9, 8), (1.8, 1.14)),
        ];
        let histories = [
            vec![],
            vec![HeadToHeadMatch::new("A", "B", 1, 1); 5],
            vec![HeadToHeadMatch::new("B", "A", 0, 4), HeadToHeadMatch::new("A", "B", 0, 1)],
        ];
        for (played, wins, draws, goals, avg) in records {
            for (o_played, o_wins, o_draws, o_goals, o_avg) in records {
                let home = team_stats(1, "A", played, wins, draws, goals, (goals.1, goals.0), avg);
                let away = team_stats(2, "B", o_played, o_wins, o_draws, o_goals, (o_goals.1, o_goals.0), o_avg);
                for history in &histories {
                    let result = predict(&home, &away, history).unwrap();
                    assert_normalised(&result.win_probability);
                }
            }
        }
    }

    #[test]
    fn malformed_history_is_rejected() {
        let history = vec![HeadToHeadMatch::new("Everton", "Fulham", 1, 0)];
        assert!(matches!(
            predict(&arsenal(), &chelsea(), &history),
            Err(PredictionError::InvalidHeadToHead { .. })
        ));
    }
}
