/// Team power score.
///
/// Blends current-season form at the given venue with the head-to-head win
/// rate:
///   form  = win_rate·50 + goal_diff_per_match·10 + avg_goals·5
///   h2h   = h2h_win_rate·100
///   power = form·(1 − H2H_WEIGHT) + h2h·H2H_WEIGHT
/// floored at 1 so the two-team share computation never divides by zero.
use crate::source::stats::{TeamSeasonStatistics, Venue};

/// Share of the power score taken from head-to-head history. A tuning
/// constant, not derived from data.
pub const H2H_WEIGHT: f64 = 0.3;

const WIN_RATE_SCALE: f64 = 50.0;
const GOAL_DIFF_SCALE: f64 = 10.0;
const AVG_GOALS_SCALE: f64 = 5.0;
const H2H_SCALE: f64 = 100.0;

pub fn power(stats: &TeamSeasonStatistics, venue: Venue, h2h_win_rate: f64) -> f64 {
    let played = stats.fixtures.played.at(venue);
    let win_rate = if played > 0 {
        f64::from(stats.fixtures.wins.at(venue)) / f64::from(played)
    } else {
        0.0
    };
    let goal_diff = f64::from(stats.goals.scored.total.at(venue))
        - f64::from(stats.goals.conceded.total.at(venue));
    let goal_diff_per_match = goal_diff / f64::from(played.max(1));
    let avg_goals = stats.goals.scored.average.at(venue);

    let form_power = win_rate * WIN_RATE_SCALE
        + goal_diff_per_match * GOAL_DIFF_SCALE
        + avg_goals * AVG_GOALS_SCALE;
    let h2h_power = h2h_win_rate * H2H_SCALE;

    let combined = form_power * (1.0 - H2H_WEIGHT) + h2h_power * H2H_WEIGHT;
    combined.max(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::stats::fixtures::team_stats;
    use approx::assert_relative_eq;

    #[test]
    fn strong_home_record() {
        // 10 home games, 7 wins, +12 goal difference, 2.0 goals per game
        let stats = team_stats(1, "Home FC", (10, 10), (7, 3), (2, 3), (20, 10), (8, 12), (2.0, 1.0));
        let p = power(&stats, Venue::Home, 0.5);
        let form = 0.7 * 50.0 + 1.2 * 10.0 + 2.0 * 5.0;
        assert_relative_eq!(p, form * 0.7 + 50.0 * 0.3, epsilon = 1e-9);
    }

    #[test]
    fn venue_selects_the_split() {
        let stats = team_stats(1, "Home FC", (10, 10), (7, 3), (2, 3), (20, 10), (8, 12), (2.0, 1.0));
        assert!(power(&stats, Venue::Home, 0.0) > power(&stats, Venue::Away, 0.0));
    }

    #[test]
    fn no_games_played_does_not_divide_by_zero() {
        let stats = team_stats(1, "New FC", (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0.0, 0.0));
        let p = power(&stats, Venue::Home, 0.0);
        assert!(p.is_finite());
        assert_relative_eq!(p, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn power_is_floored_at_one() {
        // Heavy goal deficit drives form power negative
        let stats = team_stats(1, "Weak FC", (10, 10), (0, 0), (0, 0), (2, 1), (40, 45), (0.2, 0.1));
        for rate in [0.0, 0.25, 0.5, 1.0] {
            assert!(power(&stats, Venue::Away, rate) >= 1.0);
        }
    }
}
