//! Season statistics as the predictor consumes them, plus the loosely typed
//! API-Football payloads they are parsed from.
//!
//! Upstream responses carry optional fields and numbers encoded as strings
//! ("1.45"). Everything is deserialised into `Raw*` structs first and then
//! converted with `TryFrom`, so nothing downstream has to guess at field
//! presence.

use serde::{Deserialize, Serialize};

use crate::error::SourceError;

/// Which side of the fixture a team plays on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Venue {
    Home,
    Away,
}

/// A value broken down by venue
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Split<T> {
    pub home: T,
    pub away: T,
    pub total: T,
}

impl<T: Copy> Split<T> {
    pub fn at(&self, venue: Venue) -> T {
        match venue {
            Venue::Home => self.home,
            Venue::Away => self.away,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamRef {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeagueRef {
    pub id: i64,
    pub name: String,
    pub season: i32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FixtureCounts {
    pub played: Split<u32>,
    pub wins: Split<u32>,
    pub draws: Split<u32>,
    pub losses: Split<u32>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GoalTotals {
    /// Goal sums
    pub total: Split<u32>,
    /// Goals per match
    pub average: Split<f64>,
    /// Goals per match as upstream wrote them ("2.5"), empty when not sent
    #[serde(default)]
    pub average_text: Split<String>,
}

impl GoalTotals {
    /// The average for display, in upstream's own notation when available
    pub fn average_label(&self, venue: Venue) -> String {
        let text = match venue {
            Venue::Home => &self.average_text.home,
            Venue::Away => &self.average_text.away,
        };
        if text.is_empty() {
            format!("{:.2}", self.average.at(venue))
        } else {
            text.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Goals {
    pub scored: GoalTotals,
    pub conceded: GoalTotals,
}

/// One team's season in one league
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamSeasonStatistics {
    pub team: TeamRef,
    pub league: LeagueRef,
    /// Recent results, most recent last, e.g. "WWDLW"
    pub form: String,
    pub fixtures: FixtureCounts,
    pub goals: Goals,
}

// ── Raw payloads ─────────────────────────────────────────────────────────────

/// A number that may arrive as a JSON number, a numeric string, or null
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Loose {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Loose {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Loose::Int(v) => Some(*v as f64),
            Loose::Float(v) => Some(*v),
            Loose::Text(s) => s.trim().parse().ok(),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Loose::Int(v) => Some(*v),
            Loose::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            Loose::Float(_) => None,
            Loose::Text(s) => s.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSplit {
    pub home: Option<Loose>,
    pub away: Option<Loose>,
    pub total: Option<Loose>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawFixtures {
    pub played: Option<RawSplit>,
    pub wins: Option<RawSplit>,
    pub draws: Option<RawSplit>,
    #[serde(alias = "loses")]
    pub losses: Option<RawSplit>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawGoalTotals {
    pub total: Option<RawSplit>,
    pub average: Option<RawSplit>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawGoals {
    #[serde(rename = "for")]
    pub scored: Option<RawGoalTotals>,
    #[serde(rename = "against")]
    pub conceded: Option<RawGoalTotals>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTeamRef {
    pub id: Option<i64>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawLeagueRef {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub season: Option<i32>,
}

/// `response` object of `GET /teams/statistics`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTeamStatistics {
    pub team: Option<RawTeamRef>,
    pub league: Option<RawLeagueRef>,
    pub form: Option<String>,
    pub fixtures: Option<RawFixtures>,
    pub goals: Option<RawGoals>,
}

fn missing(field: &str) -> SourceError {
    SourceError::Decode(format!("team statistics missing '{}'", field))
}

fn count_split(raw: Option<&RawSplit>, field: &str) -> Result<Split<u32>, SourceError> {
    let raw = raw.ok_or_else(|| missing(field))?;
    let part = |v: &Option<Loose>, side: &str| -> Result<u32, SourceError> {
        let n = v.as_ref().and_then(Loose::as_i64).unwrap_or(0);
        u32::try_from(n)
            .map_err(|_| SourceError::Decode(format!("negative count in {}.{}: {}", field, side, n)))
    };
    Ok(Split {
        home: part(&raw.home, "home")?,
        away: part(&raw.away, "away")?,
        total: part(&raw.total, "total")?,
    })
}

fn average_split(raw: Option<&RawSplit>, field: &str) -> Result<Split<f64>, SourceError> {
    let raw = raw.ok_or_else(|| missing(field))?;
    let part = |v: &Option<Loose>, side: &str| -> Result<f64, SourceError> {
        let x = v.as_ref().and_then(Loose::as_f64).unwrap_or(0.0);
        if !x.is_finite() || x < 0.0 {
            return Err(SourceError::Decode(format!(
                "invalid average in {}.{}: {}",
                field, side, x
            )));
        }
        Ok(x)
    };
    Ok(Split {
        home: part(&raw.home, "home")?,
        away: part(&raw.away, "away")?,
        total: part(&raw.total, "total")?,
    })
}

fn average_text(raw: Option<&RawSplit>) -> Split<String> {
    let text = |v: &Option<Loose>| match v {
        Some(Loose::Text(s)) => s.trim().to_string(),
        Some(Loose::Int(n)) => n.to_string(),
        Some(Loose::Float(x)) => x.to_string(),
        None => String::new(),
    };
    match raw {
        Some(raw) => Split {
            home: text(&raw.home),
            away: text(&raw.away),
            total: text(&raw.total),
        },
        None => Split::default(),
    }
}

fn goal_totals(raw: Option<&RawGoalTotals>, field: &str) -> Result<GoalTotals, SourceError> {
    let raw = raw.ok_or_else(|| missing(field))?;
    Ok(GoalTotals {
        total: count_split(raw.total.as_ref(), &format!("{}.total", field))?,
        average: average_split(raw.average.as_ref(), &format!("{}.average", field))?,
        average_text: average_text(raw.average.as_ref()),
    })
}

impl TryFrom<RawTeamStatistics> for TeamSeasonStatistics {
    type Error = SourceError;

    fn try_from(raw: RawTeamStatistics) -> Result<Self, Self::Error> {
        let team = raw.team.ok_or_else(|| missing("team"))?;
        let team = TeamRef {
            id: team.id.ok_or_else(|| missing("team.id"))?,
            name: team.name.ok_or_else(|| missing("team.name"))?,
        };
        let league = raw.league.ok_or_else(|| missing("league"))?;
        let league = LeagueRef {
            id: league.id.ok_or_else(|| missing("league.id"))?,
            name: league.name.unwrap_or_default(),
            season: league.season.ok_or_else(|| missing("league.season"))?,
        };

        let form = raw.form.unwrap_or_default();
        if let Some(bad) = form.chars().find(|c| !matches!(c, 'W' | 'D' | 'L')) {
            return Err(SourceError::Decode(format!(
                "unexpected form character '{}' in '{}'",
                bad, form
            )));
        }

        let fx = raw.fixtures.ok_or_else(|| missing("fixtures"))?;
        let fixtures = FixtureCounts {
            played: count_split(fx.played.as_ref(), "fixtures.played")?,
            wins: count_split(fx.wins.as_ref(), "fixtures.wins")?,
            draws: count_split(fx.draws.as_ref(), "fixtures.draws")?,
            losses: count_split(fx.losses.as_ref(), "fixtures.losses")?,
        };
        let record = |venue: Venue| -> u64 {
            u64::from(fixtures.wins.at(venue))
                + u64::from(fixtures.draws.at(venue))
                + u64::from(fixtures.losses.at(venue))
        };
        let total = u64::from(fixtures.wins.total)
            + u64::from(fixtures.draws.total)
            + u64::from(fixtures.losses.total);
        for (venue, played, sum) in [
            ("home", fixtures.played.home, record(Venue::Home)),
            ("away", fixtures.played.away, record(Venue::Away)),
            ("total", fixtures.played.total, total),
        ] {
            if u64::from(played) != sum {
                return Err(SourceError::Decode(format!(
                    "{} record does not add up: played {} but W+D+L = {}",
                    venue, played, sum
                )));
            }
        }

        let g = raw.goals.ok_or_else(|| missing("goals"))?;
        let goals = Goals {
            scored: goal_totals(g.scored.as_ref(), "goals.for")?,
            conceded: goal_totals(g.conceded.as_ref(), "goals.against")?,
        };

        Ok(TeamSeasonStatistics {
            team,
            league,
            form,
            fixtures,
            goals,
        })
    }
}
