use serde::Serialize;
use tracing::{info, warn};

use crate::db::Database;
use crate::error::ImportError;
use crate::source::StatSource;

/// Counts from one reference-data sync
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReferenceSummary {
    pub league_id: i64,
    pub teams: usize,
    /// Upstream entries without a usable id or name
    pub skipped: usize,
}

/// Upsert a league and its teams for `season`, so that player records
/// pointing at them pass validation.
pub async fn sync_reference(
    source: &dyn StatSource,
    db: &Database,
    league_id: i64,
    season: i32,
) -> Result<ReferenceSummary, ImportError> {
    let league = source
        .leagues(league_id, season)
        .await?
        .into_iter()
        .filter_map(|entry| entry.into_league())
        .find(|l| l.id == league_id)
        .ok_or_else(|| {
            ImportError::ReferenceData(anyhow::anyhow!(
                "league {} season {} not found on {}",
                league_id,
                season,
                source.name()
            ))
        })?;

    // League row first; teams reference it through players.
    db.upsert_league(&league)?;

    let entries = source.teams(league_id, season).await?;
    let received = entries.len();
    let teams: Vec<_> = entries.into_iter().filter_map(|entry| entry.into_team()).collect();
    let skipped = received - teams.len();
    if skipped > 0 {
        warn!("Skipped {} team entries without id or name for league {}", skipped, league_id);
    }
    db.upsert_teams(&teams)?;

    info!(
        "Reference data synced: league={} ({}), season={}, teams={}",
        league.id,
        league.name,
        season,
        teams.len()
    );
    Ok(ReferenceSummary {
        league_id,
        teams: teams.len(),
        skipped,
    })
}
