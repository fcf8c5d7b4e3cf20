use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{error, info, warn};

use super::progress::{CancelToken, ImportProgress};
use crate::db::models::Player;
use crate::db::Database;
use crate::error::{ErrorKind, ImportError, SourceError};
use crate::source::records::RawPlayerRecord;
use crate::source::StatSource;

/// Checkpoint key for the player import
pub const PLAYERS_IMPORT: &str = "players";

/// Storage the player import writes to.
pub trait PlayerStore: Send + Sync {
    fn known_team_ids(&self) -> Result<HashSet<i64>>;
    fn known_league_ids(&self) -> Result<HashSet<i64>>;
    /// All-or-nothing bulk upsert keyed by player id
    fn upsert_players(&self, players: &[Player]) -> Result<()>;
    fn read_checkpoint(&self, import_type: &str) -> Result<Option<u32>>;
    fn write_checkpoint(&self, import_type: &str, last_batch: u32) -> Result<()>;
}

impl PlayerStore for Database {
    fn known_team_ids(&self) -> Result<HashSet<i64>> {
        self.team_ids()
    }

    fn known_league_ids(&self) -> Result<HashSet<i64>> {
        self.league_ids()
    }

    fn upsert_players(&self, players: &[Player]) -> Result<()> {
        Database::upsert_players(self, players)
    }

    fn read_checkpoint(&self, import_type: &str) -> Result<Option<u32>> {
        Ok(self.read_import_checkpoint(import_type)?.map(|cp| cp.last_batch))
    }

    fn write_checkpoint(&self, import_type: &str, last_batch: u32) -> Result<()> {
        self.write_import_checkpoint(import_type, last_batch)
    }
}

/// Pacing and retry policy for a run.
#[derive(Debug, Clone)]
pub struct ImportSettings {
    pub batch_size: u32,
    /// Retries after the first attempt, for fetches and upserts alike
    pub retry_attempts: u32,
    /// Flat delay between retries
    pub retry_delay: Duration,
    /// Pause after every batch
    pub batch_delay: Duration,
    /// Pause before re-fetching a rate-limited batch
    pub rate_limit_delay: Duration,
    pub max_rate_limit_waits: u32,
    /// Consecutive skipped batches after which the run stops
    pub max_consecutive_skips: u32,
}

impl Default for ImportSettings {
    fn default() -> Self {
        ImportSettings {
            batch_size: 200,
            retry_attempts: 3,
            retry_delay: Duration::from_millis(5000),
            batch_delay: Duration::from_millis(1000),
            rate_limit_delay: Duration::from_secs(60),
            max_rate_limit_waits: 3,
            max_consecutive_skips: 5,
        }
    }
}

/// Per-call overrides of the run's starting point and page size
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportOptions {
    pub batch_size: Option<u32>,
    pub start_from_batch: Option<u32>,
}

enum Fetched {
    Page(Vec<RawPlayerRecord>),
    /// Retries exhausted or the error is not worth retrying
    Skipped(SourceError),
}

/// Pulls players page by page, validates them against known teams and
/// leagues, upserts each page and checkpoints after it.
pub struct BatchImporter {
    source: Arc<dyn StatSource>,
    store: Arc<dyn PlayerStore>,
    settings: ImportSettings,
    cancel: CancelToken,
    progress_tx: Option<UnboundedSender<ImportProgress>>,
}

impl BatchImporter {
    pub fn new(source: Arc<dyn StatSource>, store: Arc<dyn PlayerStore>, settings: ImportSettings) -> Self {
        BatchImporter {
            source,
            store,
            settings,
            cancel: CancelToken::new(),
            progress_tx: None,
        }
    }

    pub fn with_progress(mut self, tx: UnboundedSender<ImportProgress>) -> Self {
        self.progress_tx = Some(tx);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub async fn import_players(&self, options: ImportOptions) -> Result<ImportProgress, ImportError> {
        let batch_size = options.batch_size.unwrap_or(self.settings.batch_size);
        self.import_all(options.start_from_batch.unwrap_or(0), batch_size).await
    }

    /// Continue after the last committed batch, or from the start when no
    /// checkpoint exists.
    pub async fn resume_import(&self) -> Result<ImportProgress, ImportError> {
        let start = self
            .store
            .read_checkpoint(PLAYERS_IMPORT)?
            .map(|last| last + 1)
            .unwrap_or(0);
        info!("Resuming player import at batch {}", start);
        self.import_all(start, self.settings.batch_size).await
    }

    /// Run batches from `start_batch` until the source returns an empty page,
    /// the run is cancelled, or a fatal error occurs.
    pub async fn import_all(&self, start_batch: u32, batch_size: u32) -> Result<ImportProgress, ImportError> {
        let teams = self.store.known_team_ids().map_err(ImportError::ReferenceData)?;
        let leagues = self.store.known_league_ids().map_err(ImportError::ReferenceData)?;
        info!(
            "Starting player import from {}: start_batch={}, batch_size={}, teams={}, leagues={}",
            self.source.name(),
            start_batch,
            batch_size,
            teams.len(),
            leagues.len()
        );

        let mut progress = ImportProgress::default();
        self.publish(&progress);

        let mut batch = start_batch;
        let mut consecutive_skips = 0u32;
        loop {
            if self.cancel.is_cancelled() {
                info!("Player import cancelled before batch {}", batch);
                progress.cancelled = true;
                break;
            }

            let records = match self.fetch_batch(batch, batch_size).await {
                Ok(Fetched::Page(records)) => records,
                Ok(Fetched::Skipped(err)) => {
                    warn!("Skipping batch {} after fetch failure: {}", batch, err);
                    progress.record(
                        ErrorKind::BatchFetch,
                        None,
                        format!("Batch {} failed", batch),
                        Some(err.to_string()),
                    );
                    self.commit(batch, &mut progress)?;
                    consecutive_skips += 1;
                    if consecutive_skips >= self.settings.max_consecutive_skips {
                        error!(
                            "Stopping player import: {} consecutive batches failed (last={})",
                            consecutive_skips, batch
                        );
                        progress.stopped_early = true;
                        break;
                    }
                    batch += 1;
                    tokio::time::sleep(self.settings.batch_delay).await;
                    continue;
                }
                Err(e) => {
                    error!("Player import aborted at batch {}: {}", batch, e);
                    self.publish(&progress);
                    return Err(e);
                }
            };
            consecutive_skips = 0;

            if records.is_empty() {
                info!("Batch {} is empty, no more players", batch);
                break;
            }

            let fetched = records.len() as u64;
            progress.total += fetched;
            progress.current += fetched;

            let mut valid = Vec::with_capacity(records.len());
            for raw in records {
                let entity_id = raw.id();
                match normalize_player(raw, &teams, &leagues) {
                    Ok(player) => valid.push(player),
                    Err(reason) => {
                        progress.failed += 1;
                        progress.record(
                            ErrorKind::Validation,
                            entity_id,
                            "Data validation error",
                            Some(reason),
                        );
                    }
                }
            }

            if !valid.is_empty() {
                match self.upsert_with_retry(&valid).await {
                    Ok(()) => progress.success += valid.len() as u64,
                    Err(e) => {
                        error!("Upsert of batch {} failed: {:#}", batch, e);
                        progress.failed += valid.len() as u64;
                        progress.record(
                            ErrorKind::BatchUpsert,
                            None,
                            "Batch insert failed",
                            Some(format!("{:#}", e)),
                        );
                    }
                }
            }

            info!(
                "Batch {} done: fetched={}, valid={}, success={}, failed={}",
                batch,
                fetched,
                valid.len(),
                progress.success,
                progress.failed
            );
            self.commit(batch, &mut progress)?;
            batch += 1;
            tokio::time::sleep(self.settings.batch_delay).await;
        }

        info!(
            "Player import finished: total={}, success={}, failed={}, errors={}, cancelled={}",
            progress.total,
            progress.success,
            progress.failed,
            progress.errors.len(),
            progress.cancelled
        );
        self.publish(&progress);
        Ok(progress)
    }

    async fn fetch_batch(&self, batch: u32, batch_size: u32) -> Result<Fetched, ImportError> {
        let mut retries = 0u32;
        let mut rate_limit_waits = 0u32;
        loop {
            match self.source.players_batch(batch, batch_size).await {
                Ok(records) => return Ok(Fetched::Page(records)),
                Err(SourceError::QuotaExceeded) => return Err(ImportError::QuotaExceeded { batch }),
                Err(SourceError::RateLimited) => {
                    if rate_limit_waits >= self.settings.max_rate_limit_waits {
                        return Ok(Fetched::Skipped(SourceError::RateLimited));
                    }
                    rate_limit_waits += 1;
                    warn!(
                        "Rate limited on batch {}, waiting {:?} ({}/{})",
                        batch, self.settings.rate_limit_delay, rate_limit_waits, self.settings.max_rate_limit_waits
                    );
                    tokio::time::sleep(self.settings.rate_limit_delay).await;
                }
                Err(e) if e.is_transient() && retries < self.settings.retry_attempts => {
                    retries += 1;
                    warn!("Fetching batch {} failed, retry attempt {}: {}", batch, retries, e);
                    tokio::time::sleep(self.settings.retry_delay).await;
                }
                Err(e) => return Ok(Fetched::Skipped(e)),
            }
        }
    }

    async fn upsert_with_retry(&self, players: &[Player]) -> Result<()> {
        let mut retries = 0u32;
        loop {
            match self.store.upsert_players(players) {
                Ok(()) => return Ok(()),
                Err(e) if retries < self.settings.retry_attempts => {
                    retries += 1;
                    warn!("Upsert failed, retry attempt {}: {:#}", retries, e);
                    tokio::time::sleep(self.settings.retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Persist the checkpoint for `batch` before the run may advance.
    fn commit(&self, batch: u32, progress: &mut ImportProgress) -> Result<(), ImportError> {
        self.store
            .write_checkpoint(PLAYERS_IMPORT, batch)
            .map_err(|source| ImportError::Checkpoint { batch, source })?;
        progress.last_batch_id = Some(batch);
        self.publish(progress);
        Ok(())
    }

    fn publish(&self, progress: &ImportProgress) {
        if let Some(tx) = &self.progress_tx {
            // A caller that stopped listening does not stop the import.
            let _ = tx.send(progress.clone());
        }
    }
}

/// Turn one upstream record into a storable player, or say why not.
fn normalize_player(
    raw: RawPlayerRecord,
    teams: &HashSet<i64>,
    leagues: &HashSet<i64>,
) -> Result<Player, String> {
    let (team_id, league_id) = raw.primary_refs();
    let id = raw.player.id.filter(|id| *id > 0);

    let (Some(team_id), Some(league_id)) = (
        team_id.filter(|t| teams.contains(t)),
        league_id.filter(|l| leagues.contains(l)),
    ) else {
        return Err(format!(
            "Missing team or league reference for player {}",
            id.map(|i| i.to_string()).unwrap_or_else(|| "?".into())
        ));
    };

    let first = raw.statistics.into_iter().next().unwrap_or_default();
    let p = raw.player;
    let name = p
        .name
        .filter(|n| !n.trim().is_empty())
        .or_else(|| {
            let joined = [p.firstname.as_deref(), p.lastname.as_deref()]
                .into_iter()
                .flatten()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            (!joined.is_empty()).then_some(joined)
        });

    let (Some(id), Some(name)) = (id, name) else {
        return Err("Missing required player data".to_string());
    };

    Ok(Player {
        id,
        name,
        firstname: p.firstname,
        lastname: p.lastname,
        nationality: p.nationality,
        birthdate: p.birth.and_then(|b| b.date),
        photo: p.photo,
        height: p.height,
        weight: p.weight,
        team_id,
        league_id,
        position: first.games.and_then(|g| g.position),
        last_season: first
            .league
            .and_then(|l| l.season)
            .and_then(|s| s.as_i64())
            .and_then(|s| i32::try_from(s).ok()),
    })
}
