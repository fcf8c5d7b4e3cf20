use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::db::models::{HistoricalMatch, PromoteOutcome, StageOutcome, StagedLeague};
use crate::db::Database;
use crate::error::{ImportError, SourceError};
use crate::source::openfootball::{read_local_league_file, RawHistoricalMatch};
use crate::source::LeagueFileSource;

/// Where a season file comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeagueFileLocation {
    /// `{base}/{season}/{league_file}` on the file source, e.g. `2023-24` / `en.1.json`
    Remote { season: String, league_file: String },
    /// A JSON file on disk in the same shape
    Local { season: String, path: PathBuf },
}

impl LeagueFileLocation {
    fn season(&self) -> &str {
        match self {
            LeagueFileLocation::Remote { season, .. } | LeagueFileLocation::Local { season, .. } => season,
        }
    }

    fn source_file(&self) -> String {
        match self {
            LeagueFileLocation::Remote { league_file, .. } => league_file.clone(),
            LeagueFileLocation::Local { path, .. } => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HistoricalImportSummary {
    pub league_id: i64,
    pub match_count: usize,
    /// Fixtures in the file without a full-time result
    pub skipped: usize,
}

/// Two-phase ingestion of historical seasons: stage, then promote.
#[derive(Clone)]
pub struct HistoricalImportPipeline {
    files: Arc<dyn LeagueFileSource>,
    db: Database,
}

impl HistoricalImportPipeline {
    pub fn new(files: Arc<dyn LeagueFileSource>, db: Database) -> Self {
        HistoricalImportPipeline { files, db }
    }

    /// Fetch or read a season file and stage the league with its matches.
    pub async fn import_league(&self, location: LeagueFileLocation) -> Result<HistoricalImportSummary, ImportError> {
        let raw = match &location {
            LeagueFileLocation::Remote { season, league_file } => {
                self.files.fetch_league_file(season, league_file).await?
            }
            LeagueFileLocation::Local { path, .. } => read_local_league_file(path).await?,
        };

        let name = raw
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| SourceError::Decode(format!("league file {} has no name", location.source_file())))?;

        let listed = raw.matches.len();
        let matches: Vec<HistoricalMatch> = raw
            .matches
            .into_iter()
            .filter_map(RawHistoricalMatch::into_match)
            .collect();
        let skipped = listed - matches.len();
        if skipped > 0 {
            warn!("{}: skipping {} fixtures without a final score", name, skipped);
        }

        let season = location.season();
        match self.db.stage_league(&name, season, &location.source_file(), &matches)? {
            StageOutcome::Staged { league_id, match_count } => {
                info!(
                    "Staged historical league: id={}, name={}, season={}, matches={}",
                    league_id, name, season, match_count
                );
                Ok(HistoricalImportSummary {
                    league_id,
                    match_count,
                    skipped,
                })
            }
            StageOutcome::Duplicate => Err(ImportError::DuplicateImport {
                name,
                season: season.to_string(),
            }),
        }
    }

    /// Promote a staged league (and with it, its matches) to validated and
    /// return the promoted row.
    pub fn validate_league(&self, id: i64) -> Result<StagedLeague, ImportError> {
        match self.db.promote_league_to_validated(id)? {
            PromoteOutcome::Promoted => {
                info!("Historical league {} validated", id);
                self.db
                    .get_historical_league(id)?
                    .ok_or(ImportError::LeagueNotFound(id))
            }
            PromoteOutcome::AlreadyValidated => Err(ImportError::AlreadyValidated(id)),
            PromoteOutcome::NotFound => Err(ImportError::LeagueNotFound(id)),
        }
    }

    pub fn get_staged_leagues(&self) -> Result<Vec<StagedLeague>, ImportError> {
        Ok(self.db.get_staged_leagues()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::LeagueStatus;
    use crate::source::openfootball::{parse_league_file, RawHistoricalLeague};
    use async_trait::async_trait;
    use std::collections::HashMap;

    const SEASON_FILE: &str = r#"{
        "name": "English Premier League 2023/24",
        "matches": [
            {"round": "Matchday 1", "date": "2023-08-12", "team1": "Arsenal FC", "team2": "Chelsea FC",
             "score": {"ft": [2, 1]}},
            {"round": "Matchday 20", "date": "2024-01-02", "team1": "Chelsea FC", "team2": "Arsenal FC",
             "score": {"ft": [0, 0]}},
            {"round": "Matchday 38", "date": "2024-05-19", "team1": "Arsenal FC", "team2": "Everton FC"}
        ]
    }"#;

    /// Serves season files from memory, keyed by `season/file`
    #[derive(Default)]
    struct MemoryFiles(HashMap<String, String>);

    #[async_trait]
    impl LeagueFileSource for MemoryFiles {
        async fn fetch_league_file(&self, season: &str, league_file: &str) -> Result<RawHistoricalLeague, SourceError> {
            match self.0.get(&format!("{}/{}", season, league_file)) {
                Some(text) => parse_league_file(text),
                None => Err(SourceError::Http {
                    status: 404,
                    body: "404: Not Found".into(),
                }),
            }
        }
    }

    fn pipeline(db: &Database) -> HistoricalImportPipeline {
        let mut files = MemoryFiles::default();
        files.0.insert("2023-24/en.1.json".into(), SEASON_FILE.into());
        files.0.insert("2023-24/nameless.json".into(), r#"{"matches": []}"#.into());
        HistoricalImportPipeline::new(Arc::new(files), db.clone())
    }

    fn remote(file: &str) -> LeagueFileLocation {
        LeagueFileLocation::Remote {
            season: "2023-24".into(),
            league_file: file.into(),
        }
    }

    #[tokio::test]
    async fn stages_played_matches() {
        let db = Database::open_in_memory().unwrap();
        let p = pipeline(&db);
        let summary = p.import_league(remote("en.1.json")).await.unwrap();
        assert_eq!(summary.match_count, 2);
        assert_eq!(summary.skipped, 1);

        let staged = p.get_staged_leagues().unwrap();
        assert_eq!(staged.len(), 1);
        assert_eq!(staged[0].id, summary.league_id);
        assert_eq!(staged[0].source_file, "en.1.json");
        assert_eq!(staged[0].match_count, 2);
    }

    #[tokio::test]
    async fn second_import_is_duplicate() {
        let db = Database::open_in_memory().unwrap();
        let p = pipeline(&db);
        p.import_league(remote("en.1.json")).await.unwrap();
        let err = p.import_league(remote("en.1.json")).await.unwrap_err();
        match err {
            ImportError::DuplicateImport { name, season } => {
                assert_eq!(name, "English Premier League 2023/24");
                assert_eq!(season, "2023-24");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(p.get_staged_leagues().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn validation_is_one_way() {
        let db = Database::open_in_memory().unwrap();
        let p = pipeline(&db);
        let summary = p.import_league(remote("en.1.json")).await.unwrap();

        assert!(db.head_to_head_history("Arsenal FC", "Chelsea FC").unwrap().is_empty());
        let promoted = p.validate_league(summary.league_id).unwrap();
        assert_eq!(promoted.status, LeagueStatus::Validated);
        assert_eq!(promoted.match_count, 2);
        assert!(p.get_staged_leagues().unwrap().is_empty());
        assert_eq!(db.head_to_head_history("Chelsea FC", "Arsenal FC").unwrap().len(), 2);

        assert!(matches!(
            p.validate_league(summary.league_id),
            Err(ImportError::AlreadyValidated(_))
        ));
        assert!(matches!(p.validate_league(9999), Err(ImportError::LeagueNotFound(9999))));
    }

    #[tokio::test]
    async fn missing_remote_file_and_nameless_file_fail() {
        let db = Database::open_in_memory().unwrap();
        let p = pipeline(&db);
        assert!(matches!(
            p.import_league(remote("xx.9.json")).await,
            Err(ImportError::Source(SourceError::Http { status: 404, .. }))
        ));
        assert!(matches!(
            p.import_league(remote("nameless.json")).await,
            Err(ImportError::Source(SourceError::Decode(_)))
        ));
        assert!(p.get_staged_leagues().unwrap().is_empty());
    }

    #[tokio::test]
    async fn local_file_uses_its_file_name() {
        let db = Database::open_in_memory().unwrap();
        let p = pipeline(&db);
        let path = std::env::temp_dir().join(format!("matchday-staging-{}.json", std::process::id()));
        tokio::fs::write(&path, SEASON_FILE).await.unwrap();

        let summary = p
            .import_league(LeagueFileLocation::Local {
                season: "2023-24".into(),
                path: path.clone(),
            })
            .await
            .unwrap();
        tokio::fs::remove_file(&path).await.unwrap();

        let league = db.get_historical_league(summary.league_id).unwrap().unwrap();
        assert_eq!(
            league.source_file,
            path.file_name().unwrap().to_string_lossy().into_owned()
        );
    }
}
