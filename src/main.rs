use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

mod config;
mod dashboard;
mod db;
mod error;
mod import;
mod predict;
mod source;

use config::{Command, Config};
use dashboard::AppState;
use db::Database;
use import::{
    sync_reference, BatchImporter, CancelToken, HistoricalImportPipeline, ImportOptions, ImportProgress,
    LeagueFileLocation,
};
use predict::{FixtureRequest, PredictionService};
use source::{ApiFootballClient, OpenFootballClient, RequestBudget, StatSource};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    let db = Database::open(&config.database_path)?;
    info!("Database opened: {}", config.database_path);

    let files = Arc::new(OpenFootballClient::new(&config.openfootball_url, config.http_timeout())?);
    let historical = HistoricalImportPipeline::new(files, db.clone());

    match config.command.clone() {
        Command::ImportLeague {
            season,
            league_file,
            local_file,
        } => {
            let location = match (league_file, local_file) {
                (_, Some(path)) => LeagueFileLocation::Local { season, path },
                (Some(league_file), None) => LeagueFileLocation::Remote { season, league_file },
                (None, None) => anyhow::bail!("either --league-file or --local-file is required"),
            };
            let summary = historical.import_league(location).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            return Ok(());
        }
        Command::ValidateLeague { id } => {
            let league = historical.validate_league(id)?;
            println!("{}", serde_json::to_string_pretty(&league)?);
            return Ok(());
        }
        Command::Staged => {
            let staged = historical.get_staged_leagues()?;
            println!("{}", serde_json::to_string_pretty(&staged)?);
            return Ok(());
        }
        _ => {}
    }

    // Everything below talks to API-Football through one shared budget.
    let api_key = config
        .api_football_key
        .clone()
        .context("API_FOOTBALL_KEY is required for this command")?;
    let budget = Arc::new(RequestBudget::new(config.requests_per_minute));
    let client = ApiFootballClient::new(
        &config.api_football_url,
        &api_key,
        config.players_season,
        config.http_timeout(),
        budget,
    )?;
    let api = client.clone();
    let source: Arc<dyn StatSource> = Arc::new(client);

    match config.command.clone() {
        Command::Serve => {
            let state = AppState::new(db.clone(), source, historical, config.import_settings());
            let app = dashboard::router(state);
            let addr: SocketAddr = config.dashboard_addr.parse()?;
            info!("Dashboard listening on http://{}", addr);
            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app).await?;
        }
        Command::ImportPlayers { start_batch } => {
            let importer = BatchImporter::new(source, Arc::new(db.clone()), config.import_settings());
            let progress = run_player_import(importer, |imp| async move {
                imp.import_players(ImportOptions {
                    batch_size: None,
                    start_from_batch: Some(start_batch),
                })
                .await
            })
            .await?;
            print_progress(&db, &progress)?;
        }
        Command::ResumePlayers => {
            let importer = BatchImporter::new(source, Arc::new(db.clone()), config.import_settings());
            let progress = run_player_import(importer, |imp| async move { imp.resume_import().await }).await?;
            print_progress(&db, &progress)?;
        }
        Command::SyncReference { league, season } => {
            let summary = sync_reference(source.as_ref(), &db, league, season).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Predict {
            home_team,
            away_team,
            league,
            season,
        } => {
            let service = PredictionService::new(source, db.clone());
            let prediction = service
                .predict_fixture(&FixtureRequest {
                    home_team_id: Some(home_team),
                    away_team_id: Some(away_team),
                    league_id: Some(league),
                    season: Some(season),
                })
                .await?;
            println!("{}", serde_json::to_string_pretty(&prediction)?);
        }
        Command::ImportLeague { .. } | Command::ValidateLeague { .. } | Command::Staged => {}
    }

    if let Some(remaining) = api.budget().daily_remaining() {
        info!("API-Football requests remaining today: {}", remaining);
    }
    Ok(())
}

/// Run an import with Ctrl-C wired to its cancel token and progress logged
/// as it arrives.
async fn run_player_import<F, Fut>(importer: BatchImporter, run: F) -> Result<ImportProgress>
where
    F: FnOnce(BatchImporter) -> Fut,
    Fut: std::future::Future<Output = Result<ImportProgress, error::ImportError>>,
{
    let cancel = CancelToken::new();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let importer = importer.with_cancel(cancel.clone()).with_progress(tx);

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl-C received, stopping after the current batch");
            cancel.cancel();
        }
    });
    let reporter = tokio::spawn(async move {
        while let Some(progress) = rx.recv().await {
            if let Some(batch) = progress.last_batch_id {
                info!(
                    "Progress: batch={}, current={}, success={}, failed={}",
                    batch, progress.current, progress.success, progress.failed
                );
            }
        }
    });

    let result = run(importer).await;
    let _ = reporter.await;
    Ok(result?)
}

fn print_progress(db: &Database, progress: &ImportProgress) -> Result<()> {
    info!("Players stored: {}", db.count_players()?);
    if progress.stopped_early {
        warn!(
            "Import stopped early after repeated batch failures; resume from batch {}",
            progress.last_batch_id.map_or(0, |b| b + 1)
        );
    }
    if progress.is_partial() {
        warn!(
            "Import partially failed: {} succeeded, {} failed",
            progress.success, progress.failed
        );
    }
    println!("{}", serde_json::to_string_pretty(progress)?);
    Ok(())
}
