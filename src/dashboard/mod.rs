use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::db::Database;
use crate::error::{ImportError, PredictionError};
use crate::import::{
    BatchImporter, CancelToken, HistoricalImportPipeline, ImportOptions, ImportProgress, ImportSettings,
};
use crate::predict::{FixtureRequest, PredictionService};
use crate::source::StatSource;

type ApiError = (StatusCode, String);

pub struct AppState {
    pub db: Database,
    pub source: Arc<dyn StatSource>,
    pub predictions: PredictionService,
    pub historical: HistoricalImportPipeline,
    pub import_settings: ImportSettings,
    player_import: Mutex<PlayerImportStatus>,
}

impl AppState {
    pub fn new(
        db: Database,
        source: Arc<dyn StatSource>,
        historical: HistoricalImportPipeline,
        import_settings: ImportSettings,
    ) -> Self {
        AppState {
            predictions: PredictionService::new(source.clone(), db.clone()),
            db,
            source,
            historical,
            import_settings,
            player_import: Mutex::new(PlayerImportStatus::default()),
        }
    }

    fn import_status(&self) -> Result<std::sync::MutexGuard<'_, PlayerImportStatus>, ApiError> {
        self.player_import
            .lock()
            .map_err(|_| internal("import status lock poisoned"))
    }
}

/// Latest state of the background player import
#[derive(Debug, Clone, Default, Serialize)]
pub struct PlayerImportStatus {
    pub running: bool,
    pub progress: Option<ImportProgress>,
    /// Fatal error of the last run, if it ended with one
    pub error: Option<String>,
    #[serde(skip)]
    cancel: Option<CancelToken>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct StartImportRequest {
    pub batch_size: Option<u32>,
    pub start_from_batch: Option<u32>,
    /// Continue after the stored checkpoint; `start_from_batch` is ignored
    #[serde(default)]
    pub resume: bool,
}

/// Build the Axum router for the dashboard API.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/staged-leagues", get(staged_leagues_handler))
        .route("/api/staged-leagues/:id/validate", post(validate_league_handler))
        .route("/api/checkpoints", get(checkpoints_handler))
        .route(
            "/api/imports/players",
            get(player_import_status_handler).post(start_player_import_handler),
        )
        .route("/api/imports/players/cancel", post(cancel_player_import_handler))
        .route("/api/players/:id", get(player_handler))
        .route("/api/predict", get(predict_handler))
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

/// GET /api/staged-leagues
async fn staged_leagues_handler(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    state
        .historical
        .get_staged_leagues()
        .map(Json)
        .map_err(import_error)
}

/// POST /api/staged-leagues/:id/validate
async fn validate_league_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    state.historical.validate_league(id).map(Json).map_err(import_error)
}

/// GET /api/checkpoints
async fn checkpoints_handler(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    state
        .db
        .list_import_checkpoints()
        .map(Json)
        .map_err(|e| internal(e.to_string()))
}

#[derive(Serialize)]
struct PlayerImportView {
    #[serde(flatten)]
    status: PlayerImportStatus,
    stored_players: i64,
}

/// GET /api/imports/players
async fn player_import_status_handler(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let stored_players = state.db.count_players().map_err(|e| internal(e.to_string()))?;
    let status = state.import_status()?.clone();
    Ok(Json(PlayerImportView {
        status,
        stored_players,
    }))
}

/// GET /api/players/:id
async fn player_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    match state.db.get_player(id) {
        Ok(Some(player)) => Ok(Json(player)),
        Ok(None) => Err((StatusCode::NOT_FOUND, format!("player {} not found", id))),
        Err(e) => Err(internal(e.to_string())),
    }
}

/// POST /api/imports/players
///
/// Starts the import in the background. Only one player import runs at a time.
async fn start_player_import_handler(
    State(state): State<Arc<AppState>>,
    request: Option<Json<StartImportRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let cancel = CancelToken::new();
    {
        let mut status = state.import_status()?;
        if status.running {
            return Err((StatusCode::CONFLICT, "player import already running".into()));
        }
        *status = PlayerImportStatus {
            running: true,
            progress: None,
            error: None,
            cancel: Some(cancel.clone()),
        };
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    let importer = BatchImporter::new(
        state.source.clone(),
        Arc::new(state.db.clone()),
        state.import_settings.clone(),
    )
    .with_progress(tx)
    .with_cancel(cancel);

    let forward_state = state.clone();
    let forward = tokio::spawn(async move {
        while let Some(progress) = rx.recv().await {
            if let Ok(mut status) = forward_state.player_import.lock() {
                status.progress = Some(progress);
            }
        }
    });

    let run_state = state.clone();
    tokio::spawn(async move {
        let result = if request.resume {
            importer.resume_import().await
        } else {
            importer
                .import_players(ImportOptions {
                    batch_size: request.batch_size,
                    start_from_batch: request.start_from_batch,
                })
                .await
        };
        // Closes the progress channel so the forwarder drains and exits.
        drop(importer);
        let _ = forward.await;

        if let Ok(mut status) = run_state.player_import.lock() {
            status.running = false;
            status.cancel = None;
            match result {
                Ok(progress) => status.progress = Some(progress),
                Err(e) => {
                    error!("Background player import failed: {}", e);
                    status.error = Some(e.to_string());
                }
            }
        }
    });

    info!("Player import started from the dashboard");
    Ok((StatusCode::ACCEPTED, Json(serde_json::json!({ "status": "started" }))))
}

/// POST /api/imports/players/cancel
async fn cancel_player_import_handler(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let status = state.import_status()?;
    match (&status.cancel, status.running) {
        (Some(cancel), true) => {
            cancel.cancel();
            info!("Player import cancellation requested");
            Ok((StatusCode::ACCEPTED, Json(serde_json::json!({ "status": "cancelling" }))))
        }
        _ => Err((StatusCode::CONFLICT, "no player import is running".into())),
    }
}

/// GET /api/predict?home=33&away=40&league=39&season=2023
async fn predict_handler(
    State(state): State<Arc<AppState>>,
    Query(request): Query<FixtureRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .predictions
        .predict_fixture(&request)
        .await
        .map(Json)
        .map_err(prediction_error)
}

// ── Error mapping ─────────────────────────────────────────────────────────────

/// Missing inputs mean no prediction is available; a failed upstream call
/// means the prediction failed.
fn prediction_error(err: PredictionError) -> ApiError {
    let status = if err.is_missing_input() {
        StatusCode::UNPROCESSABLE_ENTITY
    } else {
        match err {
            PredictionError::Source(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    };
    (status, err.to_string())
}

fn import_error(err: ImportError) -> ApiError {
    let status = match err {
        ImportError::LeagueNotFound(_) => StatusCode::NOT_FOUND,
        ImportError::AlreadyValidated(_) | ImportError::DuplicateImport { .. } => StatusCode::CONFLICT,
        ImportError::Source(_) | ImportError::QuotaExceeded { .. } => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

fn internal(msg: impl Into<String>) -> ApiError {
    (StatusCode::INTERNAL_SERVER_ERROR, msg.into())
}
