pub mod errors;
pub mod models;
pub mod routes;

use axum::Router;
use dashmap::DashMap;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::VigilConfig;
use crate::errors::VigilError;
use crate::failover::ModelFailoverManager;
use crate::store::Database;

/// Handle to a run executing in a background task.
pub struct RunHandle {
    pub cancel_token: CancellationToken,
}

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<VigilConfig>,
    pub failover: Arc<Mutex<ModelFailoverManager>>,
    pub active_runs: Arc<DashMap<String, Arc<RunHandle>>>,
}

pub fn create_app_state(config: VigilConfig) -> Result<AppState, VigilError> {
    let db = Database::new(&config.db_path())?;
    let failover = Arc::new(Mutex::new(ModelFailoverManager::new(
        config.models.clone(),
        config.quota_check_interval_secs,
    )));
    Ok(AppState {
        db,
        config: Arc::new(config),
        failover,
        active_runs: Arc::new(DashMap::new()),
    })
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", axum::routing::get(routes::health::health_check))
        .route(
            "/api/runs",
            axum::routing::post(routes::runs::create_run).get(routes::runs::list_runs),
        )
        .route("/api/runs/:id", axum::routing::get(routes::runs::get_run))
        .route(
            "/api/runs/:id/findings",
            axum::routing::get(routes::runs::get_findings),
        )
        .route(
            "/api/runs/:id/diff",
            axum::routing::get(routes::runs::get_diff),
        )
        .route(
            "/api/runs/:id/stop",
            axum::routing::post(routes::runs::stop_run),
        )
        .route(
            "/api/models",
            axum::routing::get(routes::models_status::get_models),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
