use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info};

use crate::agent::{AgentClient, SubprocessAgentClient};
use crate::api::models::{CreateRunRequest, ListQuery};
use crate::api::{AppState, RunHandle};
use crate::history::HistoryStore;
use crate::prioritize::PriorityMode;
use crate::runner::Runner;
use crate::store::TaskQueue;

fn internal(e: impl std::fmt::Display) -> (StatusCode, Json<Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": e.to_string()})),
    )
}

fn queue_for(state: &AppState) -> TaskQueue {
    TaskQueue::new(state.db.clone(), state.config.tasks.clone())
}

pub async fn create_run(
    State(state): State<AppState>,
    body: Option<Json<CreateRunRequest>>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    // Runs execute sequentially; a second concurrent run would fight over
    // the same projects and models.
    if !state.active_runs.is_empty() {
        return Err((
            StatusCode::CONFLICT,
            Json(json!({"error": "A run is already in progress"})),
        ));
    }
    if state.config.projects.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "No projects configured"})),
        ));
    }

    let mut config = (*state.config).clone();
    if let Some(Json(overrides)) = body {
        if let Some(mode) = overrides.priority_mode.as_deref() {
            config.priority_mode = PriorityMode::parse(mode).ok_or_else(|| {
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({"error": format!("Unknown priority mode '{}'", mode)})),
                )
            })?;
        }
        if let Some(hours) = overrides.max_duration_hours {
            config.max_duration_hours = hours;
        }
        if let Some(budget) = overrides.token_budget {
            config.token_budget = Some(budget);
        }
    }

    let agent: Arc<dyn AgentClient> =
        Arc::new(SubprocessAgentClient::new(config.agent_bin.clone()));
    let mut runner = Runner::new(config, state.db.clone(), agent)
        .with_failover(state.failover.clone());
    let run_id = runner.setup().map_err(internal)?;

    let handle = Arc::new(RunHandle {
        cancel_token: runner.cancel_token(),
    });
    state.active_runs.insert(run_id.clone(), handle);

    let active_runs = state.active_runs.clone();
    let spawned_id = run_id.clone();
    tokio::spawn(async move {
        match runner.run().await {
            Ok(outcome) => info!(
                run_id = %spawned_id,
                completed = outcome.report.completed_tasks,
                "Background run finished"
            ),
            Err(e) => error!(run_id = %spawned_id, error = %e, "Background run failed"),
        }
        active_runs.remove(&spawned_id);
    });

    Ok((
        StatusCode::CREATED,
        Json(json!({"id": run_id, "status": "started"})),
    ))
}

// Store failures map to responses through VigilError's IntoResponse.
pub async fn list_runs(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Value>, crate::errors::VigilError> {
    let limit = query.limit.unwrap_or(20);
    let runs = queue_for(&state).list_runs(limit)?;
    Ok(Json(json!({"runs": runs, "total": runs.len()})))
}

pub async fn get_run(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let queue = queue_for(&state);
    match queue.get_run(&id) {
        Ok(Some(run)) => {
            let stats = queue.get_statistics(Some(&id)).map_err(internal)?;
            Ok(Json(json!({
                "run": run,
                "statistics": stats,
                "active": state.active_runs.contains_key(&id),
            })))
        }
        Ok(None) => Err((StatusCode::NOT_FOUND, Json(json!({"error": "Run not found"})))),
        Err(e) => Err(internal(e)),
    }
}

pub async fn get_findings(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let queue = queue_for(&state);
    if queue.get_run(&id).map_err(internal)?.is_none() {
        return Err((StatusCode::NOT_FOUND, Json(json!({"error": "Run not found"}))));
    }
    let findings = queue.get_all_findings(Some(&id)).map_err(internal)?;
    Ok(Json(json!({"findings": findings, "total": findings.len()})))
}

pub async fn get_diff(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let history = HistoryStore::new(state.config.history_path());
    match history.compute_diff(Some(&id)) {
        Ok(diff) => Ok(Json(serde_json::to_value(diff).map_err(internal)?)),
        Err(e) => Err((StatusCode::NOT_FOUND, Json(json!({"error": e.to_string()})))),
    }
}

pub async fn stop_run(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if let Some(handle) = state.active_runs.get(&id) {
        handle.cancel_token.cancel();
        info!(run_id = %id, "Stop requested via API");
        Ok(Json(json!({"stopping": true})))
    } else {
        Err((
            StatusCode::NOT_FOUND,
            Json(json!({"error": "No active run with that id"})),
        ))
    }
}
