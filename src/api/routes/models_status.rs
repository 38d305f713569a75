use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::api::AppState;

/// Configured model chain with live cooldown state.
pub async fn get_models(State(state): State<AppState>) -> Json<Value> {
    let status = state.failover.lock().unwrap().get_status();
    let all_exhausted = status.iter().all(|s| !s.available);
    Json(json!({
        "models": status,
        "all_exhausted": all_exhausted && !status.is_empty(),
    }))
}
