use serde::Deserialize;

/// Optional per-run overrides accepted by POST /api/runs.
#[derive(Debug, Default, Deserialize)]
pub struct CreateRunRequest {
    pub priority_mode: Option<String>,
    pub max_duration_hours: Option<f64>,
    pub token_budget: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<usize>,
}
