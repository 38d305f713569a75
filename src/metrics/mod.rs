//! Per-model performance metrics. Every task execution is recorded into
//! a JSON file beside the database, keyed by model and by model+kind,
//! so later runs can see which model performs best on a given kind.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::errors::VigilError;
use crate::models::TaskKind;

/// A model+kind pair needs this many samples before it can win
/// `best_model_for_task`.
const MIN_SAMPLES: u64 = 3;

/// Lifetime totals for one model across all task kinds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub total_tasks: u64,
    pub successful_tasks: u64,
    pub total_tokens: i64,
    pub total_findings: u64,
    pub total_duration_secs: f64,
}

/// Running averages for one model+kind pair.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskMetrics {
    pub count: u64,
    pub avg_findings: f64,
    pub avg_tokens: f64,
    pub avg_duration_secs: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct MetricsFile {
    #[serde(default)]
    models: BTreeMap<String, ModelMetrics>,
    #[serde(default)]
    tasks: BTreeMap<String, TaskMetrics>,
}

pub struct ModelPerformanceTracker {
    path: PathBuf,
}

impl ModelPerformanceTracker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load(&self) -> Result<MetricsFile, VigilError> {
        if !self.path.exists() {
            return Ok(MetricsFile::default());
        }
        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(MetricsFile::default());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn save(&self, file: &MetricsFile) -> Result<(), VigilError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(file)?)?;
        Ok(())
    }

    pub fn record_task_result(
        &self,
        model_key: &str,
        kind: TaskKind,
        tokens_used: i64,
        findings_count: usize,
        duration_secs: f64,
        success: bool,
    ) -> Result<(), VigilError> {
        let mut file = self.load()?;

        let model = file.models.entry(model_key.to_string()).or_default();
        model.total_tasks += 1;
        if success {
            model.successful_tasks += 1;
        }
        model.total_tokens += tokens_used;
        model.total_findings += findings_count as u64;
        model.total_duration_secs += duration_secs;

        let task = file
            .tasks
            .entry(task_key(model_key, kind))
            .or_default();
        let old = task.count as f64;
        task.count += 1;
        let new = task.count as f64;
        task.avg_findings = (task.avg_findings * old + findings_count as f64) / new;
        task.avg_tokens = (task.avg_tokens * old + tokens_used as f64) / new;
        task.avg_duration_secs = (task.avg_duration_secs * old + duration_secs) / new;

        debug!(model = %model_key, kind = %kind, "Recorded task metrics");
        self.save(&file)
    }

    /// The model with the best findings-per-token ratio on this kind,
    /// among models with enough recorded samples.
    pub fn best_model_for_task(&self, kind: TaskKind) -> Result<Option<String>, VigilError> {
        let file = self.load()?;
        let mut candidates: Vec<(String, f64)> = Vec::new();
        for (key, data) in &file.tasks {
            let Some((model_key, task_kind)) = key.rsplit_once('|') else {
                continue;
            };
            if task_kind != kind.as_str() || data.count < MIN_SAMPLES {
                continue;
            }
            let score = data.avg_findings / data.avg_tokens.max(1.0) * 1000.0;
            candidates.push((model_key.to_string(), score));
        }
        candidates.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        Ok(candidates.into_iter().next().map(|(model, _)| model))
    }

    pub fn model_summary(&self) -> Result<BTreeMap<String, ModelMetrics>, VigilError> {
        Ok(self.load()?.models)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn task_key(model_key: &str, kind: TaskKind) -> String {
    format!("{}|{}", model_key, kind)
}
