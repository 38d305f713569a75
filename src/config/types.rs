use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::prioritize::PriorityMode;

/// A project to analyze during a run.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProjectConfig {
    pub name: String,
    pub path: PathBuf,
}

/// One entry in the model failover chain.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ModelConfig {
    pub provider: String,
    pub model_id: String,
    /// Lower values are tried first. Must be distinct across the chain.
    #[serde(default)]
    pub priority: i64,
}

impl ModelConfig {
    pub fn new(provider: &str, model_id: &str, priority: i64) -> Self {
        Self {
            provider: provider.to_string(),
            model_id: model_id.to_string(),
            priority,
        }
    }

    /// Stable key used for cooldown bookkeeping and task records.
    pub fn key(&self) -> String {
        format!("{}/{}", self.provider, self.model_id)
    }
}

/// Which task categories to generate for each project.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TaskToggles {
    #[serde(default = "default_true")]
    pub codebase_audit: bool,
    #[serde(default = "default_true")]
    pub enhancement_recommendations: bool,
    #[serde(default = "default_true")]
    pub tool_stack_research: bool,
}

impl Default for TaskToggles {
    fn default() -> Self {
        Self {
            codebase_audit: true,
            enhancement_recommendations: true,
            tool_stack_research: true,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct NotifyConfig {
    pub slack_webhook_url: Option<String>,
    pub webhook_url: Option<String>,
}

/// Main configuration for a run.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VigilConfig {
    #[serde(default)]
    pub projects: Vec<ProjectConfig>,

    /// Model failover chain in priority order.
    #[serde(default = "default_models")]
    pub models: Vec<ModelConfig>,

    #[serde(default)]
    pub tasks: TaskToggles,

    #[serde(default = "default_duration_hours")]
    pub max_duration_hours: f64,

    /// How long the runner sleeps when every model is cooling down, and
    /// how often the failover manager prunes expired cooldowns.
    #[serde(default = "default_quota_interval")]
    pub quota_check_interval_secs: u64,

    #[serde(default)]
    pub priority_mode: PriorityMode,

    /// Optional greedy token budget applied during prioritization.
    #[serde(default)]
    pub token_budget: Option<i64>,

    #[serde(default)]
    pub notify: NotifyConfig,

    /// Override for the agent CLI binary (also via VIGIL_AGENT_BIN).
    #[serde(default)]
    pub agent_bin: Option<String>,

    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for VigilConfig {
    fn default() -> Self {
        Self {
            projects: Vec::new(),
            models: default_models(),
            tasks: TaskToggles::default(),
            max_duration_hours: default_duration_hours(),
            quota_check_interval_secs: default_quota_interval(),
            priority_mode: PriorityMode::default(),
            token_budget: None,
            notify: NotifyConfig::default(),
            agent_bin: None,
            data_dir: default_data_dir(),
        }
    }
}

impl VigilConfig {
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("vigil.db")
    }

    pub fn history_path(&self) -> PathBuf {
        self.data_dir.join("finding_history.json")
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.data_dir.join("reports")
    }

    pub fn schedules_path(&self) -> PathBuf {
        self.data_dir.join("schedules.json")
    }

    pub fn metrics_path(&self) -> PathBuf {
        self.data_dir.join("model_metrics.json")
    }

    pub fn max_duration_secs(&self) -> u64 {
        (self.max_duration_hours * 3600.0) as u64
    }
}

fn default_models() -> Vec<ModelConfig> {
    vec![
        ModelConfig::new("anthropic", "claude-sonnet-4-5", 1),
        ModelConfig::new("openai", "gpt-4o", 2),
        ModelConfig::new("google", "gemini-2.5-pro", 3),
        ModelConfig::new("google", "gemini-2.5-flash", 4),
    ]
}

fn default_duration_hours() -> f64 {
    8.0
}

fn default_quota_interval() -> u64 {
    1800
}

fn default_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("VIGIL_DATA_DIR") {
        return PathBuf::from(dir);
    }
    dirs_home().join(".vigil")
}

fn dirs_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_chain_has_distinct_priorities() {
        let models = default_models();
        let mut priorities: Vec<i64> = models.iter().map(|m| m.priority).collect();
        priorities.sort();
        priorities.dedup();
        assert_eq!(priorities.len(), models.len());
    }

    #[test]
    fn test_model_key_format() {
        let m = ModelConfig::new("openai", "gpt-4o", 2);
        assert_eq!(m.key(), "openai/gpt-4o");
    }

    #[test]
    fn test_duration_conversion() {
        let config = VigilConfig {
            max_duration_hours: 0.5,
            ..Default::default()
        };
        assert_eq!(config.max_duration_secs(), 1800);
    }

    #[test]
    fn test_task_toggles_default_all_enabled() {
        let toggles = TaskToggles::default();
        assert!(toggles.codebase_audit);
        assert!(toggles.enhancement_recommendations);
        assert!(toggles.tool_stack_research);
    }
}
