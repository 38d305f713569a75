//! Client interface to the coding-agent CLI. Tasks are executed by
//! spawning the agent as a subprocess; the trait seam lets the runner and
//! tests swap in a scripted client.

pub mod mock;
pub mod subprocess;

pub use mock::MockAgentClient;
pub use subprocess::SubprocessAgentClient;

use async_trait::async_trait;
use std::path::PathBuf;

use crate::errors::VigilError;
use crate::models::TaskKind;

pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Agent persona a task is routed to. Research tasks need web lookup,
/// everything else reads the codebase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentRole {
    Explore,
    Librarian,
}

impl AgentRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRole::Explore => "explore",
            AgentRole::Librarian => "librarian",
        }
    }

    pub fn for_task(kind: TaskKind) -> Self {
        match kind {
            TaskKind::DependencyUpdates
            | TaskKind::SotaAlternatives
            | TaskKind::IntegrationOpportunities => AgentRole::Librarian,
            _ => AgentRole::Explore,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AgentRequest {
    pub prompt: String,
    pub role: AgentRole,
    /// Model key override; None lets the agent pick its own default.
    pub model: Option<String>,
    pub working_dir: Option<PathBuf>,
    pub timeout_secs: u64,
}

impl AgentRequest {
    pub fn new(prompt: impl Into<String>, role: AgentRole) -> Self {
        Self {
            prompt: prompt.into(),
            role,
            model: None,
            working_dir: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AgentResponse {
    /// Final text output, with any event-stream framing stripped.
    pub output: String,
    pub model: Option<String>,
}

#[async_trait]
pub trait AgentClient: Send + Sync {
    async fn invoke(&self, request: &AgentRequest) -> Result<AgentResponse, VigilError>;

    /// Model ids the agent can route to, for chain discovery.
    async fn list_models(&self) -> Result<Vec<String>, VigilError>;
}

/// Heuristic check for provider rate-limit responses surfaced as error
/// text by the agent CLI.
pub fn is_rate_limit_message(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.contains("rate limit")
        || lower.contains("rate_limit")
        || lower.contains("429")
        || lower.contains("too many requests")
        || lower.contains("quota exceeded")
        || lower.contains("resource_exhausted")
        || lower.contains("overloaded")
}

/// Check for "unknown model" failures that justify retrying without the
/// model override.
pub fn is_model_not_found(text: &str) -> bool {
    let lower = text.to_lowercase();
    (lower.contains("model") && lower.contains("not found"))
        || lower.contains("unknown model")
        || lower.contains("invalid model")
}
