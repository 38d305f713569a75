use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use super::{is_model_not_found, is_rate_limit_message, AgentClient, AgentRequest, AgentResponse};
use crate::errors::VigilError;

const DEFAULT_AGENT_BIN: &str = "agent";

/// Runs the agent CLI as a child process in print mode and collects its
/// output. One process per task; nothing is kept warm between tasks.
pub struct SubprocessAgentClient {
    bin: String,
}

impl SubprocessAgentClient {
    pub fn new(bin: Option<String>) -> Self {
        let bin = bin
            .or_else(|| std::env::var("VIGIL_AGENT_BIN").ok())
            .unwrap_or_else(|| DEFAULT_AGENT_BIN.to_string());
        Self { bin }
    }

    async fn run_once(
        &self,
        request: &AgentRequest,
        model: Option<&str>,
        isolated_env: bool,
    ) -> Result<AgentResponse, VigilError> {
        let mut cmd = Command::new(&self.bin);
        if isolated_env {
            // Retry path for transient failures: a corrupted inherited
            // environment must not poison the second attempt.
            cmd.env_clear();
            for key in ["PATH", "HOME", "TERM"] {
                if let Some(value) = std::env::var_os(key) {
                    cmd.env(key, value);
                }
            }
        }
        cmd.arg("--agent")
            .arg(request.role.as_str())
            .arg("-p")
            .arg(&request.prompt)
            .arg("--output-format")
            .arg("json");
        if let Some(model) = model {
            cmd.arg("--model").arg(model);
        }
        if let Some(dir) = &request.working_dir {
            cmd.current_dir(dir);
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(bin = %self.bin, role = request.role.as_str(), model = ?model, "Spawning agent");

        let output = tokio::time::timeout(
            Duration::from_secs(request.timeout_secs),
            cmd.output(),
        )
        .await
        .map_err(|_| {
            VigilError::Timeout(format!(
                "Agent did not finish within {}s",
                request.timeout_secs
            ))
        })?
        .map_err(|e| VigilError::Agent(format!("Failed to spawn {}: {}", self.bin, e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            let detail = if stderr.trim().is_empty() { &stdout } else { &stderr };
            if is_rate_limit_message(detail) {
                return Err(VigilError::RateLimit(detail.trim().to_string()));
            }
            return Err(VigilError::Agent(format!(
                "Agent exited with {}: {}",
                output.status,
                detail.trim()
            )));
        }

        Ok(AgentResponse {
            output: extract_result_text(&stdout),
            model: model.map(str::to_string),
        })
    }
}

#[async_trait]
impl AgentClient for SubprocessAgentClient {
    async fn invoke(&self, request: &AgentRequest) -> Result<AgentResponse, VigilError> {
        match self.run_once(request, request.model.as_deref(), false).await {
            Ok(response) => Ok(response),
            Err(VigilError::Agent(message))
                if request.model.is_some() && is_model_not_found(&message) =>
            {
                // The agent build may not know this model id yet. Retry
                // once letting it pick its own default.
                warn!(model = ?request.model, "Model rejected by agent, retrying without override");
                self.run_once(request, None, false).await
            }
            // Rate limits go straight back to the caller; the failover
            // chain owns that recovery path.
            Err(e @ VigilError::RateLimit(_)) => Err(e),
            Err(e) => {
                let class = e.classify();
                if !class.retryable {
                    return Err(e);
                }
                let delay = class.retry_delay(0);
                warn!(error = %e, delay_secs = delay.as_secs(), "Transient agent failure, retrying with isolated environment");
                tokio::time::sleep(delay).await;
                self.run_once(request, request.model.as_deref(), true).await
            }
        }
    }

    async fn list_models(&self) -> Result<Vec<String>, VigilError> {
        let output = tokio::time::timeout(
            Duration::from_secs(30),
            Command::new(&self.bin)
                .arg("models")
                .arg("--json")
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| VigilError::Timeout("Model listing timed out".into()))?
        .map_err(|e| VigilError::Agent(format!("Failed to spawn {}: {}", self.bin, e)))?;

        if !output.status.success() {
            return Err(VigilError::Agent(format!(
                "Model listing exited with {}",
                output.status
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(parse_model_list(&stdout))
    }
}

/// Pull the final result text out of the agent's JSON output. The CLI
/// emits either an event array (print mode with streaming) or a single
/// object; anything unparseable is returned as-is.
fn extract_result_text(stdout: &str) -> String {
    let trimmed = stdout.trim();
    let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) else {
        return trimmed.to_string();
    };

    match &value {
        serde_json::Value::Array(events) => {
            if let Some(result) = events.iter().rev().find_map(|event| {
                (event.get("type").and_then(|t| t.as_str()) == Some("result"))
                    .then(|| event.get("result").and_then(|r| r.as_str()))
                    .flatten()
            }) {
                return result.to_string();
            }
            // No terminal result event: join assistant text blocks.
            let texts: Vec<&str> = events
                .iter()
                .filter_map(|event| event.get("text").and_then(|t| t.as_str()))
                .collect();
            if texts.is_empty() {
                trimmed.to_string()
            } else {
                texts.join("\n")
            }
        }
        serde_json::Value::Object(map) => map
            .get("result")
            .or_else(|| map.get("output"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| trimmed.to_string()),
        _ => trimmed.to_string(),
    }
}

fn parse_model_list(stdout: &str) -> Vec<String> {
    if let Ok(ids) = serde_json::from_str::<Vec<String>>(stdout.trim()) {
        return ids;
    }
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(stdout.trim()) {
        if let Some(models) = value.get("models").and_then(|m| m.as_array()) {
            return models
                .iter()
                .filter_map(|m| {
                    m.as_str()
                        .map(str::to_string)
                        .or_else(|| m.get("id").and_then(|id| id.as_str()).map(str::to_string))
                })
                .collect();
        }
    }
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
