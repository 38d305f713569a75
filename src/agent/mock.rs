use async_trait::async_trait;
use std::sync::Mutex;

use super::{AgentClient, AgentRequest, AgentResponse};
use crate::errors::VigilError;

/// Scripted agent for tests and dry runs. Returns a fixed output (or a
/// queue of outputs) and records every request it receives.
pub struct MockAgentClient {
    outputs: Mutex<Vec<String>>,
    default_output: String,
    models: Vec<String>,
    fail_rate_limited: bool,
    pub requests: Mutex<Vec<AgentRequest>>,
}

impl MockAgentClient {
    pub fn new(output: impl Into<String>) -> Self {
        Self {
            outputs: Mutex::new(Vec::new()),
            default_output: output.into(),
            models: Vec::new(),
            fail_rate_limited: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue outputs returned one per call before falling back to the
    /// default.
    pub fn with_output_queue(self, outputs: Vec<String>) -> Self {
        let mut queue = outputs;
        queue.reverse();
        Self {
            outputs: Mutex::new(queue),
            ..self
        }
    }

    pub fn with_models(self, models: Vec<String>) -> Self {
        Self { models, ..self }
    }

    /// Every invoke fails with a rate-limit error.
    pub fn rate_limited() -> Self {
        Self {
            fail_rate_limited: true,
            ..Self::new("")
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl AgentClient for MockAgentClient {
    async fn invoke(&self, request: &AgentRequest) -> Result<AgentResponse, VigilError> {
        self.requests.lock().unwrap().push(request.clone());
        if self.fail_rate_limited {
            return Err(VigilError::RateLimit("429 too many requests".into()));
        }
        let output = self
            .outputs
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| self.default_output.clone());
        Ok(AgentResponse {
            output,
            model: request.model.clone(),
        })
    }

    async fn list_models(&self) -> Result<Vec<String>, VigilError> {
        Ok(self.models.clone())
    }
}
