//! Optional discovery of the model chain from the agent CLI itself.
//! Scores whatever models the agent reports and builds a priority chain,
//! falling back to the configured defaults when discovery fails.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use crate::agent::AgentClient;
use crate::config::ModelConfig;
use crate::errors::VigilError;

const CACHE_TTL_SECS: i64 = 3600;

/// Heuristic quality score from a model id. Bigger and newer wins.
fn score_model(model_id: &str) -> i64 {
    let id = model_id.to_lowercase();
    let mut score = 0i64;

    if id.contains("opus") || id.contains("gpt-5") {
        score += 100;
    } else if id.contains("sonnet") || id.contains("gpt-4") || id.contains("pro") {
        score += 80;
    } else if id.contains("haiku") || id.contains("mini") || id.contains("flash") {
        score += 40;
    }

    // Version digits break ties within a family.
    let version: i64 = id
        .chars()
        .filter(|c| c.is_ascii_digit())
        .take(2)
        .collect::<String>()
        .parse()
        .unwrap_or(0);
    score + version
}

/// Ids that are not general-purpose text models and never belong in the
/// chain.
fn is_excluded_modality(model_id: &str) -> bool {
    let id = model_id.to_lowercase();
    ["embed", "whisper", "tts", "audio", "image", "dall-e", "vision-only"]
        .iter()
        .any(|kw| id.contains(kw))
}

fn provider_of(model_id: &str) -> &'static str {
    let id = model_id.to_lowercase();
    if id.contains("claude") {
        "anthropic"
    } else if id.contains("gpt") || id.starts_with("o1") || id.starts_with("o3") {
        "openai"
    } else if id.contains("gemini") {
        "google"
    } else {
        "unknown"
    }
}

pub struct ModelDiscovery {
    cached: Option<(DateTime<Utc>, Vec<ModelConfig>)>,
    fallback: Vec<ModelConfig>,
}

impl ModelDiscovery {
    pub fn new(fallback: Vec<ModelConfig>) -> Self {
        Self {
            cached: None,
            fallback,
        }
    }

    /// Discovered chain, cached for an hour. Any discovery failure falls
    /// back to the configured chain.
    pub async fn chain(&mut self, agent: &dyn AgentClient) -> Vec<ModelConfig> {
        if let Some((fetched_at, chain)) = &self.cached {
            if Utc::now() - *fetched_at < Duration::seconds(CACHE_TTL_SECS) {
                return chain.clone();
            }
        }

        match self.discover(agent).await {
            Ok(chain) if !chain.is_empty() => {
                debug!(count = chain.len(), "Discovered model chain");
                self.cached = Some((Utc::now(), chain.clone()));
                chain
            }
            Ok(_) => {
                warn!("Agent reported no models, using configured chain");
                self.fallback.clone()
            }
            Err(e) => {
                warn!(error = %e, "Model discovery failed, using configured chain");
                self.fallback.clone()
            }
        }
    }

    async fn discover(&self, agent: &dyn AgentClient) -> Result<Vec<ModelConfig>, VigilError> {
        let model_ids = agent.list_models().await?;
        let mut scored: Vec<(i64, String)> = model_ids
            .into_iter()
            .filter(|id| provider_of(id) != "unknown" && !is_excluded_modality(id))
            .map(|id| (score_model(&id), id))
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        Ok(scored
            .into_iter()
            .enumerate()
            .map(|(index, (_, id))| ModelConfig::new(provider_of(&id), &id, (index + 1) as i64))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_prefers_larger_models() {
        assert!(score_model("claude-opus-4") > score_model("claude-sonnet-4"));
        assert!(score_model("claude-sonnet-4") > score_model("claude-haiku-4"));
        assert!(score_model("gemini-2.5-pro") > score_model("gemini-2.5-flash"));
    }

    #[test]
    fn test_non_text_models_are_excluded() {
        assert!(is_excluded_modality("text-embedding-3-large"));
        assert!(is_excluded_modality("whisper-1"));
        assert!(is_excluded_modality("dall-e-3"));
        assert!(!is_excluded_modality("claude-sonnet-4-5"));
    }

    #[test]
    fn test_provider_detection() {
        assert_eq!(provider_of("claude-sonnet-4-5"), "anthropic");
        assert_eq!(provider_of("gpt-4o"), "openai");
        assert_eq!(provider_of("gemini-2.5-pro"), "google");
        assert_eq!(provider_of("llama-3"), "unknown");
    }

    #[tokio::test]
    async fn test_discovery_builds_priority_chain() {
        let agent = crate::agent::MockAgentClient::new("[]")
            .with_models(vec!["gemini-2.5-flash".into(), "claude-sonnet-4-5".into()]);
        let mut discovery = ModelDiscovery::new(Vec::new());
        let chain = discovery.chain(&agent).await;
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0].model_id, "claude-sonnet-4-5");
        assert_eq!(chain[0].priority, 1);
        assert_eq!(chain[1].priority, 2);
    }

    #[tokio::test]
    async fn test_discovery_falls_back_on_empty() {
        let agent = crate::agent::MockAgentClient::new("[]");
        let fallback = vec![ModelConfig::new("openai", "gpt-4o", 1)];
        let mut discovery = ModelDiscovery::new(fallback.clone());
        let chain = discovery.chain(&agent).await;
        assert_eq!(chain, fallback);
    }
}
