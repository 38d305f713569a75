//! Model failover: walk the configured chain in priority order, skipping
//! models that are cooling down after a rate limit. Cooldowns are pruned
//! lazily; no background timer runs.

pub mod discovery;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::config::ModelConfig;

const DEFAULT_COOLDOWN_SECS: i64 = 3600;

/// Snapshot of one model's availability, for status endpoints and the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct ModelStatus {
    pub key: String,
    pub priority: i64,
    pub available: bool,
    pub cooldown_remaining_secs: i64,
    /// When the cooldown expires; absent for available models.
    pub retry_at: Option<DateTime<Utc>>,
}

pub struct ModelFailoverManager {
    /// Configured chain, sorted ascending by priority (lower tries first).
    models: Vec<ModelConfig>,
    /// Cooldown expiry per model key. Entries past expiry are stale until
    /// the next prune.
    cooldowns: HashMap<String, DateTime<Utc>>,
    /// Minimum gap between prune passes.
    check_interval: Duration,
    last_check: DateTime<Utc>,
}

impl ModelFailoverManager {
    pub fn new(mut models: Vec<ModelConfig>, quota_check_interval_secs: u64) -> Self {
        models.sort_by_key(|m| m.priority);
        Self {
            models,
            cooldowns: HashMap::new(),
            check_interval: Duration::seconds(quota_check_interval_secs as i64),
            last_check: Utc::now(),
        }
    }

    /// Drop expired cooldowns, at most once per check interval. Called on
    /// the acquisition path so no timer is needed.
    fn prune_cooldowns(&mut self) {
        let now = Utc::now();
        if now - self.last_check < self.check_interval {
            return;
        }
        self.last_check = now;
        let before = self.cooldowns.len();
        self.cooldowns.retain(|key, expiry| {
            let keep = *expiry > now;
            if !keep {
                info!(model = %key, "Cooldown expired, model available again");
            }
            keep
        });
        if before != self.cooldowns.len() {
            debug!(expired = before - self.cooldowns.len(), "Pruned cooldowns");
        }
    }

    fn is_cooling(&self, key: &str) -> bool {
        self.cooldowns
            .get(key)
            .map(|expiry| *expiry > Utc::now())
            .unwrap_or(false)
    }

    /// Best available model: lowest priority value not in cooldown.
    pub fn get_available_model(&mut self) -> Option<ModelConfig> {
        self.prune_cooldowns();
        self.models
            .iter()
            .find(|m| !self.is_cooling(&m.key()))
            .cloned()
    }

    /// Put a model on cooldown after a rate-limit response.
    pub fn mark_rate_limited(&mut self, key: &str, cooldown_secs: Option<i64>) {
        let secs = cooldown_secs.unwrap_or(DEFAULT_COOLDOWN_SECS);
        let expiry = Utc::now() + Duration::seconds(secs);
        warn!(model = %key, cooldown_secs = secs, "Model rate limited");
        self.cooldowns.insert(key.to_string(), expiry);
    }

    /// Clear a cooldown early, e.g. after the provider recovers sooner
    /// than the default backoff assumed.
    pub fn mark_available(&mut self, key: &str) {
        if self.cooldowns.remove(key).is_some() {
            info!(model = %key, "Cooldown cleared");
        }
    }

    /// True when every configured model is cooling down.
    pub fn all_exhausted(&self) -> bool {
        !self.models.is_empty() && self.models.iter().all(|m| self.is_cooling(&m.key()))
    }

    /// Seconds until the soonest cooldown expiry, when exhausted.
    pub fn shortest_cooldown_secs(&self) -> Option<i64> {
        let now = Utc::now();
        self.cooldowns
            .values()
            .filter(|expiry| **expiry > now)
            .map(|expiry| (*expiry - now).num_seconds().max(1))
            .min()
    }

    pub fn get_status(&self) -> Vec<ModelStatus> {
        let now = Utc::now();
        self.models
            .iter()
            .map(|m| {
                let key = m.key();
                let expiry = self.cooldowns.get(&key).copied().filter(|e| *e > now);
                let remaining = expiry
                    .map(|e| (e - now).num_seconds().max(0))
                    .unwrap_or(0);
                ModelStatus {
                    key,
                    priority: m.priority,
                    available: remaining == 0,
                    cooldown_remaining_secs: remaining,
                    retry_at: expiry,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> Vec<ModelConfig> {
        vec![
            ModelConfig::new("google", "gemini-2.5-pro", 3),
            ModelConfig::new("anthropic", "claude-sonnet-4-5", 1),
            ModelConfig::new("openai", "gpt-4o", 2),
        ]
    }

    #[test]
    fn test_lowest_priority_wins() {
        let mut mgr = ModelFailoverManager::new(chain(), 1800);
        let model = mgr.get_available_model().unwrap();
        assert_eq!(model.key(), "anthropic/claude-sonnet-4-5");
    }

    #[test]
    fn test_rate_limited_model_is_skipped() {
        let mut mgr = ModelFailoverManager::new(chain(), 1800);
        mgr.mark_rate_limited("anthropic/claude-sonnet-4-5", None);
        let model = mgr.get_available_model().unwrap();
        assert_eq!(model.key(), "openai/gpt-4o");

        // Priority 1 wins again as soon as its cooldown is cleared.
        mgr.mark_available("anthropic/claude-sonnet-4-5");
        let model = mgr.get_available_model().unwrap();
        assert_eq!(model.key(), "anthropic/claude-sonnet-4-5");
    }

    #[test]
    fn test_all_exhausted_and_recovery() {
        let mut mgr = ModelFailoverManager::new(chain(), 1800);
        for key in [
            "anthropic/claude-sonnet-4-5",
            "openai/gpt-4o",
            "google/gemini-2.5-pro",
        ] {
            mgr.mark_rate_limited(key, Some(600));
        }
        assert!(mgr.all_exhausted());
        assert!(mgr.get_available_model().is_none());
        assert!(mgr.shortest_cooldown_secs().unwrap() <= 600);

        mgr.mark_available("openai/gpt-4o");
        assert!(!mgr.all_exhausted());
        assert_eq!(mgr.get_available_model().unwrap().key(), "openai/gpt-4o");
    }

    #[test]
    fn test_expired_cooldown_is_ignored_even_before_prune() {
        let mut mgr = ModelFailoverManager::new(chain(), 1800);
        mgr.mark_rate_limited("anthropic/claude-sonnet-4-5", Some(-5));
        // Prune has not run (interval not elapsed) but the expiry check
        // still treats the model as available.
        let model = mgr.get_available_model().unwrap();
        assert_eq!(model.key(), "anthropic/claude-sonnet-4-5");
    }

    #[test]
    fn test_status_reports_cooldowns() {
        let mut mgr = ModelFailoverManager::new(chain(), 1800);
        mgr.mark_rate_limited("openai/gpt-4o", Some(300));
        let status = mgr.get_status();
        assert_eq!(status.len(), 3);
        let gpt = status.iter().find(|s| s.key == "openai/gpt-4o").unwrap();
        assert!(!gpt.available);
        assert!(gpt.cooldown_remaining_secs > 0 && gpt.cooldown_remaining_secs <= 300);
        let retry_at = gpt.retry_at.unwrap();
        assert!(retry_at > Utc::now());
        assert!(retry_at <= Utc::now() + Duration::seconds(300));
        assert!(status
            .iter()
            .filter(|s| s.available)
            .all(|s| s.retry_at.is_none()));
        assert!(status.iter().filter(|s| s.available).count() == 2);
    }
}
