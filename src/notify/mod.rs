//! Run-completion notifications. Fire-and-forget webhooks; a delivery
//! failure is logged and never fails the run.

use serde_json::json;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::NotifyConfig;
use crate::errors::VigilError;
use crate::models::{RunReport, Severity};

const DELIVERY_TIMEOUT: Duration = Duration::from_secs(15);

/// Lifecycle moments worth a ping besides the final report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEvent {
    Started,
    Failed,
}

impl RunEvent {
    fn as_str(&self) -> &'static str {
        match self {
            RunEvent::Started => "started",
            RunEvent::Failed => "failed",
        }
    }
}

pub struct Notifier {
    config: NotifyConfig,
    client: reqwest::Client,
}

impl Notifier {
    pub fn new(config: NotifyConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn summary_line(report: &RunReport) -> String {
        format!(
            "Run {} finished: {}/{} tasks completed, {} findings ({} critical, {} high), {} tokens",
            report.run_id,
            report.completed_tasks,
            report.total_tasks,
            report.all_findings().len(),
            report.count_by_severity(Severity::Critical),
            report.count_by_severity(Severity::High),
            report.total_tokens
        )
    }

    /// Short lifecycle notification (run started, run failed). Delivered
    /// to every configured endpoint; failures are only logged.
    pub async fn send_event(&self, event: RunEvent, run_id: &str, detail: &str) {
        let text = if detail.is_empty() {
            format!("Run {} {}", run_id, event.as_str())
        } else {
            format!("Run {} {}: {}", run_id, event.as_str(), detail)
        };

        if let Some(url) = &self.config.slack_webhook_url {
            if let Err(e) = self.post(url, &json!({ "text": text })).await {
                warn!(error = %e, "Slack notification failed");
            }
        }
        if let Some(url) = &self.config.webhook_url {
            let payload = json!({
                "run_id": run_id,
                "event": event.as_str(),
                "detail": detail,
            });
            if let Err(e) = self.post(url, &payload).await {
                warn!(error = %e, "Webhook notification failed");
            }
        }
    }

    /// Deliver the report summary to every configured endpoint. Errors are
    /// logged per endpoint; the first one is returned for the caller to
    /// surface if it cares.
    pub async fn send_report(&self, report: &RunReport) -> Result<(), VigilError> {
        let mut first_error = None;

        if let Some(url) = &self.config.slack_webhook_url {
            let payload = json!({ "text": Self::summary_line(report) });
            if let Err(e) = self.post(url, &payload).await {
                warn!(error = %e, "Slack notification failed");
                first_error.get_or_insert(e);
            }
        }

        if let Some(url) = &self.config.webhook_url {
            let payload = json!({
                "run_id": report.run_id,
                "completed_tasks": report.completed_tasks,
                "failed_tasks": report.failed_tasks,
                "total_tasks": report.total_tasks,
                "total_tokens": report.total_tokens,
                "finding_count": report.all_findings().len(),
                "critical": report.count_by_severity(Severity::Critical),
                "high": report.count_by_severity(Severity::High),
            });
            if let Err(e) = self.post(url, &payload).await {
                warn!(error = %e, "Webhook notification failed");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn post(&self, url: &str, payload: &serde_json::Value) -> Result<(), VigilError> {
        let response = self
            .client
            .post(url)
            .timeout(DELIVERY_TIMEOUT)
            .json(payload)
            .send()
            .await
            .map_err(|e| VigilError::Network(format!("POST {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(VigilError::Network(format!(
                "POST {} returned {}",
                url,
                response.status()
            )));
        }
        info!(url = %url, "Notification delivered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Finding, ProjectReport};
    use chrono::Utc;
    use std::path::PathBuf;

    fn report() -> RunReport {
        RunReport {
            run_id: "run_x".into(),
            started_at: Utc::now(),
            completed_at: Some(Utc::now()),
            projects: vec![ProjectReport {
                name: "demo".into(),
                path: PathBuf::from("/tmp/demo"),
                findings: vec![Finding::new(Severity::Critical, "bad", "very bad")],
            }],
            total_tasks: 11,
            completed_tasks: 10,
            failed_tasks: 1,
            total_tokens: 10_000,
            models_used: vec![],
            cross_project_findings: vec![],
        }
    }

    #[test]
    fn test_summary_line_content() {
        let line = Notifier::summary_line(&report());
        assert!(line.contains("run_x"));
        assert!(line.contains("10/11 tasks"));
        assert!(line.contains("1 critical"));
    }

    #[tokio::test]
    async fn test_no_endpoints_is_a_noop() {
        let notifier = Notifier::new(NotifyConfig::default());
        assert!(notifier.send_report(&report()).await.is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_returns_network_error() {
        let notifier = Notifier::new(NotifyConfig {
            webhook_url: Some("http://127.0.0.1:1/hook".into()),
            slack_webhook_url: None,
        });
        let err = notifier.send_report(&report()).await.unwrap_err();
        assert!(matches!(err, VigilError::Network(_)));
    }
}
