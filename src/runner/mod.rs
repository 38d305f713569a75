//! The sequential run loop: dequeue the highest-priority pending task,
//! acquire a model from the failover chain, execute it through the agent,
//! and persist the outcome. One task at a time, cooperative stop between
//! tasks, hard stop at the duration budget.

pub mod prompts;

use serde::Deserialize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::agent::{AgentClient, AgentRequest, AgentRole};
use crate::config::{ModelConfig, VigilConfig};
use crate::cross_project::CrossProjectAnalyzer;
use crate::errors::VigilError;
use crate::failover::ModelFailoverManager;
use crate::history::HistoryStore;
use crate::metrics::ModelPerformanceTracker;
use crate::models::{Finding, ProjectReport, RunReport, Severity, Task};
use crate::store::{Database, TaskQueue};

/// Flat token accounting: each completed task books this many tokens.
/// The agent CLI does not report real usage in print mode.
pub const TOKENS_PER_TASK: i64 = 1000;

/// How much unstructured output is preserved in the fallback finding.
const FALLBACK_OUTPUT_CHARS: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// No pending tasks left in the run.
    QueueDrained,
    /// The duration budget elapsed with tasks still pending.
    DurationExceeded,
    /// stop() was requested; the in-flight task finished first.
    Cancelled,
    /// Every model is cooling down past the remaining budget.
    ModelsExhausted,
}

#[derive(Debug)]
pub struct RunOutcome {
    pub report: RunReport,
    pub stop_reason: StopReason,
}

pub struct Runner {
    config: VigilConfig,
    queue: TaskQueue,
    /// Shared with the API layer: cooldowns are provider-level state, not
    /// per-run state.
    failover: Arc<Mutex<ModelFailoverManager>>,
    agent: Arc<dyn AgentClient>,
    history: HistoryStore,
    metrics: ModelPerformanceTracker,
    cancel: CancellationToken,
}

impl Runner {
    pub fn new(config: VigilConfig, db: Database, agent: Arc<dyn AgentClient>) -> Self {
        let queue = TaskQueue::new(db, config.tasks.clone());
        let failover = Arc::new(Mutex::new(ModelFailoverManager::new(
            config.models.clone(),
            config.quota_check_interval_secs,
        )));
        let history = HistoryStore::new(config.history_path());
        let metrics = ModelPerformanceTracker::new(config.metrics_path());
        Self {
            config,
            queue,
            failover,
            agent,
            history,
            metrics,
            cancel: CancellationToken::new(),
        }
    }

    /// Use an externally owned failover manager instead of a private one.
    pub fn with_failover(mut self, failover: Arc<Mutex<ModelFailoverManager>>) -> Self {
        self.failover = failover;
        self
    }

    /// Token for cooperative stop. Cancelling never interrupts an
    /// in-flight task; the loop checks between tasks.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn run_id(&self) -> Option<&str> {
        self.queue.current_run()
    }

    /// Create the run, generate tasks for every configured project, and
    /// write the prioritized order back to the store.
    pub fn setup(&mut self) -> Result<String, VigilError> {
        let run_id = self.queue.create_run()?;

        let mut tasks = Vec::new();
        for project in &self.config.projects {
            tasks.extend(self.queue.generate_tasks_for_project(project)?);
        }

        let generated_ids: Vec<String> = tasks.iter().map(|t| t.id.clone()).collect();
        let mut ordered = crate::prioritize::prioritize(
            self.config.priority_mode,
            tasks,
            self.config.token_budget,
        );
        self.queue.update_task_priorities(&mut ordered)?;

        // Tasks the budget excluded must never reach the dispatch loop.
        for id in &generated_ids {
            if !ordered.iter().any(|t| &t.id == id) {
                self.queue.mark_skipped(id, "Excluded by token budget")?;
            }
        }

        info!(
            run_id = %run_id,
            tasks = ordered.len(),
            mode = self.config.priority_mode.as_str(),
            estimated_tokens = crate::prioritize::estimate_total_tokens(&ordered),
            estimated_minutes = crate::prioritize::estimate_duration_minutes(&ordered),
            "Run prepared"
        );
        Ok(run_id)
    }

    /// Drive the run to completion and return the final report. Requires
    /// setup() first.
    pub async fn run(&mut self) -> Result<RunOutcome, VigilError> {
        let run_id = self
            .queue
            .current_run()
            .ok_or_else(|| VigilError::NoActiveRun("run() requires setup() first".into()))?
            .to_string();

        let started = Instant::now();
        let budget = Duration::from_secs(self.config.max_duration_secs());

        let stop_reason = loop {
            if self.cancel.is_cancelled() {
                info!(run_id = %run_id, "Stop requested, ending run");
                break StopReason::Cancelled;
            }
            if started.elapsed() >= budget {
                warn!(run_id = %run_id, "Duration budget exhausted");
                break StopReason::DurationExceeded;
            }

            let Some(task) = self.queue.get_next_pending_task(None)? else {
                info!(run_id = %run_id, "Queue drained");
                break StopReason::QueueDrained;
            };

            let available = self.failover.lock().unwrap().get_available_model();
            let Some(model) = available else {
                let remaining = budget.saturating_sub(started.elapsed());
                let wait = Duration::from_secs(
                    self.failover
                        .lock()
                        .unwrap()
                        .shortest_cooldown_secs()
                        .unwrap_or(self.config.quota_check_interval_secs as i64)
                        .min(self.config.quota_check_interval_secs as i64)
                        as u64,
                );
                if wait >= remaining {
                    warn!(run_id = %run_id, "All models cooling down past the remaining budget");
                    break StopReason::ModelsExhausted;
                }
                info!(wait_secs = wait.as_secs(), "All models cooling down, waiting");
                tokio::select! {
                    _ = self.cancel.cancelled() => break StopReason::Cancelled,
                    _ = tokio::time::sleep(wait) => {}
                }
                continue;
            };

            self.execute_task(&task, &model).await?;
        };

        self.queue.finalize_run(None)?;
        let report = self.build_report(&run_id)?;
        let findings: Vec<Finding> = report.all_findings().into_iter().cloned().collect();
        self.history.record_run(&run_id, &findings)?;

        info!(
            run_id = %run_id,
            completed = report.completed_tasks,
            failed = report.failed_tasks,
            findings = findings.len(),
            tokens = report.total_tokens,
            "Run finished"
        );
        Ok(RunOutcome {
            report,
            stop_reason,
        })
    }

    /// Execute one task end to end. Task-level failures are recorded on
    /// the task and do not abort the run; store failures propagate.
    async fn execute_task(&mut self, task: &Task, model: &ModelConfig) -> Result<(), VigilError> {
        let model_key = model.key();
        self.queue.mark_in_progress(&task.id, &model_key)?;
        info!(task = %task.id, kind = %task.kind, model = %model_key, "Executing task");

        let project = crate::config::ProjectConfig {
            name: task.project_name.clone(),
            path: task.project_path.clone(),
        };
        let mut request = AgentRequest::new(
            prompts::build_prompt(task.kind, &project),
            AgentRole::for_task(task.kind),
        );
        request.model = Some(model_key.clone());
        request.working_dir = Some(task.project_path.clone());

        let task_started = Instant::now();
        let (findings_count, tokens, success) = match self.agent.invoke(&request).await {
            Ok(response) => {
                let findings = parse_findings(&response.output);
                for finding in &findings {
                    self.queue.save_finding(&task.id, finding)?;
                }
                self.queue
                    .mark_completed(&task.id, TOKENS_PER_TASK, &response.output)?;
                info!(task = %task.id, findings = findings.len(), "Task completed");
                (findings.len(), TOKENS_PER_TASK, true)
            }
            Err(VigilError::RateLimit(message)) => {
                // The model goes on cooldown and the task is failed in
                // place; later tasks move on to the next model.
                self.failover
                    .lock()
                    .unwrap()
                    .mark_rate_limited(&model_key, None);
                self.queue
                    .mark_failed(&task.id, &format!("Rate limited: {}", message))?;
                warn!(task = %task.id, model = %model_key, "Task failed on rate limit");
                (0, 0, false)
            }
            Err(e) => {
                self.queue.mark_failed(&task.id, &e.to_string())?;
                error!(task = %task.id, error = %e, "Task failed");
                (0, 0, false)
            }
        };

        if let Err(e) = self.metrics.record_task_result(
            &model_key,
            task.kind,
            tokens,
            findings_count,
            task_started.elapsed().as_secs_f64(),
            success,
        ) {
            warn!(error = %e, "Failed to record model metrics");
        }
        Ok(())
    }

    fn build_report(&self, run_id: &str) -> Result<RunReport, VigilError> {
        let run = self.queue.get_run(run_id)?.ok_or_else(|| {
            VigilError::Database(format!("Run {} vanished during finalization", run_id))
        })?;

        let mut projects = Vec::with_capacity(self.config.projects.len());
        for project in &self.config.projects {
            projects.push(ProjectReport {
                name: project.name.clone(),
                path: project.path.clone(),
                findings: self
                    .queue
                    .get_findings_for_project(&project.name, Some(run_id))?,
            });
        }

        // Only meaningful with more than one project to compare.
        let cross_project_findings = if self.config.projects.len() > 1 {
            CrossProjectAnalyzer::new(&self.config.projects).analyze_shared_dependencies()
        } else {
            Vec::new()
        };

        Ok(RunReport {
            run_id: run.id,
            started_at: run.started_at,
            completed_at: run.completed_at,
            projects,
            total_tasks: run.total_tasks,
            completed_tasks: run.completed_tasks,
            failed_tasks: run.failed_tasks,
            total_tokens: run.total_tokens,
            models_used: run.models_used,
            cross_project_findings,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ParsedFinding {
    #[serde(default = "default_severity")]
    severity: String,
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    recommendation: Option<String>,
    #[serde(default)]
    references: Vec<String>,
}

fn default_severity() -> String {
    "info".to_string()
}

/// Parse the agent's findings array out of its output. Tolerates code
/// fences and surrounding prose; anything that still fails to parse is
/// preserved as a single info finding so no output is silently dropped.
pub fn parse_findings(raw: &str) -> Vec<Finding> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    if let Some(json) = extract_json_array(trimmed) {
        if let Ok(parsed) = serde_json::from_str::<Vec<ParsedFinding>>(json) {
            return parsed
                .into_iter()
                .map(|p| {
                    let mut finding = Finding::new(
                        Severity::parse(&p.severity.to_lowercase()).unwrap_or(Severity::Info),
                        p.title,
                        p.description,
                    );
                    finding.location = p.location.filter(|l| !l.is_empty());
                    finding.recommendation = p.recommendation.filter(|r| !r.is_empty());
                    finding.references = p.references;
                    finding
                })
                .collect();
        }
    }

    let mut preview: String = trimmed.chars().take(FALLBACK_OUTPUT_CHARS).collect();
    if trimmed.chars().count() > FALLBACK_OUTPUT_CHARS {
        preview.push_str("...");
    }
    let mut fallback = Finding::new(Severity::Info, "Unstructured agent output", preview);
    fallback
        .metadata
        .insert("parse_fallback".into(), serde_json::Value::Bool(true));
    vec![fallback]
}

/// Locate the outermost JSON array in possibly fenced or chatty output.
fn extract_json_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    (end > start).then(|| &text[start..=end])
}
