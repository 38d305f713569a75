use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use tracing::debug;

use super::Database;
use crate::config::{ProjectConfig, TaskToggles};
use crate::errors::VigilError;
use crate::models::{Finding, Run, Severity, Task, TaskKind, TaskStatus};

/// Fixed task set generated per project: (kind, priority). Priorities are
/// stable across runs; disabled categories are skipped entirely.
const AUDIT_TASKS: [(TaskKind, i64); 5] = [
    (TaskKind::FileStructureAnalysis, 1),
    (TaskKind::DependencyAudit, 2),
    (TaskKind::CodePatternAnalysis, 3),
    (TaskKind::TechDebtScan, 4),
    (TaskKind::SecurityReview, 5),
];

const ENHANCEMENT_TASKS: [(TaskKind, i64); 3] = [
    (TaskKind::ArchitectureReview, 6),
    (TaskKind::BestPracticesCheck, 7),
    (TaskKind::PerformanceAnalysis, 8),
];

const RESEARCH_TASKS: [(TaskKind, i64); 3] = [
    (TaskKind::DependencyUpdates, 9),
    (TaskKind::SotaAlternatives, 10),
    (TaskKind::IntegrationOpportunities, 11),
];

/// Per-status task counts plus the token sum over completed tasks,
/// scoped to a single run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunStatistics {
    pub pending: i64,
    pub in_progress: i64,
    pub completed: i64,
    pub failed: i64,
    pub total_tokens: i64,
}

impl RunStatistics {
    pub fn total_tasks(&self) -> i64 {
        self.pending + self.in_progress + self.completed + self.failed
    }
}

/// Run-scoped durable task and finding store. The queue tracks a "current"
/// run context; read operations default to it and never fall back to
/// global (cross-run) state.
pub struct TaskQueue {
    db: Database,
    toggles: TaskToggles,
    current_run: Option<String>,
}

impl TaskQueue {
    pub fn new(db: Database, toggles: TaskToggles) -> Self {
        Self {
            db,
            toggles,
            current_run: None,
        }
    }

    pub fn current_run(&self) -> Option<&str> {
        self.current_run.as_deref()
    }

    fn scope<'a>(&'a self, run_id: Option<&'a str>) -> Option<&'a str> {
        run_id.or(self.current_run.as_deref())
    }

    /// Allocate a fresh run id, persist the run record, and make it the
    /// current run context.
    pub fn create_run(&mut self) -> Result<String, VigilError> {
        let now = Utc::now();
        let run_id = format!(
            "run_{}_{}",
            now.format("%Y%m%d_%H%M%S"),
            &uuid::Uuid::new_v4().simple().to_string()[..8]
        );

        let conn = self.db.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO runs (id, started_at) VALUES (?1, ?2)",
            rusqlite::params![run_id, now.to_rfc3339()],
        )
        .map_err(|e| VigilError::Database(format!("Failed to create run: {}", e)))?;
        drop(conn);

        debug!(run_id = %run_id, "Created run");
        self.current_run = Some(run_id.clone());
        Ok(run_id)
    }

    /// Generate and persist the fixed task set for one project, tagged with
    /// the current run. Calling this without an active run is a programming
    /// error and fails loudly.
    pub fn generate_tasks_for_project(
        &self,
        project: &ProjectConfig,
    ) -> Result<Vec<Task>, VigilError> {
        let run_id = self.current_run.as_deref().ok_or_else(|| {
            VigilError::NoActiveRun(
                "generate_tasks_for_project requires create_run first".into(),
            )
        })?;

        let mut kinds: Vec<(TaskKind, i64)> = Vec::new();
        if self.toggles.codebase_audit {
            kinds.extend(AUDIT_TASKS);
        }
        if self.toggles.enhancement_recommendations {
            kinds.extend(ENHANCEMENT_TASKS);
        }
        if self.toggles.tool_stack_research {
            kinds.extend(RESEARCH_TASKS);
        }

        let now = Utc::now();
        let mut tasks = Vec::with_capacity(kinds.len());
        let conn = self.db.conn.lock().unwrap();
        for (kind, priority) in kinds {
            let task = Task {
                id: format!(
                    "{}_{}_{}",
                    project.name,
                    kind.as_str(),
                    &uuid::Uuid::new_v4().simple().to_string()[..8]
                ),
                run_id: run_id.to_string(),
                kind,
                project_name: project.name.clone(),
                project_path: project.path.clone(),
                status: TaskStatus::Pending,
                priority,
                started_at: None,
                completed_at: None,
                model_used: None,
                tokens_used: 0,
                raw_output: None,
                error: None,
            };

            conn.execute(
                "INSERT INTO tasks (id, run_id, task_type, project_name, project_path, status, priority, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    task.id,
                    task.run_id,
                    task.kind.as_str(),
                    task.project_name,
                    task.project_path.to_string_lossy(),
                    task.status.as_str(),
                    task.priority,
                    now.to_rfc3339(),
                ],
            )
            .map_err(|e| VigilError::Database(format!("Failed to insert task: {}", e)))?;

            tasks.push(task);
        }

        debug!(run_id = %run_id, project = %project.name, count = tasks.len(), "Generated tasks");
        Ok(tasks)
    }

    /// Return the lowest-priority-value pending task in the given run
    /// (default: current run). Pending tasks from other runs are never
    /// returned implicitly.
    pub fn get_next_pending_task(&self, run_id: Option<&str>) -> Result<Option<Task>, VigilError> {
        let Some(scope) = self.scope(run_id) else {
            return Ok(None);
        };

        let conn = self.db.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT id, run_id, task_type, project_name, project_path, status, priority,
                        started_at, completed_at, model_used, tokens_used, raw_output, error
                 FROM tasks
                 WHERE run_id = ?1 AND status = 'pending'
                 ORDER BY priority ASC, created_at ASC, id ASC
                 LIMIT 1",
            )
            .map_err(|e| VigilError::Database(format!("Query failed: {}", e)))?;

        let result = stmt.query_row(rusqlite::params![scope], row_to_task);
        match result {
            Ok(task) => Ok(Some(task)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(VigilError::Database(format!("Query error: {}", e))),
        }
    }

    pub fn get_task(&self, task_id: &str) -> Result<Option<Task>, VigilError> {
        let conn = self.db.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT id, run_id, task_type, project_name, project_path, status, priority,
                        started_at, completed_at, model_used, tokens_used, raw_output, error
                 FROM tasks WHERE id = ?1",
            )
            .map_err(|e| VigilError::Database(format!("Query failed: {}", e)))?;

        match stmt.query_row(rusqlite::params![task_id], row_to_task) {
            Ok(task) => Ok(Some(task)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(VigilError::Database(format!("Query error: {}", e))),
        }
    }

    /// Transition a pending task to in_progress, recording the model key.
    /// Atomic single write; fails if the task is not pending (status
    /// transitions are monotonic).
    pub fn mark_in_progress(&self, task_id: &str, model_key: &str) -> Result<(), VigilError> {
        let conn = self.db.conn.lock().unwrap();
        let affected = conn
            .execute(
                "UPDATE tasks SET status = 'in_progress', started_at = ?2, model_used = ?3
                 WHERE id = ?1 AND status = 'pending'",
                rusqlite::params![task_id, Utc::now().to_rfc3339(), model_key],
            )
            .map_err(|e| VigilError::Database(format!("Update failed: {}", e)))?;
        if affected == 0 {
            return Err(VigilError::Database(format!(
                "Task {} is not pending",
                task_id
            )));
        }
        Ok(())
    }

    pub fn mark_completed(
        &self,
        task_id: &str,
        tokens_used: i64,
        raw_output: &str,
    ) -> Result<(), VigilError> {
        let conn = self.db.conn.lock().unwrap();
        let affected = conn
            .execute(
                "UPDATE tasks SET status = 'completed', completed_at = ?2, tokens_used = ?3, raw_output = ?4
                 WHERE id = ?1 AND status = 'in_progress'",
                rusqlite::params![task_id, Utc::now().to_rfc3339(), tokens_used, raw_output],
            )
            .map_err(|e| VigilError::Database(format!("Update failed: {}", e)))?;
        if affected == 0 {
            return Err(VigilError::Database(format!(
                "Task {} is not in progress",
                task_id
            )));
        }
        Ok(())
    }

    /// Fail a task that will never execute, straight from pending. Used
    /// when the token budget excludes a task before dispatch.
    pub fn mark_skipped(&self, task_id: &str, reason: &str) -> Result<(), VigilError> {
        let conn = self.db.conn.lock().unwrap();
        let affected = conn
            .execute(
                "UPDATE tasks SET status = 'failed', completed_at = ?2, error = ?3
                 WHERE id = ?1 AND status = 'pending'",
                rusqlite::params![task_id, Utc::now().to_rfc3339(), reason],
            )
            .map_err(|e| VigilError::Database(format!("Update failed: {}", e)))?;
        if affected == 0 {
            return Err(VigilError::Database(format!(
                "Task {} is not pending",
                task_id
            )));
        }
        Ok(())
    }

    pub fn mark_failed(&self, task_id: &str, error: &str) -> Result<(), VigilError> {
        let conn = self.db.conn.lock().unwrap();
        let affected = conn
            .execute(
                "UPDATE tasks SET status = 'failed', completed_at = ?2, error = ?3
                 WHERE id = ?1 AND status = 'in_progress'",
                rusqlite::params![task_id, Utc::now().to_rfc3339(), error],
            )
            .map_err(|e| VigilError::Database(format!("Update failed: {}", e)))?;
        if affected == 0 {
            return Err(VigilError::Database(format!(
                "Task {} is not in progress",
                task_id
            )));
        }
        Ok(())
    }

    /// Per-status counts and completed-token sum for the given run
    /// (default: current run). Returns zeros when no run is in scope.
    pub fn get_statistics(&self, run_id: Option<&str>) -> Result<RunStatistics, VigilError> {
        let Some(scope) = self.scope(run_id) else {
            return Ok(RunStatistics::default());
        };

        let conn = self.db.conn.lock().unwrap();
        let mut stats = RunStatistics::default();
        for status in TaskStatus::ALL {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM tasks WHERE run_id = ?1 AND status = ?2",
                    rusqlite::params![scope, status.as_str()],
                    |row| row.get(0),
                )
                .map_err(|e| VigilError::Database(format!("Query error: {}", e)))?;
            match status {
                TaskStatus::Pending => stats.pending = count,
                TaskStatus::InProgress => stats.in_progress = count,
                TaskStatus::Completed => stats.completed = count,
                TaskStatus::Failed => stats.failed = count,
            }
        }

        stats.total_tokens = conn
            .query_row(
                "SELECT COALESCE(SUM(tokens_used), 0) FROM tasks
                 WHERE run_id = ?1 AND status = 'completed'",
                rusqlite::params![scope],
                |row| row.get(0),
            )
            .map_err(|e| VigilError::Database(format!("Query error: {}", e)))?;

        Ok(stats)
    }

    pub fn save_finding(&self, task_id: &str, finding: &Finding) -> Result<(), VigilError> {
        let conn = self.db.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO findings (id, task_id, severity, title, description, location, recommendation, references_json, metadata_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            rusqlite::params![
                finding.id,
                task_id,
                finding.severity.as_str(),
                finding.title,
                finding.description,
                finding.location,
                finding.recommendation,
                serde_json::to_string(&finding.references)?,
                serde_json::to_string(&finding.metadata)?,
            ],
        )
        .map_err(|e| VigilError::Database(format!("Failed to insert finding: {}", e)))?;
        Ok(())
    }

    pub fn get_all_findings(&self, run_id: Option<&str>) -> Result<Vec<Finding>, VigilError> {
        let Some(scope) = self.scope(run_id) else {
            return Ok(Vec::new());
        };

        let conn = self.db.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT f.id, f.severity, f.title, f.description, f.location, f.recommendation,
                        f.references_json, f.metadata_json
                 FROM findings f JOIN tasks t ON f.task_id = t.id
                 WHERE t.run_id = ?1",
            )
            .map_err(|e| VigilError::Database(format!("Query failed: {}", e)))?;

        let rows = stmt
            .query_map(rusqlite::params![scope], row_to_finding)
            .map_err(|e| VigilError::Database(format!("Query error: {}", e)))?;

        collect_findings(rows)
    }

    pub fn get_findings_for_project(
        &self,
        project_name: &str,
        run_id: Option<&str>,
    ) -> Result<Vec<Finding>, VigilError> {
        let Some(scope) = self.scope(run_id) else {
            return Ok(Vec::new());
        };

        let conn = self.db.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT f.id, f.severity, f.title, f.description, f.location, f.recommendation,
                        f.references_json, f.metadata_json
                 FROM findings f JOIN tasks t ON f.task_id = t.id
                 WHERE t.run_id = ?1 AND t.project_name = ?2",
            )
            .map_err(|e| VigilError::Database(format!("Query failed: {}", e)))?;

        let rows = stmt
            .query_map(rusqlite::params![scope, project_name], row_to_finding)
            .map_err(|e| VigilError::Database(format!("Query error: {}", e)))?;

        collect_findings(rows)
    }

    /// Compute final statistics and the model list for a run and write them
    /// into the run record. Idempotent: the completion timestamp is only
    /// set once, counters are recomputed from task rows each time.
    pub fn finalize_run(&self, run_id: Option<&str>) -> Result<(), VigilError> {
        let Some(scope) = self.scope(run_id).map(str::to_string) else {
            return Ok(());
        };

        let stats = self.get_statistics(Some(&scope))?;

        let conn = self.db.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT DISTINCT model_used FROM tasks
                 WHERE run_id = ?1 AND model_used IS NOT NULL
                 ORDER BY model_used",
            )
            .map_err(|e| VigilError::Database(format!("Query failed: {}", e)))?;
        let models: Vec<String> = stmt
            .query_map(rusqlite::params![scope], |row| row.get(0))
            .map_err(|e| VigilError::Database(format!("Query error: {}", e)))?
            .collect::<Result<_, _>>()
            .map_err(|e| VigilError::Database(format!("Row error: {}", e)))?;

        conn.execute(
            "UPDATE runs SET
                completed_at = COALESCE(completed_at, ?2),
                total_tasks = ?3,
                completed_tasks = ?4,
                failed_tasks = ?5,
                total_tokens = ?6,
                models_used = ?7
             WHERE id = ?1",
            rusqlite::params![
                scope,
                Utc::now().to_rfc3339(),
                stats.total_tasks(),
                stats.completed,
                stats.failed,
                stats.total_tokens,
                serde_json::to_string(&models)?,
            ],
        )
        .map_err(|e| VigilError::Database(format!("Failed to finalize run: {}", e)))?;
        Ok(())
    }

    /// Rewrite task priorities to match the caller-supplied ordering and
    /// update the in-memory tasks to match. Used by the prioritization
    /// policy after task generation.
    pub fn update_task_priorities(&self, ordered: &mut [Task]) -> Result<(), VigilError> {
        let mut conn = self.db.conn.lock().unwrap();
        let tx = conn
            .transaction()
            .map_err(|e| VigilError::Database(format!("Transaction failed: {}", e)))?;
        for (index, task) in ordered.iter_mut().enumerate() {
            let priority = (index + 1) as i64;
            tx.execute(
                "UPDATE tasks SET priority = ?2 WHERE id = ?1",
                rusqlite::params![task.id, priority],
            )
            .map_err(|e| VigilError::Database(format!("Update failed: {}", e)))?;
            task.priority = priority;
        }
        tx.commit()
            .map_err(|e| VigilError::Database(format!("Commit failed: {}", e)))?;
        Ok(())
    }

    pub fn get_run(&self, run_id: &str) -> Result<Option<Run>, VigilError> {
        let conn = self.db.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT id, started_at, completed_at, total_tasks, completed_tasks,
                        failed_tasks, total_tokens, models_used
                 FROM runs WHERE id = ?1",
            )
            .map_err(|e| VigilError::Database(format!("Query failed: {}", e)))?;

        match stmt.query_row(rusqlite::params![run_id], row_to_run) {
            Ok(run) => Ok(Some(run)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(VigilError::Database(format!("Query error: {}", e))),
        }
    }

    pub fn list_runs(&self, limit: usize) -> Result<Vec<Run>, VigilError> {
        let conn = self.db.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT id, started_at, completed_at, total_tasks, completed_tasks,
                        failed_tasks, total_tokens, models_used
                 FROM runs ORDER BY started_at DESC LIMIT ?1",
            )
            .map_err(|e| VigilError::Database(format!("Query failed: {}", e)))?;

        let rows = stmt
            .query_map(rusqlite::params![limit as i64], row_to_run)
            .map_err(|e| VigilError::Database(format!("Query error: {}", e)))?;

        let mut runs = Vec::new();
        for row in rows {
            runs.push(row.map_err(|e| VigilError::Database(format!("Row error: {}", e)))?);
        }
        Ok(runs)
    }

    /// Most recently started run id, for status display outside a live
    /// runner context.
    pub fn latest_run_id(&self) -> Result<Option<String>, VigilError> {
        let conn = self.db.conn.lock().unwrap();
        let result = conn.query_row(
            "SELECT id FROM runs ORDER BY started_at DESC LIMIT 1",
            [],
            |row| row.get::<_, String>(0),
        );
        match result {
            Ok(id) => Ok(Some(id)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(VigilError::Database(format!("Query error: {}", e))),
        }
    }
}

fn parse_timestamp(value: Option<String>) -> Option<DateTime<Utc>> {
    value
        .as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn row_to_task(row: &rusqlite::Row) -> Result<Task, rusqlite::Error> {
    let kind_str: String = row.get(2)?;
    let status_str: String = row.get(5)?;
    let path_str: String = row.get(4)?;

    Ok(Task {
        id: row.get(0)?,
        run_id: row.get(1)?,
        kind: TaskKind::parse(&kind_str).unwrap_or(TaskKind::FileStructureAnalysis),
        project_name: row.get(3)?,
        project_path: PathBuf::from(path_str),
        status: TaskStatus::parse(&status_str).unwrap_or(TaskStatus::Pending),
        priority: row.get(6)?,
        started_at: parse_timestamp(row.get(7)?),
        completed_at: parse_timestamp(row.get(8)?),
        model_used: row.get(9)?,
        tokens_used: row.get::<_, Option<i64>>(10)?.unwrap_or(0),
        raw_output: row.get(11)?,
        error: row.get(12)?,
    })
}

fn row_to_finding(row: &rusqlite::Row) -> Result<Finding, rusqlite::Error> {
    let severity_str: String = row.get(1)?;
    let references_json: Option<String> = row.get(6)?;
    let metadata_json: Option<String> = row.get(7)?;

    Ok(Finding {
        id: row.get(0)?,
        severity: Severity::parse(&severity_str).unwrap_or(Severity::Info),
        title: row.get(2)?,
        description: row.get(3)?,
        location: row.get(4)?,
        recommendation: row.get(5)?,
        references: references_json
            .and_then(|j| serde_json::from_str(&j).ok())
            .unwrap_or_default(),
        metadata: metadata_json
            .and_then(|j| serde_json::from_str(&j).ok())
            .unwrap_or_default(),
    })
}

fn row_to_run(row: &rusqlite::Row) -> Result<Run, rusqlite::Error> {
    let models_json: Option<String> = row.get(7)?;
    Ok(Run {
        id: row.get(0)?,
        started_at: parse_timestamp(row.get(1)?).unwrap_or_else(Utc::now),
        completed_at: parse_timestamp(row.get(2)?),
        total_tasks: row.get::<_, Option<i64>>(3)?.unwrap_or(0),
        completed_tasks: row.get::<_, Option<i64>>(4)?.unwrap_or(0),
        failed_tasks: row.get::<_, Option<i64>>(5)?.unwrap_or(0),
        total_tokens: row.get::<_, Option<i64>>(6)?.unwrap_or(0),
        models_used: models_json
            .and_then(|j| serde_json::from_str(&j).ok())
            .unwrap_or_default(),
    })
}

fn collect_findings<F>(rows: rusqlite::MappedRows<'_, F>) -> Result<Vec<Finding>, VigilError>
where
    F: FnMut(&rusqlite::Row<'_>) -> Result<Finding, rusqlite::Error>,
{
    let mut findings = Vec::new();
    for row in rows {
        findings.push(row.map_err(|e| VigilError::Database(format!("Row error: {}", e)))?);
    }
    Ok(findings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn test_queue() -> TaskQueue {
        TaskQueue::new(Database::in_memory().unwrap(), TaskToggles::default())
    }

    fn demo_project() -> ProjectConfig {
        ProjectConfig {
            name: "demo".into(),
            path: PathBuf::from("/tmp/demo"),
        }
    }

    #[test]
    fn test_generate_tasks_requires_active_run() {
        let queue = test_queue();
        let result = queue.generate_tasks_for_project(&demo_project());
        assert!(matches!(result, Err(VigilError::NoActiveRun(_))));
    }

    #[test]
    fn test_generate_tasks_all_categories() {
        let mut queue = test_queue();
        queue.create_run().unwrap();
        let tasks = queue.generate_tasks_for_project(&demo_project()).unwrap();

        assert_eq!(tasks.len(), 11);
        let priorities: Vec<i64> = tasks.iter().map(|t| t.priority).collect();
        assert_eq!(priorities, (1..=11).collect::<Vec<i64>>());
        assert_eq!(tasks[0].kind, TaskKind::FileStructureAnalysis);
        assert_eq!(tasks[4].kind, TaskKind::SecurityReview);
        assert_eq!(tasks[10].kind, TaskKind::IntegrationOpportunities);
    }

    #[test]
    fn test_disabled_categories_are_skipped_entirely() {
        let toggles = TaskToggles {
            codebase_audit: true,
            enhancement_recommendations: false,
            tool_stack_research: false,
        };
        let mut queue = TaskQueue::new(Database::in_memory().unwrap(), toggles);
        queue.create_run().unwrap();
        let tasks = queue.generate_tasks_for_project(&demo_project()).unwrap();

        assert_eq!(tasks.len(), 5);
        assert!(tasks.iter().all(|t| t.priority <= 5));
    }

    #[test]
    fn test_mark_skipped_moves_pending_to_failed() {
        let mut queue = test_queue();
        queue.create_run().unwrap();
        let tasks = queue.generate_tasks_for_project(&demo_project()).unwrap();

        queue
            .mark_skipped(&tasks[0].id, "Excluded by token budget")
            .unwrap();
        let task = queue.get_task(&tasks[0].id).unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.error.as_deref(), Some("Excluded by token budget"));
        assert!(task.completed_at.is_some());

        // Terminal tasks stay terminal.
        assert!(queue.mark_skipped(&tasks[0].id, "again").is_err());
    }

    #[test]
    fn test_next_pending_orders_by_priority() {
        let mut queue = test_queue();
        queue.create_run().unwrap();
        queue.generate_tasks_for_project(&demo_project()).unwrap();

        let first = queue.get_next_pending_task(None).unwrap().unwrap();
        assert_eq!(first.kind, TaskKind::FileStructureAnalysis);
        assert_eq!(first.priority, 1);

        queue.mark_in_progress(&first.id, "openai/gpt-4o").unwrap();
        let second = queue.get_next_pending_task(None).unwrap().unwrap();
        assert_eq!(second.priority, 2);
    }

    #[test]
    fn test_run_scope_isolation() {
        let mut queue = test_queue();
        let project = demo_project();

        let run1 = queue.create_run().unwrap();
        queue.generate_tasks_for_project(&project).unwrap();
        let task = queue.get_next_pending_task(Some(&run1)).unwrap().unwrap();
        queue.mark_in_progress(&task.id, "openai/gpt-4o").unwrap();
        queue.mark_completed(&task.id, 10, "[]").unwrap();

        let run2 = queue.create_run().unwrap();
        queue.generate_tasks_for_project(&project).unwrap();

        // Current run context is run2: counters and the pending queue must
        // not leak from run1.
        let stats = queue.get_statistics(None).unwrap();
        assert_eq!(stats.pending, 11);
        assert_eq!(stats.completed, 0);

        let run1_stats = queue.get_statistics(Some(&run1)).unwrap();
        assert_eq!(run1_stats.completed, 1);
        assert_eq!(run1_stats.total_tokens, 10);

        let next = queue.get_next_pending_task(None).unwrap().unwrap();
        assert_eq!(next.run_id, run2);
    }

    #[test]
    fn test_no_scope_reads_return_empty() {
        let queue = test_queue();
        assert!(queue.get_next_pending_task(None).unwrap().is_none());
        assert_eq!(queue.get_statistics(None).unwrap().total_tasks(), 0);
        assert!(queue.get_all_findings(None).unwrap().is_empty());
    }

    #[test]
    fn test_completed_task_round_trip() {
        let mut queue = test_queue();
        queue.create_run().unwrap();
        queue.generate_tasks_for_project(&demo_project()).unwrap();

        let task = queue.get_next_pending_task(None).unwrap().unwrap();
        queue.mark_in_progress(&task.id, "anthropic/claude-sonnet-4-5").unwrap();
        queue.mark_completed(&task.id, 1234, "raw agent output").unwrap();

        let reloaded = queue.get_task(&task.id).unwrap().unwrap();
        assert_eq!(reloaded.status, TaskStatus::Completed);
        assert_eq!(reloaded.tokens_used, 1234);
        assert_eq!(reloaded.raw_output.as_deref(), Some("raw agent output"));
        assert_eq!(reloaded.model_used.as_deref(), Some("anthropic/claude-sonnet-4-5"));
        assert!(reloaded.started_at.is_some());
        assert!(reloaded.completed_at.is_some());
    }

    #[test]
    fn test_status_transitions_are_monotonic() {
        let mut queue = test_queue();
        queue.create_run().unwrap();
        queue.generate_tasks_for_project(&demo_project()).unwrap();

        let task = queue.get_next_pending_task(None).unwrap().unwrap();
        queue.mark_in_progress(&task.id, "openai/gpt-4o").unwrap();
        queue.mark_completed(&task.id, 10, "[]").unwrap();

        // A completed task is never reopened.
        assert!(queue.mark_in_progress(&task.id, "openai/gpt-4o").is_err());
        assert!(queue.mark_failed(&task.id, "late failure").is_err());
    }

    #[test]
    fn test_findings_join_by_run_and_project() {
        let mut queue = test_queue();
        let project = demo_project();

        queue.create_run().unwrap();
        let tasks = queue.generate_tasks_for_project(&project).unwrap();
        let mut finding = Finding::new(Severity::High, "Unpinned dependency", "No version pin");
        finding.location = Some("Cargo.toml".into());
        queue.save_finding(&tasks[0].id, &finding).unwrap();

        let all = queue.get_all_findings(None).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].severity, Severity::High);
        assert_eq!(all[0].location.as_deref(), Some("Cargo.toml"));

        let by_project = queue.get_findings_for_project("demo", None).unwrap();
        assert_eq!(by_project.len(), 1);
        assert!(queue.get_findings_for_project("other", None).unwrap().is_empty());
    }

    #[test]
    fn test_finalize_run_is_idempotent() {
        let mut queue = test_queue();
        let run_id = queue.create_run().unwrap();
        queue.generate_tasks_for_project(&demo_project()).unwrap();

        let task = queue.get_next_pending_task(None).unwrap().unwrap();
        queue.mark_in_progress(&task.id, "openai/gpt-4o").unwrap();
        queue.mark_completed(&task.id, 500, "[]").unwrap();

        queue.finalize_run(None).unwrap();
        let first = queue.get_run(&run_id).unwrap().unwrap();
        assert_eq!(first.completed_tasks, 1);
        assert_eq!(first.total_tokens, 500);
        assert_eq!(first.models_used, vec!["openai/gpt-4o".to_string()]);
        let completed_at = first.completed_at.unwrap();

        queue.finalize_run(None).unwrap();
        let second = queue.get_run(&run_id).unwrap().unwrap();
        assert_eq!(second.completed_at.unwrap(), completed_at);
    }

    #[test]
    fn test_update_task_priorities_rewrites_order() {
        let mut queue = test_queue();
        queue.create_run().unwrap();
        let mut tasks = queue.generate_tasks_for_project(&demo_project()).unwrap();

        tasks.reverse();
        queue.update_task_priorities(&mut tasks).unwrap();

        assert_eq!(tasks[0].priority, 1);
        assert_eq!(tasks[0].kind, TaskKind::IntegrationOpportunities);

        let next = queue.get_next_pending_task(None).unwrap().unwrap();
        assert_eq!(next.kind, TaskKind::IntegrationOpportunities);
    }

    #[test]
    fn test_latest_run_id_and_listing() {
        let mut queue = test_queue();
        assert!(queue.latest_run_id().unwrap().is_none());

        let _run1 = queue.create_run().unwrap();
        let run2 = queue.create_run().unwrap();

        // Same-second timestamps sort ambiguously; listing still returns both.
        assert_eq!(queue.list_runs(10).unwrap().len(), 2);
        assert!(queue.latest_run_id().unwrap().is_some());
        assert_eq!(queue.current_run(), Some(run2.as_str()));
    }
}
