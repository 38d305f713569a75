use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::finding::{Finding, Severity};

/// One identifier-scoped execution context. The store holds the full run
/// history; counters are finalized at the end of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub total_tasks: i64,
    pub completed_tasks: i64,
    pub failed_tasks: i64,
    pub total_tokens: i64,
    pub models_used: Vec<String>,
}

/// Per-project slice of a run report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectReport {
    pub name: String,
    pub path: PathBuf,
    pub findings: Vec<Finding>,
}

impl ProjectReport {
    pub fn count_by_severity(&self, severity: Severity) -> usize {
        self.findings.iter().filter(|f| f.severity == severity).count()
    }
}

/// Aggregate report returned at the end of a run loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub projects: Vec<ProjectReport>,
    pub total_tasks: i64,
    pub completed_tasks: i64,
    pub failed_tasks: i64,
    pub total_tokens: i64,
    pub models_used: Vec<String>,
    /// Findings from the cross-project dependency comparison; not tied
    /// to any task.
    #[serde(default)]
    pub cross_project_findings: Vec<Finding>,
}

impl RunReport {
    pub fn all_findings(&self) -> Vec<&Finding> {
        self.projects.iter().flat_map(|p| p.findings.iter()).collect()
    }

    pub fn duration_minutes(&self) -> f64 {
        match self.completed_at {
            Some(done) => (done - self.started_at).num_seconds() as f64 / 60.0,
            None => 0.0,
        }
    }

    pub fn count_by_severity(&self, severity: Severity) -> usize {
        self.all_findings().iter().filter(|f| f.severity == severity).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn report_with(findings: Vec<Finding>) -> RunReport {
        let started = Utc::now();
        RunReport {
            run_id: "run_test".into(),
            started_at: started,
            completed_at: Some(started + Duration::minutes(90)),
            projects: vec![ProjectReport {
                name: "demo".into(),
                path: PathBuf::from("/tmp/demo"),
                findings,
            }],
            total_tasks: 11,
            completed_tasks: 10,
            failed_tasks: 1,
            total_tokens: 11_000,
            models_used: vec!["openai/gpt-4o".into()],
            cross_project_findings: vec![],
        }
    }

    #[test]
    fn test_duration_minutes() {
        let report = report_with(Vec::new());
        assert!((report.duration_minutes() - 90.0).abs() < 0.1);
    }

    #[test]
    fn test_severity_counts_across_projects() {
        let findings = vec![
            Finding::new(Severity::Critical, "a", "d"),
            Finding::new(Severity::Critical, "b", "d"),
            Finding::new(Severity::Info, "c", "d"),
        ];
        let report = report_with(findings);
        assert_eq!(report.count_by_severity(Severity::Critical), 2);
        assert_eq!(report.count_by_severity(Severity::Info), 1);
        assert_eq!(report.all_findings().len(), 3);
    }
}
