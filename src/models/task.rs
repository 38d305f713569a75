use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Status of an audit task. Transitions are monotonic: a task moves
/// `Pending -> InProgress -> {Completed | Failed}` and is never reopened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 4] = [
        TaskStatus::Pending,
        TaskStatus::InProgress,
        TaskStatus::Completed,
        TaskStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The fixed set of analysis task kinds, grouped into three categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    // Codebase audit
    FileStructureAnalysis,
    DependencyAudit,
    CodePatternAnalysis,
    TechDebtScan,
    SecurityReview,

    // Enhancement recommendations
    ArchitectureReview,
    BestPracticesCheck,
    PerformanceAnalysis,

    // Tool-stack research
    DependencyUpdates,
    SotaAlternatives,
    IntegrationOpportunities,
}

impl TaskKind {
    pub const ALL: [TaskKind; 11] = [
        TaskKind::FileStructureAnalysis,
        TaskKind::DependencyAudit,
        TaskKind::CodePatternAnalysis,
        TaskKind::TechDebtScan,
        TaskKind::SecurityReview,
        TaskKind::ArchitectureReview,
        TaskKind::BestPracticesCheck,
        TaskKind::PerformanceAnalysis,
        TaskKind::DependencyUpdates,
        TaskKind::SotaAlternatives,
        TaskKind::IntegrationOpportunities,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FileStructureAnalysis => "file_structure_analysis",
            Self::DependencyAudit => "dependency_audit",
            Self::CodePatternAnalysis => "code_pattern_analysis",
            Self::TechDebtScan => "tech_debt_scan",
            Self::SecurityReview => "security_review",
            Self::ArchitectureReview => "architecture_review",
            Self::BestPracticesCheck => "best_practices_check",
            Self::PerformanceAnalysis => "performance_analysis",
            Self::DependencyUpdates => "dependency_updates",
            Self::SotaAlternatives => "sota_alternatives",
            Self::IntegrationOpportunities => "integration_opportunities",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "file_structure_analysis" => Some(Self::FileStructureAnalysis),
            "dependency_audit" => Some(Self::DependencyAudit),
            "code_pattern_analysis" => Some(Self::CodePatternAnalysis),
            "tech_debt_scan" => Some(Self::TechDebtScan),
            "security_review" => Some(Self::SecurityReview),
            "architecture_review" => Some(Self::ArchitectureReview),
            "best_practices_check" => Some(Self::BestPracticesCheck),
            "performance_analysis" => Some(Self::PerformanceAnalysis),
            "dependency_updates" => Some(Self::DependencyUpdates),
            "sota_alternatives" => Some(Self::SotaAlternatives),
            "integration_opportunities" => Some(Self::IntegrationOpportunities),
            _ => None,
        }
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single unit of analysis work against one project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub run_id: String,
    pub kind: TaskKind,
    pub project_name: String,
    pub project_path: PathBuf,
    pub status: TaskStatus,
    /// Lower values are dequeued first.
    pub priority: i64,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub model_used: Option<String>,
    pub tokens_used: i64,
    pub raw_output: Option<String>,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_status_roundtrip() {
        for status in TaskStatus::ALL {
            assert_eq!(TaskStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(TaskStatus::parse("reopened"), None);
    }

    #[test]
    fn test_task_kind_serde_matches_as_str() {
        let json = serde_json::to_string(&TaskKind::SecurityReview).unwrap();
        assert_eq!(json, "\"security_review\"");
        let parsed: TaskKind = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, TaskKind::SecurityReview);
    }

    #[test]
    fn test_task_kind_parse_unknown() {
        assert_eq!(TaskKind::parse("crystal_ball_reading"), None);
    }
}
