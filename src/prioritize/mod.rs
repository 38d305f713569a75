//! Pure ordering policy for generated tasks. Each task kind carries a
//! static impact score; the active mode scales it by category, and an
//! optional token budget drops the tail that would not fit.

use serde::{Deserialize, Serialize};

use crate::models::{Task, TaskKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityMode {
    #[default]
    Balanced,
    SecurityFirst,
    ResearchHeavy,
    QuickScan,
}

impl PriorityMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriorityMode::Balanced => "balanced",
            PriorityMode::SecurityFirst => "security_first",
            PriorityMode::ResearchHeavy => "research_heavy",
            PriorityMode::QuickScan => "quick_scan",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "balanced" => Some(PriorityMode::Balanced),
            "security_first" => Some(PriorityMode::SecurityFirst),
            "research_heavy" => Some(PriorityMode::ResearchHeavy),
            "quick_scan" => Some(PriorityMode::QuickScan),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskCategory {
    Security,
    Dependencies,
    Architecture,
    Other,
}

pub fn category_of(kind: TaskKind) -> TaskCategory {
    match kind {
        TaskKind::SecurityReview => TaskCategory::Security,
        TaskKind::DependencyAudit | TaskKind::DependencyUpdates => TaskCategory::Dependencies,
        TaskKind::ArchitectureReview | TaskKind::CodePatternAnalysis => {
            TaskCategory::Architecture
        }
        TaskKind::TechDebtScan
        | TaskKind::BestPracticesCheck
        | TaskKind::PerformanceAnalysis
        | TaskKind::SotaAlternatives
        | TaskKind::FileStructureAnalysis
        | TaskKind::IntegrationOpportunities => TaskCategory::Other,
    }
}

/// Static impact score per kind, independent of mode.
pub fn impact_score(kind: TaskKind) -> f64 {
    match kind {
        TaskKind::SecurityReview => 100.0,
        TaskKind::DependencyAudit => 90.0,
        TaskKind::ArchitectureReview => 85.0,
        TaskKind::TechDebtScan => 75.0,
        TaskKind::CodePatternAnalysis => 70.0,
        TaskKind::PerformanceAnalysis => 65.0,
        TaskKind::BestPracticesCheck => 60.0,
        TaskKind::DependencyUpdates => 55.0,
        TaskKind::SotaAlternatives => 50.0,
        TaskKind::FileStructureAnalysis => 40.0,
        TaskKind::IntegrationOpportunities => 35.0,
    }
}

/// Rough per-task token spend, used for budget-constrained ordering.
pub fn estimated_token_cost(kind: TaskKind) -> i64 {
    match kind {
        TaskKind::SecurityReview => 15_000,
        TaskKind::ArchitectureReview => 12_000,
        TaskKind::CodePatternAnalysis => 10_000,
        TaskKind::DependencyAudit => 8_000,
        TaskKind::TechDebtScan => 8_000,
        TaskKind::PerformanceAnalysis => 8_000,
        TaskKind::BestPracticesCheck => 6_000,
        TaskKind::DependencyUpdates => 5_000,
        TaskKind::SotaAlternatives => 5_000,
        TaskKind::FileStructureAnalysis => 4_000,
        TaskKind::IntegrationOpportunities => 4_000,
    }
}

fn category_multiplier(mode: PriorityMode, category: TaskCategory) -> f64 {
    use TaskCategory::*;
    match mode {
        PriorityMode::Balanced => match category {
            Security => 1.2,
            Dependencies => 1.1,
            Architecture => 1.0,
            Other => 1.0,
        },
        PriorityMode::SecurityFirst => match category {
            Security => 2.0,
            Dependencies => 1.5,
            Architecture => 1.0,
            Other => 0.5,
        },
        PriorityMode::ResearchHeavy => match category {
            Security => 0.8,
            Dependencies => 1.0,
            Architecture => 1.0,
            Other => 1.5,
        },
        PriorityMode::QuickScan => match category {
            Security => 1.5,
            Dependencies => 1.2,
            Architecture => 0.5,
            Other => 0.3,
        },
    }
}

pub fn effective_score(mode: PriorityMode, kind: TaskKind) -> f64 {
    impact_score(kind) * category_multiplier(mode, category_of(kind))
}

/// Order tasks by descending effective score. When a token budget is
/// given, tasks are greedily selected in score order while their
/// estimated cost fits the remaining budget; tasks that do not fit are
/// dropped from the result entirely.
pub fn prioritize(mode: PriorityMode, mut tasks: Vec<Task>, token_budget: Option<i64>) -> Vec<Task> {
    tasks.sort_by(|a, b| {
        effective_score(mode, b.kind)
            .partial_cmp(&effective_score(mode, a.kind))
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });

    let Some(budget) = token_budget else {
        return tasks;
    };

    let mut remaining = budget;
    tasks.retain(|task| {
        let cost = estimated_token_cost(task.kind);
        if remaining >= cost {
            remaining -= cost;
            true
        } else {
            false
        }
    });
    tasks
}

/// Estimated total spend for a task list, for pre-run reporting.
pub fn estimate_total_tokens(tasks: &[Task]) -> i64 {
    tasks.iter().map(|t| estimated_token_cost(t.kind)).sum()
}

/// Rough wall-clock estimate for a task list, assuming roughly 2k tokens
/// of agent work per minute.
pub fn estimate_duration_minutes(tasks: &[Task]) -> f64 {
    estimate_total_tokens(tasks) as f64 / 2000.0
}
