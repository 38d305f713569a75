//! Prompt assembly for each task kind. Every prompt asks for the same
//! JSON findings array so parsing stays uniform across kinds.

use crate::config::ProjectConfig;
use crate::models::TaskKind;

const OUTPUT_CONTRACT: &str = r#"Respond with ONLY a JSON array of findings. Each finding is an object:
{
  "severity": "critical" | "high" | "medium" | "low" | "info",
  "title": "short summary",
  "description": "what you found and why it matters",
  "location": "file path or component, omit if project-wide",
  "recommendation": "concrete next step",
  "references": ["optional supporting links"]
}
Return [] if nothing is worth reporting. No prose outside the array."#;

fn task_instructions(kind: TaskKind) -> &'static str {
    match kind {
        TaskKind::FileStructureAnalysis => {
            "Map the project layout. Flag misplaced modules, dead directories, \
             oversized files, and structure that fights the language's conventions."
        }
        TaskKind::DependencyAudit => {
            "Audit the declared dependencies. Flag unpinned versions, abandoned \
             packages, known-vulnerable releases, and dependencies that duplicate \
             each other."
        }
        TaskKind::CodePatternAnalysis => {
            "Look for recurring problem patterns: swallowed errors, copy-pasted \
             logic, unchecked input at boundaries, and concurrency hazards."
        }
        TaskKind::TechDebtScan => {
            "Find accumulated debt: TODO/FIXME clusters, deprecated API usage, \
             commented-out code, and modules everyone is afraid to touch."
        }
        TaskKind::SecurityReview => {
            "Review for security issues: injection points, hardcoded secrets, \
             missing auth checks, unsafe deserialization, and path traversal."
        }
        TaskKind::ArchitectureReview => {
            "Assess the architecture. Flag layering violations, god modules, \
             circular dependencies, and seams that would ease testing."
        }
        TaskKind::BestPracticesCheck => {
            "Compare the code against current best practices for its language \
             and frameworks. Flag idioms that have better modern replacements."
        }
        TaskKind::PerformanceAnalysis => {
            "Look for performance problems: accidental O(n^2) loops, repeated \
             IO in hot paths, missing caching, and oversized allocations."
        }
        TaskKind::DependencyUpdates => {
            "Research newer versions of this project's dependencies. Report \
             notable upgrades, breaking changes to plan for, and security fixes."
        }
        TaskKind::SotaAlternatives => {
            "Research state-of-the-art alternatives to the libraries and tools \
             this project uses. Report credible replacements with trade-offs."
        }
        TaskKind::IntegrationOpportunities => {
            "Research tools and services this project could integrate to reduce \
             custom code: linters, scanners, managed services, and automation."
        }
    }
}

pub fn build_prompt(kind: TaskKind, project: &ProjectConfig) -> String {
    format!(
        "You are auditing the project '{}' at {}.\n\nTask: {}\n\n{}",
        project.name,
        project.path.display(),
        task_instructions(kind),
        OUTPUT_CONTRACT
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_every_kind_has_a_prompt() {
        let project = ProjectConfig {
            name: "demo".into(),
            path: PathBuf::from("/tmp/demo"),
        };
        for kind in TaskKind::ALL {
            let prompt = build_prompt(kind, &project);
            assert!(prompt.contains("demo"));
            assert!(prompt.contains("JSON array"));
        }
    }
}
