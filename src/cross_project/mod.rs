//! Analysis that spans configured projects instead of running as a
//! queued task. Dependencies declared by more than one project with
//! mismatched version requirements become report findings.

use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

use crate::config::ProjectConfig;
use crate::models::{Finding, Severity};

/// One declared dependency, as read from a project manifest.
#[derive(Debug, Clone)]
pub struct DependencyInfo {
    pub name: String,
    pub version: String,
    pub project: String,
}

pub struct CrossProjectAnalyzer<'a> {
    projects: &'a [ProjectConfig],
}

impl<'a> CrossProjectAnalyzer<'a> {
    pub fn new(projects: &'a [ProjectConfig]) -> Self {
        Self { projects }
    }

    /// Flag dependencies shared by two or more projects under different
    /// version requirements. Unreadable manifests are skipped, not
    /// errors; a missing manifest just contributes nothing.
    pub fn analyze_shared_dependencies(&self) -> Vec<Finding> {
        let mut by_name: BTreeMap<String, Vec<DependencyInfo>> = BTreeMap::new();
        for project in self.projects {
            for dep in extract_dependencies(project) {
                by_name.entry(dep.name.to_lowercase()).or_default().push(dep);
            }
        }

        let mut findings = Vec::new();
        for (name, instances) in by_name {
            if instances.len() < 2 {
                continue;
            }
            let mut versions: Vec<&str> =
                instances.iter().map(|d| d.version.as_str()).collect();
            versions.sort_unstable();
            versions.dedup();
            if versions.len() < 2 {
                continue;
            }

            let projects = instances
                .iter()
                .map(|d| d.project.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            let detail = instances
                .iter()
                .map(|d| format!("{}: {}", d.project, d.version))
                .collect::<Vec<_>>()
                .join(", ");

            let mut finding = Finding::new(
                Severity::Medium,
                format!("Version mismatch: {}", name),
                format!(
                    "Dependency '{}' has different versions across projects: {}",
                    name, detail
                ),
            );
            finding.id = format!("dep_conflict_{}", name);
            finding.location = Some(projects);
            finding.recommendation = Some(format!(
                "Align {} versions across projects to avoid compatibility issues",
                name
            ));
            findings.push(finding);
        }
        findings
    }
}

fn extract_dependencies(project: &ProjectConfig) -> Vec<DependencyInfo> {
    let mut deps = Vec::new();
    if let Ok(content) = std::fs::read_to_string(project.path.join("Cargo.toml")) {
        deps.extend(parse_cargo_toml(&content, &project.name));
    }
    if let Ok(content) = std::fs::read_to_string(project.path.join("package.json")) {
        deps.extend(parse_package_json(&content, &project.name));
    }
    if let Ok(content) = std::fs::read_to_string(project.path.join("requirements.txt")) {
        deps.extend(parse_requirements(&content, &project.name));
    }
    debug!(project = %project.name, count = deps.len(), "Extracted dependencies");
    deps
}

fn parse_cargo_toml(content: &str, project: &str) -> Vec<DependencyInfo> {
    let mut deps = Vec::new();
    let mut in_deps = false;
    for line in content.lines() {
        let line = line.trim();
        if line.starts_with('[') {
            in_deps = matches!(
                line,
                "[dependencies]" | "[dev-dependencies]" | "[build-dependencies]"
            );
            continue;
        }
        if !in_deps || line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((name, rest)) = line.split_once('=') else {
            continue;
        };
        let name = name.trim();
        if name.is_empty() || !is_dependency_name(name) {
            continue;
        }
        deps.push(DependencyInfo {
            name: name.to_string(),
            version: cargo_version(rest).unwrap_or("any").to_string(),
            project: project.to_string(),
        });
    }
    deps
}

fn is_dependency_name(name: &str) -> bool {
    name.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Version requirement from the right-hand side of a Cargo dependency
/// line, handling both `"1.0"` and `{ version = "1.0", ... }` forms.
fn cargo_version(rest: &str) -> Option<&str> {
    let rest = rest.trim();
    if rest.starts_with('{') {
        let idx = rest.find("version")?;
        first_quoted(&rest[idx..])
    } else {
        first_quoted(rest)
    }
}

fn first_quoted(text: &str) -> Option<&str> {
    let start = text.find('"')? + 1;
    let len = text[start..].find('"')?;
    Some(&text[start..start + len])
}

fn parse_package_json(content: &str, project: &str) -> Vec<DependencyInfo> {
    let Ok(value) = serde_json::from_str::<Value>(content) else {
        return Vec::new();
    };
    let mut deps = Vec::new();
    for key in ["dependencies", "devDependencies"] {
        if let Some(map) = value.get(key).and_then(Value::as_object) {
            for (name, version) in map {
                deps.push(DependencyInfo {
                    name: name.clone(),
                    version: version.as_str().unwrap_or("any").to_string(),
                    project: project.to_string(),
                });
            }
        }
    }
    deps
}

fn parse_requirements(content: &str, project: &str) -> Vec<DependencyInfo> {
    let mut deps = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (name, version) = match line.find(['>', '<', '=', '!', '~']) {
            Some(i) => (line[..i].trim(), line[i..].trim()),
            None => (line, "any"),
        };
        if name.is_empty() || !is_dependency_name(name) {
            continue;
        }
        deps.push(DependencyInfo {
            name: name.to_string(),
            version: version.to_string(),
            project: project.to_string(),
        });
    }
    deps
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    fn project(dir: &Path, name: &str) -> ProjectConfig {
        let path = dir.join(name);
        std::fs::create_dir_all(&path).unwrap();
        ProjectConfig {
            name: name.to_string(),
            path,
        }
    }

    #[test]
    fn test_version_mismatch_across_projects() {
        let dir = TempDir::new().unwrap();
        let a = project(dir.path(), "alpha");
        let b = project(dir.path(), "beta");
        std::fs::write(
            a.path.join("Cargo.toml"),
            "[package]\nname = \"alpha\"\n[dependencies]\nserde = \"1.0\"\n",
        )
        .unwrap();
        std::fs::write(
            b.path.join("Cargo.toml"),
            "[dependencies]\nserde = { version = \"0.9\", features = [\"derive\"] }\n",
        )
        .unwrap();

        let projects = [a, b];
        let findings = CrossProjectAnalyzer::new(&projects).analyze_shared_dependencies();
        assert_eq!(findings.len(), 1);
        let f = &findings[0];
        assert_eq!(f.id, "dep_conflict_serde");
        assert_eq!(f.severity, Severity::Medium);
        assert_eq!(f.title, "Version mismatch: serde");
        assert_eq!(f.location.as_deref(), Some("alpha, beta"));
        assert!(f.description.contains("alpha: 1.0"));
        assert!(f.description.contains("beta: 0.9"));
    }

    #[test]
    fn test_matching_versions_produce_no_finding() {
        let dir = TempDir::new().unwrap();
        let a = project(dir.path(), "alpha");
        let b = project(dir.path(), "beta");
        for p in [&a, &b] {
            std::fs::write(
                p.path.join("Cargo.toml"),
                "[dependencies]\ntokio = \"1\"\n",
            )
            .unwrap();
        }

        let projects = [a, b];
        let findings = CrossProjectAnalyzer::new(&projects).analyze_shared_dependencies();
        assert!(findings.is_empty());
    }

    #[test]
    fn test_mismatch_detected_across_manifest_kinds() {
        let dir = TempDir::new().unwrap();
        let a = project(dir.path(), "web");
        let b = project(dir.path(), "tools");
        std::fs::write(
            a.path.join("package.json"),
            r#"{"dependencies": {"lodash": "^4.17.0"}}"#,
        )
        .unwrap();
        std::fs::write(b.path.join("package.json"), r#"{"devDependencies": {"lodash": "^3.0.0"}}"#)
            .unwrap();
        std::fs::write(b.path.join("requirements.txt"), "requests>=2.31\n# comment\n").unwrap();

        let projects = [a, b];
        let findings = CrossProjectAnalyzer::new(&projects).analyze_shared_dependencies();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].title, "Version mismatch: lodash");
    }

    #[test]
    fn test_missing_manifests_are_skipped() {
        let dir = TempDir::new().unwrap();
        let projects = [project(dir.path(), "empty_a"), project(dir.path(), "empty_b")];
        let findings = CrossProjectAnalyzer::new(&projects).analyze_shared_dependencies();
        assert!(findings.is_empty());
    }
}
