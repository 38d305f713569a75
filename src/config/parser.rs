use std::collections::HashSet;
use std::path::Path;

use tracing::warn;

use super::types::VigilConfig;
use crate::errors::VigilError;

pub async fn parse_config(path: &Path) -> Result<VigilConfig, VigilError> {
    if !path.exists() {
        return Err(VigilError::Config(format!(
            "Config file not found: {}",
            path.display()
        )));
    }

    let metadata = tokio::fs::metadata(path).await?;
    if metadata.len() > 1_048_576 {
        return Err(VigilError::Config("Config file exceeds 1MB limit".into()));
    }

    let content = tokio::fs::read_to_string(path).await?;
    let config: VigilConfig = serde_yaml::from_str(&content)?;

    validate(&config)?;

    Ok(config)
}

/// Detect semantic problems the type system cannot express.
fn validate(config: &VigilConfig) -> Result<(), VigilError> {
    let mut names = HashSet::new();
    for project in &config.projects {
        if !names.insert(project.name.as_str()) {
            return Err(VigilError::Config(format!(
                "Duplicate project name: {}",
                project.name
            )));
        }
    }

    // Priority is a total order across the failover chain.
    let mut priorities = HashSet::new();
    for model in &config.models {
        if !priorities.insert(model.priority) {
            return Err(VigilError::Config(format!(
                "Duplicate model priority {} ({})",
                model.priority,
                model.key()
            )));
        }
    }

    if config.models.is_empty() {
        return Err(VigilError::Config("Model failover chain is empty".into()));
    }

    if config.max_duration_hours <= 0.0 {
        return Err(VigilError::Config(format!(
            "max_duration_hours must be positive, got {}",
            config.max_duration_hours
        )));
    }

    if config.projects.is_empty() {
        warn!("No projects configured; a run will generate no tasks");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::{ModelConfig, ProjectConfig};
    use std::path::PathBuf;

    fn base_config() -> VigilConfig {
        VigilConfig {
            projects: vec![ProjectConfig {
                name: "demo".into(),
                path: PathBuf::from("/tmp/demo"),
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_accepts_defaults() {
        assert!(validate(&base_config()).is_ok());
    }

    #[test]
    fn test_validate_rejects_duplicate_project_names() {
        let mut config = base_config();
        config.projects.push(ProjectConfig {
            name: "demo".into(),
            path: PathBuf::from("/tmp/other"),
        });
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_model_priorities() {
        let mut config = base_config();
        config.models = vec![
            ModelConfig::new("openai", "gpt-4o", 1),
            ModelConfig::new("google", "gemini-2.5-pro", 1),
        ];
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_rejects_empty_chain() {
        let mut config = base_config();
        config.models.clear();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_rejects_non_positive_duration() {
        let mut config = base_config();
        config.max_duration_hours = 0.0;
        assert!(validate(&config).is_err());
    }

    #[tokio::test]
    async fn test_parse_config_missing_file() {
        let result = parse_config(Path::new("/nonexistent/vigil.yaml")).await;
        assert!(matches!(result, Err(VigilError::Config(_))));
    }

    #[tokio::test]
    async fn test_parse_config_minimal_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vigil.yaml");
        tokio::fs::write(
            &path,
            "projects:\n  - name: demo\n    path: /tmp/demo\nmax_duration_hours: 2.0\n",
        )
        .await
        .unwrap();

        let config = parse_config(&path).await.unwrap();
        assert_eq!(config.projects.len(), 1);
        assert_eq!(config.max_duration_hours, 2.0);
        // Defaults fill in the rest
        assert_eq!(config.models.len(), 4);
        assert!(config.tasks.codebase_audit);
    }
}
