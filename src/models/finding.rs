use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Severity level for a finding, ordered from most to least severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl Severity {
    /// Returns a numeric rank where lower values indicate higher severity.
    /// Critical = 0, High = 1, Medium = 2, Low = 3, Info = 4.
    pub fn rank(&self) -> u8 {
        match self {
            Severity::Critical => 0,
            Severity::High => 1,
            Severity::Medium => 2,
            Severity::Low => 3,
            Severity::Info => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Info => "info",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "critical" => Some(Self::Critical),
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            "info" => Some(Self::Info),
            _ => None,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single observation produced by a task. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub id: String,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    /// File path or component the finding refers to.
    pub location: Option<String>,
    pub recommendation: Option<String>,
    #[serde(default)]
    pub references: Vec<String>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Finding {
    pub fn new(severity: Severity, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: format!("finding_{}", &uuid::Uuid::new_v4().simple().to_string()[..8]),
            severity,
            title: title.into(),
            description: description.into(),
            location: None,
            recommendation: None,
            references: Vec::new(),
            metadata: HashMap::new(),
        }
    }

    /// Stable identity used to match findings across runs. Two findings
    /// with the same signature in different runs are "the same finding".
    pub fn signature(&self) -> String {
        format!(
            "{}|{}|{}",
            self.title,
            self.location.as_deref().unwrap_or("global"),
            self.severity
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical.rank() < Severity::High.rank());
        assert!(Severity::High.rank() < Severity::Medium.rank());
        assert!(Severity::Low.rank() < Severity::Info.rank());
    }

    #[test]
    fn test_signature_uses_global_when_no_location() {
        let f = Finding::new(Severity::High, "Hardcoded secret", "A secret is hardcoded");
        assert_eq!(f.signature(), "Hardcoded secret|global|high");
    }

    #[test]
    fn test_signature_includes_location() {
        let mut f = Finding::new(Severity::Low, "Deep nesting", "Nested five levels");
        f.location = Some("src/parser.rs".into());
        assert_eq!(f.signature(), "Deep nesting|src/parser.rs|low");
    }

    #[test]
    fn test_severity_serde_lowercase() {
        let json = serde_json::to_string(&Severity::Critical).unwrap();
        assert_eq!(json, "\"critical\"");
        let parsed: Severity = serde_json::from_str("\"info\"").unwrap();
        assert_eq!(parsed, Severity::Info);
    }
}
