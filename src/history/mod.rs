//! Cross-run finding history and the diff engine. History lives in a
//! JSON file beside the database, capped to the most recent runs, and is
//! keyed by finding signature (`title|location|severity`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::errors::VigilError;
use crate::models::Finding;

const MAX_RECORDED_RUNS: usize = 30;

/// One run's worth of signatures, as recorded after finalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub recorded_at: DateTime<Utc>,
    pub signatures: Vec<String>,
}

/// Aggregate view of a signature across recorded runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureStats {
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub occurrences: u64,
    /// Snapshot of the finding the first time this signature appeared,
    /// kept so a later "fixed" report can show more than the signature.
    #[serde(default)]
    pub finding_data: Option<RecordedFinding>,
}

/// The reportable fields of a finding, captured at record time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedFinding {
    pub title: String,
    pub severity: crate::models::Severity,
    pub description: String,
    pub location: Option<String>,
    pub recommendation: Option<String>,
}

impl RecordedFinding {
    fn from_finding(finding: &Finding) -> Self {
        Self {
            title: finding.title.clone(),
            severity: finding.severity,
            description: finding.description.clone(),
            location: finding.location.clone(),
            recommendation: finding.recommendation.clone(),
        }
    }

    fn to_finding(&self, signature: &str) -> Finding {
        let mut f = Finding::new(self.severity, self.title.clone(), self.description.clone());
        f.id = format!("fixed_{}", signature.chars().take(8).collect::<String>());
        f.location = self.location.clone();
        f.recommendation = self.recommendation.clone();
        f
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct HistoryFile {
    #[serde(default)]
    runs: Vec<RunRecord>,
    #[serde(default)]
    signatures: BTreeMap<String, SignatureStats>,
}

/// A finding identity reconstructed from a stored signature, for display
/// of fixed findings whose full records belong to an earlier run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignatureParts {
    pub title: String,
    pub location: Option<String>,
    pub severity: crate::models::Severity,
}

/// Split `title|location-or-global|severity` back into its parts. Titles
/// may themselves contain pipes, so the split works from the right.
pub fn split_signature(signature: &str) -> Option<SignatureParts> {
    let (rest, severity) = signature.rsplit_once('|')?;
    let (title, location) = rest.rsplit_once('|')?;
    Some(SignatureParts {
        title: title.to_string(),
        location: (location != "global").then(|| location.to_string()),
        severity: crate::models::Severity::parse(severity)?,
    })
}

/// Result of diffing one run against its baseline.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FindingDiff {
    pub baseline_run_id: Option<String>,
    /// Signatures present now but not in the baseline.
    pub new: Vec<String>,
    /// Signatures present in the baseline but gone now.
    pub fixed: Vec<String>,
    /// Signatures present in both.
    pub persistent: Vec<String>,
    /// Fixed findings rebuilt from the snapshots taken when they were
    /// first recorded; the live rows belong to an earlier run.
    pub fixed_findings: Vec<Finding>,
}

pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load(&self) -> Result<HistoryFile, VigilError> {
        if !self.path.exists() {
            return Ok(HistoryFile::default());
        }
        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(HistoryFile::default());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn save(&self, file: &HistoryFile) -> Result<(), VigilError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(file)?)?;
        Ok(())
    }

    /// Append a completed run's findings to the log, updating per-signature
    /// stats and dropping the oldest runs past the cap.
    pub fn record_run(&self, run_id: &str, findings: &[Finding]) -> Result<(), VigilError> {
        let mut file = self.load()?;
        let now = Utc::now();

        let mut by_signature: BTreeMap<String, &Finding> = BTreeMap::new();
        for finding in findings {
            by_signature.entry(finding.signature()).or_insert(finding);
        }
        let signatures: Vec<String> = by_signature.keys().cloned().collect();

        for (sig, finding) in &by_signature {
            file.signatures
                .entry(sig.clone())
                .and_modify(|stats| {
                    stats.last_seen = now;
                    stats.occurrences += 1;
                })
                .or_insert_with(|| SignatureStats {
                    first_seen: now,
                    last_seen: now,
                    occurrences: 1,
                    finding_data: Some(RecordedFinding::from_finding(finding)),
                });
        }

        // Re-recording the same run replaces its entry instead of
        // duplicating it.
        file.runs.retain(|r| r.run_id != run_id);
        file.runs.push(RunRecord {
            run_id: run_id.to_string(),
            recorded_at: now,
            signatures,
        });

        if file.runs.len() > MAX_RECORDED_RUNS {
            let excess = file.runs.len() - MAX_RECORDED_RUNS;
            file.runs.drain(..excess);
        }

        debug!(run_id = %run_id, runs = file.runs.len(), "Recorded run history");
        self.save(&file)
    }

    pub fn recorded_runs(&self) -> Result<Vec<RunRecord>, VigilError> {
        Ok(self.load()?.runs)
    }

    pub fn signature_stats(&self, signature: &str) -> Result<Option<SignatureStats>, VigilError> {
        Ok(self.load()?.signatures.get(signature).cloned())
    }

    /// Diff a run against the run immediately preceding it in the log.
    /// With no run id, the latest recorded run is diffed. A run with no
    /// predecessor reports everything as new.
    pub fn compute_diff(&self, run_id: Option<&str>) -> Result<FindingDiff, VigilError> {
        let file = self.load()?;

        let target_index = match run_id {
            Some(id) => file
                .runs
                .iter()
                .position(|r| r.run_id == id)
                .ok_or_else(|| {
                    VigilError::Internal(format!("Run {} is not in the history log", id))
                })?,
            None => match file.runs.len().checked_sub(1) {
                Some(index) => index,
                None => return Ok(FindingDiff::default()),
            },
        };

        let target: HashSet<&str> = file.runs[target_index]
            .signatures
            .iter()
            .map(String::as_str)
            .collect();

        let baseline_record = target_index.checked_sub(1).map(|i| &file.runs[i]);
        let baseline: HashSet<&str> = baseline_record
            .map(|r| r.signatures.iter().map(String::as_str).collect())
            .unwrap_or_default();

        let mut diff = FindingDiff {
            baseline_run_id: baseline_record.map(|r| r.run_id.clone()),
            ..Default::default()
        };
        for sig in &target {
            if baseline.contains(sig) {
                diff.persistent.push(sig.to_string());
            } else {
                diff.new.push(sig.to_string());
            }
        }
        for sig in &baseline {
            if !target.contains(sig) {
                diff.fixed.push(sig.to_string());
            }
        }
        diff.new.sort();
        diff.fixed.sort();
        diff.persistent.sort();

        for sig in &diff.fixed {
            let rebuilt = match file.signatures.get(sig).and_then(|s| s.finding_data.as_ref()) {
                Some(data) => data.to_finding(sig),
                // Entries recorded before snapshots were kept fall back
                // to what the signature itself encodes.
                None => match split_signature(sig) {
                    Some(parts) => {
                        let mut f = Finding::new(parts.severity, parts.title, "");
                        f.location = parts.location;
                        f
                    }
                    None => continue,
                },
            };
            diff.fixed_findings.push(rebuilt);
        }
        Ok(diff)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Severity;
    use tempfile::TempDir;

    fn finding(title: &str, location: Option<&str>, severity: Severity) -> Finding {
        let mut f = Finding::new(severity, title, "desc");
        f.location = location.map(str::to_string);
        f
    }

    fn store(dir: &TempDir) -> HistoryStore {
        HistoryStore::new(dir.path().join("finding_history.json"))
    }

    #[test]
    fn test_diff_against_preceding_run() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        store
            .record_run(
                "run_1",
                &[
                    finding("SQL injection", Some("src/db.rs"), Severity::Critical),
                    finding("Outdated dep", None, Severity::Medium),
                ],
            )
            .unwrap();
        store
            .record_run(
                "run_2",
                &[
                    finding("SQL injection", Some("src/db.rs"), Severity::Critical),
                    finding("Missing timeout", Some("src/net.rs"), Severity::Low),
                ],
            )
            .unwrap();

        let diff = store.compute_diff(Some("run_2")).unwrap();
        assert_eq!(diff.baseline_run_id.as_deref(), Some("run_1"));
        assert_eq!(diff.new, vec!["Missing timeout|src/net.rs|low"]);
        assert_eq!(diff.fixed, vec!["Outdated dep|global|medium"]);
        assert_eq!(diff.persistent, vec!["SQL injection|src/db.rs|critical"]);
    }

    #[test]
    fn test_diff_defaults_to_latest_run() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store
            .record_run("run_1", &[finding("A", None, Severity::High)])
            .unwrap();
        store
            .record_run("run_2", &[finding("B", None, Severity::High)])
            .unwrap();

        let diff = store.compute_diff(None).unwrap();
        assert_eq!(diff.baseline_run_id.as_deref(), Some("run_1"));
        assert_eq!(diff.new, vec!["B|global|high"]);
        assert_eq!(diff.fixed, vec!["A|global|high"]);
    }

    #[test]
    fn test_first_run_reports_everything_new() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store
            .record_run("run_1", &[finding("A", None, Severity::High)])
            .unwrap();

        let diff = store.compute_diff(Some("run_1")).unwrap();
        assert!(diff.baseline_run_id.is_none());
        assert_eq!(diff.new, vec!["A|global|high"]);
        assert!(diff.fixed.is_empty());
        assert!(diff.persistent.is_empty());
    }

    #[test]
    fn test_diff_unknown_run_errors() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.record_run("run_1", &[]).unwrap();
        assert!(store.compute_diff(Some("run_404")).is_err());
    }

    #[test]
    fn test_history_caps_recorded_runs() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        for i in 0..35 {
            store.record_run(&format!("run_{}", i), &[]).unwrap();
        }
        let runs = store.recorded_runs().unwrap();
        assert_eq!(runs.len(), 30);
        assert_eq!(runs[0].run_id, "run_5");
        assert_eq!(runs[29].run_id, "run_34");
    }

    #[test]
    fn test_signature_stats_accumulate() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let f = finding("Persistent issue", Some("lib.rs"), Severity::High);
        store.record_run("run_1", std::slice::from_ref(&f)).unwrap();
        store.record_run("run_2", std::slice::from_ref(&f)).unwrap();

        let stats = store
            .signature_stats("Persistent issue|lib.rs|high")
            .unwrap()
            .unwrap();
        assert_eq!(stats.occurrences, 2);
        assert!(stats.last_seen >= stats.first_seen);
    }

    #[test]
    fn test_split_signature_round_trip() {
        let mut f = finding("Pipe | in title", Some("src/a.rs"), Severity::Medium);
        f.location = Some("src/a.rs".into());
        let parts = split_signature(&f.signature()).unwrap();
        assert_eq!(parts.title, "Pipe | in title");
        assert_eq!(parts.location.as_deref(), Some("src/a.rs"));
        assert_eq!(parts.severity, Severity::Medium);

        let global = split_signature("No location|global|info").unwrap();
        assert!(global.location.is_none());

        assert!(split_signature("not a signature").is_none());
        assert!(split_signature("a|b|not_a_severity").is_none());
    }

    #[test]
    fn test_fixed_findings_rebuilt_from_snapshot() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let mut f = finding("Hardcoded secret", Some("src/auth.rs"), Severity::High);
        f.description = "API key committed in source".into();
        f.recommendation = Some("Move the key to the environment".into());
        store.record_run("run_1", std::slice::from_ref(&f)).unwrap();
        store.record_run("run_2", &[]).unwrap();

        let diff = store.compute_diff(Some("run_2")).unwrap();
        assert_eq!(diff.fixed, vec!["Hardcoded secret|src/auth.rs|high"]);
        assert_eq!(diff.fixed_findings.len(), 1);
        let rebuilt = &diff.fixed_findings[0];
        assert_eq!(rebuilt.title, "Hardcoded secret");
        assert_eq!(rebuilt.severity, Severity::High);
        assert_eq!(rebuilt.description, "API key committed in source");
        assert_eq!(rebuilt.location.as_deref(), Some("src/auth.rs"));
        assert_eq!(
            rebuilt.recommendation.as_deref(),
            Some("Move the key to the environment")
        );
    }

    #[test]
    fn test_rerecording_same_run_replaces_entry() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store
            .record_run("run_1", &[finding("A", None, Severity::Low)])
            .unwrap();
        store
            .record_run("run_1", &[finding("B", None, Severity::Low)])
            .unwrap();

        let runs = store.recorded_runs().unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].signatures, vec!["B|global|low"]);
    }
}
