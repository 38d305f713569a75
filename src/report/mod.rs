//! Static HTML report rendering. One self-contained file per run, written
//! under the data directory; no external assets.

use std::path::{Path, PathBuf};
use tracing::info;

use crate::errors::VigilError;
use crate::history::FindingDiff;
use crate::models::{Finding, RunReport, Severity};

const SEVERITIES: [Severity; 5] = [
    Severity::Critical,
    Severity::High,
    Severity::Medium,
    Severity::Low,
    Severity::Info,
];

fn severity_color(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "#d32f2f",
        Severity::High => "#f57c00",
        Severity::Medium => "#fbc02d",
        Severity::Low => "#7cb342",
        Severity::Info => "#78909c",
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn render_finding(finding: &Finding) -> String {
    let mut html = format!(
        "<div class=\"finding\">\
         <span class=\"badge\" style=\"background:{}\">{}</span> \
         <strong>{}</strong>",
        severity_color(finding.severity),
        finding.severity,
        escape(&finding.title)
    );
    if let Some(location) = &finding.location {
        html.push_str(&format!(" <code>{}</code>", escape(location)));
    }
    if !finding.description.is_empty() {
        html.push_str(&format!("<p>{}</p>", escape(&finding.description)));
    }
    if let Some(rec) = &finding.recommendation {
        html.push_str(&format!(
            "<p class=\"rec\">Recommendation: {}</p>",
            escape(rec)
        ));
    }
    html.push_str("</div>\n");
    html
}

fn render_diff(diff: &FindingDiff) -> String {
    let baseline = diff
        .baseline_run_id
        .as_deref()
        .unwrap_or("none (first recorded run)");
    let mut html = format!(
        "<h2>Changes since {}</h2>\
         <p>{} new, {} fixed, {} persistent</p>\n",
        escape(baseline),
        diff.new.len(),
        diff.fixed.len(),
        diff.persistent.len()
    );
    if !diff.fixed_findings.is_empty() {
        html.push_str("<ul>");
        for f in &diff.fixed_findings {
            html.push_str(&format!(
                "<li>Fixed: [{}] {} ({})</li>",
                f.severity,
                escape(&f.title),
                escape(f.location.as_deref().unwrap_or("project-wide"))
            ));
        }
        html.push_str("</ul>\n");
    }
    html
}

/// Render a run report to a single HTML page.
pub fn render_html(report: &RunReport, diff: Option<&FindingDiff>) -> String {
    let mut html = String::with_capacity(8 * 1024);
    html.push_str("<!DOCTYPE html><html><head><meta charset=\"utf-8\">");
    html.push_str(&format!("<title>Vigil report {}</title>", escape(&report.run_id)));
    html.push_str(
        "<style>body{font-family:sans-serif;max-width:60em;margin:2em auto;padding:0 1em;\
         background:#14171c;color:#d4d8de}\
         h1,h2{color:#e8ecf1}small{color:#7a828c}\
         .badge{color:#fff;border-radius:3px;padding:1px 6px;font-size:0.8em}\
         .finding{border-bottom:1px solid #252a31;padding:0.6em 0}\
         .rec{color:#9aa3ad}code{background:#1e232a;padding:1px 4px}</style>",
    );
    html.push_str("</head><body>");

    html.push_str(&format!("<h1>Run {}</h1>", escape(&report.run_id)));
    html.push_str(&format!(
        "<p>{} of {} tasks completed, {} failed. {} tokens, {:.0} minutes. Models: {}</p>",
        report.completed_tasks,
        report.total_tasks,
        report.failed_tasks,
        report.total_tokens,
        report.duration_minutes(),
        escape(&report.models_used.join(", "))
    ));

    let counts: Vec<String> = SEVERITIES
        .iter()
        .map(|&s| format!("{}: {}", s, report.count_by_severity(s)))
        .collect();
    html.push_str(&format!("<p>{}</p>", counts.join(" | ")));

    if let Some(diff) = diff {
        html.push_str(&render_diff(diff));
    }

    if !report.cross_project_findings.is_empty() {
        html.push_str("<h2>Cross-project</h2>");
        for finding in &report.cross_project_findings {
            html.push_str(&render_finding(finding));
        }
    }

    for project in &report.projects {
        html.push_str(&format!(
            "<h2>{} <small>{}</small></h2>",
            escape(&project.name),
            escape(&project.path.display().to_string())
        ));
        if project.findings.is_empty() {
            html.push_str("<p>No findings.</p>");
            continue;
        }
        let mut findings: Vec<&Finding> = project.findings.iter().collect();
        findings.sort_by_key(|f| f.severity.rank());
        for finding in findings {
            html.push_str(&render_finding(finding));
        }
    }

    html.push_str("</body></html>");
    html
}

/// Write the rendered report under the reports directory and return its
/// path.
pub fn save_report(
    reports_dir: &Path,
    report: &RunReport,
    diff: Option<&FindingDiff>,
) -> Result<PathBuf, VigilError> {
    std::fs::create_dir_all(reports_dir)?;
    let path = reports_dir.join(format!("{}.html", report.run_id));
    std::fs::write(&path, render_html(report, diff))?;
    info!(path = %path.display(), "Report written");
    Ok(path)
}

/// Report files present on disk, newest first by file name (run ids embed
/// their start timestamp).
pub fn list_reports(reports_dir: &Path) -> Result<Vec<PathBuf>, VigilError> {
    if !reports_dir.exists() {
        return Ok(Vec::new());
    }
    let mut paths: Vec<PathBuf> = std::fs::read_dir(reports_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.extension().map(|e| e == "html").unwrap_or(false))
        .collect();
    paths.sort();
    paths.reverse();
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProjectReport;
    use chrono::Utc;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn sample_report() -> RunReport {
        let mut finding = Finding::new(Severity::Critical, "Hardcoded <secret>", "Key in source");
        finding.location = Some("src/auth.rs".into());
        finding.recommendation = Some("Move to environment".into());
        RunReport {
            run_id: "run_20260829_010000_abcd1234".into(),
            started_at: Utc::now(),
            completed_at: Some(Utc::now()),
            projects: vec![ProjectReport {
                name: "demo".into(),
                path: PathBuf::from("/tmp/demo"),
                findings: vec![finding],
            }],
            total_tasks: 11,
            completed_tasks: 11,
            failed_tasks: 0,
            total_tokens: 11_000,
            models_used: vec!["openai/gpt-4o".into()],
            cross_project_findings: vec![],
        }
    }

    #[test]
    fn test_render_escapes_and_includes_summary() {
        let html = render_html(&sample_report(), None);
        assert!(html.contains("Hardcoded &lt;secret&gt;"));
        assert!(html.contains("11 of 11 tasks completed"));
        assert!(html.contains("critical: 1"));
        assert!(html.contains("openai/gpt-4o"));
    }

    #[test]
    fn test_render_includes_diff_section() {
        let mut fixed = Finding::new(Severity::Medium, "Stale lockfile", "");
        fixed.location = Some("Cargo.lock".into());
        let diff = FindingDiff {
            baseline_run_id: Some("run_prev".into()),
            new: vec!["a|global|high".into()],
            fixed: vec!["Stale lockfile|Cargo.lock|medium".into()],
            persistent: vec![],
            fixed_findings: vec![fixed],
        };
        let html = render_html(&sample_report(), Some(&diff));
        assert!(html.contains("Changes since run_prev"));
        assert!(html.contains("1 new, 1 fixed, 0 persistent"));
        assert!(html.contains("Fixed: [medium] Stale lockfile (Cargo.lock)"));
    }

    #[test]
    fn test_save_and_list_reports() {
        let dir = TempDir::new().unwrap();
        let path = save_report(dir.path(), &sample_report(), None).unwrap();
        assert!(path.exists());

        let listed = list_reports(dir.path()).unwrap();
        assert_eq!(listed, vec![path]);
        assert!(list_reports(&dir.path().join("missing")).unwrap().is_empty());
    }
}
