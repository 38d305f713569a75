use console::style;

use crate::cli::commands::StatusArgs;
use crate::errors::VigilError;
use crate::metrics::ModelPerformanceTracker;
use crate::models::Severity;
use crate::store::{Database, TaskQueue};

pub async fn handle_status(args: StatusArgs) -> Result<(), VigilError> {
    let config = super::load_config(args.config.as_deref()).await?;
    let db = Database::new(&config.db_path())?;
    let queue = TaskQueue::new(db, config.tasks.clone());

    let run_id = match args.run {
        Some(id) => id,
        None => match queue.latest_run_id()? {
            Some(id) => id,
            None => {
                println!("No runs recorded yet");
                return Ok(());
            }
        },
    };

    let run = queue
        .get_run(&run_id)?
        .ok_or_else(|| VigilError::Config(format!("Run '{}' does not exist", run_id)))?;
    let stats = queue.get_statistics(Some(&run_id))?;
    let findings = queue.get_all_findings(Some(&run_id))?;

    println!("{} {}", style("Run").bold(), run.id);
    println!("  started   {}", run.started_at.to_rfc3339());
    match &run.completed_at {
        Some(done) => println!("  completed {}", done.to_rfc3339()),
        None => println!("  completed {}", style("in progress").yellow()),
    }
    println!(
        "  tasks     {} pending, {} in progress, {} completed, {} failed",
        stats.pending, stats.in_progress, stats.completed, stats.failed
    );
    println!("  tokens    {}", stats.total_tokens);
    if !run.models_used.is_empty() {
        println!("  models    {}", run.models_used.join(", "));
    }

    let severities = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
        Severity::Info,
    ];
    let counts: Vec<String> = severities
        .iter()
        .map(|&s| {
            let count = findings.iter().filter(|f| f.severity == s).count();
            format!("{} {}", count, s)
        })
        .collect();
    println!("  findings  {} ({})", findings.len(), counts.join(", "));

    let metrics = ModelPerformanceTracker::new(config.metrics_path());
    let summary = metrics.model_summary()?;
    if !summary.is_empty() {
        println!("{}", style("Model performance").bold());
        for (key, m) in &summary {
            println!(
                "  {}  {}/{} tasks, {} findings, {} tokens",
                key, m.successful_tasks, m.total_tasks, m.total_findings, m.total_tokens
            );
        }
    }

    Ok(())
}
