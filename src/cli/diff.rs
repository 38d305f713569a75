use console::style;

use crate::cli::commands::DiffArgs;
use crate::errors::VigilError;
use crate::history::{split_signature, HistoryStore};

pub async fn handle_diff(args: DiffArgs) -> Result<(), VigilError> {
    let config = super::load_config(args.config.as_deref()).await?;
    let history = HistoryStore::new(config.history_path());
    let diff = history.compute_diff(args.run.as_deref())?;

    match &diff.baseline_run_id {
        Some(baseline) => println!("Baseline: {}", baseline),
        None => println!("No earlier run recorded; everything counts as new"),
    }

    print_section(&style("New").red().bold().to_string(), &diff.new);
    print_fixed(
        &style("Fixed").green().bold().to_string(),
        &diff.fixed_findings,
    );
    print_section(
        &style("Persistent").yellow().bold().to_string(),
        &diff.persistent,
    );
    Ok(())
}

fn print_fixed(label: &str, findings: &[crate::models::Finding]) {
    println!("{} ({})", label, findings.len());
    for f in findings {
        println!(
            "  [{}] {} ({})",
            f.severity,
            f.title,
            f.location.as_deref().unwrap_or("project-wide")
        );
        if let Some(rec) = &f.recommendation {
            println!("      was: {}", rec);
        }
    }
}

fn print_section(label: &str, signatures: &[String]) {
    println!("{} ({})", label, signatures.len());
    for sig in signatures {
        match split_signature(sig) {
            Some(parts) => println!(
                "  [{}] {} ({})",
                parts.severity,
                parts.title,
                parts.location.as_deref().unwrap_or("project-wide")
            ),
            None => println!("  {}", sig),
        }
    }
}
