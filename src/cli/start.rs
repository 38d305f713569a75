use console::style;
use std::sync::Arc;
use tracing::info;

use crate::agent::{AgentClient, SubprocessAgentClient};
use crate::cli::commands::StartArgs;
use crate::errors::VigilError;
use crate::failover::discovery::ModelDiscovery;
use crate::history::HistoryStore;
use crate::notify::{Notifier, RunEvent};
use crate::prioritize::PriorityMode;
use crate::report;
use crate::runner::{Runner, StopReason};
use crate::store::Database;

pub async fn handle_start(args: StartArgs) -> Result<(), VigilError> {
    let mut config = super::load_config(args.config.as_deref()).await?;
    if let Some(mode) = args.mode.as_deref() {
        config.priority_mode = PriorityMode::parse(mode)
            .ok_or_else(|| VigilError::Config(format!("Unknown priority mode '{}'", mode)))?;
    }
    if let Some(hours) = args.hours {
        config.max_duration_hours = hours;
    }
    if let Some(budget) = args.token_budget {
        config.token_budget = Some(budget);
    }
    if config.projects.is_empty() {
        return Err(VigilError::Config(
            "No projects configured, nothing to audit".into(),
        ));
    }

    let db = Database::new(&config.db_path())?;
    let agent: Arc<dyn AgentClient> =
        Arc::new(SubprocessAgentClient::new(config.agent_bin.clone()));

    if args.discover_models {
        let mut discovery = ModelDiscovery::new(config.models.clone());
        config.models = discovery.chain(agent.as_ref()).await;
    }

    let mut runner = Runner::new(config.clone(), db, agent);

    let run_id = runner.setup()?;
    println!(
        "{} run {} across {} project(s), mode {}",
        style("Starting").green().bold(),
        run_id,
        config.projects.len(),
        config.priority_mode.as_str()
    );

    let ctrl_c_cancel = runner.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Interrupt received, finishing the current task before stopping");
            ctrl_c_cancel.cancel();
        }
    });

    let notifier = Notifier::new(config.notify.clone());
    if !args.no_notify {
        notifier
            .send_event(RunEvent::Started, &run_id, &format!("{} project(s)", config.projects.len()))
            .await;
    }

    let outcome = match runner.run().await {
        Ok(outcome) => outcome,
        Err(e) => {
            if !args.no_notify {
                notifier
                    .send_event(RunEvent::Failed, &run_id, &e.to_string())
                    .await;
            }
            return Err(e);
        }
    };
    let report_data = &outcome.report;

    let history = HistoryStore::new(config.history_path());
    let diff = history.compute_diff(Some(&run_id))?;
    let report_path = report::save_report(&config.reports_dir(), report_data, Some(&diff))?;

    println!();
    println!(
        "{}: {}/{} tasks completed, {} failed, {} tokens",
        style("Run finished").green().bold(),
        report_data.completed_tasks,
        report_data.total_tasks,
        report_data.failed_tasks,
        report_data.total_tokens
    );
    println!(
        "Findings: {} ({} new, {} fixed, {} persistent vs previous run)",
        report_data.all_findings().len(),
        diff.new.len(),
        diff.fixed.len(),
        diff.persistent.len()
    );
    match outcome.stop_reason {
        StopReason::QueueDrained => {}
        StopReason::DurationExceeded => {
            println!("{}", style("Stopped at the duration budget with tasks pending").yellow())
        }
        StopReason::Cancelled => println!("{}", style("Stopped on request").yellow()),
        StopReason::ModelsExhausted => {
            println!("{}", style("Stopped: every model is rate limited").yellow())
        }
    }
    println!("Report: {}", report_path.display());

    if !args.no_notify {
        if let Err(e) = notifier.send_report(report_data).await {
            // Notifications are best-effort once the run itself succeeded.
            info!(error = %e, "Notification delivery failed");
        }
    }

    Ok(())
}
