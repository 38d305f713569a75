use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "vigil", version, about = "Overnight autonomous codebase audit orchestrator")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a full audit of the configured projects now
    Start(StartArgs),
    /// Start the HTTP REST API server
    Serve(ServeArgs),
    /// Show the state of the latest (or a given) run
    Status(StatusArgs),
    /// Diff a run's findings against the preceding run
    Diff(DiffArgs),
    /// List or open generated HTML reports
    Report(ReportArgs),
    /// Manage overnight schedules
    Schedule(ScheduleArgs),
    /// Validate a configuration file
    Validate(ValidateArgs),
}

#[derive(Args, Clone)]
pub struct StartArgs {
    /// YAML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Prioritization mode: balanced, security_first, research_heavy, quick_scan
    #[arg(long)]
    pub mode: Option<String>,

    /// Duration budget in hours (overrides config)
    #[arg(long)]
    pub hours: Option<f64>,

    /// Token budget applied during prioritization
    #[arg(long)]
    pub token_budget: Option<i64>,

    /// Skip webhook notifications for this run
    #[arg(long)]
    pub no_notify: bool,

    /// Build the failover chain from the agent's own model list instead
    /// of the configured one
    #[arg(long)]
    pub discover_models: bool,
}

#[derive(Args, Clone)]
pub struct ServeArgs {
    /// YAML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    #[arg(short, long, default_value_t = 8710)]
    pub port: u16,
}

#[derive(Args, Clone)]
pub struct StatusArgs {
    /// YAML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Run id (defaults to the latest run)
    #[arg(long)]
    pub run: Option<String>,
}

#[derive(Args, Clone)]
pub struct DiffArgs {
    /// YAML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Run id (defaults to the latest recorded run)
    #[arg(long)]
    pub run: Option<String>,
}

#[derive(Args, Clone)]
pub struct ReportArgs {
    /// YAML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Print all report paths instead of just the latest
    #[arg(long)]
    pub list: bool,
}

#[derive(Args, Clone)]
pub struct ScheduleArgs {
    /// YAML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub action: ScheduleAction,
}

#[derive(Subcommand, Clone)]
pub enum ScheduleAction {
    /// Add or replace a named schedule
    Add {
        name: String,
        /// Fire time as HH:MM (24h, UTC)
        #[arg(long, default_value = "02:00")]
        time: String,
        /// Comma-separated weekdays, 0=Sunday..6=Saturday (default: daily)
        #[arg(long)]
        weekdays: Option<String>,
    },
    /// Remove a schedule by name
    Remove { name: String },
    /// List registered schedules
    List,
    /// Print the crontab line for a schedule
    Cron { name: String },
    /// Print the launchd plist for a schedule
    Launchd { name: String },
}

#[derive(Args, Clone)]
pub struct ValidateArgs {
    /// YAML configuration file
    pub config: String,
}
