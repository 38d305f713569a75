use clap::Parser;
use tracing_subscriber::EnvFilter;

use vigil::cli;
use vigil::config;
use vigil::errors::VigilError;

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level(cli.quiet, cli.verbose)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(!cli.no_color)
        .init();

    let result = match cli.command {
        cli::Commands::Start(args) => cli::start::handle_start(args).await,
        cli::Commands::Serve(args) => cli::serve::handle_serve(args).await,
        cli::Commands::Status(args) => cli::status::handle_status(args).await,
        cli::Commands::Diff(args) => cli::diff::handle_diff(args).await,
        cli::Commands::Report(args) => cli::report::handle_report(args).await,
        cli::Commands::Schedule(args) => cli::schedule::handle_schedule(args).await,
        cli::Commands::Validate(args) => handle_validate(args).await,
    };

    match result {
        Ok(()) => {}
        Err(e) => {
            eprintln!("Error: {}", e);
            let exit_code = match &e {
                VigilError::Config(_) => 2,
                VigilError::Agent(_) => 3,
                VigilError::RateLimit(_) => 4,
                VigilError::Database(_) => 5,
                _ => 1,
            };
            std::process::exit(exit_code);
        }
    }
}

async fn handle_validate(args: cli::commands::ValidateArgs) -> Result<(), VigilError> {
    let path = std::path::PathBuf::from(&args.config);
    let config = config::parse_config(&path).await?;
    println!(
        "Configuration is valid: {} ({} project(s), {} model(s))",
        args.config,
        config.projects.len(),
        config.models.len()
    );
    Ok(())
}

/// Default log level from the global flags; --quiet wins over any -v.
fn log_level(quiet: bool, verbose: u8) -> &'static str {
    if quiet {
        return "warn";
    }
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiet_overrides_verbose() {
        assert_eq!(log_level(true, 0), "warn");
        assert_eq!(log_level(true, 3), "warn");
        assert_eq!(log_level(false, 0), "info");
        assert_eq!(log_level(false, 1), "debug");
        assert_eq!(log_level(false, 2), "trace");
    }
}
