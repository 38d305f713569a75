use crate::cli::commands::ReportArgs;
use crate::errors::VigilError;
use crate::report;

pub async fn handle_report(args: ReportArgs) -> Result<(), VigilError> {
    let config = super::load_config(args.config.as_deref()).await?;
    let reports = report::list_reports(&config.reports_dir())?;

    if reports.is_empty() {
        println!("No reports generated yet");
        return Ok(());
    }

    if args.list {
        for path in &reports {
            println!("{}", path.display());
        }
    } else {
        println!("{}", reports[0].display());
    }
    Ok(())
}
