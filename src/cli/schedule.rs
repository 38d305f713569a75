use std::path::PathBuf;

use crate::cli::commands::{ScheduleAction, ScheduleArgs};
use crate::errors::VigilError;
use crate::schedule::{Schedule, ScheduleRegistry};

fn parse_time(time: &str) -> Result<(u32, u32), VigilError> {
    let (hour, minute) = time
        .split_once(':')
        .ok_or_else(|| VigilError::Config(format!("Time '{}' is not HH:MM", time)))?;
    let hour: u32 = hour
        .parse()
        .map_err(|_| VigilError::Config(format!("Bad hour in '{}'", time)))?;
    let minute: u32 = minute
        .parse()
        .map_err(|_| VigilError::Config(format!("Bad minute in '{}'", time)))?;
    Ok((hour, minute))
}

fn parse_weekdays(spec: Option<&str>) -> Result<Vec<u32>, VigilError> {
    let Some(spec) = spec else {
        return Ok(Vec::new());
    };
    spec.split(',')
        .map(|part| {
            part.trim()
                .parse::<u32>()
                .map_err(|_| VigilError::Config(format!("Bad weekday '{}'", part)))
        })
        .collect()
}

pub async fn handle_schedule(args: ScheduleArgs) -> Result<(), VigilError> {
    let config = super::load_config(args.config.as_deref()).await?;
    let registry = ScheduleRegistry::new(config.schedules_path());
    let binary = std::env::current_exe()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| "vigil".to_string());

    match args.action {
        ScheduleAction::Add {
            name,
            time,
            weekdays,
        } => {
            let (hour, minute) = parse_time(&time)?;
            let schedule = Schedule {
                name: name.clone(),
                hour,
                minute,
                weekdays: parse_weekdays(weekdays.as_deref())?,
                config_path: args.config.as_deref().map(PathBuf::from),
                enabled: true,
            };
            registry.upsert(schedule)?;
            println!("Schedule '{}' saved to {}", name, registry.path().display());
            println!("Install it with: vigil schedule cron {}", name);
        }
        ScheduleAction::Remove { name } => {
            if registry.remove(&name)? {
                println!("Schedule '{}' removed", name);
            } else {
                println!("No schedule named '{}'", name);
            }
        }
        ScheduleAction::List => {
            let schedules = registry.list()?;
            if schedules.is_empty() {
                println!("No schedules registered");
            }
            for s in schedules {
                let days = if s.weekdays.is_empty() {
                    "daily".to_string()
                } else {
                    format!("weekdays {:?}", s.weekdays)
                };
                let state = if s.enabled { "" } else { " (disabled)" };
                println!("{}  {:02}:{:02} UTC, {}{}", s.name, s.hour, s.minute, days, state);
            }
        }
        ScheduleAction::Cron { name } => {
            let schedule = registry
                .get(&name)?
                .ok_or_else(|| VigilError::Config(format!("No schedule named '{}'", name)))?;
            println!("{}", schedule.cron_line(&binary));
        }
        ScheduleAction::Launchd { name } => {
            let schedule = registry
                .get(&name)?
                .ok_or_else(|| VigilError::Config(format!("No schedule named '{}'", name)))?;
            print!("{}", schedule.launchd_plist(&binary));
        }
    }
    Ok(())
}
