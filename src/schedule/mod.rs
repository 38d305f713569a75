//! Overnight schedule management. Schedules live in a JSON registry; the
//! CLI renders them into crontab lines or launchd plists for the host's
//! own scheduler to execute.

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::errors::VigilError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub name: String,
    /// 24h clock, UTC.
    pub hour: u32,
    pub minute: u32,
    /// 0 = Sunday .. 6 = Saturday. Empty means every day.
    #[serde(default)]
    pub weekdays: Vec<u32>,
    #[serde(default)]
    pub config_path: Option<PathBuf>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl Schedule {
    pub fn validate(&self) -> Result<(), VigilError> {
        if self.name.is_empty() {
            return Err(VigilError::Config("Schedule name must not be empty".into()));
        }
        if self.hour > 23 || self.minute > 59 {
            return Err(VigilError::Config(format!(
                "Schedule '{}' has an invalid time {:02}:{:02}",
                self.name, self.hour, self.minute
            )));
        }
        if self.weekdays.iter().any(|&d| d > 6) {
            return Err(VigilError::Config(format!(
                "Schedule '{}' has a weekday outside 0-6",
                self.name
            )));
        }
        Ok(())
    }

    fn start_command(&self, binary: &str) -> String {
        match &self.config_path {
            Some(path) => format!("{} start --config {}", binary, path.display()),
            None => format!("{} start", binary),
        }
    }

    /// Crontab entry for this schedule.
    pub fn cron_line(&self, binary: &str) -> String {
        let dow = if self.weekdays.is_empty() {
            "*".to_string()
        } else {
            self.weekdays
                .iter()
                .map(|d| d.to_string())
                .collect::<Vec<_>>()
                .join(",")
        };
        format!(
            "{} {} * * {} {}",
            self.minute,
            self.hour,
            dow,
            self.start_command(binary)
        )
    }

    /// launchd job definition for macOS hosts.
    pub fn launchd_plist(&self, binary: &str) -> String {
        let mut intervals = String::new();
        let days: Vec<Option<u32>> = if self.weekdays.is_empty() {
            vec![None]
        } else {
            self.weekdays.iter().map(|&d| Some(d)).collect()
        };
        for day in days {
            intervals.push_str("    <dict>\n");
            if let Some(day) = day {
                intervals.push_str(&format!(
                    "      <key>Weekday</key><integer>{}</integer>\n",
                    day
                ));
            }
            intervals.push_str(&format!(
                "      <key>Hour</key><integer>{}</integer>\n      <key>Minute</key><integer>{}</integer>\n",
                self.hour, self.minute
            ));
            intervals.push_str("    </dict>\n");
        }

        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
  <key>Label</key><string>dev.vigil.{name}</string>
  <key>ProgramArguments</key>
  <array>
{args}  </array>
  <key>StartCalendarInterval</key>
  <array>
{intervals}  </array>
</dict>
</plist>
"#,
            name = self.name,
            args = self
                .start_command(binary)
                .split_whitespace()
                .map(|a| format!("    <string>{}</string>\n", a))
                .collect::<String>(),
            intervals = intervals
        )
    }

    /// Whether this schedule fires at the given instant (minute
    /// resolution).
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        if !self.enabled {
            return false;
        }
        if now.hour() != self.hour || now.minute() != self.minute {
            return false;
        }
        self.weekdays.is_empty()
            || self
                .weekdays
                .contains(&now.weekday().num_days_from_sunday())
    }
}

/// JSON-backed registry of named schedules.
pub struct ScheduleRegistry {
    path: PathBuf,
}

impl ScheduleRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn list(&self) -> Result<Vec<Schedule>, VigilError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn save(&self, schedules: &[Schedule]) -> Result<(), VigilError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(schedules)?)?;
        Ok(())
    }

    /// Add or replace a schedule by name.
    pub fn upsert(&self, schedule: Schedule) -> Result<(), VigilError> {
        schedule.validate()?;
        let mut schedules = self.list()?;
        schedules.retain(|s| s.name != schedule.name);
        info!(name = %schedule.name, "Schedule saved");
        schedules.push(schedule);
        self.save(&schedules)
    }

    pub fn remove(&self, name: &str) -> Result<bool, VigilError> {
        let mut schedules = self.list()?;
        let before = schedules.len();
        schedules.retain(|s| s.name != name);
        let removed = schedules.len() != before;
        if removed {
            self.save(&schedules)?;
            info!(name = %name, "Schedule removed");
        }
        Ok(removed)
    }

    pub fn get(&self, name: &str) -> Result<Option<Schedule>, VigilError> {
        Ok(self.list()?.into_iter().find(|s| s.name == name))
    }

    /// Schedules due at the given instant.
    pub fn due_at(&self, now: DateTime<Utc>) -> Result<Vec<Schedule>, VigilError> {
        Ok(self.list()?.into_iter().filter(|s| s.is_due(now)).collect())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn nightly() -> Schedule {
        Schedule {
            name: "nightly".into(),
            hour: 2,
            minute: 30,
            weekdays: vec![],
            config_path: None,
            enabled: true,
        }
    }

    #[test]
    fn test_cron_line_daily_and_weekday() {
        assert_eq!(nightly().cron_line("vigil"), "30 2 * * * vigil start");

        let weekdays_only = Schedule {
            weekdays: vec![1, 2, 3, 4, 5],
            config_path: Some(PathBuf::from("/etc/vigil.yaml")),
            ..nightly()
        };
        assert_eq!(
            weekdays_only.cron_line("vigil"),
            "30 2 * * 1,2,3,4,5 vigil start --config /etc/vigil.yaml"
        );
    }

    #[test]
    fn test_launchd_plist_shape() {
        let plist = nightly().launchd_plist("/usr/local/bin/vigil");
        assert!(plist.contains("<key>Label</key><string>dev.vigil.nightly</string>"));
        assert!(plist.contains("<string>/usr/local/bin/vigil</string>"));
        assert!(plist.contains("<key>Hour</key><integer>2</integer>"));
    }

    #[test]
    fn test_is_due_matches_minute_and_weekday() {
        // 2026-08-30 is a Sunday.
        let sunday = Utc.with_ymd_and_hms(2026, 8, 30, 2, 30, 0).unwrap();
        assert!(nightly().is_due(sunday));
        assert!(!nightly().is_due(sunday + chrono::Duration::minutes(1)));

        let weekdays_only = Schedule {
            weekdays: vec![1, 2, 3, 4, 5],
            ..nightly()
        };
        assert!(!weekdays_only.is_due(sunday));
        assert!(weekdays_only.is_due(sunday + chrono::Duration::days(1)));

        let disabled = Schedule {
            enabled: false,
            ..nightly()
        };
        assert!(!disabled.is_due(sunday));
    }

    #[test]
    fn test_registry_upsert_remove() {
        let dir = TempDir::new().unwrap();
        let registry = ScheduleRegistry::new(dir.path().join("schedules.json"));

        registry.upsert(nightly()).unwrap();
        registry
            .upsert(Schedule {
                hour: 3,
                ..nightly()
            })
            .unwrap();

        let schedules = registry.list().unwrap();
        assert_eq!(schedules.len(), 1);
        assert_eq!(schedules[0].hour, 3);

        assert!(registry.remove("nightly").unwrap());
        assert!(!registry.remove("nightly").unwrap());
        assert!(registry.list().unwrap().is_empty());
    }

    #[test]
    fn test_validate_rejects_bad_time() {
        let bad = Schedule {
            hour: 24,
            ..nightly()
        };
        assert!(bad.validate().is_err());
        let bad_day = Schedule {
            weekdays: vec![7],
            ..nightly()
        };
        assert!(bad_day.validate().is_err());
    }
}
