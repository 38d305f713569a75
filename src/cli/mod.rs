pub mod commands;
pub mod diff;
pub mod report;
pub mod schedule;
pub mod serve;
pub mod start;
pub mod status;

pub use commands::{Cli, Commands};

use std::path::PathBuf;

use crate::config::{parse_config, VigilConfig};
use crate::errors::VigilError;

const DEFAULT_CONFIG_FILE: &str = "vigil.yaml";

/// Resolve the effective configuration: an explicit path must parse, the
/// default file is used when present, and everything else falls back to
/// built-in defaults.
pub async fn load_config(path: Option<&str>) -> Result<VigilConfig, VigilError> {
    match path {
        Some(path) => parse_config(&PathBuf::from(path)).await,
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_FILE);
            if default.exists() {
                parse_config(&default).await
            } else {
                Ok(VigilConfig::default())
            }
        }
    }
}
