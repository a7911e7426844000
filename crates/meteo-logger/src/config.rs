use std::fs;
use std::path::Path;

use log::info;
use meteo_core::config::{ConfigError, MonitorConfig};
use thiserror_no_std::Error;

use crate::cli::Cli;

/// Startup failures of the host binary.
#[derive(Error, Debug)]
pub enum HostError {
    #[error("cannot read config file {path}: {message}")]
    ReadConfig { path: String, message: String },
    #[error("cannot parse config file {path}: {message}")]
    ParseConfig { path: String, message: String },
    #[error("invalid configuration: {0}")]
    InvalidConfig(ConfigError),
    #[error("cannot read log file {path}: {message}")]
    ReadLog { path: String, message: String },
    #[error("cannot write query output: {message}")]
    WriteOutput { message: String },
}

impl From<ConfigError> for HostError {
    fn from(value: ConfigError) -> Self {
        Self::InvalidConfig(value)
    }
}

/// Defaults, then the JSON file if one was given, then command-line
/// overrides.
pub fn load(cli: &Cli) -> Result<MonitorConfig, HostError> {
    let mut config = match &cli.config {
        Some(path) => from_file(path)?,
        None => MonitorConfig::default(),
    };

    if let Some(bus) = cli.bus {
        config.bus = bus;
    }

    config.validate()?;
    Ok(config)
}

fn from_file(path: &Path) -> Result<MonitorConfig, HostError> {
    let text = fs::read_to_string(path).map_err(|e| HostError::ReadConfig {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    let config = parse(&text).map_err(|message| HostError::ParseConfig {
        path: path.display().to_string(),
        message,
    })?;
    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

fn parse(text: &str) -> Result<MonitorConfig, String> {
    serde_json::from_str(text).map_err(|e| e.to_string())
}
