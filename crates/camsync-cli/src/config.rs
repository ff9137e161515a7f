//! Configuration file management.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use camsync_core::{SessionConfig, load_device_names};
use serde::Deserialize;

use crate::cli::SessionArgs;

/// Configuration file structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Config {
    /// Session settings
    #[serde(default)]
    pub session: SessionConfig,
}

impl Config {
    /// Get the config file path
    pub fn path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("camsync")
            .join("config.toml")
    }

    /// Load config from the default location, or return default if not found
    pub fn load() -> Self {
        let path = Self::path();
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("{:#}", e);
                Self::default()
            }
        }
    }

    /// Load config from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))
    }
}

/// Merge command-line overrides into the file settings and validate.
///
/// Names given with `--device` replace the configured list; names from
/// `--devices-file` are appended after them.
pub fn resolve_session(args: &SessionArgs, config: &Config) -> Result<SessionConfig> {
    let mut session = config.session.clone();

    if !args.devices.is_empty() {
        session.device_names = args.devices.clone();
    }
    if let Some(path) = &args.devices_file {
        let names = load_device_names(path)
            .with_context(|| format!("Failed to read devices file: {}", path.display()))?;
        if args.devices.is_empty() {
            session.device_names = names;
        } else {
            session.device_names.extend(names);
        }
    }
    if let Some(keyword) = &args.keyword {
        session.keyword = keyword.clone();
    }
    if let Some(delay) = args.delay {
        session.stop_delay_secs = delay;
    }

    session.validate().context("Invalid configuration")?;
    Ok(session)
}
