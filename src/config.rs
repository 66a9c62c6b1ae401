//! Daemon and client configuration
//!
//! TOML file under the XDG config dir, created with defaults on first run.
//! Every field has a default so older files keep loading.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{Level, info, warn};

use crate::clock::DayBoundary;
use crate::constants;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Calendar used to decide when the daily counter resets
    #[serde(default)]
    pub day_boundary: DayBoundary,

    #[serde(default = "default_watchdog_interval")]
    pub watchdog_interval_minutes: u64,

    /// Watchdog ticks this soon after midnight reset the counter
    #[serde(default = "default_rollover_window")]
    pub rollover_window_minutes: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_path: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub socket_path: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_watchdog_interval() -> u64 {
    constants::watchdog::DEFAULT_INTERVAL_MINUTES
}

fn default_rollover_window() -> i64 {
    constants::watchdog::DEFAULT_ROLLOVER_WINDOW_MINUTES
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            day_boundary: DayBoundary::default(),
            watchdog_interval_minutes: default_watchdog_interval(),
            rollover_window_minutes: default_rollover_window(),
            state_path: None,
            socket_path: None,
        }
    }
}

fn app_dir() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push(constants::config::APP_DIR);
    path
}

impl Config {
    pub fn path() -> PathBuf {
        app_dir().join(constants::config::FILENAME)
    }

    /// Load from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::path())
    }

    /// Load configuration from TOML file or create default
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            info!("Config file not found, creating default config at {:?}", config_path);
            let config = Config::default();
            config.save_to(config_path)?;
            return Ok(config);
        }

        let contents = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config from {:?}", config_path))?;

        let mut config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse TOML from {:?}", config_path))?;

        config.validate_and_clamp();
        Ok(config)
    }

    /// Clamp timing values to ranges the daemon can schedule with
    fn validate_and_clamp(&mut self) {
        use constants::watchdog::{MAX_INTERVAL_MINUTES, MAX_ROLLOVER_WINDOW_MINUTES, MIN_INTERVAL_MINUTES};

        let interval = self
            .watchdog_interval_minutes
            .clamp(MIN_INTERVAL_MINUTES, MAX_INTERVAL_MINUTES);
        if interval != self.watchdog_interval_minutes {
            warn!(
                watchdog_interval_minutes = self.watchdog_interval_minutes,
                clamped = interval,
                "watchdog_interval_minutes out of range, clamping"
            );
            self.watchdog_interval_minutes = interval;
        }

        let window = self
            .rollover_window_minutes
            .clamp(0, MAX_ROLLOVER_WINDOW_MINUTES);
        if window != self.rollover_window_minutes {
            warn!(
                rollover_window_minutes = self.rollover_window_minutes,
                clamped = window,
                "rollover_window_minutes out of range, clamping"
            );
            self.rollover_window_minutes = window;
        }
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {:?}", parent))?;
        }

        let toml = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(config_path, toml)
            .with_context(|| format!("Failed to write config to {:?}", config_path))?;

        info!("Saved config to {:?}", config_path);
        Ok(())
    }

    pub fn state_path(&self) -> PathBuf {
        self.state_path
            .clone()
            .unwrap_or_else(|| app_dir().join(constants::config::STATE_FILENAME))
    }

    pub fn socket_path(&self) -> Result<PathBuf> {
        match &self.socket_path {
            Some(path) => Ok(path.clone()),
            None => crate::ipc::default_socket_path(),
        }
    }

    /// Parsed `log_level`, defaulting to INFO for unknown names
    pub fn trace_level(&self) -> Level {
        parse_level(&self.log_level)
    }
}

pub fn parse_level(name: &str) -> Level {
    match name.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}
