//! Configuration management for aptop.
//!
//! Loads configuration from ${APTOP_HOME}/config.toml with sensible defaults.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub mod paths {
    //! Path resolution for aptop configuration and log directories.
    //!
    //! APTOP_HOME resolution order:
    //! 1. APTOP_HOME environment variable (if set)
    //! 2. ~/.config/aptop (default)

    use std::path::PathBuf;

    /// Returns the aptop home directory, or `None` when neither APTOP_HOME
    /// nor a home directory is available.
    pub fn aptop_home() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("APTOP_HOME") {
            return Some(PathBuf::from(home));
        }

        dirs::home_dir().map(|h| h.join(".config").join("aptop"))
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> Option<PathBuf> {
        aptop_home().map(|home| home.join("config.toml"))
    }

    /// Returns the directory that receives log files.
    pub fn logs_dir() -> Option<PathBuf> {
        aptop_home().map(|home| home.join("logs"))
    }
}

/// The external telemetry program and its fixed arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Program to run (looked up on PATH)
    pub program: String,
    /// Extra arguments placed before `-i <interval>`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            program: "powermetrics".to_string(),
            args: Vec::new(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Sampling interval in milliseconds, used when `--interval` is absent
    pub interval_ms: u64,

    /// How long to wait after SIGTERM before killing the probe
    pub grace_period_ms: u64,

    /// Width of percentage bars, in cells
    pub bar_width: usize,

    /// Telemetry program
    pub probe: ProbeConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interval_ms: Self::DEFAULT_INTERVAL_MS,
            grace_period_ms: Self::DEFAULT_GRACE_PERIOD_MS,
            bar_width: Self::DEFAULT_BAR_WIDTH,
            probe: ProbeConfig::default(),
        }
    }
}

impl Config {
    pub const DEFAULT_INTERVAL_MS: u64 = 1000;
    pub const DEFAULT_GRACE_PERIOD_MS: u64 = 2000;
    pub const DEFAULT_BAR_WIDTH: usize = 20;
    pub const MAX_BAR_WIDTH: usize = 200;

    /// Loads configuration from the default config path.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        match paths::config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Config::default()),
        }
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read, parsed, or
    /// holds invalid values.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config at {}", path.display()))?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.interval_ms > 0, "interval_ms must be at least 1");
        anyhow::ensure!(
            (1..=Self::MAX_BAR_WIDTH).contains(&self.bar_width),
            "bar_width must be between 1 and {}",
            Self::MAX_BAR_WIDTH
        );
        anyhow::ensure!(
            !self.probe.program.trim().is_empty(),
            "probe.program cannot be empty"
        );
        Ok(())
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }
}
