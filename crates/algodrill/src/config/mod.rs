use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::types::ExecutionLimits;

mod loader;

/// Example configuration embedded at compile time.
///
/// Library users can access this to generate a starter config file.
pub const EXAMPLE_CONFIG: &str = include_str!("../../algodrill.example.toml");

/// Prefix of environment variables that override the config file
pub const ENV_PREFIX: &str = "ALGODRILL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file at {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] config::ConfigError),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Config for algodrill
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Deadline for one run, in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Problem catalog file; the built-in catalog is used when unset
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,

    /// Directory of the progress store
    #[serde(default)]
    pub progress_dir: Option<PathBuf>,

    /// Limits applied to every run.
    /// Individual runs may override them.
    #[serde(default)]
    pub limits: ExecutionLimits,
}

impl Config {
    pub const DEFAULT_TIMEOUT_MS: u64 = 2000;

    /// Create a config from the embedded example
    pub fn new() -> Self {
        Self::default()
    }

    /// Deadline for one run
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Directory of the progress store
    pub fn progress_dir(&self) -> PathBuf {
        self.progress_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(".algodrill"))
    }

    /// Merge limits with the configured ones
    pub fn effective_limits(&self, overrides: Option<&ExecutionLimits>) -> ExecutionLimits {
        match overrides {
            Some(limits) => self.limits.with_overrides(limits),
            None => self.limits.clone(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::parse_toml(EXAMPLE_CONFIG).expect("embedded default config should be valid")
    }
}

fn default_timeout_ms() -> u64 {
    Config::DEFAULT_TIMEOUT_MS
}
