//! Configuration file loading for algodrill
//!
//! Handles loading and parsing configuration files using the config crate.
//! Sources are layered: embedded example, then the file, then `ALGODRILL_*`
//! environment variables.

use std::path::Path;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use tracing::debug;

use crate::config::{Config, ConfigError, ENV_PREFIX, EXAMPLE_CONFIG};

/// Smallest worker stack that leaves the engine room to run
const MIN_STACK_SIZE_KB: u64 = 1024;
/// Smallest heap a fresh engine context fits in
const MIN_MEMORY_LIMIT_KB: u64 = 4 * 1024;

impl Config {
    /// Load configuration from a file, with environment overrides
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::ReadFile {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
            });
        }
        debug!(?path, "loading config file");
        Self::build(Some(path), environment())
    }

    /// Load the embedded defaults with environment overrides
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::build(None, environment())
    }

    /// Parse configuration from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config = ConfigBuilder::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn build(path: Option<&Path>, env: Environment) -> Result<Self, ConfigError> {
        let mut builder =
            ConfigBuilder::builder().add_source(File::from_str(EXAMPLE_CONFIG, FileFormat::Toml));
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        let config: Config = builder.add_source(env).build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms == 0 {
            return Err(ConfigError::Invalid("timeout_ms must be positive".to_string()));
        }
        if self.limits.stack_size_kb.is_some_and(|kb| kb < MIN_STACK_SIZE_KB) {
            return Err(ConfigError::Invalid(format!(
                "limits.stack_size_kb must be at least {MIN_STACK_SIZE_KB}"
            )));
        }
        if self.limits.memory_limit_kb.is_some_and(|kb| kb < MIN_MEMORY_LIMIT_KB) {
            return Err(ConfigError::Invalid(format!(
                "limits.memory_limit_kb must be at least {MIN_MEMORY_LIMIT_KB}"
            )));
        }
        if self.limits.max_steps == Some(0) {
            return Err(ConfigError::Invalid("limits.max_steps must be positive".to_string()));
        }
        Ok(())
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}
