//! Configuration file loading for snipcube
//!
//! Handles loading and parsing configuration files using the config crate.

use std::path::Path;

use config::{Config as ConfigBuilder, File, FileFormat};

use crate::config::{Config, ConfigError};

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let config = ConfigBuilder::builder()
            .add_source(File::from(path))
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
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

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_ms must be positive".to_string(),
            ));
        }

        match self.interpreter.command.first() {
            None => {
                return Err(ConfigError::Invalid(
                    "interpreter has empty command".to_string(),
                ));
            }
            Some(program) if program.is_empty() => {
                return Err(ConfigError::Invalid(
                    "interpreter program is empty".to_string(),
                ));
            }
            Some(_) => {}
        }
        if !self.interpreter.takes_snippet() {
            return Err(ConfigError::Invalid(
                "interpreter command never receives {snippet}".to_string(),
            ));
        }

        let limits = &self.limits;
        if !limits.wall_time_limit.is_finite() || limits.wall_time_limit <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "wall_time_limit must be a positive number of seconds, got {}",
                limits.wall_time_limit
            )));
        }
        if limits.cpu_time_limit == 0 {
            return Err(ConfigError::Invalid(
                "cpu_time_limit must be at least 1 second".to_string(),
            ));
        }
        if limits.max_output_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max_output_bytes must be positive".to_string(),
            ));
        }
        if limits.max_snippet_len == 0 {
            return Err(ConfigError::Invalid(
                "max_snippet_len must be positive".to_string(),
            ));
        }

        Ok(())
    }
}
