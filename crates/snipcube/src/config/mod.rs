use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

pub use crate::config::interpreter::{
    DEFAULT_SANDBOX_PATH, InterpreterConfig, SNIPPET_PLACEHOLDER,
};
use crate::sandbox::MIN_POLL_INTERVAL;
use crate::types::Limits;

pub mod interpreter;
mod loader;

/// Example configuration embedded at compile time.
///
/// Library users can access this to generate a starter config file.
pub const EXAMPLE_CONFIG: &str = include_str!("../../snipcube.example.toml");

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse config: {0}")]
    Parse(#[from] config::ConfigError),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Config for snipcube
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Number of executions admitted at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Output collector wake-up period in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Interpreter started inside each sandbox
    #[serde(default)]
    pub interpreter: InterpreterConfig,

    /// Default limits applied to requests built by the engine.
    /// Requests carrying their own limits are not merged with these.
    #[serde(default)]
    pub limits: Limits,
}

impl Config {
    /// Create a new config from the embedded example
    pub fn new() -> Self {
        Self::default()
    }

    /// Collector wake-up period, never shorter than one millisecond
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms).max(MIN_POLL_INTERVAL)
    }

    /// Replace the interpreter command
    pub fn with_interpreter_command(
        mut self,
        command: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.interpreter.command = command.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the default limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Replace the admission slot count
    pub fn with_concurrency(mut self, slots: usize) -> Self {
        self.concurrency = slots;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::parse_toml(EXAMPLE_CONFIG).expect("embedded default config should be valid")
    }
}

fn default_concurrency() -> usize {
    1
}

fn default_poll_interval_ms() -> u64 {
    50
}
