//! Execution engine for snipcube
//!
//! Runs one request through the whole pipeline: validation, admission,
//! spawning, supervision and classification. Every failure comes back as an
//! [`ExecutionOutcome`]; nothing is returned as an error.

use std::sync::Arc;

use tracing::{error, info, instrument, warn};

pub use crate::runner::format::{finish, summarize};
pub use crate::runner::validate::validate;

mod format;
mod validate;

use crate::{
    admission::Admission,
    config::Config,
    sandbox::{ProcessSandbox, Spawner, supervise},
    types::{ExecutionOutcome, ExecutionRequest, RejectReason},
};

/// High-level entry point for snippet execution
#[derive(Debug)]
pub struct Engine<S: Spawner = ProcessSandbox> {
    config: Config,
    spawner: S,
    admission: Arc<Admission>,
}

impl Engine {
    /// Create an engine that spawns the configured interpreter
    pub fn new(config: Config) -> Self {
        let spawner = ProcessSandbox::new(config.interpreter.clone());
        Self::with_spawner(config, spawner)
    }

    /// Create an engine with the default configuration
    pub fn with_defaults() -> Self {
        Self::new(Config::default())
    }
}

impl<S: Spawner> Engine<S> {
    /// Create an engine with a custom spawner and its own admission slots.
    ///
    /// A concurrency of zero is raised to one slot.
    pub fn with_spawner(config: Config, spawner: S) -> Self {
        if config.concurrency == 0 {
            warn!("concurrency of 0 would reject every request, using 1");
        }
        let admission = Arc::new(Admission::new(config.concurrency.max(1)));
        Self {
            config,
            spawner,
            admission,
        }
    }

    /// Share an admission budget with other engines
    pub fn with_admission(mut self, admission: Arc<Admission>) -> Self {
        self.admission = admission;
        self
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the admission controller
    pub fn admission(&self) -> &Arc<Admission> {
        &self.admission
    }

    /// Get the spawner
    pub fn spawner(&self) -> &S {
        &self.spawner
    }

    /// Build a request carrying the configured default limits
    pub fn request(&self, snippet: impl Into<String>, input: Option<String>) -> ExecutionRequest {
        ExecutionRequest {
            snippet: snippet.into(),
            input,
            limits: self.config.limits.clone(),
        }
    }

    /// Run a snippet and classify how it ended
    #[instrument(skip(self, request), fields(snippet_len = request.snippet.len()))]
    pub async fn execute(&self, request: ExecutionRequest) -> ExecutionOutcome {
        if let Err(reason) = validate(&request) {
            info!(?reason, "request rejected");
            return ExecutionOutcome::Rejected { reason };
        }

        let Some(_permit) = self.admission.try_acquire() else {
            info!("request rejected, no free slots");
            return ExecutionOutcome::Rejected {
                reason: RejectReason::Busy,
            };
        };

        let handle = match self.spawner.spawn(&request) {
            Ok(handle) => handle,
            Err(e) => {
                error!(error = %e, "failed to start sandbox");
                return ExecutionOutcome::Rejected {
                    reason: RejectReason::SpawnFailed,
                };
            }
        };

        let max_output = request.limits.max_output_bytes;
        match supervise(handle, max_output, self.config.poll_interval()).await {
            Ok((collected, report)) => {
                let outcome = finish(&report, &collected, max_output);
                info!(
                    termination = ?report.termination,
                    killed_by_deadline = report.killed_by_deadline,
                    cpu_time = ?report.cpu_time,
                    output_bytes = collected.bytes.len(),
                    success = outcome.is_success(),
                    "execution finished"
                );
                outcome
            }
            Err(e) => {
                error!(error = %e, "failed to supervise sandbox");
                ExecutionOutcome::RuntimeError {
                    message: "the sandbox could not be supervised".to_string(),
                }
            }
        }
    }
}
