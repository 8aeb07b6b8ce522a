//! Process sandbox for snippet execution
//!
//! Each execution runs the interpreter as a child in its own process group
//! with rlimits applied between fork and exec. The parent then drives three
//! things at once until the child is gone: reading its merged output, feeding
//! its stdin and waiting for it against the wall clock deadline.

use std::time::Duration;

use thiserror::Error;

pub use crate::sandbox::collect::{Collected, MIN_POLL_INTERVAL, collect_output, feed_input};
pub use crate::sandbox::handle::{PendingInput, SandboxHandle};
pub use crate::sandbox::limits::RlimitPlan;
pub use crate::sandbox::reap::{ExitReport, Termination};
pub use crate::sandbox::spawn::ProcessSandbox;

mod collect;
mod handle;
mod limits;
mod reap;
mod spawn;

use crate::types::ExecutionRequest;

/// Errors that occur while starting or supervising a sandbox
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("interpreter command is empty")]
    EmptyCommand,

    #[error("failed to create output pipe: {0}")]
    Pipe(#[from] nix::Error),

    #[error("failed to spawn interpreter: {0}")]
    SpawnFailed(#[source] std::io::Error),

    #[error("spawned child has no process ID")]
    MissingPid,

    #[error("failed to wait for child: {0}")]
    Wait(#[source] std::io::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Starts sandboxed children
///
/// [`ProcessSandbox`] is the real implementation. The engine is generic over
/// this trait so tests can observe whether a spawn was attempted.
pub trait Spawner: Send + Sync {
    /// Start the interpreter for `request` under its limits
    fn spawn(&self, request: &ExecutionRequest) -> Result<SandboxHandle, SandboxError>;
}

/// Drive a spawned sandbox to completion.
///
/// Output collection, stdin feeding and reaping run concurrently so a child
/// blocked on a full pipe or an unread stdin can never stall the others.
/// Returns once the child has been reaped and the collector has stopped.
pub async fn supervise(
    mut handle: SandboxHandle,
    max_output: usize,
    poll_interval: Duration,
) -> Result<(Collected, ExitReport), SandboxError> {
    let deadline = handle.deadline();
    let output = handle.take_output();
    let input = handle.take_input();

    let (collected, (), report) = tokio::join!(
        collect_output(output, deadline, max_output, poll_interval),
        feed_input(input, deadline),
        handle.reap(),
    );

    Ok((collected, report?))
}
