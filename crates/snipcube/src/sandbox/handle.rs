use std::time::Duration;

use nix::errno::Errno;
use nix::sys::signal::{Signal, killpg};
use nix::unistd::Pid;
use tokio::net::unix::pipe;
use tokio::process::{Child, ChildStdin};
use tokio::time::Instant;
use tracing::{debug, warn};

/// Input waiting to be written to the child's stdin
#[derive(Debug)]
pub struct PendingInput {
    pub stdin: ChildStdin,
    pub data: Vec<u8>,
}

/// A running sandboxed child
///
/// Owns the child process, the read end of its output pipe and its stdin.
///
/// # Reaping
///
/// The child must be reaped through [`reap()`](Self::reap) before the handle
/// is dropped. Dropping an unreaped handle kills the child's process group and
/// leaves the final wait to tokio's background reaper, logging a warning.
#[derive(Debug)]
pub struct SandboxHandle {
    /// Process ID, also the process group ID
    pid: i32,

    pub(super) child: Child,

    /// Read end of the output pipe
    output: Option<pipe::Receiver>,

    input: Option<PendingInput>,

    /// Absolute wall clock deadline
    pub(super) deadline: Instant,

    /// CPU time the child is allowed before SIGXCPU
    pub(super) cpu_limit: Duration,

    /// Whether the child has been waited for
    pub(super) reaped: bool,
}

impl SandboxHandle {
    pub(crate) fn new(
        pid: i32,
        child: Child,
        output: pipe::Receiver,
        input: Option<PendingInput>,
        deadline: Instant,
        cpu_limit: Duration,
    ) -> Self {
        Self {
            pid,
            child,
            output: Some(output),
            input,
            deadline,
            cpu_limit,
            reaped: false,
        }
    }

    /// Get the child's process ID
    pub fn pid(&self) -> i32 {
        self.pid
    }

    /// Get the wall clock deadline
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Check if the child has been reaped
    pub fn is_reaped(&self) -> bool {
        self.reaped
    }

    /// Take ownership of the output pipe
    pub fn take_output(&mut self) -> Option<pipe::Receiver> {
        self.output.take()
    }

    /// Take ownership of the pending stdin data
    pub fn take_input(&mut self) -> Option<PendingInput> {
        self.input.take()
    }

    /// Send SIGKILL to the child's process group.
    ///
    /// Safe to repeat and safe after the child exited on its own. Once the
    /// child is reaped its ID may be reused, so this becomes a no-op.
    pub fn kill(&self) {
        if self.reaped {
            return;
        }
        match killpg(Pid::from_raw(self.pid), Signal::SIGKILL) {
            Ok(()) => debug!(pid = self.pid, "sent SIGKILL to sandbox"),
            Err(Errno::ESRCH) => {}
            Err(e) => warn!(pid = self.pid, error = %e, "failed to kill sandbox process group"),
        }
    }
}

impl Drop for SandboxHandle {
    fn drop(&mut self) {
        if !self.reaped {
            warn!(
                pid = self.pid,
                "SandboxHandle dropped before the child was reaped; \
                 killing it and leaving the wait to the runtime"
            );
            self.kill();
        }
    }
}
