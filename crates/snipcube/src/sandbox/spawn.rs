use std::process::Stdio;
use std::time::Duration;

use nix::fcntl::OFlag;
use nix::unistd::pipe2;
use tokio::net::unix::pipe;
use tokio::process::Command;
use tokio::time::Instant;
use tracing::{debug, instrument};

use crate::config::InterpreterConfig;
use crate::sandbox::handle::{PendingInput, SandboxHandle};
use crate::sandbox::limits::{RlimitPlan, prepare_child};
use crate::sandbox::{SandboxError, Spawner};
use crate::types::ExecutionRequest;

/// Deadline used when the configured wall time does not fit in an `Instant`
const MAX_WALL_TIME: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Spawns the configured interpreter as an rlimited child process
#[derive(Debug, Clone)]
pub struct ProcessSandbox {
    interpreter: InterpreterConfig,
}

impl ProcessSandbox {
    pub fn new(interpreter: InterpreterConfig) -> Self {
        Self { interpreter }
    }

    pub fn interpreter(&self) -> &InterpreterConfig {
        &self.interpreter
    }
}

impl Spawner for ProcessSandbox {
    #[instrument(skip(self, request), fields(snippet_len = request.snippet.len()))]
    fn spawn(&self, request: &ExecutionRequest) -> Result<SandboxHandle, SandboxError> {
        let args = self.interpreter.expand_command(&request.snippet);
        let (program, rest) = args.split_first().ok_or(SandboxError::EmptyCommand)?;

        let (read_end, write_end) = pipe2(OFlag::O_CLOEXEC)?;
        let stderr_end = write_end.try_clone()?;
        let output = pipe::Receiver::from_owned_fd(read_end)?;

        let mut command = Command::new(program);
        command
            .args(rest)
            .env_clear()
            .env("PATH", &self.interpreter.path)
            .envs(&self.interpreter.env)
            .stdout(Stdio::from(write_end))
            .stderr(Stdio::from(stderr_end))
            .kill_on_drop(true);

        if request.input.is_some() {
            command.stdin(Stdio::piped());
        } else {
            command.stdin(Stdio::null());
        }

        let plan = RlimitPlan::from_limits(&request.limits);
        // SAFETY: prepare_child only performs async-signal-safe syscalls
        unsafe {
            command.pre_exec(move || prepare_child(plan));
        }

        let mut child = command.spawn().map_err(SandboxError::SpawnFailed)?;
        // Close the parent's write ends so EOF follows the child
        drop(command);

        let now = Instant::now();
        let deadline = now
            .checked_add(request.limits.wall_time())
            .unwrap_or(now + MAX_WALL_TIME);
        let pid = match child.id().and_then(|id| i32::try_from(id).ok()) {
            Some(pid) => pid,
            None => return Err(SandboxError::MissingPid),
        };

        let input = match (child.stdin.take(), &request.input) {
            (Some(stdin), Some(data)) => Some(PendingInput {
                stdin,
                data: data.clone().into_bytes(),
            }),
            _ => None,
        };

        debug!(pid, program = %program, "sandbox started");
        Ok(SandboxHandle::new(
            pid,
            child,
            output,
            input,
            deadline,
            Duration::from_secs(request.limits.cpu_time_limit),
        ))
    }
}
