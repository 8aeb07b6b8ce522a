use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;
use std::time::Duration;

use nix::errno::Errno;
use nix::sys::signal::Signal;
use nix::sys::wait::{Id, WaitPidFlag, WaitStatus, waitid};
use nix::unistd::{Pid, SysconfVar, sysconf};
use tokio::signal::unix::{SignalKind, signal};
use tokio::time::timeout_at;
use tracing::{debug, instrument, warn};

use crate::sandbox::SandboxError;
use crate::sandbox::handle::SandboxHandle;

/// Clock tick rate assumed when `sysconf` cannot report one
const DEFAULT_CLOCK_TICKS: u64 = 100;

/// How the child ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Exited with a status code
    Exited(i32),

    /// Terminated by a signal
    Signaled(i32),
}

impl Termination {
    pub fn from_status(status: ExitStatus) -> Self {
        match (status.code(), status.signal()) {
            (Some(code), _) => Termination::Exited(code),
            (None, Some(signal)) => Termination::Signaled(signal),
            // Stopped or continued children are never reported by wait()
            (None, None) => Termination::Exited(-1),
        }
    }

    /// Get the terminating signal, if any
    pub fn signal(&self) -> Option<i32> {
        match self {
            Termination::Signaled(signal) => Some(*signal),
            Termination::Exited(_) => None,
        }
    }
}

/// Result of reaping a sandboxed child
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitReport {
    pub termination: Termination,

    /// The SIGKILL came from the wall clock deadline
    pub killed_by_deadline: bool,

    /// CPU time the child used, read before it was reaped
    pub cpu_time: Option<Duration>,

    /// CPU time the child was allowed
    pub cpu_limit: Duration,
}

impl ExitReport {
    /// Check if the child used up its CPU allowance.
    ///
    /// The kernel sends SIGKILL at the hard CPU limit, so a child that ignores
    /// SIGXCPU dies of SIGKILL with at least the soft limit consumed.
    pub fn cpu_exhausted(&self) -> bool {
        self.cpu_time.is_some_and(|used| used >= self.cpu_limit)
    }
}

impl SandboxHandle {
    /// Wait for the child, killing its process group at the deadline.
    ///
    /// The child is waited for exactly once whichever branch is taken. Its
    /// CPU usage is read while it is still a zombie.
    #[instrument(skip(self), fields(pid = self.pid()))]
    pub async fn reap(&mut self) -> Result<ExitReport, SandboxError> {
        let timed_out = match timeout_at(self.deadline, self.wait_exited()).await {
            Ok(result) => {
                self.abandon_on_error(result)?;
                false
            }
            Err(_) => {
                debug!("wall clock deadline reached");
                self.kill();
                let result = self.wait_exited().await;
                self.abandon_on_error(result)?;
                true
            }
        };

        let cpu_time = read_cpu_time(self.pid()).await;
        let status = match self.child.wait().await {
            Ok(status) => status,
            Err(e) => {
                self.kill();
                return Err(SandboxError::Wait(e));
            }
        };
        self.reaped = true;

        let termination = Termination::from_status(status);
        let killed_by_deadline =
            timed_out && termination == Termination::Signaled(Signal::SIGKILL as i32);

        if timed_out && !killed_by_deadline {
            warn!(?termination, "child ended on its own after the deadline");
        }
        debug!(?termination, killed_by_deadline, ?cpu_time, "child reaped");

        Ok(ExitReport {
            termination,
            killed_by_deadline,
            cpu_time,
            cpu_limit: self.cpu_limit,
        })
    }

    /// Wait until the child has exited without reaping it
    async fn wait_exited(&self) -> Result<(), SandboxError> {
        let mut sigchld = signal(SignalKind::child())?;
        let pid = Pid::from_raw(self.pid());
        let flags = WaitPidFlag::WEXITED | WaitPidFlag::WNOHANG | WaitPidFlag::WNOWAIT;

        loop {
            match waitid(Id::Pid(pid), flags) {
                Ok(WaitStatus::StillAlive) => {
                    if sigchld.recv().await.is_none() {
                        return Ok(());
                    }
                }
                Ok(_) => return Ok(()),
                Err(Errno::EINTR) => {}
                Err(e) => return Err(SandboxError::Wait(e.into())),
            }
        }
    }

    /// Kill the group when the child could not be waited for.
    ///
    /// The handle stays unreaped so its `Drop` still runs the cleanup.
    fn abandon_on_error(&self, result: Result<(), SandboxError>) -> Result<(), SandboxError> {
        if let Err(e) = &result {
            warn!(error = %e, "failed to wait for sandbox");
            self.kill();
        }
        result
    }
}

/// Read the user plus system CPU time of an exited, unreaped child
async fn read_cpu_time(pid: i32) -> Option<Duration> {
    let stat = tokio::fs::read_to_string(format!("/proc/{pid}/stat"))
        .await
        .ok()?;
    let ticks = parse_cpu_ticks(&stat)?;
    let per_second = clock_ticks_per_second();
    Some(Duration::from_millis(ticks.saturating_mul(1000) / per_second))
}

/// Sum the `utime` and `stime` fields of a `/proc/<pid>/stat` line.
///
/// The command name may contain spaces and parentheses, so fields are
/// counted from the last closing parenthesis.
fn parse_cpu_ticks(stat: &str) -> Option<u64> {
    let (_, fields) = stat.rsplit_once(')')?;
    let mut fields = fields.split_whitespace().skip(11);
    let utime: u64 = fields.next()?.parse().ok()?;
    let stime: u64 = fields.next()?.parse().ok()?;
    Some(utime.saturating_add(stime))
}

fn clock_ticks_per_second() -> u64 {
    match sysconf(SysconfVar::CLK_TCK) {
        Ok(Some(ticks)) => u64::try_from(ticks)
            .ok()
            .filter(|&ticks| ticks > 0)
            .unwrap_or(DEFAULT_CLOCK_TICKS),
        _ => DEFAULT_CLOCK_TICKS,
    }
}
