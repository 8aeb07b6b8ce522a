//! Resource limits applied inside the child before the interpreter starts

use std::io;

use nix::sys::resource::{Resource, getrlimit, setrlimit};
use nix::unistd::{Pid, setpgid};

use crate::types::Limits;

/// rlimit values for one sandboxed child
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RlimitPlan {
    /// RLIMIT_CPU soft limit in seconds; SIGXCPU is delivered here
    pub cpu_seconds: u64,

    /// RLIMIT_AS in bytes
    pub address_space: u64,

    /// RLIMIT_NPROC
    pub processes: u64,
}

impl RlimitPlan {
    pub fn from_limits(limits: &Limits) -> Self {
        Self {
            cpu_seconds: limits.cpu_time_limit,
            address_space: limits.memory_limit,
            processes: limits.max_processes,
        }
    }

    /// Hard CPU limit: one second past the soft limit the kernel sends SIGKILL
    pub fn cpu_hard_limit(&self) -> u64 {
        self.cpu_seconds.saturating_add(1)
    }

    /// Apply the limits to the calling process.
    ///
    /// Order matters: CPU, address space, process count, then core dumps.
    /// Limits are never raised above the current hard limit.
    pub fn apply(&self) -> nix::Result<()> {
        lower_limit(Resource::RLIMIT_CPU, self.cpu_seconds, self.cpu_hard_limit())?;
        lower_limit(Resource::RLIMIT_AS, self.address_space, self.address_space)?;
        lower_limit(Resource::RLIMIT_NPROC, self.processes, self.processes)?;
        lower_limit(Resource::RLIMIT_CORE, 0, 0)?;
        Ok(())
    }
}

fn lower_limit(resource: Resource, soft: u64, hard: u64) -> nix::Result<()> {
    let (_, current_hard) = getrlimit(resource)?;
    let hard = hard.min(current_hard);
    setrlimit(resource, soft.min(hard), hard)
}

/// Runs in the forked child between fork and exec.
///
/// Only async-signal-safe system calls are made here: the child is a copy of
/// a multi-threaded parent and must not allocate or take locks.
pub(crate) fn prepare_child(plan: RlimitPlan) -> io::Result<()> {
    // Own process group so the deadline kill reaches anything the snippet starts
    setpgid(Pid::from_raw(0), Pid::from_raw(0))?;
    plan.apply()?;
    Ok(())
}
