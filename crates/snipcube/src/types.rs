use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Resource limits applied to a single snippet execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Maximum snippet (and input) length in characters
    pub max_snippet_len: usize,

    /// Maximum captured output in bytes
    pub max_output_bytes: usize,

    /// CPU time limit in whole seconds
    pub cpu_time_limit: u64,

    /// Address space limit in bytes
    pub memory_limit: u64,

    /// Maximum number of processes the snippet may start (normally 0)
    pub max_processes: u64,

    /// Wall clock time limit in seconds
    pub wall_time_limit: f64,
}

impl Limits {
    /// 1 kibibyte in bytes
    pub const KIB: u64 = 1024;
    /// 1 mebibyte in bytes
    pub const MIB: u64 = 1024 * 1024;
    /// 1 gibibyte in bytes
    pub const GIB: u64 = 1024 * 1024 * 1024;

    /// Create limits with the default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum snippet length in characters
    pub fn with_max_snippet_len(mut self, chars: usize) -> Self {
        self.max_snippet_len = chars;
        self
    }

    /// Set the maximum captured output in bytes
    pub fn with_max_output_bytes(mut self, bytes: usize) -> Self {
        self.max_output_bytes = bytes;
        self
    }

    /// Set the CPU time limit in seconds
    pub fn with_cpu_time_limit(mut self, seconds: u64) -> Self {
        self.cpu_time_limit = seconds;
        self
    }

    /// Set the address space limit in bytes
    pub fn with_memory_limit(mut self, bytes: u64) -> Self {
        self.memory_limit = bytes;
        self
    }

    /// Set the maximum number of processes
    pub fn with_max_processes(mut self, count: u64) -> Self {
        self.max_processes = count;
        self
    }

    /// Set the wall clock time limit in seconds
    pub fn with_wall_time_limit(mut self, seconds: f64) -> Self {
        self.wall_time_limit = seconds;
        self
    }

    /// Wall clock limit as a duration.
    ///
    /// Negative, NaN or overflowing values collapse to zero, which makes the
    /// deadline expire immediately.
    pub fn wall_time(&self) -> Duration {
        Duration::try_from_secs_f64(self.wall_time_limit).unwrap_or(Duration::ZERO)
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_snippet_len: 1000,
            max_output_bytes: 400,
            cpu_time_limit: 2,
            memory_limit: 128 * Self::MIB,
            max_processes: 0,
            wall_time_limit: 5.0,
        }
    }
}

/// A snippet submitted for execution
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    /// Source snippet handed to the interpreter
    pub snippet: String,

    /// Data fed to the interpreter's standard input
    pub input: Option<String>,

    /// Limits for this execution
    pub limits: Limits,
}

impl ExecutionRequest {
    /// Create a request with default limits and no input
    pub fn new(snippet: impl Into<String>) -> Self {
        Self {
            snippet: snippet.into(),
            input: None,
            limits: Limits::default(),
        }
    }

    /// Attach standard input data
    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.input = Some(input.into());
        self
    }

    /// Replace the limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }
}

/// Which resource ceiling a snippet ran into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceKind {
    #[serde(rename = "cpu")]
    Cpu,

    #[serde(rename = "memory")]
    Memory,

    #[serde(rename = "processes")]
    ProcessCount,
}

impl ResourceKind {
    /// Name used in interpreter trailer lines
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Cpu => "cpu",
            ResourceKind::Memory => "memory",
            ResourceKind::ProcessCount => "processes",
        }
    }

    /// Parse a trailer name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "cpu" => Some(ResourceKind::Cpu),
            "memory" => Some(ResourceKind::Memory),
            "processes" => Some(ResourceKind::ProcessCount),
            _ => None,
        }
    }
}

/// Why a request never reached (or never finished starting) a sandbox
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    /// Snippet or input exceeds the length cap
    InputTooLong,

    /// Snippet or input contains a NUL byte, which cannot cross `exec`
    InvalidInput,

    /// Every admission slot is taken
    Busy,

    /// The host could not create the sandboxed process
    SpawnFailed,
}

/// Classified result of one execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// Exited successfully
    Completed { output: Vec<u8>, truncated: bool },

    /// Killed at the wall clock deadline
    TimedOut { partial_output: Vec<u8> },

    /// Stopped by a CPU, memory or process-count ceiling
    ResourceExceeded {
        partial_output: Vec<u8>,
        kind: ResourceKind,
    },

    /// Killed by a signal the engine did not send
    Signaled { signal: i32, partial_output: Vec<u8> },

    /// The snippet ran and reported an error
    RuntimeError { message: String },

    /// No execution took place
    Rejected { reason: RejectReason },
}

impl ExecutionOutcome {
    /// Check if the snippet ran to a successful exit
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionOutcome::Completed { .. })
    }

    /// Check if the failure lies with the host rather than the snippet
    #[must_use]
    pub fn is_infrastructure_failure(&self) -> bool {
        matches!(
            self,
            ExecutionOutcome::Rejected {
                reason: RejectReason::SpawnFailed
            }
        )
    }

    /// Output captured before the execution ended, if any was kept
    pub fn output(&self) -> Option<&[u8]> {
        match self {
            ExecutionOutcome::Completed { output, .. } => Some(output),
            ExecutionOutcome::TimedOut { partial_output }
            | ExecutionOutcome::ResourceExceeded { partial_output, .. }
            | ExecutionOutcome::Signaled { partial_output, .. } => Some(partial_output),
            ExecutionOutcome::RuntimeError { .. } | ExecutionOutcome::Rejected { .. } => None,
        }
    }
}

/// Short reply text for the requester
impl fmt::Display for ExecutionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionOutcome::Completed { output, .. } if output.is_empty() => {
                write!(f, "(no output)")
            }
            ExecutionOutcome::Completed { output, .. } => {
                write!(f, "{}", String::from_utf8_lossy(output))
            }
            ExecutionOutcome::TimedOut { .. } => write!(f, "timed out"),
            ExecutionOutcome::ResourceExceeded { kind, .. } => match kind {
                ResourceKind::Cpu => write!(f, "used too much CPU time"),
                ResourceKind::Memory => write!(f, "used too much memory"),
                ResourceKind::ProcessCount => write!(f, "tried to start too many processes"),
            },
            ExecutionOutcome::Signaled { signal, .. } => write!(f, "was killed (signal {signal})"),
            ExecutionOutcome::RuntimeError { message } => write!(f, "error: `{message}`"),
            ExecutionOutcome::Rejected { reason } => match reason {
                RejectReason::InputTooLong => write!(f, "too long"),
                RejectReason::InvalidInput => write!(f, "can't contain NUL bytes"),
                RejectReason::Busy => write!(f, "busy, try again"),
                RejectReason::SpawnFailed => write!(f, "could not start the sandbox"),
            },
        }
    }
}
