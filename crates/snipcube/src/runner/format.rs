//! Classification of a finished sandbox into an [`ExecutionOutcome`]

use nix::sys::signal::Signal;

use crate::protocol::{Trailer, mentions_alloc_failure};
use crate::sandbox::{Collected, ExitReport, Termination};
use crate::types::{ExecutionOutcome, ResourceKind};

const SIGXCPU: i32 = Signal::SIGXCPU as i32;
const SIGKILL: i32 = Signal::SIGKILL as i32;
const SIGABRT: i32 = Signal::SIGABRT as i32;
const SIGSEGV: i32 = Signal::SIGSEGV as i32;
const SIGBUS: i32 = Signal::SIGBUS as i32;
const SIGPIPE: i32 = Signal::SIGPIPE as i32;

/// Turn a reaped child and its captured output into an outcome
pub fn finish(report: &ExitReport, collected: &Collected, max_output: usize) -> ExecutionOutcome {
    if report.killed_by_deadline {
        return ExecutionOutcome::TimedOut {
            partial_output: summarize(&collected.bytes, max_output).0,
        };
    }

    match report.termination {
        Termination::Signaled(signal) => finish_signaled(signal, report, collected, max_output),
        Termination::Exited(0) => {
            let (output, truncated) = summarize(&collected.bytes, max_output);
            ExecutionOutcome::Completed { output, truncated }
        }
        Termination::Exited(code) => finish_failed(code, collected, max_output),
    }
}

fn finish_signaled(
    signal: i32,
    report: &ExitReport,
    collected: &Collected,
    max_output: usize,
) -> ExecutionOutcome {
    let exceeded = |kind| ExecutionOutcome::ResourceExceeded {
        partial_output: summarize(&collected.bytes, max_output).0,
        kind,
    };

    match signal {
        SIGXCPU => exceeded(ResourceKind::Cpu),
        // Sent by the kernel at the hard CPU limit when SIGXCPU was ignored
        SIGKILL if report.cpu_exhausted() => exceeded(ResourceKind::Cpu),
        SIGABRT | SIGSEGV | SIGBUS if mentions_alloc_failure(&collected.bytes) => {
            exceeded(ResourceKind::Memory)
        }
        SIGPIPE if collected.overflowed => ExecutionOutcome::Completed {
            output: summarize(&collected.bytes, max_output).0,
            truncated: true,
        },
        _ => ExecutionOutcome::Signaled {
            signal,
            partial_output: summarize(&collected.bytes, max_output).0,
        },
    }
}

fn finish_failed(code: i32, collected: &Collected, max_output: usize) -> ExecutionOutcome {
    match Trailer::from_output(&collected.bytes) {
        Some(Trailer::Limit(kind)) => ExecutionOutcome::ResourceExceeded {
            partial_output: summarize(without_last_line(&collected.bytes), max_output).0,
            kind,
        },
        Some(Trailer::Error(message)) => ExecutionOutcome::RuntimeError {
            message: clip(message, max_output),
        },
        None if mentions_alloc_failure(&collected.bytes) => ExecutionOutcome::ResourceExceeded {
            partial_output: summarize(&collected.bytes, max_output).0,
            kind: ResourceKind::Memory,
        },
        None => ExecutionOutcome::RuntimeError {
            message: format!("exited with status {code}"),
        },
    }
}

/// Shape raw output for a short reply.
///
/// Cuts to `max_output` bytes, drops one trailing newline and collapses
/// multi-line output to its first line plus a count of the rest. The flag
/// reports whether bytes were cut.
pub fn summarize(bytes: &[u8], max_output: usize) -> (Vec<u8>, bool) {
    let truncated = bytes.len() > max_output;
    let mut kept = &bytes[..bytes.len().min(max_output)];
    if let Some(rest) = kept.strip_suffix(b"\n") {
        kept = rest;
    }

    let mut lines = kept.split(|&b| b == b'\n');
    let first = lines.next().unwrap_or_default();
    let more = lines.count();

    let mut output = first.to_vec();
    if more > 0 {
        output.extend_from_slice(format!(" (+{more} more lines)").as_bytes());
    }
    (output, truncated)
}

/// Output with its final non-empty line removed
fn without_last_line(bytes: &[u8]) -> &[u8] {
    let end = bytes
        .iter()
        .rposition(|&b| !b.is_ascii_whitespace())
        .map_or(0, |i| i + 1);
    match bytes[..end].iter().rposition(|&b| b == b'\n') {
        Some(newline) => &bytes[..=newline],
        None => &[],
    }
}

fn clip(mut message: String, max_len: usize) -> String {
    if message.len() > max_len {
        let mut end = max_len;
        while !message.is_char_boundary(end) {
            end -= 1;
        }
        message.truncate(end);
    }
    message
}
