use std::fs;
use std::io::ErrorKind;
use std::os::unix::fs::PermissionsExt;
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use nix::sys::resource::{Resource, setrlimit};
use nix::unistd::{Gid, Uid, setgid, setuid};
use snipcube::runner::finish;
use snipcube::sandbox::{Collected, ExitReport, Termination};
use snipcube::types::{ExecutionOutcome, Limits, ResourceKind};

use super::{EVAL_BIN, engine_with, running_as_root};

/// Unprivileged account the root-only test drops to
const NOBODY: u32 = 65534;

#[tokio::test]
async fn test_infinite_loop_times_out() {
    let limits = Limits::new()
        .with_wall_time_limit(3.0)
        .with_cpu_time_limit(10);
    let engine = engine_with(limits);
    let started = Instant::now();

    let outcome = engine.execute(engine.request("loop {}", None)).await;

    let elapsed = started.elapsed();
    assert!(
        matches!(outcome, ExecutionOutcome::TimedOut { .. }),
        "got {outcome:?}"
    );
    assert!(elapsed >= Duration::from_secs(3));
    assert!(elapsed < Duration::from_secs(5), "took {elapsed:?}");
    assert_eq!(outcome.to_string(), "timed out");
}

#[tokio::test]
async fn test_timeout_keeps_partial_output() {
    let limits = Limits::new()
        .with_wall_time_limit(1.0)
        .with_cpu_time_limit(10);
    let engine = engine_with(limits);

    let outcome = engine
        .execute(engine.request(r#"print("started"); loop {}"#, None))
        .await;

    assert_eq!(
        outcome,
        ExecutionOutcome::TimedOut {
            partial_output: b"started".to_vec()
        }
    );
}

#[tokio::test]
async fn test_cpu_limit_is_resource_exceeded() {
    let limits = Limits::new()
        .with_wall_time_limit(10.0)
        .with_cpu_time_limit(1);
    let engine = engine_with(limits);
    let started = Instant::now();

    let outcome = engine.execute(engine.request("loop {}", None)).await;

    assert!(
        matches!(
            outcome,
            ExecutionOutcome::ResourceExceeded {
                kind: ResourceKind::Cpu,
                ..
            }
        ),
        "got {outcome:?}"
    );
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(outcome.to_string(), "used too much CPU time");
}

#[tokio::test]
async fn test_memory_limit_is_resource_exceeded() {
    let limits = Limits::new()
        .with_memory_limit(128 * Limits::MIB)
        .with_cpu_time_limit(5)
        .with_wall_time_limit(10.0);
    let engine = engine_with(limits);

    let outcome = engine
        .execute(engine.request(r#"let s = "xxxxxxxx"; loop { s += s; }"#, None))
        .await;

    assert!(
        matches!(
            outcome,
            ExecutionOutcome::ResourceExceeded {
                kind: ResourceKind::Memory,
                ..
            }
        ),
        "got {outcome:?}"
    );
    assert_eq!(outcome.to_string(), "used too much memory");
}

#[tokio::test]
async fn test_process_ceiling_is_resource_exceeded() {
    if running_as_root() {
        eprintln!(
            "skipping: RLIMIT_NPROC is not enforced for root, \
             see test_process_ceiling_as_unprivileged_user"
        );
        return;
    }
    let engine = engine_with(Limits::new().with_max_processes(0));

    let outcome = engine
        .execute(engine.request(r#"spawn("/bin/true")"#, None))
        .await;

    assert_eq!(
        outcome,
        ExecutionOutcome::ResourceExceeded {
            partial_output: Vec::new(),
            kind: ResourceKind::ProcessCount
        }
    );
    assert_eq!(outcome.to_string(), "tried to start too many processes");
}

#[tokio::test]
async fn test_missing_program_is_runtime_error() {
    // Clamped to the current hard limit, so the spawn itself is allowed
    let engine = engine_with(Limits::new().with_max_processes(u64::MAX));

    let outcome = engine
        .execute(engine.request(r#"spawn("/nonexistent/program")"#, None))
        .await;

    match outcome {
        ExecutionOutcome::RuntimeError { message } => {
            assert!(message.contains("/nonexistent/program"), "message: {message}");
        }
        other => panic!("expected a runtime error, got {other:?}"),
    }
}

#[test]
fn test_process_ceiling_as_unprivileged_user() {
    if !running_as_root() {
        eprintln!("skipping: dropping to another user needs root");
        return;
    }

    // The build directory is usually private to root, so run a copy
    let eval_copy = std::env::temp_dir().join(format!("snipcube-eval-{}", std::process::id()));
    fs::copy(EVAL_BIN, &eval_copy).expect("Failed to copy interpreter");
    fs::set_permissions(&eval_copy, fs::Permissions::from_mode(0o755))
        .expect("Failed to make interpreter executable");

    let mut command = Command::new(&eval_copy);
    command
        .arg(r#"spawn("/bin/true")"#)
        .env_clear()
        .stdin(Stdio::null())
        .stderr(Stdio::null());
    // SAFETY: only setgid, setuid and setrlimit run between fork and exec
    unsafe {
        command.pre_exec(|| {
            setgid(Gid::from_raw(NOBODY))?;
            setuid(Uid::from_raw(NOBODY))?;
            setrlimit(Resource::RLIMIT_NPROC, 0, 0)?;
            Ok(())
        });
    }
    let result = command.output();
    let _ = fs::remove_file(&eval_copy);

    let output = match result {
        Ok(output) => output,
        Err(e) if e.kind() == ErrorKind::PermissionDenied => {
            eprintln!("skipping: interpreter copy is not executable by nobody: {e}");
            return;
        }
        Err(e) => panic!("Failed to run interpreter: {e}"),
    };

    assert_eq!(output.stdout, b"limit: processes\n");
    assert_eq!(output.status.code(), Some(2));

    let report = ExitReport {
        termination: Termination::from_status(output.status),
        killed_by_deadline: false,
        cpu_time: None,
        cpu_limit: Duration::from_secs(2),
    };
    let collected = Collected {
        bytes: output.stdout,
        overflowed: false,
        eof: true,
    };
    assert_eq!(
        finish(&report, &collected, 400),
        ExecutionOutcome::ResourceExceeded {
            partial_output: Vec::new(),
            kind: ResourceKind::ProcessCount
        }
    );
    assert!(output.status.signal().is_none());
}
