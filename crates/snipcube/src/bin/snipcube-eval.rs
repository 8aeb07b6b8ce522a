//! Interpreter started inside each sandbox.
//!
//! Usage: `snipcube-eval <snippet>`
//!
//! Evaluates a Rhai snippet and prints its value. Failures end with a
//! trailer line understood by the parent (see `snipcube::protocol`).

use std::io::{self, ErrorKind, Read, Write};
use std::process::{self, Command};
use std::sync::OnceLock;

use nix::errno::Errno;
use rhai::{Dynamic, EvalAltResult};
use snipcube::protocol::{EXIT_ERROR, EXIT_LIMIT, Trailer};
use snipcube::types::ResourceKind;

static INPUT: OnceLock<String> = OnceLock::new();

fn main() {
    let snippet = match std::env::args_os().nth(1).map(|arg| arg.into_string()) {
        Some(Ok(snippet)) => snippet,
        Some(Err(_)) => fail(Trailer::Error("snippet is not valid UTF-8".to_string())),
        None => fail(Trailer::Error("missing snippet argument".to_string())),
    };

    let mut engine = rhai::Engine::new();
    engine.on_print(|text| emit(text));
    engine.on_debug(|text, _, _| emit(text));
    engine.register_fn("input", read_input);
    engine.register_fn("spawn", spawn);

    match engine.eval::<Dynamic>(&snippet) {
        Ok(value) if value.is_unit() => {}
        Ok(value) => emit(&value.to_string()),
        Err(e) => fail(Trailer::Error(e.to_string().replace('\n', " "))),
    }
}

/// Whole of stdin, read on first use
fn read_input() -> String {
    INPUT
        .get_or_init(|| {
            let mut input = String::new();
            // An unreadable stdin behaves like an empty one
            let _ = io::stdin().read_to_string(&mut input);
            input
        })
        .clone()
}

/// Run a host program and return its exit code
fn spawn(program: &str) -> Result<i64, Box<EvalAltResult>> {
    match Command::new(program).status() {
        Ok(status) => Ok(status.code().map_or(-1, i64::from)),
        Err(e) if e.raw_os_error() == Some(Errno::EAGAIN as i32) => {
            fail(Trailer::Limit(ResourceKind::ProcessCount))
        }
        Err(e) => Err(format!("cannot run {program}: {e}").into()),
    }
}

/// Write one line, ending quietly once the reader has gone away
fn emit(text: &str) {
    let mut stdout = io::stdout().lock();
    if let Err(e) = writeln!(stdout, "{text}").and_then(|()| stdout.flush()) {
        if e.kind() == ErrorKind::BrokenPipe {
            process::exit(0);
        }
    }
}

fn fail(trailer: Trailer) -> ! {
    let code = match trailer {
        Trailer::Error(_) => EXIT_ERROR,
        Trailer::Limit(_) => EXIT_LIMIT,
    };
    emit(&trailer.to_line());
    process::exit(i32::from(code));
}
