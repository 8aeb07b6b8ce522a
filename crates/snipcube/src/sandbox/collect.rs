use std::io::ErrorKind;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::unix::pipe;
use tokio::time::{Instant, timeout, timeout_at};
use tracing::{debug, instrument, warn};

use crate::sandbox::handle::PendingInput;

const READ_CHUNK: usize = 4096;

/// Shortest wake-up period; a zero interval would spin on the pipe
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Output captured from a sandboxed child
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Collected {
    /// Captured bytes, at most one byte past the cap
    pub bytes: Vec<u8>,

    /// The child wrote more than the cap
    pub overflowed: bool,

    /// The pipe reached end of file
    pub eof: bool,
}

/// Read the child's merged output until EOF, the deadline or overflow.
///
/// At most `max_output + 1` bytes are kept so the formatter can tell a cut
/// stream from one that fit exactly. The receiver is dropped on return; a
/// child still writing then gets EPIPE instead of blocking on a full pipe.
#[instrument(skip(pipe))]
pub async fn collect_output(
    pipe: Option<pipe::Receiver>,
    deadline: Instant,
    max_output: usize,
    poll_interval: Duration,
) -> Collected {
    let Some(mut pipe) = pipe else {
        return Collected {
            eof: true,
            ..Collected::default()
        };
    };

    let poll_interval = poll_interval.max(MIN_POLL_INTERVAL);
    let limit = max_output.saturating_add(1);
    let mut collected = Collected::default();
    let mut chunk = [0u8; READ_CHUNK];

    loop {
        let now = Instant::now();
        if now >= deadline {
            debug!(bytes = collected.bytes.len(), "deadline reached while reading output");
            break;
        }
        let wait = poll_interval.min(deadline - now);

        match timeout(wait, pipe.read(&mut chunk)).await {
            Err(_) => continue,
            Ok(Ok(0)) => {
                collected.eof = true;
                break;
            }
            Ok(Ok(n)) => {
                let room = limit - collected.bytes.len();
                collected.bytes.extend_from_slice(&chunk[..n.min(room)]);
                if collected.bytes.len() > max_output {
                    debug!(max_output, "output cap exceeded, closing pipe");
                    collected.overflowed = true;
                    break;
                }
            }
            Ok(Err(e)) if e.kind() == ErrorKind::Interrupted => continue,
            Ok(Err(e)) => {
                warn!(error = %e, "failed to read sandbox output");
                break;
            }
        }
    }

    collected
}

/// Write the pending input to the child's stdin, then close it.
///
/// Gives up at the deadline. A child that exits or closes stdin early is not
/// an error.
#[instrument(skip(input))]
pub async fn feed_input(input: Option<PendingInput>, deadline: Instant) {
    let Some(PendingInput { mut stdin, data }) = input else {
        return;
    };

    match timeout_at(deadline, stdin.write_all(&data)).await {
        Ok(Ok(())) => debug!(bytes = data.len(), "input written"),
        Ok(Err(e)) if e.kind() == ErrorKind::BrokenPipe => {
            debug!("child closed stdin before reading all input")
        }
        Ok(Err(e)) => warn!(error = %e, "failed to write sandbox input"),
        Err(_) => debug!("deadline reached while writing input"),
    }
}
