//! Output conventions of the sandboxed interpreter
//!
//! The interpreter shares one output stream with the snippet. When a snippet
//! fails it writes a single trailer line in one of these forms and exits
//! with a non-zero status:
//!
//! ```text
//! error: <message>
//! limit: <cpu|memory|processes>
//! ```
//!
//! The parent only looks at the last non-empty line, so anything the snippet
//! printed before failing is left alone.

use crate::types::ResourceKind;

/// Prefix of a runtime error trailer
pub const ERROR_PREFIX: &str = "error: ";

/// Prefix of a resource limit trailer
pub const LIMIT_PREFIX: &str = "limit: ";

/// Printed by the Rust runtime when an allocation fails under RLIMIT_AS
pub const ALLOC_FAILURE_MARKER: &str = "memory allocation of ";

/// Exit status for a reported runtime error
pub const EXIT_ERROR: u8 = 1;

/// Exit status for a reported resource limit
pub const EXIT_LIMIT: u8 = 2;

/// Trailer line written by the interpreter on failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trailer {
    Error(String),
    Limit(ResourceKind),
}

impl Trailer {
    /// Parse a single line
    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        if let Some(message) = line.strip_prefix(ERROR_PREFIX) {
            return Some(Trailer::Error(message.trim().to_string()));
        }
        if let Some(name) = line.strip_prefix(LIMIT_PREFIX) {
            return ResourceKind::from_name(name.trim()).map(Trailer::Limit);
        }
        None
    }

    /// Find the trailer on the last non-empty line of the output
    pub fn from_output(output: &[u8]) -> Option<Self> {
        let text = String::from_utf8_lossy(output);
        text.lines()
            .rev()
            .find(|line| !line.trim().is_empty())
            .and_then(Self::parse_line)
    }

    /// Render the line the interpreter writes
    pub fn to_line(&self) -> String {
        match self {
            Trailer::Error(message) => format!("{ERROR_PREFIX}{message}"),
            Trailer::Limit(kind) => format!("{LIMIT_PREFIX}{}", kind.as_str()),
        }
    }
}

/// Check whether the output shows the allocator giving up
pub fn mentions_alloc_failure(output: &[u8]) -> bool {
    String::from_utf8_lossy(output).contains(ALLOC_FAILURE_MARKER)
}
