//! A library for running untrusted code snippets.
//!
//! Snipcube runs short snippets submitted through a chat front end. Each one
//! executes in a child process under CPU, memory and process-count rlimits
//! and a wall clock deadline, and comes back as a classified
//! [`ExecutionOutcome`] with a short reply rendering.
//!
//! # Features
//!
//! - **Admission control**: A bounded number of sandboxes run at once; excess requests are turned away immediately.
//! - **Resource limits**: CPU time, address space and process count are enforced by the kernel.
//! - **Deadline reaping**: Overdue children are killed with their whole process group and always waited for.
//! - **Bounded output**: Output is capped while it is read, so a chatty snippet cannot exhaust the host.
//! - **TOML configuration**: Interpreter command and default limits.

pub use admission::{Admission, AdmissionPermit};
pub use config::{Config, ConfigError, EXAMPLE_CONFIG, InterpreterConfig};
pub use runner::Engine;
pub use sandbox::{ProcessSandbox, SandboxError, SandboxHandle, Spawner};
pub use types::{ExecutionOutcome, ExecutionRequest, Limits, RejectReason, ResourceKind};

pub mod admission;
pub mod config;
pub mod protocol;
pub mod runner;
pub mod sandbox;
pub mod types;
