//! Snipcube CLI
//!
//! A command-line tool for running code snippets in the snipcube sandbox.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use snipcube::{Config, EXAMPLE_CONFIG, Engine, ExecutionOutcome, Limits};
use tracing::{Level, debug, info};
use tracing_subscriber::EnvFilter;

/// Interpreter binary shipped alongside the CLI
const BUNDLED_INTERPRETER: &str = "snipcube-eval";

#[derive(Parser)]
#[command(name = "snipcube")]
#[command(about = "A tool for running untrusted code snippets under resource limits")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new configuration file
    Init {
        /// Output path (default: snipcube.toml)
        #[arg(short, long, default_value = "snipcube.toml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Run a snippet
    Run {
        /// Snippet source
        #[arg(value_name = "SNIPPET", required_unless_present = "file")]
        snippet: Option<String>,

        /// Read the snippet from a file instead
        #[arg(short, long, conflicts_with = "snippet")]
        file: Option<PathBuf>,

        /// Text fed to the snippet's standard input
        #[arg(short, long)]
        input: Option<String>,

        /// Wall time limit in seconds
        #[arg(short, long)]
        wall_time: Option<f64>,

        /// CPU time limit in seconds
        #[arg(short = 't', long)]
        cpu_time: Option<u64>,

        /// Memory limit in KB
        #[arg(short, long)]
        memory_limit: Option<u64>,

        /// Output cap in bytes
        #[arg(long)]
        max_output: Option<usize>,
    },

    /// Show the active configuration
    ShowConfig,
}

/// Per-run limit overrides from the command line
struct LimitOverrides {
    wall_time: Option<f64>,
    cpu_time: Option<u64>,
    memory_limit: Option<u64>,
    max_output: Option<usize>,
}

impl LimitOverrides {
    fn apply(&self, mut limits: Limits) -> Limits {
        if let Some(seconds) = self.wall_time {
            limits = limits.with_wall_time_limit(seconds);
        }
        if let Some(seconds) = self.cpu_time {
            limits = limits.with_cpu_time_limit(seconds);
        }
        if let Some(kb) = self.memory_limit {
            limits = limits.with_memory_limit(kb.saturating_mul(Limits::KIB));
        }
        if let Some(bytes) = self.max_output {
            limits = limits.with_max_output_bytes(bytes);
        }
        limits
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Load configuration
    let mut config = if let Some(ref path) = cli.config {
        info!(?path, "loading configuration");
        Config::from_file(path).context("failed to load configuration")?
    } else {
        debug!("using default configuration");
        Config::default()
    };
    resolve_bundled_interpreter(&mut config);

    match cli.command {
        Commands::Init { output, force } => init_config(&output, force).await,
        Commands::Run {
            snippet,
            file,
            input,
            wall_time,
            cpu_time,
            memory_limit,
            max_output,
        } => {
            let snippet = match (snippet, file) {
                (Some(snippet), _) => snippet,
                (None, Some(path)) => tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("failed to read snippet from '{}'", path.display()))?,
                (None, None) => anyhow::bail!("no snippet given"),
            };
            let overrides = LimitOverrides {
                wall_time,
                cpu_time,
                memory_limit,
                max_output,
            };
            run_snippet(config, snippet, input, &overrides).await
        }
        Commands::ShowConfig => {
            show_config(&config);
            Ok(())
        }
    }
}

/// Point the default interpreter command at the binary next to this one.
///
/// The sandbox runs with a minimal PATH, so a bare `snipcube-eval` would
/// only be found if it was installed system-wide.
fn resolve_bundled_interpreter(config: &mut Config) {
    let Some(program) = config.interpreter.command.first_mut() else {
        return;
    };
    if *program != BUNDLED_INTERPRETER {
        return;
    }

    let sibling = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(BUNDLED_INTERPRETER)));
    if let Some(path) = sibling.filter(|path| path.is_file()) {
        debug!(path = %path.display(), "using bundled interpreter");
        *program = path.to_string_lossy().into_owned();
    }
}

async fn run_snippet(
    config: Config,
    snippet: String,
    input: Option<String>,
    overrides: &LimitOverrides,
) -> Result<()> {
    let engine = Engine::new(config);

    let mut request = engine.request(snippet, input);
    request.limits = overrides.apply(request.limits);
    debug!(limits = ?request.limits, "running snippet");

    let outcome = engine.execute(request).await;

    // Reply on stdout, details through tracing (stderr)
    println!("{outcome}");
    match &outcome {
        ExecutionOutcome::Completed { truncated, .. } => {
            info!(truncated = *truncated, "snippet completed");
        }
        ExecutionOutcome::TimedOut { partial_output }
        | ExecutionOutcome::ResourceExceeded { partial_output, .. }
        | ExecutionOutcome::Signaled { partial_output, .. } => {
            if !partial_output.is_empty() {
                info!(
                    output = %String::from_utf8_lossy(partial_output),
                    "partial output"
                );
            }
        }
        ExecutionOutcome::RuntimeError { .. } | ExecutionOutcome::Rejected { .. } => {}
    }

    if outcome.is_success() {
        Ok(())
    } else if outcome.is_infrastructure_failure() {
        std::process::exit(2);
    } else {
        std::process::exit(1);
    }
}

fn show_config(config: &Config) {
    let limits = &config.limits;
    println!("Default resource limits:");
    println!("  Wall time limit: {}s", limits.wall_time_limit);
    println!("  CPU time limit: {}s", limits.cpu_time_limit);
    println!("  Memory limit: {} KB", limits.memory_limit / Limits::KIB);
    println!("  Max processes: {}", limits.max_processes);
    println!("  Max output: {} bytes", limits.max_output_bytes);
    println!("  Max snippet length: {} chars", limits.max_snippet_len);
    println!();
    println!("Interpreter: {}", config.interpreter.command.join(" "));
    println!("Sandbox PATH: {}", config.interpreter.path);
    println!();
    println!("Concurrent executions: {}", config.concurrency);
}

async fn init_config(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        anyhow::bail!(
            "Configuration file already exists at '{}'. Use --force to overwrite.",
            output.display()
        );
    }

    tokio::fs::write(output, EXAMPLE_CONFIG)
        .await
        .context("failed to write configuration file")?;

    println!("Created configuration file at '{}'", output.display());
    Ok(())
}
