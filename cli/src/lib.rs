//! # relaunch
//!
//! Runs shell commands and restarts all of them whenever a watched path
//! settles after a change.
//!
//! ```text
//! relaunch [PATH [+ PATH]...] [COMMAND] [COMMAND]...
//!
//! relaunch ./src [cargo run]
//! relaunch ./src + ./assets [npm run build] [npm run serve]
//! ```
//!
//! Everything before the first `[` is the list of paths to watch (the
//! current directory when empty). Each top-level `[...]` group is one
//! command; nested brackets are kept as part of the command text. Lines
//! typed on stdin are forwarded to every running command.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use relaunch_runtime::{NotificationSource, OutputSink, Runtime, RuntimeError, prepare};
use tokio::io::AsyncBufRead;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Environment variable holding a `tracing` filter directive.
pub const LOG_ENV: &str = "RELAUNCH_LOG";

/// Run commands and restart them when watched paths change.
#[derive(Parser, Debug)]
#[command(name = "relaunch", version, about)]
pub struct Cli {
    /// Log debug output to stderr (overridden by RELAUNCH_LOG)
    #[arg(short, long)]
    pub verbose: bool,

    /// Watch paths followed by bracketed commands, e.g. `./src [cargo run]`
    #[arg(
        value_name = "ARGS",
        required = true,
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub line: Vec<String>,
}

impl Cli {
    /// The positional arguments joined with single spaces.
    pub fn argument_line(&self) -> String {
        self.line.join(" ")
    }
}

/// Install the global `tracing` subscriber, writing to stderr.
pub fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Validate `line`, announce the watch paths, and run until `shutdown`.
///
/// Nothing is spawned or watched when validation fails.
pub async fn serve<I, F>(
    line: &str,
    cwd: &Path,
    source: Arc<dyn NotificationSource>,
    sink: Arc<dyn OutputSink>,
    input: I,
    shutdown: F,
) -> Result<(), RuntimeError>
where
    I: AsyncBufRead + Unpin,
    F: Future<Output = ()>,
{
    debug!(line, cwd = %cwd.display(), "preparing");
    let argument = prepare(line, cwd)?;

    for path in &argument.paths {
        sink.info(&format!("[watching: {path}]"));
    }

    let (mut runtime, _events) = Runtime::new(argument, source, sink);
    runtime.run(input, shutdown).await;
    info!(generations = runtime.generations(), "exiting");
    Ok(())
}
