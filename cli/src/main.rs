use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use relaunch_cli::{Cli, init_logging, serve};
use relaunch_runtime::{OutputSink, TerminalSink};
use relaunch_watcher::NotifySource;
use tokio::io::BufReader;
use tracing::warn;

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    tracing::debug!(?cli, "parsed CLI arguments");

    let cwd = std::env::current_dir().context("failed to read the current directory")?;
    let sink = Arc::new(TerminalSink::new());

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build the tokio runtime")?;

    let result = runtime.block_on(serve(
        &cli.argument_line(),
        &cwd,
        Arc::new(NotifySource::new()),
        sink.clone(),
        BufReader::new(tokio::io::stdin()),
        ctrl_c(),
    ));

    // A blocking stdin read would otherwise hold up the exit.
    runtime.shutdown_background();

    match result {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            sink.info(&e.to_string());
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for Ctrl+C: {e}");
    }
}
