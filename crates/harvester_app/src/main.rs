mod cli;
mod config;
mod runner;

use std::process::ExitCode;

use clap::Parser;
use engine_logging::LogDestination;

use crate::cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let destination = match cli.log_file.as_deref() {
        Some(path) => LogDestination::Both(path),
        None => LogDestination::Terminal,
    };
    engine_logging::initialize(destination, cli.log_level);

    runner::run(cli).await
}
