// ABOUTME: Main entry point for mapper-proxy
//
// Binary: mapper-proxy
// Usage: mapper-proxy <COMMAND>
// - check: validate a config file
// - replay: run an event trace through the splitter and print diagnostics

#![allow(missing_docs)]

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;

mod cli;

use cli::Commands;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    setup_logging(args.log_file.as_deref())?;
    setup_panic_handler();

    match args.command {
        Commands::Check(check_args) => cli::check::execute(check_args, args.format),
        Commands::Replay(replay_args) => {
            cli::replay::execute(replay_args, args.format, args.no_color).await
        }
    }
}

/// Human-readable logs on stderr, or JSON Lines in `log_dir` when given
fn setup_logging(log_dir: Option<&Path>) -> Result<()> {
    use std::fs::OpenOptions;
    use tracing_subscriber::prelude::*;

    let (json_layer, stderr_layer) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

            // JSONL log file with timestamp
            let log_file = dir.join(format!(
                "mapper-proxy-{}.jsonl",
                chrono::Local::now().format("%Y%m%d-%H%M%S")
            ));

            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_file)
                .with_context(|| format!("Failed to create log file {}", log_file.display()))?;

            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_target(true)
                .with_writer(file)
                .with_ansi(false);
            (Some(layer), None)
        }
        None => {
            let layer = tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr);
            (None, Some(layer))
        }
    };

    tracing_subscriber::registry()
        .with(json_layer)
        .with(stderr_layer)
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mapper_proxy=info".into()),
        )
        .init();

    Ok(())
}

fn setup_panic_handler() {
    use tracing::error;

    std::panic::set_hook(Box::new(|panic_info| {
        error!("mapper-proxy panicked: {}", panic_info);
        eprintln!("mapper-proxy panicked: {}", panic_info);
        eprintln!("Please check the logs for more details.");
    }));
}
