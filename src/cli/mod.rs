// ABOUTME: CLI argument parsing and command routing for mapper-proxy
//
// Provides command-line interface for:
// - Validating a proxy config (check)
// - Replaying miner event traces through the splitter (replay)

pub mod check;
pub mod replay;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use mapper_proxy::config::ProxyConfig;

/// Session router for a mining proxy
#[derive(Parser)]
#[command(name = "mapper-proxy")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Write JSON Lines logs to this directory instead of stderr
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Disable colored connection summaries
    #[arg(long, global = true)]
    pub no_color: bool,
}

/// Output format for commands
#[derive(Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Load and validate a config file
    Check(CheckArgs),

    /// Replay a JSON Lines event trace through the splitter
    Replay(ReplayArgs),
}

/// Arguments for the check command
#[derive(clap::Args)]
pub struct CheckArgs {
    /// Config file (defaults to ~/.mapper-proxy/config.toml)
    #[arg(long, short)]
    pub config: Option<PathBuf>,
}

/// Arguments for the replay command
#[derive(clap::Args)]
pub struct ReplayArgs {
    /// Trace file, one JSON record per line
    #[arg(long, short)]
    pub trace: PathBuf,

    /// Config file (defaults to ~/.mapper-proxy/config.toml)
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Pace records in real time and watch the config file for changes
    #[arg(long)]
    pub live: bool,
}

/// Resolve `--config` or fall back to the default location
pub fn config_path(arg: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    match arg {
        Some(path) => Ok(path),
        None => ProxyConfig::default_path(),
    }
}
