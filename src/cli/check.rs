// ABOUTME: CLI check command - load a config file and report what the splitter will use

use super::{config_path, CheckArgs, OutputFormat};
use mapper_proxy::config::ProxyConfig;
use anyhow::Result;
use serde::Serialize;

/// Summary of a validated config
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub path: String,
    pub reuse_timeout: u64,
    pub reuse_enabled: bool,
    pub tick_interval: u64,
    pub pools: Vec<String>,
}

impl CheckReport {
    pub fn new(path: &std::path::Path, config: &ProxyConfig) -> Self {
        Self {
            path: path.display().to_string(),
            reuse_timeout: config.reuse_timeout.as_secs(),
            reuse_enabled: config.reuse_enabled(),
            tick_interval: config.tick_interval.as_secs(),
            pools: config.pools.iter().map(|pool| pool.url()).collect(),
        }
    }
}

/// Execute the check command
pub fn execute(args: CheckArgs, format: OutputFormat) -> Result<()> {
    let path = config_path(args.config)?;
    let config = ProxyConfig::load(&path)?;
    let report = CheckReport::new(&path, &config);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => output_text(&report),
    }

    Ok(())
}

fn output_text(report: &CheckReport) {
    println!("Config OK: {}", report.path);
    if report.reuse_enabled {
        println!("  reuse timeout: {}s", report.reuse_timeout);
    } else {
        println!("  reuse timeout: disabled");
    }
    println!("  tick interval: {}s", report.tick_interval);
    println!("  pools:");
    for (i, pool) in report.pools.iter().enumerate() {
        println!("    {}. {pool}", i + 1);
    }
}
