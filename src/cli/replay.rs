// ABOUTME: CLI replay command - feed an event trace through the splitter and print the result

use super::{config_path, OutputFormat, ReplayArgs};
use mapper_proxy::config::{ConfigWatcher, ProxyConfig};
use mapper_proxy::replay::{self, ReplayReport};
use anyhow::{Context, Result};
use std::fs::File;
use std::io::BufReader;

/// Execute the replay command
pub async fn execute(args: ReplayArgs, format: OutputFormat, no_color: bool) -> Result<()> {
    let path = config_path(args.config)?;
    let mut config = ProxyConfig::load(&path)?;
    if no_color {
        config.colors = false;
    }

    let file = File::open(&args.trace)
        .with_context(|| format!("Failed to open trace {}", args.trace.display()))?;
    let reader = BufReader::new(file);
    let colors = config.colors;

    let report = if args.live {
        let records = replay::parse_trace(reader)
            .with_context(|| format!("Failed to read trace {}", args.trace.display()))?;
        let watcher = (config.watch && !config.watch_interval.is_zero())
            .then(|| ConfigWatcher::new(&path));
        replay::replay_live(config, records, watcher).await?
    } else {
        replay::replay(config, reader)
            .with_context(|| format!("Failed to replay {}", args.trace.display()))?
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => output_text(&report, colors),
    }

    Ok(())
}

fn output_text(report: &ReplayReport, colors: bool) {
    for line in report.summary.lines(colors) {
        println!("{line}");
    }
    println!(
        "* mappers:   created {} released {} evicted {}",
        report.created, report.released, report.evicted
    );
    println!(
        "* replay:    {} record(s), {} tick(s), reuse timeout {}s",
        report.records, report.ticks, report.reuse_timeout
    );
}
