// ABOUTME: Connection summaries for operational visibility
// ABOUTME: Pure formatting over counts; never mutates the routing table

use crossterm::style::{style, StyledContent, Stylize};
use serde::Serialize;

use super::counters::Counters;

/// Mapper counts at a point in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpstreamCounts {
    /// Bound mappers with a live upstream connection
    pub active: u64,
    /// Idle mappers waiting for reuse
    pub sleep: u64,
    /// Mappers neither active nor idle (upstream failed or still connecting)
    pub error: u64,
    pub total: u64,
}

impl UpstreamCounts {
    /// Derive counts; `error` is whatever is left of `total`
    pub fn new(active: u64, sleep: u64, total: u64) -> Self {
        Self {
            active,
            sleep,
            error: total.saturating_sub(active).saturating_sub(sleep),
            total,
        }
    }
}

/// Upstream counts plus miner counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConnectionSummary {
    pub upstreams: UpstreamCounts,
    pub miners: u64,
    pub max_miners: u64,
}

impl ConnectionSummary {
    pub fn new(upstreams: UpstreamCounts, counters: &Counters) -> Self {
        Self {
            upstreams,
            miners: counters.miners(),
            max_miners: counters.max_miners(),
        }
    }

    /// Two report lines: upstreams, then miners
    pub fn lines(&self, colors: bool) -> [String; 2] {
        if colors {
            self.colored_lines()
        } else {
            self.plain_lines()
        }
    }

    fn plain_lines(&self) -> [String; 2] {
        let u = &self.upstreams;
        [
            format!(
                "* upstreams: active {} sleep {} error {} total {}",
                u.active, u.sleep, u.error, u.total
            ),
            format!("* miners:    active {} max {}", self.miners, self.max_miners),
        ]
    }

    fn colored_lines(&self) -> [String; 2] {
        let u = &self.upstreams;
        let active = if u.active > 0 {
            style(u.active).green().bold()
        } else {
            style(u.active).red().bold()
        };
        let error = if u.error > 0 {
            style(u.error).red().bold()
        } else {
            style(u.error).white().bold()
        };
        let miners = if self.miners > 0 {
            style(self.miners).green().bold()
        } else {
            style(self.miners).red().bold()
        };

        [
            format!(
                "{} {} {} {} {} {} {} {} {} {}",
                "*".green().bold(),
                "upstreams".white().bold(),
                label("active"),
                active,
                label("sleep"),
                style(u.sleep).white().bold(),
                label("error"),
                error,
                label("total"),
                style(u.total).white().bold(),
            ),
            format!(
                "{} {} {} {} {} {}",
                "*".green().bold(),
                "miners   ".white().bold(),
                label("active"),
                miners,
                label("max"),
                style(self.max_miners).white().bold(),
            ),
        ]
    }

    /// Emit the summary through tracing
    pub fn log(&self, colors: bool) {
        for line in self.lines(colors) {
            tracing::info!("{line}");
        }
    }
}

fn label(name: &str) -> StyledContent<String> {
    format!("{name}:").dark_grey()
}

impl std::fmt::Display for ConnectionSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [upstreams, miners] = self.plain_lines();
        write!(f, "{upstreams}\n{miners}")
    }
}
