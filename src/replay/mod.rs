// ABOUTME: Replays JSON Lines event traces through the splitter on a virtual clock
// ABOUTME: Used by the `replay` command to inspect reuse/eviction behavior offline

//! Trace replay.
//!
//! Each line of a trace is one JSON record:
//!
//! ```text
//! {"at_ms": 0,     "kind": "login", "miner": 1, "request": {"login": "wallet"}}
//! {"at_ms": 500,   "kind": "submit", "miner": 1, "job_id": "j1", "nonce": "00", "result": "ff"}
//! {"at_ms": 1000,  "kind": "close", "miner": 1}
//! {"at_ms": 40000, "kind": "wait"}
//! ```
//!
//! Records must be in time order. In the default mode sweeper ticks scheduled
//! before a record's `at_ms` run first, so idle mappers expire exactly as they
//! would live without waiting for wall time. [`live::replay_live`] paces the
//! same records in real time against the running control loop.

pub mod live;
pub mod mapper;

use std::collections::HashMap;
use std::io::BufRead;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::{ConfigError, PoolUrl, ProxyConfig};
use crate::splitter::controller::{ControlMessage, Controller, ControllerClosed};
use crate::splitter::counters::Counters;
use crate::splitter::diagnostics::ConnectionSummary;
use crate::splitter::events::{LoginRequest, ProxyEvent, SubmitEvent};
use crate::splitter::mapper::{MapperFactory, MapperId};
use crate::splitter::miner::{Miner, MinerHandle, MinerId};
use crate::splitter::simple::SimpleSplitter;

pub use live::replay_live;
pub use mapper::{ReplayMapper, VirtualClock};

// === Errors ===

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Line {line}: invalid config change: {source}")]
    InvalidConfig {
        line: usize,
        #[source]
        source: ConfigError,
    },

    #[error("Line {line}: record at {at_ms}ms is earlier than the previous one")]
    OutOfOrder { line: usize, at_ms: u64 },

    #[error(transparent)]
    Closed(#[from] ControllerClosed),

    #[error("Control loop task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

// === Trace Records ===

/// One line of a trace
#[derive(Debug, Clone, Deserialize)]
pub struct TraceRecord {
    /// Milliseconds since the start of the trace
    #[serde(default)]
    pub at_ms: u64,
    #[serde(flatten)]
    pub action: TraceAction,
}

impl TraceRecord {
    pub fn at(&self) -> Duration {
        Duration::from_millis(self.at_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TraceAction {
    Connection {
        miner: u64,
        #[serde(default = "default_ip")]
        ip: String,
    },
    Login {
        miner: u64,
        #[serde(default)]
        request: LoginRequest,
    },
    Submit {
        miner: u64,
        #[serde(default)]
        request_id: i64,
        job_id: String,
        nonce: String,
        result: String,
        #[serde(default)]
        algorithm: Option<String>,
    },
    Accept {
        miner: u64,
    },
    Reject {
        miner: u64,
        #[serde(default)]
        reason: String,
    },
    Close {
        miner: u64,
    },
    /// Replace parts of the running config
    Config {
        #[serde(default)]
        reuse_timeout: Option<u64>,
        #[serde(default)]
        pools: Option<Vec<PoolUrl>>,
    },
    /// Log a connection summary
    Print,
    /// Only advance the clock
    Wait,
}

fn default_ip() -> String {
    "127.0.0.1".to_string()
}

/// A parsed record with its 1-based line number
#[derive(Debug, Clone)]
pub struct NumberedRecord {
    pub line: usize,
    pub record: TraceRecord,
}

/// Parse a whole trace, skipping blank lines and `#` comments
pub fn parse_trace<R: BufRead>(reader: R) -> Result<Vec<NumberedRecord>, ReplayError> {
    let mut records = Vec::new();
    let mut last_at = 0;

    for (index, line) in reader.lines().enumerate() {
        let line_no = index + 1;
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let record: TraceRecord = serde_json::from_str(line).map_err(|source| ReplayError::Parse {
            line: line_no,
            source,
        })?;
        if record.at_ms < last_at {
            return Err(ReplayError::OutOfOrder {
                line: line_no,
                at_ms: record.at_ms,
            });
        }
        last_at = record.at_ms;

        records.push(NumberedRecord {
            line: line_no,
            record,
        });
    }

    Ok(records)
}

// === Driver ===

/// Turns trace actions into control messages.
///
/// Keeps the miner registry and its own copy of the config so `config`
/// records can be applied as partial updates.
#[derive(Debug)]
pub struct TraceDriver {
    config: ProxyConfig,
    miners: HashMap<u64, MinerHandle>,
}

impl TraceDriver {
    pub fn new(config: ProxyConfig) -> Self {
        Self {
            config,
            miners: HashMap::new(),
        }
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Message for one action; `None` for actions that only move time
    pub fn message(
        &mut self,
        line: usize,
        action: TraceAction,
    ) -> Result<Option<ControlMessage>, ReplayError> {
        let message = match action {
            TraceAction::Connection { miner, ip } => {
                let handle = Arc::new(Miner::new(MinerId(miner), ip));
                self.miners.insert(miner, Arc::clone(&handle));
                ControlMessage::Event(ProxyEvent::Connection { miner: handle })
            }
            TraceAction::Login { miner, request } => ControlMessage::Event(ProxyEvent::Login {
                miner: self.miner(miner),
                request,
            }),
            TraceAction::Submit {
                miner,
                request_id,
                job_id,
                nonce,
                result,
                algorithm,
            } => ControlMessage::Event(ProxyEvent::Submit(SubmitEvent {
                miner: self.miner(miner),
                request_id,
                job_id,
                nonce,
                result,
                algorithm,
            })),
            TraceAction::Accept { miner } => ControlMessage::Event(ProxyEvent::Accept {
                miner: self.miner(miner),
            }),
            TraceAction::Reject { miner, reason } => ControlMessage::Event(ProxyEvent::Reject {
                miner: self.miner(miner),
                reason,
            }),
            TraceAction::Close { miner } => {
                let handle = self
                    .miners
                    .remove(&miner)
                    .unwrap_or_else(|| Miner::handle(miner, default_ip()));
                ControlMessage::Event(ProxyEvent::Close { miner: handle })
            }
            TraceAction::Config {
                reuse_timeout,
                pools,
            } => {
                let mut next = self.config.clone();
                if let Some(secs) = reuse_timeout {
                    next.reuse_timeout = Duration::from_secs(secs);
                }
                if let Some(pools) = pools {
                    next.pools = pools;
                }
                next.validate()
                    .map_err(|source| ReplayError::InvalidConfig { line, source })?;
                self.config = next.clone();
                ControlMessage::ConfigChanged(Box::new(next))
            }
            TraceAction::Print => ControlMessage::PrintConnections,
            TraceAction::Wait => return Ok(None),
        };

        Ok(Some(message))
    }

    /// Miners may appear without a `connection` record
    fn miner(&mut self, id: u64) -> MinerHandle {
        Arc::clone(
            self.miners
                .entry(id)
                .or_insert_with(|| Miner::handle(id, default_ip())),
        )
    }
}

/// Factory producing replay mappers that share one clock and release counter
pub fn replay_factory(
    clock: &VirtualClock,
    released: &Arc<AtomicU64>,
) -> impl MapperFactory<Mapper = ReplayMapper> + Send + 'static {
    let clock = clock.clone();
    let released = Arc::clone(released);
    move |id: MapperId, config: &ProxyConfig| {
        ReplayMapper::new(id, config.pools.clone(), clock.clone(), Arc::clone(&released))
    }
}

// === Report ===

/// Outcome of a replay
#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    /// Records applied (blank lines and comments excluded)
    pub records: usize,
    /// Sweeper ticks performed
    pub ticks: u64,
    /// Mappers created over the whole trace
    pub created: u64,
    /// Mappers dropped, by eviction or zero-timeout release
    pub released: u64,
    /// Mappers evicted by the sweeper
    pub evicted: u64,
    /// Final state
    pub summary: ConnectionSummary,
    /// Final reuse timeout in seconds
    pub reuse_timeout: u64,
}

impl ReplayReport {
    fn new<F: MapperFactory>(
        records: usize,
        splitter: &SimpleSplitter<F>,
        counters: &Counters,
        ticks: u64,
        evicted: u64,
        released: &AtomicU64,
    ) -> Self {
        Self {
            records,
            ticks,
            created: splitter.next_sequence(),
            released: released.load(Ordering::Relaxed),
            evicted,
            summary: splitter.summary(counters),
            reuse_timeout: splitter.reuse_timeout().as_secs(),
        }
    }
}

/// Replay a trace against `config` on a virtual clock
pub fn replay<R: BufRead>(config: ProxyConfig, reader: R) -> Result<ReplayReport, ReplayError> {
    let records = parse_trace(reader)?;

    let clock = VirtualClock::new();
    let released = Arc::new(AtomicU64::new(0));
    let splitter = SimpleSplitter::new(config.clone(), replay_factory(&clock, &released));
    let (mut controller, _handle) = Controller::new(splitter, Arc::new(Counters::new()));
    let mut driver = TraceDriver::new(config);

    let mut next_tick = tick_period(controller.splitter().config());
    let applied = records.len();

    for NumberedRecord { line, record } in records {
        let at = record.at();
        while next_tick <= at {
            clock.advance_to(next_tick);
            controller.tick();
            next_tick += tick_period(controller.splitter().config());
        }
        clock.advance_to(at);

        if let Some(message) = driver.message(line, record.action)? {
            controller.handle_message(message);
        }
    }

    let report = ReplayReport::new(
        applied,
        controller.splitter(),
        controller.counters(),
        controller.ticks(),
        controller.evicted(),
        &released,
    );
    debug!("Replay finished: {report:?}");

    Ok(report)
}

// A zero interval would never let the clock pass the next tick
fn tick_period(config: &ProxyConfig) -> Duration {
    config.tick_interval.max(Duration::from_millis(1))
}
