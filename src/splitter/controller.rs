// ABOUTME: Single-task control loop that owns the splitter
//
// Every routing-table mutation happens here. Listeners, mapper I/O completions
// and the config watcher post messages through a ControllerHandle; the loop
// also drives the sweeper tick and periodic connection summaries.

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, info, trace};

use super::counters::Counters;
use super::events::ProxyEvent;
use super::mapper::MapperFactory;
use super::simple::{SimpleSplitter, Splitter};
use crate::config::ProxyConfig;

// === Messages ===

/// Work posted to the control loop
#[derive(Debug)]
pub enum ControlMessage {
    /// Downstream event to route
    Event(ProxyEvent),
    /// A new configuration replaced the current one
    ConfigChanged(Box<ProxyConfig>),
    /// Log a connection summary now
    PrintConnections,
    /// Stop the loop after logging a final summary
    Shutdown,
}

/// The control loop has stopped and no longer accepts messages
#[derive(Debug, Error)]
#[error("Controller is not running")]
pub struct ControllerClosed;

/// What the loop should do after a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Reconfigured,
    Stop,
}

// === Handle ===

/// Cloneable sender side of the control loop
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    tx: mpsc::UnboundedSender<ControlMessage>,
}

impl ControllerHandle {
    pub fn send(&self, message: ControlMessage) -> Result<(), ControllerClosed> {
        self.tx.send(message).map_err(|_| ControllerClosed)
    }

    pub fn send_event(&self, event: ProxyEvent) -> Result<(), ControllerClosed> {
        self.send(ControlMessage::Event(event))
    }

    pub fn config_changed(&self, config: ProxyConfig) -> Result<(), ControllerClosed> {
        self.send(ControlMessage::ConfigChanged(Box::new(config)))
    }

    pub fn print_connections(&self) -> Result<(), ControllerClosed> {
        self.send(ControlMessage::PrintConnections)
    }

    pub fn shutdown(&self) -> Result<(), ControllerClosed> {
        self.send(ControlMessage::Shutdown)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

// === Controller ===

/// What `run` hands back once the loop stops
pub struct Stopped<F: MapperFactory> {
    pub splitter: SimpleSplitter<F>,
    pub ticks: u64,
    /// Mappers evicted by the sweeper over the loop's lifetime
    pub evicted: u64,
}

/// Owns the splitter and serializes all access to it
pub struct Controller<F: MapperFactory> {
    splitter: SimpleSplitter<F>,
    counters: Arc<Counters>,
    rx: mpsc::UnboundedReceiver<ControlMessage>,
    ticks: u64,
    evicted: u64,
}

impl<F: MapperFactory> Controller<F> {
    pub fn new(splitter: SimpleSplitter<F>, counters: Arc<Counters>) -> (Self, ControllerHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let controller = Self {
            splitter,
            counters,
            rx,
            ticks: 0,
            evicted: 0,
        };
        (controller, ControllerHandle { tx })
    }

    pub fn splitter(&self) -> &SimpleSplitter<F> {
        &self.splitter
    }

    pub fn counters(&self) -> &Arc<Counters> {
        &self.counters
    }

    /// Ticks performed so far
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    /// Apply one message to the splitter
    pub fn handle_message(&mut self, message: ControlMessage) -> Flow {
        match message {
            ControlMessage::Event(event) => {
                self.handle_event(event);
                Flow::Continue
            }
            ControlMessage::ConfigChanged(config) => {
                let previous = self.splitter.config().clone();
                self.splitter.on_config_changed(&config, &previous);
                Flow::Reconfigured
            }
            ControlMessage::PrintConnections => {
                self.print_connections();
                Flow::Continue
            }
            ControlMessage::Shutdown => Flow::Stop,
        }
    }

    fn handle_event(&mut self, event: ProxyEvent) {
        trace!("{} event from miner {}", event.kind(), event.miner().id());

        match &event {
            ProxyEvent::Connection { .. } => self.counters.add_miner(),
            ProxyEvent::Close { .. } => self.counters.remove_miner(),
            ProxyEvent::Accept { .. } => self.counters.accept(),
            ProxyEvent::Reject { reason, .. } => {
                debug!("Share from miner {} rejected: {reason}", event.miner().id());
                self.counters.reject();
            }
            _ => {}
        }

        self.splitter.on_event(event);
    }

    /// Advance the tick counter and sweep
    pub fn tick(&mut self) -> usize {
        self.ticks += 1;
        let released = self.splitter.tick_at(self.ticks, Instant::now());
        self.evicted += released as u64;
        if released > 0 {
            debug!("Tick {}: released {released} idle mapper(s)", self.ticks);
        }
        released
    }

    pub fn print_connections(&self) {
        self.splitter.print_connections(&self.counters);
    }

    /// Run until shutdown or until every handle is dropped.
    ///
    /// Hands the splitter back so callers can inspect the final state.
    pub async fn run(mut self) -> Stopped<F> {
        let mut tick = tick_interval(self.splitter.config().tick_interval);
        let mut print = print_interval(self.splitter.config().print_interval);

        info!(
            "Control loop started (reuse timeout {}s, {} pool(s))",
            self.splitter.reuse_timeout().as_secs(),
            self.splitter.config().pools.len()
        );

        loop {
            tokio::select! {
                message = self.rx.recv() => {
                    let Some(message) = message else {
                        debug!("All controller handles dropped");
                        break;
                    };

                    match self.handle_message(message) {
                        Flow::Continue => {}
                        Flow::Stop => break,
                        Flow::Reconfigured => {
                            let config = self.splitter.config();
                            if tick.period() != config.tick_interval {
                                tick = tick_interval(config.tick_interval);
                            }
                            if print.as_ref().map(Interval::period) != Some(config.print_interval) {
                                print = print_interval(config.print_interval);
                            }
                        }
                    }
                }
                _ = tick.tick() => {
                    self.tick();
                }
                () = next_print(print.as_mut()) => {
                    self.print_connections();
                }
            }
        }

        self.print_connections();
        info!("Control loop stopped after {} tick(s)", self.ticks);
        Stopped {
            splitter: self.splitter,
            ticks: self.ticks,
            evicted: self.evicted,
        }
    }
}

fn tick_interval(period: Duration) -> Interval {
    // Zero is rejected by config validation; guard anyway since `interval` panics on it
    let period = period.max(Duration::from_millis(1));
    let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

fn print_interval(period: Duration) -> Option<Interval> {
    (!period.is_zero()).then(|| tick_interval(period))
}

async fn next_print(interval: Option<&mut Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
