// ABOUTME: Simple splitter: one miner per mapper, idle mappers retained for reuse
// ABOUTME: Routing table, event dispatch, idle eviction and pool reload

//! The simple splitter binds each miner to its own mapper. When a miner leaves,
//! its mapper is kept idle for `reuse_timeout` so the next login can resume on
//! the same upstream connection instead of opening a new one.
//!
//! # Ownership
//!
//! ```text
//! upstreams: BTreeMap<MapperId, M>   <- owns every mapper
//! idles:     BTreeSet<MapperId>      <- tags the idle subset of `upstreams`
//! ```
//!
//! "Active" mappers are the stored ones not tagged idle. A mapper is dropped
//! exactly once, when it leaves `upstreams`.

use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};

use tracing::{debug, info, trace};

use super::counters::Counters;
use super::diagnostics::{ConnectionSummary, UpstreamCounts};
use super::events::{LoginRequest, ProxyEvent, SubmitEvent};
use super::mapper::{Mapper, MapperFactory, MapperId};
use super::miner::MinerHandle;
use crate::config::ProxyConfig;

/// Routing strategy between miners and upstream mappers
pub trait Splitter {
    /// Open upstream connections ahead of demand
    fn connect(&mut self);

    /// Release resources no longer needed
    fn gc(&mut self);

    /// Advance timers and evict expired idle mappers
    fn tick(&mut self, ticks: u64);

    /// Current mapper counts
    fn upstreams(&self) -> UpstreamCounts;

    /// Log a connection summary
    fn print_connections(&self, counters: &Counters);

    /// Route a downstream event
    fn on_event(&mut self, event: ProxyEvent);

    /// Apply a new configuration; `previous` is the one it replaces
    fn on_config_changed(&mut self, config: &ProxyConfig, previous: &ProxyConfig);
}

/// Splitter that gives every miner a dedicated mapper
pub struct SimpleSplitter<F: MapperFactory> {
    config: ProxyConfig,
    reuse_timeout: Duration,
    factory: F,
    upstreams: BTreeMap<MapperId, F::Mapper>,
    idles: BTreeSet<MapperId>,
    sequence: u64,
}

impl<F: MapperFactory> std::fmt::Debug for SimpleSplitter<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimpleSplitter")
            .field("reuse_timeout", &self.reuse_timeout)
            .field("upstreams", &self.upstreams.keys().collect::<Vec<_>>())
            .field("idles", &self.idles)
            .field("sequence", &self.sequence)
            .finish_non_exhaustive()
    }
}

impl<F: MapperFactory> SimpleSplitter<F> {
    pub fn new(config: ProxyConfig, factory: F) -> Self {
        Self {
            reuse_timeout: config.reuse_timeout,
            config,
            factory,
            upstreams: BTreeMap::new(),
            idles: BTreeSet::new(),
            sequence: 0,
        }
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    pub fn reuse_timeout(&self) -> Duration {
        self.reuse_timeout
    }

    /// Look up a stored mapper, idle or not
    pub fn mapper(&self, id: MapperId) -> Option<&F::Mapper> {
        self.upstreams.get(&id)
    }

    /// Whether `id` is stored and not idle
    pub fn is_active_session(&self, id: MapperId) -> bool {
        self.upstreams.contains_key(&id) && !self.idles.contains(&id)
    }

    /// Whether `id` is tagged idle
    pub fn is_idle_session(&self, id: MapperId) -> bool {
        self.idles.contains(&id)
    }

    /// Ids of stored mappers that are not idle, ascending
    pub fn active_sessions(&self) -> Vec<MapperId> {
        self.upstreams
            .keys()
            .filter(|id| !self.idles.contains(*id))
            .copied()
            .collect()
    }

    /// Ids of idle mappers, ascending
    pub fn idle_sessions(&self) -> Vec<MapperId> {
        self.idles.iter().copied().collect()
    }

    /// Number of mappers owned, idle included
    pub fn len(&self) -> usize {
        self.upstreams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.upstreams.is_empty()
    }

    /// Id the next new mapper will get
    pub fn next_sequence(&self) -> u64 {
        self.sequence
    }

    /// Bind a miner to an idle reusable mapper, or to a new one
    pub fn login(&mut self, miner: &MinerHandle, request: &LoginRequest) {
        let reusable = self
            .idles
            .iter()
            .copied()
            .find(|id| self.upstreams.get(id).is_some_and(Mapper::is_reusable));

        if let Some(id) = reusable {
            self.idles.remove(&id);
            if let Some(mapper) = self.upstreams.get_mut(&id) {
                debug!("Reusing mapper {id} for miner {}", miner.id());
                mapper.reuse(miner, request);
            }
            return;
        }

        let id = MapperId(self.sequence);
        self.sequence += 1;

        let mapper = self.factory.create(id, &self.config);
        debug!("Created mapper {id} for miner {}", miner.id());
        self.upstreams.entry(id).or_insert(mapper).add(miner, request);
    }

    /// Detach a miner from its mapper
    pub fn remove(&mut self, miner: &MinerHandle) {
        let Some(id) = miner.mapper() else {
            trace!("Close for unassigned miner {}", miner.id());
            return;
        };
        if self.idles.contains(&id) {
            trace!("Mapper {id} already idle, ignoring close for miner {}", miner.id());
            return;
        }
        let Some(mapper) = self.upstreams.get_mut(&id) else {
            trace!("Close for unknown mapper {id}");
            return;
        };

        mapper.remove(miner);

        if self.reuse_timeout.is_zero() {
            self.upstreams.remove(&id);
            debug!("Released mapper {id} (reuse disabled)");
        } else {
            self.idles.insert(id);
            debug!("Mapper {id} is now idle");
        }
    }

    /// Forward a share to the miner's mapper, if it still has one
    pub fn submit(&mut self, event: &SubmitEvent) {
        let Some(id) = event.miner.mapper() else {
            return;
        };
        if self.idles.contains(&id) {
            return;
        }
        match self.upstreams.get_mut(&id) {
            Some(mapper) => mapper.submit(event),
            None => trace!("Dropping late submit for mapper {id}"),
        }
    }

    /// Sweep with an explicit clock; returns how many mappers were released
    pub fn tick_at(&mut self, ticks: u64, now: Instant) -> usize {
        let mut released = Vec::new();

        for (id, mapper) in &mut self.upstreams {
            if mapper.idle_time() > self.reuse_timeout {
                released.push(*id);
                continue;
            }

            mapper.tick(ticks, now);
        }

        for id in &released {
            self.idles.remove(id);
            if self.upstreams.remove(id).is_some() {
                debug!("Evicted mapper {id} after idle timeout");
            }
        }

        released.len()
    }

    /// Update the reuse timeout and push a changed pool list to every mapper.
    ///
    /// Returns the number of mappers reloaded.
    pub fn reload(&mut self, config: &ProxyConfig, previous: &ProxyConfig) -> usize {
        self.reuse_timeout = config.reuse_timeout;
        self.config = config.clone();

        // Vec equality: same length and element-wise equal
        if config.pools == previous.pools {
            return 0;
        }

        for mapper in self.upstreams.values_mut() {
            mapper.reload(&config.pools);
        }

        info!(
            "Pool list changed, reloaded {} mapper(s) with {} pool(s)",
            self.upstreams.len(),
            config.pools.len()
        );
        self.upstreams.len()
    }

    /// Connection summary for the given counters
    pub fn summary(&self, counters: &Counters) -> ConnectionSummary {
        ConnectionSummary::new(self.upstreams(), counters)
    }
}

impl<F: MapperFactory> Splitter for SimpleSplitter<F> {
    fn connect(&mut self) {}

    fn gc(&mut self) {}

    fn tick(&mut self, ticks: u64) {
        self.tick_at(ticks, Instant::now());
    }

    fn upstreams(&self) -> UpstreamCounts {
        let active = self
            .upstreams
            .iter()
            .filter(|(id, mapper)| !self.idles.contains(*id) && mapper.is_active())
            .count();

        UpstreamCounts::new(active as u64, self.idles.len() as u64, self.upstreams.len() as u64)
    }

    fn print_connections(&self, counters: &Counters) {
        self.summary(counters).log(self.config.colors);
    }

    fn on_event(&mut self, event: ProxyEvent) {
        match event {
            ProxyEvent::Close { miner } => self.remove(&miner),
            ProxyEvent::Login { miner, request } => self.login(&miner, &request),
            ProxyEvent::Submit(submit) => self.submit(&submit),
            _ => {}
        }
    }

    fn on_config_changed(&mut self, config: &ProxyConfig, previous: &ProxyConfig) {
        self.reload(config, previous);
    }
}
