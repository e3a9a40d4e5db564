// ABOUTME: In-memory mapper used to replay event traces without an upstream
//
// Models exactly what the splitter observes: binding, idle time measured on a
// virtual clock, reusability and pool reloads. No sockets are opened.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::config::PoolUrl;
use crate::splitter::events::{LoginRequest, SubmitEvent};
use crate::splitter::mapper::{Mapper, MapperId};
use crate::splitter::miner::MinerHandle;

// === Virtual Clock ===

/// Millisecond clock advanced explicitly by the replay driver
#[derive(Debug, Clone, Default)]
pub struct VirtualClock {
    millis: Arc<AtomicU64>,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time elapsed since the start of the replay
    pub fn now(&self) -> Duration {
        Duration::from_millis(self.millis.load(Ordering::Relaxed))
    }

    /// Move the clock forward; going backwards is ignored
    pub fn advance_to(&self, at: Duration) {
        let millis = u64::try_from(at.as_millis()).unwrap_or(u64::MAX);
        self.millis.fetch_max(millis, Ordering::Relaxed);
    }
}

// === Replay Mapper ===

/// Mapper whose upstream is always reachable while it has pools
#[derive(Debug)]
pub struct ReplayMapper {
    id: MapperId,
    clock: VirtualClock,
    pools: Vec<PoolUrl>,
    miner: Option<MinerHandle>,
    detached_at: Option<Duration>,
    active: bool,
    last_tick: u64,
    submitted: u64,
    reloads: u64,
    /// Shared with the driver to count drops
    released: Arc<AtomicU64>,
}

impl ReplayMapper {
    pub fn new(
        id: MapperId,
        pools: Vec<PoolUrl>,
        clock: VirtualClock,
        released: Arc<AtomicU64>,
    ) -> Self {
        Self {
            id,
            clock,
            pools,
            miner: None,
            detached_at: None,
            active: false,
            last_tick: 0,
            submitted: 0,
            reloads: 0,
            released,
        }
    }

    fn bind(&mut self, miner: &MinerHandle) {
        miner.set_mapper_id(self.id);
        self.miner = Some(Arc::clone(miner));
        self.detached_at = None;
        self.active = !self.pools.is_empty();
    }

    pub fn pools(&self) -> &[PoolUrl] {
        &self.pools
    }

    pub fn submitted(&self) -> u64 {
        self.submitted
    }

    pub fn reloads(&self) -> u64 {
        self.reloads
    }

    pub fn last_tick(&self) -> u64 {
        self.last_tick
    }
}

impl Mapper for ReplayMapper {
    fn id(&self) -> MapperId {
        self.id
    }

    fn is_active(&self) -> bool {
        self.active && self.miner.is_some()
    }

    fn idle_time(&self) -> Duration {
        self.detached_at
            .map_or(Duration::ZERO, |at| self.clock.now().saturating_sub(at))
    }

    fn is_reusable(&self) -> bool {
        self.miner.is_none() && self.active
    }

    fn tick(&mut self, ticks: u64, _now: Instant) {
        self.last_tick = ticks;
    }

    fn reload(&mut self, pools: &[PoolUrl]) {
        self.pools = pools.to_vec();
        self.reloads += 1;
        // An empty pool list leaves nothing to connect to
        self.active = !self.pools.is_empty();
    }

    fn add(&mut self, miner: &MinerHandle, _request: &LoginRequest) {
        self.bind(miner);
    }

    fn reuse(&mut self, miner: &MinerHandle, _request: &LoginRequest) {
        self.bind(miner);
    }

    fn remove(&mut self, miner: &MinerHandle) {
        if self.miner.as_ref().is_some_and(|m| m.id() == miner.id()) {
            self.miner = None;
            self.detached_at = Some(self.clock.now());
            miner.clear_mapper_id();
        }
    }

    fn submit(&mut self, event: &SubmitEvent) {
        trace!("Mapper {} forwarding share for job {}", self.id, event.job_id);
        self.submitted += 1;
    }
}

impl Drop for ReplayMapper {
    fn drop(&mut self) {
        debug!("Mapper {} released", self.id);
        self.released.fetch_add(1, Ordering::Relaxed);
    }
}
