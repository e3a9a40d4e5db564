// ABOUTME: Contract between the splitter and an upstream session ("mapper")
//
// A mapper owns one upstream connection and serves the miner(s) bound to it.
// The splitter only drives lifecycle through this trait; wire I/O is the
// mapper's own business. Dropping a mapper releases its upstream connection.

use std::time::{Duration, Instant};

use super::events::{LoginRequest, SubmitEvent};
use super::miner::MinerHandle;
use crate::config::{PoolUrl, ProxyConfig};

/// Sequence-assigned mapper identifier, unique for the process lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MapperId(pub u64);

impl std::fmt::Display for MapperId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Upstream session driven by the splitter
#[cfg_attr(test, mockall::automock)]
pub trait Mapper {
    fn id(&self) -> MapperId;

    /// Whether the upstream connection is up and serving work
    fn is_active(&self) -> bool;

    /// Time since the last miner detached; zero while a miner is bound
    fn idle_time(&self) -> Duration;

    /// Whether a new miner may be attached to this (idle) mapper
    fn is_reusable(&self) -> bool;

    /// Advance keepalive/retry timers
    fn tick(&mut self, ticks: u64, now: Instant);

    /// Replace the upstream pool list
    fn reload(&mut self, pools: &[PoolUrl]);

    /// Attach the first miner to a freshly created mapper
    fn add(&mut self, miner: &MinerHandle, request: &LoginRequest);

    /// Attach a miner to a mapper that was idle
    fn reuse(&mut self, miner: &MinerHandle, request: &LoginRequest);

    /// Detach a miner
    fn remove(&mut self, miner: &MinerHandle);

    /// Forward a share upstream
    fn submit(&mut self, event: &SubmitEvent);
}

/// Builds mappers for new sessions
pub trait MapperFactory {
    type Mapper: Mapper;

    fn create(&mut self, id: MapperId, config: &ProxyConfig) -> Self::Mapper;
}

impl<M, F> MapperFactory for F
where
    M: Mapper,
    F: FnMut(MapperId, &ProxyConfig) -> M,
{
    type Mapper = M;

    fn create(&mut self, id: MapperId, config: &ProxyConfig) -> M {
        self(id, config)
    }
}
