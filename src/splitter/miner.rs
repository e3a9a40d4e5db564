// ABOUTME: Downstream miner handle shared between the listener, mappers and the splitter
//
// The miner carries a reverse pointer (`mapper_id`) to the mapper it is bound to.
// Mappers write it on attach/reuse/detach; the splitter only reads it.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use super::mapper::MapperId;

/// Sentinel stored in `Miner::mapper_id` while the miner is not bound
pub const UNASSIGNED: i64 = -1;

// === Miner ID ===

/// Identifier for a downstream connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MinerId(pub u64);

impl std::fmt::Display for MinerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// === Miner ===

/// A downstream connection as seen by the routing core
#[derive(Debug)]
pub struct Miner {
    id: MinerId,
    /// Remote address, informational only
    ip: String,
    mapper_id: AtomicI64,
}

/// Miners are shared between the listener that owns the socket and the mapper serving them
pub type MinerHandle = Arc<Miner>;

impl Miner {
    /// Create a new, unassigned miner
    pub fn new(id: MinerId, ip: impl Into<String>) -> Self {
        Self {
            id,
            ip: ip.into(),
            mapper_id: AtomicI64::new(UNASSIGNED),
        }
    }

    /// Convenience constructor returning a shared handle
    pub fn handle(id: u64, ip: impl Into<String>) -> MinerHandle {
        Arc::new(Self::new(MinerId(id), ip))
    }

    pub fn id(&self) -> MinerId {
        self.id
    }

    pub fn ip(&self) -> &str {
        &self.ip
    }

    /// Raw reverse pointer, `UNASSIGNED` when not bound
    pub fn mapper_id(&self) -> i64 {
        self.mapper_id.load(Ordering::Acquire)
    }

    /// Resolve the reverse pointer into a mapper id, if assigned
    pub fn mapper(&self) -> Option<MapperId> {
        u64::try_from(self.mapper_id()).ok().map(MapperId)
    }

    /// Bind this miner to a mapper. Called by mappers, never by the splitter.
    pub fn set_mapper_id(&self, id: MapperId) {
        // Ids beyond i64::MAX are unreachable for a per-process sequence
        let raw = i64::try_from(id.0).unwrap_or(i64::MAX);
        self.mapper_id.store(raw, Ordering::Release);
    }

    /// Mark this miner as unbound
    pub fn clear_mapper_id(&self) {
        self.mapper_id.store(UNASSIGNED, Ordering::Release);
    }
}
