// ABOUTME: Miner and share counters read by the diagnostics reporter
//
// Tracks:
// - Miners: currently connected, high-water mark
// - Shares: accepted, rejected

use std::sync::atomic::{AtomicU64, Ordering};

/// Process-level counters, passed explicitly to whoever reports them
#[derive(Debug, Default)]
pub struct Counters {
    miners: AtomicU64,
    max_miners: AtomicU64,
    accepted: AtomicU64,
    rejected: AtomicU64,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_miner(&self) {
        let current = self.miners.fetch_add(1, Ordering::Relaxed) + 1;
        self.max_miners.fetch_max(current, Ordering::Relaxed);
    }

    pub fn remove_miner(&self) {
        // Saturate: a close for a miner that never counted must not wrap
        let _ = self
            .miners
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    pub fn accept(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn reject(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn miners(&self) -> u64 {
        self.miners.load(Ordering::Relaxed)
    }

    pub fn max_miners(&self) -> u64 {
        self.max_miners.load(Ordering::Relaxed)
    }

    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }
}
