// ABOUTME: Behavioral tests for the idle sweeper
// Verifies timeout-based eviction, exactly-once release and id sequencing

use mapper_proxy::splitter::{MapperId, Miner, Splitter};
use pretty_assertions::assert_eq;

use super::fixtures::harness;

/// The full reuse-then-expire walk through with a 30s timeout
#[test]
fn test_reuse_then_expire_scenario() {
    let mut h = harness(30);
    let a = Miner::handle(1, "10.0.0.1");
    let b = Miner::handle(2, "10.0.0.2");
    let c = Miner::handle(3, "10.0.0.3");

    h.login(&a);
    assert_eq!(a.mapper(), Some(MapperId(0)));
    h.close(&a);

    h.at(10).login(&b);
    assert_eq!(b.mapper(), Some(MapperId(0)));
    h.at(15).close(&b);

    // Idle for 35s, past the timeout
    h.at(50);
    assert_eq!(h.tick(), 1);
    assert_eq!(h.released(), 1);
    assert!(h.splitter.is_empty());

    h.login(&c);
    assert_eq!(c.mapper(), Some(MapperId(1)));
}

/// A mapper idle for exactly the timeout survives; one more second evicts it
#[test]
fn test_eviction_requires_idle_time_past_timeout() {
    let mut h = harness(30);
    let a = Miner::handle(1, "10.0.0.1");
    h.login(&a);
    h.at(5).close(&a);

    h.at(35);
    assert_eq!(h.tick(), 0);
    assert_eq!(h.splitter.idle_sessions(), vec![MapperId(0)]);

    h.at(36);
    assert_eq!(h.tick(), 1);
}

/// Further ticks and late closes never release an evicted mapper again
#[test]
fn test_evicted_mapper_released_exactly_once() {
    let mut h = harness(10);
    let a = Miner::handle(1, "10.0.0.1");
    h.login(&a);
    h.close(&a);

    h.at(20);
    assert_eq!(h.tick(), 1);
    assert_eq!(h.tick(), 0);
    h.close(&a);
    assert_eq!(h.tick(), 0);

    assert_eq!(h.released(), 1);
}

/// Bound mappers are ticked but never swept, however old they are
#[test]
fn test_sweeper_keeps_bound_mappers() {
    let mut h = harness(10);
    let a = Miner::handle(1, "10.0.0.1");
    let b = Miner::handle(2, "10.0.0.2");
    h.login(&a);
    h.login(&b);
    h.close(&b);

    h.at(1_000);
    assert_eq!(h.tick(), 1);
    assert_eq!(h.tick(), 0);

    assert_eq!(h.splitter.active_sessions(), vec![MapperId(0)]);
    assert_eq!(h.mapper(0).map(|m| m.last_tick()), Some(2));
}

/// Ids keep increasing across create/evict cycles
#[test]
fn test_ids_are_monotonic_across_evictions() {
    let mut h = harness(5);
    let mut seen = Vec::new();

    for round in 0..4u64 {
        let miner = Miner::handle(round, "10.0.0.1");
        h.at(round * 100).login(&miner);
        seen.extend(miner.mapper());
        h.close(&miner);
        h.at(round * 100 + 50);
        assert_eq!(h.tick(), 1);
    }

    assert_eq!(seen, vec![MapperId(0), MapperId(1), MapperId(2), MapperId(3)]);
    assert_eq!(h.released(), 4);
}

/// active + sleep + error always adds up to total
#[test]
fn test_upstream_counts_partition_total() {
    let mut h = harness(30);
    let miners: Vec<_> = (1..=4).map(|i| Miner::handle(i, "10.0.0.1")).collect();
    for miner in &miners {
        h.login(miner);
    }
    h.close(&miners[0]);

    let counts = h.splitter.upstreams();
    assert_eq!(counts.active, 3);
    assert_eq!(counts.sleep, 1);
    assert_eq!(counts.error, 0);
    assert_eq!(counts.active + counts.sleep + counts.error, counts.total);
}
