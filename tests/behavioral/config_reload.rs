// ABOUTME: Behavioral tests for configuration changes reaching live mappers
// Verifies pool list comparison by value and reload of every tracked mapper

use std::time::Duration;

use mapper_proxy::splitter::{Miner, Splitter};
use pretty_assertions::assert_eq;

use super::fixtures::{config, harness, pools};

/// Re-sending an equal pool list reloads nothing
#[test]
fn test_unchanged_pools_skip_reload() {
    let mut h = harness(30);
    h.login(&Miner::handle(1, "10.0.0.1"));

    let previous = h.splitter.config().clone();
    // Equal by value, parsed independently
    let mut next = previous.clone();
    next.pools = pools(&["pool-a.example.com"]);

    assert_eq!(h.splitter.reload(&next, &previous), 0);
    assert_eq!(h.mapper(0).map(|m| m.reloads()), Some(0));
}

/// Changed pools reach bound and idle mappers alike
#[test]
fn test_changed_pools_reload_every_mapper() {
    let mut h = harness(30);
    let a = Miner::handle(1, "10.0.0.1");
    let b = Miner::handle(2, "10.0.0.2");
    h.login(&a);
    h.login(&b);
    h.close(&b);

    let previous = h.splitter.config().clone();
    let mut next = previous.clone();
    next.pools = pools(&["pool-b.example.com", "pool-a.example.com"]);

    h.splitter.on_config_changed(&next, &previous);

    for id in 0..2 {
        let mapper = h.mapper(id).unwrap();
        assert_eq!(mapper.reloads(), 1, "mapper {id} should be reloaded");
        assert_eq!(mapper.pools(), next.pools.as_slice());
    }
}

/// Reordering pools counts as a change
#[test]
fn test_pool_order_matters() {
    let mut h = harness(30);
    h.login(&Miner::handle(1, "10.0.0.1"));

    let mut previous = config(30);
    previous.pools = pools(&["a.example.com", "b.example.com"]);
    let mut next = previous.clone();
    next.pools.reverse();

    assert_eq!(h.splitter.reload(&next, &previous), 1);
}

/// A new reuse timeout applies to the next close and the next sweep
#[test]
fn test_reuse_timeout_change_takes_effect() {
    let mut h = harness(0);
    let a = Miner::handle(1, "10.0.0.1");
    h.login(&a);

    let previous = h.splitter.config().clone();
    let mut next = previous.clone();
    next.reuse_timeout = Duration::from_secs(20);
    h.splitter.on_config_changed(&next, &previous);

    assert_eq!(h.splitter.reuse_timeout(), Duration::from_secs(20));
    assert_eq!(h.mapper(0).map(|m| m.reloads()), Some(0));

    h.close(&a);
    assert_eq!(h.splitter.idle_sessions().len(), 1, "Mapper kept for reuse");
    assert_eq!(h.released(), 0);
}

/// Mappers left without pools drop out of `active` and show up as errors
#[test]
fn test_mappers_without_pools_count_as_errors() {
    let mut h = harness(30);
    let a = Miner::handle(1, "10.0.0.1");
    let b = Miner::handle(2, "10.0.0.2");
    h.login(&a);
    h.login(&b);
    h.close(&b);

    let previous = h.splitter.config().clone();
    let mut next = previous.clone();
    next.pools.clear();
    h.splitter.reload(&next, &previous);

    let counts = h.splitter.upstreams();
    assert_eq!(counts.active, 0);
    assert_eq!(counts.sleep, 1);
    assert_eq!(counts.error, 1);
    assert_eq!(counts.total, 2);
}
