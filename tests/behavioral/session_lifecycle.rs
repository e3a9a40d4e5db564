// ABOUTME: Behavioral tests for miner to mapper binding and reuse
// Verifies one mapper per miner, reuse within the timeout, zero-timeout release

use std::collections::HashSet;

use mapper_proxy::splitter::{MapperId, Miner, Splitter};
use pretty_assertions::assert_eq;

use super::fixtures::harness;

/// Every concurrently connected miner gets its own mapper
#[test]
fn test_each_miner_gets_a_distinct_mapper() {
    let mut h = harness(30);
    let miners: Vec<_> = (1..=5).map(|i| Miner::handle(i, "10.0.0.1")).collect();

    for miner in &miners {
        h.login(miner);
    }

    let assigned: HashSet<_> = miners.iter().filter_map(|m| m.mapper()).collect();
    assert_eq!(assigned.len(), 5, "No two miners may share a mapper");
    assert_eq!(h.splitter.active_sessions().len(), 5);
    assert!(h.splitter.idle_sessions().is_empty());
    assert_eq!(h.splitter.upstreams().active, 5);
}

/// A miner logging in after another left resumes the idle mapper
#[test]
fn test_login_reuses_idle_mapper_within_timeout() {
    let mut h = harness(30);
    let a = Miner::handle(1, "10.0.0.1");
    let b = Miner::handle(2, "10.0.0.2");

    h.login(&a);
    h.close(&a);
    assert_eq!(h.splitter.idle_sessions(), vec![MapperId(0)]);
    assert_eq!(a.mapper(), None, "Closed miner must be unassigned");

    h.at(10).login(&b);

    assert_eq!(b.mapper(), Some(MapperId(0)));
    assert_eq!(h.splitter.next_sequence(), 1, "Reuse must not create a mapper");
    assert!(h.splitter.idle_sessions().is_empty());
    assert_eq!(h.released(), 0);
}

/// Reuse picks the lowest idle id first
#[test]
fn test_reuse_prefers_oldest_idle_mapper() {
    let mut h = harness(30);
    let miners: Vec<_> = (1..=3).map(|i| Miner::handle(i, "10.0.0.1")).collect();
    for miner in &miners {
        h.login(miner);
    }
    h.close(&miners[2]);
    h.close(&miners[0]);

    let newcomer = Miner::handle(9, "10.0.0.9");
    h.login(&newcomer);

    assert_eq!(newcomer.mapper(), Some(MapperId(0)));
    assert_eq!(h.splitter.idle_sessions(), vec![MapperId(2)]);
}

/// With reuse disabled a mapper is released as soon as its miner leaves
#[test]
fn test_zero_timeout_releases_on_close() {
    let mut h = harness(0);
    let a = Miner::handle(1, "10.0.0.1");

    h.login(&a);
    assert_eq!(h.released(), 0);

    h.close(&a);

    assert_eq!(h.released(), 1);
    assert!(h.splitter.is_empty());
    assert!(h.splitter.idle_sessions().is_empty());

    let b = Miner::handle(2, "10.0.0.2");
    h.login(&b);
    assert_eq!(b.mapper(), Some(MapperId(1)), "Released ids are never reused");
}

/// Closing twice, or closing a miner that never logged in, changes nothing
#[test]
fn test_close_is_idempotent() {
    let mut h = harness(30);
    let a = Miner::handle(1, "10.0.0.1");
    let stranger = Miner::handle(2, "10.0.0.2");

    h.close(&stranger);
    assert!(h.splitter.is_empty());

    h.login(&a);
    h.close(&a);
    h.close(&a);

    assert_eq!(h.splitter.idle_sessions(), vec![MapperId(0)]);
    assert_eq!(h.splitter.len(), 1);
    assert_eq!(h.released(), 0);
}

/// Submits reach the bound mapper and are dropped once the miner left
#[test]
fn test_submit_routes_to_bound_mapper_only() {
    use mapper_proxy::splitter::{ProxyEvent, SubmitEvent};

    let mut h = harness(30);
    let a = Miner::handle(1, "10.0.0.1");
    let share = |miner| {
        ProxyEvent::Submit(SubmitEvent {
            miner,
            request_id: 4,
            job_id: "job-1".into(),
            nonce: "deadbeef".into(),
            result: "00ff".into(),
            algorithm: None,
        })
    };

    // Not logged in yet
    h.splitter.on_event(share(a.clone()));
    h.login(&a);
    h.splitter.on_event(share(a.clone()));
    h.splitter.on_event(share(a.clone()));
    h.close(&a);
    h.splitter.on_event(share(a.clone()));

    assert_eq!(h.mapper(0).map(|m| m.submitted()), Some(2));
}
