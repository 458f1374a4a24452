//! Maintenance scheduling scenarios.
//!
//! The peer map hands the probe layer peers whose liveness check is
//! due; probe results come back through the online/offline paths.

use std::time::Duration;

use kelp_core::PeerId;
use kelp_dht::{RoutingConfig, RoutingTable};
use kelp_tests::{init_tracing, peer_in_class};

#[test]
fn fresh_peer_is_checked_immediately() {
    init_tracing();
    let table = RoutingTable::new(PeerId::random(), RoutingConfig::default()).unwrap();
    let peer = peer_in_class(table.local_id(), 42, 0);

    table.peer_online(&peer, None);

    let due = table.peers_for_maintenance();
    assert_eq!(due, vec![peer]);
    assert!(table.peers_for_maintenance().is_empty());
}

#[test]
fn confirmed_peer_waits_a_full_interval() {
    init_tracing();
    let config = RoutingConfig {
        maintenance_timeouts_secs: vec![60, 120],
        ..Default::default()
    };
    let table = RoutingTable::new(PeerId::random(), config).unwrap();
    let peer = peer_in_class(table.local_id(), 42, 0);

    table.peer_online(&peer, None);
    assert_eq!(table.peers_for_maintenance(), vec![peer.clone()]);

    table.peer_online(&peer, None);
    assert!(table.peers_for_maintenance().is_empty());
}

#[test]
fn probe_interval_widens_with_uptime() {
    init_tracing();
    // a zero first interval means every first-hand confirmation counts
    // as a survived probe
    let config = RoutingConfig {
        maintenance_timeouts_secs: vec![0, 60],
        ..Default::default()
    };
    let table = RoutingTable::new(PeerId::random(), config).unwrap();
    let peer = peer_in_class(table.local_id(), 42, 0);

    // first contact: due at once, and the survived probe moves the
    // peer to the next interval tier
    table.peer_online(&peer, None);
    assert_eq!(table.peers_for_maintenance(), vec![peer.clone()]);

    // confirmed again: now a full 60s out rather than immediate
    table.peer_online(&peer, None);
    assert!(table.peers_for_maintenance().is_empty());
}

#[test]
fn failing_peer_is_rescheduled_immediately() {
    init_tracing();
    let config = RoutingConfig {
        maintenance_timeouts_secs: vec![60],
        ..Default::default()
    };
    let table = RoutingTable::new(PeerId::random(), config).unwrap();
    let peer = peer_in_class(table.local_id(), 42, 0);

    table.peer_online(&peer, None);
    table.peers_for_maintenance();
    table.peer_online(&peer, None);
    assert!(table.peers_for_maintenance().is_empty());

    // one failure is not enough to remove, but it voids the peer's
    // online standing: check it again right away
    assert!(!table.peer_offline(&peer, false));
    assert_eq!(table.peers_for_maintenance(), vec![peer.clone()]);
    assert!(table.contains(&peer));
}

#[test]
fn removal_clears_the_pending_check() {
    init_tracing();
    let table = RoutingTable::new(PeerId::random(), RoutingConfig::default()).unwrap();
    let peer = peer_in_class(table.local_id(), 42, 0);

    table.peer_online(&peer, None);
    assert!(table.peer_offline(&peer, true));
    assert!(table.peers_for_maintenance().is_empty());
}

#[test]
fn empty_timeouts_disable_maintenance() {
    init_tracing();
    let config = RoutingConfig {
        maintenance_timeouts_secs: Vec::new(),
        ..Default::default()
    };
    let table = RoutingTable::new(PeerId::random(), config).unwrap();
    let peer = peer_in_class(table.local_id(), 42, 0);

    table.peer_online(&peer, None);
    table.peer_offline(&peer, false);
    assert!(table.peers_for_maintenance().is_empty());
}

#[test]
fn drain_preserves_scheduling_order() {
    init_tracing();
    let table = RoutingTable::new(PeerId::random(), RoutingConfig::default()).unwrap();

    let peers: Vec<_> = (0..5)
        .map(|salt| peer_in_class(table.local_id(), 42, salt))
        .collect();
    for peer in &peers {
        table.peer_online(peer, None);
    }

    assert_eq!(table.peers_for_maintenance(), peers);
}
