//! Close-peer query scenarios.

use std::cmp::Ordering;
use std::collections::HashSet;

use kelp_core::PeerId;
use kelp_dht::{xor_cmp, RoutingConfig, RoutingTable};
use kelp_tests::{init_tracing, peer_in_class, random_peer};

fn assert_sorted_towards(target: &PeerId, peers: &[kelp_dht::PeerAddress]) {
    for pair in peers.windows(2) {
        assert_eq!(
            xor_cmp(target, pair[0].id(), pair[1].id()),
            Ordering::Less,
            "close peers out of order"
        );
    }
}

#[test]
fn results_are_sorted_and_unique() {
    init_tracing();
    let table = RoutingTable::new(PeerId::random(), RoutingConfig::default()).unwrap();

    let mut inserted = 0;
    for _ in 0..100 {
        if table.peer_online(&random_peer(), None) {
            inserted += 1;
        }
    }
    assert_eq!(table.len(), inserted);

    let target = PeerId::random();
    let close = table.close_peers(&target, 20);

    assert!(close.len() >= inserted.min(20));
    assert_sorted_towards(&target, &close);

    let ids: HashSet<_> = close.iter().map(|p| *p.id()).collect();
    assert_eq!(ids.len(), close.len());
    assert!(!ids.contains(table.local_id()));
}

#[test]
fn prefix_of_the_result_is_the_closest_known() {
    init_tracing();
    let table = RoutingTable::new(PeerId::random(), RoutingConfig::default()).unwrap();
    for _ in 0..60 {
        table.peer_online(&random_peer(), None);
    }

    let target = PeerId::random();
    let close = table.close_peers(&target, 10);

    // the head of the sorted result beats every other known peer
    let best = close.first().expect("table is not empty");
    for other in table.get_all() {
        assert_ne!(
            xor_cmp(&target, other.id(), best.id()),
            Ordering::Less,
            "a closer peer was left out of the result"
        );
    }
}

#[test]
fn sparse_table_returns_what_it_has() {
    init_tracing();
    let table = RoutingTable::new(PeerId::random(), RoutingConfig::default()).unwrap();
    for salt in 0..3 {
        table.peer_online(&peer_in_class(table.local_id(), 50, salt), None);
    }

    let target = kelp_tests::id_in_class(table.local_id(), 50, 60);
    let close = table.close_peers(&target, 5);
    assert_eq!(close.len(), 3);
    assert_sorted_towards(&target, &close);
}

#[test]
fn query_for_the_local_id_walks_outward() {
    init_tracing();
    let table = RoutingTable::new(PeerId::random(), RoutingConfig::default()).unwrap();
    let near = peer_in_class(table.local_id(), 10, 0);
    let far = peer_in_class(table.local_id(), 140, 0);
    table.peer_online(&near, None);
    table.peer_online(&far, None);

    let close = table.close_peers(table.local_id(), 1);
    assert_eq!(close.first(), Some(&near));

    let all = table.close_peers(table.local_id(), 10);
    assert_eq!(all.len(), 2);
    assert_sorted_towards(table.local_id(), &all);
}

#[test]
fn empty_table_returns_empty() {
    init_tracing();
    let table = RoutingTable::new(PeerId::random(), RoutingConfig::default()).unwrap();
    assert!(table.close_peers(&PeerId::random(), 5).is_empty());
    assert!(table.close_peers(table.local_id(), 5).is_empty());
}
