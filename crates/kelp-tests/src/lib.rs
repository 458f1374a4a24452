//! Integration tests and shared helpers for the Kelp peer map.
//!
//! This crate provides:
//! - Deterministic construction of ids at a chosen distance class
//! - Peer builders for scenario tests
//! - One-line tracing setup for debugging test runs

use std::net::SocketAddr;

use kelp_core::PeerId;
use kelp_dht::PeerAddress;

/// Initializes tracing for a test run. Safe to call from every test;
/// only the first call wins.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "debug".into()),
        )
        .with_test_writer()
        .try_init();
}

/// A loopback socket address on the given port.
pub fn sock(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}

/// An id at the given XOR-distance class from `local`.
///
/// The class bit is flipped, and the bits of `salt` are folded into the
/// positions below it, so distinct salts give distinct ids within the
/// same class (for classes with enough room).
pub fn id_in_class(local: &PeerId, class: usize, salt: u64) -> PeerId {
    assert!(class < PeerId::BITS);
    let mut bytes = *local.as_bytes();
    let byte = 19 - class / 8;
    bytes[byte] ^= 1 << (class % 8);
    for bit in 0..class.min(48) {
        if salt >> bit & 1 == 1 {
            let b = 19 - bit / 8;
            bytes[b] ^= 1 << (bit % 8);
        }
    }
    PeerId::new(bytes)
}

/// A peer at the given distance class from `local`.
pub fn peer_in_class(local: &PeerId, class: usize, salt: u64) -> PeerAddress {
    PeerAddress::new(id_in_class(local, class, salt), sock(4000))
}

/// A peer with a random id.
pub fn random_peer() -> PeerAddress {
    PeerAddress::new(PeerId::random(), sock(4000))
}
