//! Kelp DHT - The peer map of the Kelp overlay.
//!
//! The peer map is the routing table each node keeps of other live
//! peers. It provides:
//! - 160 distance-class buckets with a soft per-bucket cap and a hard
//!   global cap
//! - Failure accounting that suppresses recently-dead peers
//! - A maintenance queue feeding the liveness-probe layer
//! - Close-peer queries ordered by XOR distance to any key
//!
//! The map is purely reactive: it spawns no tasks and never blocks on
//! I/O. The transport layer feeds it observations via
//! [`RoutingTable::peer_online`] and [`RoutingTable::peer_offline`];
//! the probe layer drains [`RoutingTable::peers_for_maintenance`].

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod listener;
pub mod maintenance;
pub mod offline;
pub mod peer;
pub mod routing;
pub mod stats;

pub use listener::{ChangeListener, OfflineListener};
pub use peer::PeerAddress;
pub use routing::{distance, distance_class, xor_cmp, RoutingConfig, RoutingTable};

use std::time::Duration;

use thiserror::Error;

/// Default soft per-bucket capacity. The classic Kademlia bucket size;
/// buckets may grow past this while global slots remain.
pub const DEFAULT_BAG_SIZE: usize = 20;

/// Default capacity of the offline-log cache.
pub const DEFAULT_CACHE_SIZE: usize = 100;

/// Default window within which repeated failures remove a peer.
pub const DEFAULT_CACHE_TIMEOUT: Duration = Duration::from_secs(60);

/// Default number of failures within the window that removes a peer.
pub const DEFAULT_MAX_FAIL: u32 = 3;

/// Default maintenance probe intervals in seconds, widening with
/// observed uptime.
pub const DEFAULT_MAINTENANCE_TIMEOUTS_SECS: [u64; 6] = [2, 4, 8, 16, 32, 64];

/// Errors from peer map construction.
#[derive(Debug, Error)]
pub enum RoutingError {
    /// The local peer id was all-zero.
    #[error("zero is not a valid local peer id")]
    ZeroLocalId,

    /// The configured bag size was zero.
    #[error("bag size must be positive")]
    ZeroBagSize,
}
