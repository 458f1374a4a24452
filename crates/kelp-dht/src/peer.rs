//! The peer endpoint record.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::{IpAddr, SocketAddr};

use kelp_core::PeerId;
use serde::{Deserialize, Serialize};

/// A peer's endpoint: its id, its socket address, and whether its TCP
/// port is known to be unreachable from the outside.
///
/// Equality and hashing go by id only; two records for the same peer at
/// different addresses compare equal. Value-like: the peer map stores
/// its own copies, so mutating a record after handing it in has no
/// effect on the map.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
pub struct PeerAddress {
    id: PeerId,
    addr: SocketAddr,
    firewalled_tcp: bool,
}

impl PeerAddress {
    /// Creates a new peer address.
    pub fn new(id: PeerId, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            firewalled_tcp: false,
        }
    }

    /// Creates a new peer address with the firewalled-TCP flag set.
    pub fn firewalled(id: PeerId, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            firewalled_tcp: true,
        }
    }

    /// Returns the peer id.
    pub fn id(&self) -> &PeerId {
        &self.id
    }

    /// Returns the socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Returns the IP address.
    pub fn ip(&self) -> IpAddr {
        self.addr.ip()
    }

    /// Returns true if the peer's TCP port is firewalled.
    pub fn is_firewalled_tcp(&self) -> bool {
        self.firewalled_tcp
    }
}

impl PartialEq for PeerAddress {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Hash for PeerAddress {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.addr)
    }
}
