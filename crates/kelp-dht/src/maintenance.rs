//! The maintenance queue.
//!
//! Peers with a scheduled liveness check, in insertion order. The probe
//! layer drains due entries with [`MaintenanceQueue::drain_due`] and
//! reports results back through the peer map's online/offline paths.

use indexmap::IndexMap;
use kelp_core::{PeerId, Timestamp};
use parking_lot::Mutex;

use crate::peer::PeerAddress;

/// Insertion-ordered mapping of peer to next-check deadline.
pub(crate) struct MaintenanceQueue {
    // IndexMap keeps the original position on re-insert, so
    // re-scheduling a peer updates its deadline without moving it.
    entries: Mutex<IndexMap<PeerId, (PeerAddress, Timestamp)>>,
}

impl MaintenanceQueue {
    pub(crate) fn new() -> Self {
        Self {
            entries: Mutex::new(IndexMap::new()),
        }
    }

    /// Schedules (or re-schedules) a check for the peer.
    pub(crate) fn schedule(&self, peer: PeerAddress, deadline: Timestamp) {
        let mut entries = self.entries.lock();
        entries.insert(*peer.id(), (peer, deadline));
    }

    /// Drops the peer's pending check, if any.
    pub(crate) fn remove(&self, id: &PeerId) {
        let mut entries = self.entries.lock();
        entries.shift_remove(id);
    }

    /// Removes and returns every peer whose deadline is at or before
    /// `now`, in insertion order.
    pub(crate) fn drain_due(&self, now: Timestamp) -> Vec<PeerAddress> {
        let mut due = Vec::new();
        let mut entries = self.entries.lock();
        entries.retain(|_, (peer, deadline)| {
            if *deadline <= now {
                due.push(peer.clone());
                false
            } else {
                true
            }
        });
        due
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }
}
