//! Per-peer observation statistics.
//!
//! Tracks when a peer was first and last seen online and how many
//! liveness probes it has survived. The probe count drives the widening
//! of maintenance intervals; the last-seen timestamp drives oversize
//! eviction (least recently seen goes first).

use std::collections::HashMap;

use kelp_core::{PeerId, Timestamp};
use parking_lot::Mutex;

/// Statistics for one tracked peer.
#[derive(Debug, Clone, Copy, Default)]
struct PeerStat {
    /// When the peer was first observed online.
    first_seen: Timestamp,
    /// When the peer was last observed online first-hand. Zero means
    /// never, which also marks a peer due for an immediate probe.
    last_seen_online: Timestamp,
    /// Number of liveness probes the peer has survived.
    checked: usize,
}

/// Observation statistics for all tracked peers, keyed by id.
pub(crate) struct PeerStats {
    stats: Mutex<HashMap<PeerId, PeerStat>>,
}

impl PeerStats {
    pub(crate) fn new() -> Self {
        Self {
            stats: Mutex::new(HashMap::new()),
        }
    }

    /// Records a first-hand online observation now.
    pub(crate) fn record_seen_online(&self, id: &PeerId) {
        let now = Timestamp::now();
        let mut stats = self.stats.lock();
        let stat = stats.entry(*id).or_default();
        if stat.first_seen.is_zero() {
            stat.first_seen = now;
        }
        stat.last_seen_online = now;
    }

    /// Resets the online timestamp to the never-seen sentinel, leaving
    /// the probe history in place. The next maintenance schedule for
    /// the peer becomes immediate.
    pub(crate) fn clear_online(&self, id: &PeerId) {
        let mut stats = self.stats.lock();
        if let Some(stat) = stats.get_mut(id) {
            stat.last_seen_online = Timestamp::ZERO;
        }
    }

    /// Returns when the peer was last observed online first-hand, or
    /// zero if never.
    pub(crate) fn last_seen_online(&self, id: &PeerId) -> Timestamp {
        self.stats
            .lock()
            .get(id)
            .map(|s| s.last_seen_online)
            .unwrap_or(Timestamp::ZERO)
    }

    /// Returns how long the peer has been known, in milliseconds.
    pub(crate) fn known_for_millis(&self, id: &PeerId) -> i64 {
        let stats = self.stats.lock();
        match stats.get(id) {
            Some(stat) if !stat.first_seen.is_zero() => {
                Timestamp::now().as_millis() - stat.first_seen.as_millis()
            }
            _ => 0,
        }
    }

    /// Returns the number of probes the peer has survived.
    pub(crate) fn checked(&self, id: &PeerId) -> usize {
        self.stats.lock().get(id).map(|s| s.checked).unwrap_or(0)
    }

    /// Bumps the probe count.
    pub(crate) fn inc_checked(&self, id: &PeerId) {
        let mut stats = self.stats.lock();
        stats.entry(*id).or_default().checked += 1;
    }
}
