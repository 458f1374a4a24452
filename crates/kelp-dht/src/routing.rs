//! The routing table.
//!
//! Peers live in 160 buckets, one per XOR-distance class to the local
//! id. Each bucket has a soft capacity (`bag_size`); the table as a
//! whole has a hard one (`bag_size * 160`). While global slots remain,
//! a bucket may grow past its soft cap, and the oversize index
//! remembers which buckets did so that hitting the global cap can
//! reclaim a slot without scanning all 160.
//!
//! Any thread may call any operation. Bucket locks are acquired before
//! the oversize-index and stats locks, and neither of those ever takes
//! a bucket lock. No lock is held across a listener callback except the
//! listener list's own.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Duration;

use kelp_core::{PeerId, Timestamp};
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::listener::{ChangeListener, ListenerSet, OfflineListener};
use crate::maintenance::MaintenanceQueue;
use crate::offline::OfflineLog;
use crate::peer::PeerAddress;
use crate::stats::PeerStats;
use crate::{
    RoutingError, DEFAULT_BAG_SIZE, DEFAULT_CACHE_SIZE, DEFAULT_CACHE_TIMEOUT,
    DEFAULT_MAINTENANCE_TIMEOUTS_SECS, DEFAULT_MAX_FAIL,
};

/// The XOR distance between two ids.
pub fn distance(a: &PeerId, b: &PeerId) -> PeerId {
    a.xor(b)
}

/// The distance class of `b` relative to `a`: the index of the bucket
/// that holds peers at that distance, `None` when the ids are equal.
///
/// Two ids one bit apart are in class 0; the function is symmetric.
pub fn distance_class(a: &PeerId, b: &PeerId) -> Option<usize> {
    let d = distance(a, b);
    if d.is_zero() {
        None
    } else {
        Some(d.bit_length() as usize - 1)
    }
}

/// Compares which of `a` or `b` is closer to `reference` under the XOR
/// metric. `Less` means `a` is closer.
pub fn xor_cmp(reference: &PeerId, a: &PeerId, b: &PeerId) -> Ordering {
    distance(reference, a).cmp(&distance(reference, b))
}

/// Configuration for the routing table. Immutable after construction.
#[derive(Debug, Clone)]
pub struct RoutingConfig {
    /// Soft per-bucket capacity. Buckets may exceed it while global
    /// slots remain. Must be positive.
    pub bag_size: usize,
    /// Capacity of the offline-log cache.
    pub cache_size: usize,
    /// Window within which `max_fail` failures remove a peer, and for
    /// which a removed peer stays suppressed.
    pub cache_timeout: Duration,
    /// Failure count that, within the window, removes a peer.
    pub max_fail: u32,
    /// Maintenance probe intervals in seconds, non-decreasing. The
    /// interval for a peer widens with the number of probes it has
    /// survived. Empty disables maintenance.
    pub maintenance_timeouts_secs: Vec<u64>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            bag_size: DEFAULT_BAG_SIZE,
            cache_size: DEFAULT_CACHE_SIZE,
            cache_timeout: DEFAULT_CACHE_TIMEOUT,
            max_fail: DEFAULT_MAX_FAIL,
            maintenance_timeouts_secs: DEFAULT_MAINTENANCE_TIMEOUTS_SECS.to_vec(),
        }
    }
}

/// The peer map: tracked peers bucketed by distance class, with
/// failure suppression and maintenance scheduling.
pub struct RoutingTable {
    local: PeerId,
    config: RoutingConfig,
    max_peers: usize,
    buckets: Vec<RwLock<HashMap<PeerId, PeerAddress>>>,
    oversize: Mutex<HashSet<usize>>,
    offline_log: OfflineLog,
    maintenance: MaintenanceQueue,
    stats: PeerStats,
    peer_count: AtomicUsize,
    filtered: Mutex<HashSet<IpAddr>>,
    change_listeners: ListenerSet<dyn ChangeListener>,
    offline_listeners: ListenerSet<dyn OfflineListener>,
}

impl RoutingTable {
    /// Creates a new routing table around the local id.
    pub fn new(local: PeerId, config: RoutingConfig) -> Result<Self, RoutingError> {
        if local.is_zero() {
            return Err(RoutingError::ZeroLocalId);
        }
        if config.bag_size == 0 {
            return Err(RoutingError::ZeroBagSize);
        }

        let buckets = (0..PeerId::BITS)
            .map(|_| RwLock::new(HashMap::new()))
            .collect();
        let offline_log =
            OfflineLog::new(config.cache_size, config.cache_timeout, config.max_fail);
        let max_peers = config.bag_size * PeerId::BITS;

        Ok(Self {
            local,
            max_peers,
            buckets,
            oversize: Mutex::new(HashSet::new()),
            offline_log,
            maintenance: MaintenanceQueue::new(),
            stats: PeerStats::new(),
            peer_count: AtomicUsize::new(0),
            filtered: Mutex::new(HashSet::new()),
            change_listeners: ListenerSet::new(),
            offline_listeners: ListenerSet::new(),
            config,
        })
    }

    /// Returns the local peer id.
    pub fn local_id(&self) -> &PeerId {
        &self.local
    }

    /// Returns the number of tracked peers. Constant-time; may skew by
    /// one against the bucket contents during a concurrent mutation.
    pub fn len(&self) -> usize {
        self.peer_count.load(AtomicOrdering::Relaxed)
    }

    /// Returns true if no peers are tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Records that `remote` was observed alive. `referrer` is the peer
    /// that told us, or `None` when we spoke to `remote` ourselves.
    ///
    /// First-hand contact clears any failure history before anything
    /// else: a peer we just talked to is trusted over its record.
    /// Returns true iff the peer was newly inserted; an in-place
    /// refresh or any rejection returns false.
    pub fn peer_online(&self, remote: &PeerAddress, referrer: Option<&PeerAddress>) -> bool {
        let first_hand = referrer.is_none();
        if first_hand {
            self.offline_log.forget(remote.id());
        }
        if remote.id().is_zero()
            || *remote.id() == self.local
            || self.is_suppressed(remote.id())
            || self.filtered.lock().contains(&remote.ip())
            || remote.is_firewalled_tcp()
        {
            return false;
        }
        let class = match distance_class(&self.local, remote.id()) {
            Some(class) => class,
            None => return false,
        };

        let known = self.buckets[class].read().contains_key(remote.id());
        if self.len() < self.max_peers || known {
            // room to grow (or a refresh): the soft bucket cap does not
            // apply while global slots remain
            self.prepare_insert_or_update(remote, first_hand);
            return self.insert_or_update(remote, class);
        }

        // table full; only grow this bucket if it is under its soft cap
        // and an oversize bucket elsewhere can give a slot back
        let under_soft_cap = self.buckets[class].read().len() < self.config.bag_size;
        if under_soft_cap && self.evict_oversize() {
            self.prepare_insert_or_update(remote, first_hand);
            return self.insert_or_update(remote, class);
        }
        false
    }

    /// Reports that `remote` failed. With `force` the peer is removed
    /// unconditionally; otherwise the failure counter decides (see
    /// module docs of [`crate::offline`]). Returns true iff a bucket
    /// entry was removed.
    pub fn peer_offline(&self, remote: &PeerAddress, force: bool) -> bool {
        if remote.id().is_zero() || *remote.id() == self.local {
            return false;
        }
        debug!(peer = %remote, force, "peer reported offline");
        self.offline_listeners.notify(|l| l.peer_fail(remote));

        if self.offline_log.record_failure(remote.id(), force) {
            self.remove(remote)
        } else {
            // not enough evidence yet: probe the peer again soon
            self.stats.clear_online(remote.id());
            self.schedule_maintenance(remote);
            false
        }
    }

    /// Returns true while the peer is suppressed by recent failures.
    /// A suppression entry that has gone stale is purged on this call.
    pub fn is_suppressed(&self, id: &PeerId) -> bool {
        self.offline_log.is_suppressed(id)
    }

    /// Returns true if the peer is currently in a bucket.
    pub fn contains(&self, addr: &PeerAddress) -> bool {
        match distance_class(&self.local, addr.id()) {
            Some(class) => self.buckets[class].read().contains_key(addr.id()),
            None => false,
        }
    }

    /// Returns peers close to `id`, sorted ascending by XOR distance.
    ///
    /// Contains at least `at_least` peers when that many are known.
    /// Collection walks the bucket closest in class first, then every
    /// class below it (those are all closer than anything above), then
    /// upward only as far as needed.
    pub fn close_peers(&self, id: &PeerId, at_least: usize) -> Vec<PeerAddress> {
        let mut found = Vec::new();

        if *id == self.local {
            for class in 0..PeerId::BITS {
                if found.len() >= at_least {
                    break;
                }
                self.collect_bucket(class, &mut found);
            }
            return self.sorted_by_distance(id, found);
        }

        let class = match distance_class(&self.local, id) {
            Some(class) => class,
            None => return Vec::new(),
        };
        self.collect_bucket(class, &mut found);
        if found.len() < at_least {
            // everything below the target class is closer than anything
            // above it, so exhaust the downward walk in full
            for lower in (0..class).rev() {
                self.collect_bucket(lower, &mut found);
            }
        }
        if found.len() < at_least {
            for upper in class + 1..PeerId::BITS {
                if found.len() >= at_least {
                    break;
                }
                self.collect_bucket(upper, &mut found);
            }
        }
        self.sorted_by_distance(id, found)
    }

    /// Compares which of two peers is closer to `id`. `Less` means `a`.
    pub fn is_closer(&self, id: &PeerId, a: &PeerAddress, b: &PeerAddress) -> Ordering {
        xor_cmp(id, a.id(), b.id())
    }

    /// Compares which of two ids is closer to `id`. `Less` means `a`.
    pub fn is_closer_id(&self, id: &PeerId, a: &PeerId, b: &PeerId) -> Ordering {
        xor_cmp(id, a, b)
    }

    /// Removes and returns every peer whose scheduled liveness check is
    /// due, in scheduling order. The probe layer feeds results back via
    /// [`RoutingTable::peer_online`] / [`RoutingTable::peer_offline`].
    pub fn peers_for_maintenance(&self) -> Vec<PeerAddress> {
        if self.config.maintenance_timeouts_secs.is_empty() {
            return Vec::new();
        }
        self.maintenance.drain_due(Timestamp::now())
    }

    /// Returns a snapshot of all tracked peers, in no particular order.
    pub fn get_all(&self) -> Vec<PeerAddress> {
        let mut all = Vec::with_capacity(self.len());
        for bucket in &self.buckets {
            all.extend(bucket.read().values().cloned());
        }
        all
    }

    /// Refuses future insertions from the given IP address. Peers
    /// already tracked are unaffected.
    pub fn add_address_filter(&self, ip: IpAddr) {
        self.filtered.lock().insert(ip);
    }

    /// Subscribes to bucket-content changes.
    pub fn add_change_listener(&self, listener: Arc<dyn ChangeListener>) {
        self.change_listeners.add(listener);
    }

    /// Removes a change subscriber registered earlier. Identity is the
    /// `Arc`, not the contents.
    pub fn remove_change_listener(&self, listener: &Arc<dyn ChangeListener>) {
        self.change_listeners.remove(listener);
    }

    /// Subscribes to failure events.
    pub fn add_offline_listener(&self, listener: Arc<dyn OfflineListener>) {
        self.offline_listeners.add(listener);
    }

    /// Removes an offline subscriber registered earlier.
    pub fn remove_offline_listener(&self, listener: &Arc<dyn OfflineListener>) {
        self.offline_listeners.remove(listener);
    }

    fn collect_bucket(&self, class: usize, out: &mut Vec<PeerAddress>) {
        let bucket = self.buckets[class].read();
        out.extend(bucket.values().cloned());
    }

    fn sorted_by_distance(&self, id: &PeerId, mut peers: Vec<PeerAddress>) -> Vec<PeerAddress> {
        peers.sort_unstable_by(|a, b| xor_cmp(id, a.id(), b.id()));
        peers
    }

    /// Updates stats and schedules the next liveness check ahead of an
    /// insert or refresh.
    fn prepare_insert_or_update(&self, remote: &PeerAddress, first_hand: bool) {
        // snapshot before stamping: a peer on first contact is still
        // "never seen" for scheduling and gets probed immediately
        let last_seen = self.stats.last_seen_online(remote.id());
        if first_hand {
            self.stats.record_seen_online(remote.id());
            let timeouts = &self.config.maintenance_timeouts_secs;
            if !timeouts.is_empty() {
                // a peer that stayed reachable through a whole interval
                // earns a wider one
                let checked = self.stats.checked(remote.id()).min(timeouts.len() - 1);
                let interval_ms = timeouts[checked] as i64 * 1000;
                if self.stats.known_for_millis(remote.id()) >= interval_ms {
                    self.stats.inc_checked(remote.id());
                }
            }
        }
        self.schedule_with_last_seen(remote, last_seen);
    }

    fn schedule_maintenance(&self, remote: &PeerAddress) {
        let last_seen = self.stats.last_seen_online(remote.id());
        self.schedule_with_last_seen(remote, last_seen);
    }

    fn schedule_with_last_seen(&self, remote: &PeerAddress, last_seen: Timestamp) {
        let timeouts = &self.config.maintenance_timeouts_secs;
        if timeouts.is_empty() {
            return;
        }
        let now = Timestamp::now();
        let deadline = if last_seen.is_zero() {
            // never confirmed online: check immediately
            now
        } else {
            let checked = self.stats.checked(remote.id()).min(timeouts.len() - 1);
            now.add(Duration::from_secs(timeouts[checked]))
        };
        self.maintenance.schedule(remote.clone(), deadline);
    }

    /// Puts the peer into its bucket, updating in place when already
    /// present. Returns true on a new insert.
    fn insert_or_update(&self, remote: &PeerAddress, class: usize) -> bool {
        let inserted;
        {
            let mut bucket = self.buckets[class].write();
            inserted = !bucket.contains_key(remote.id());
            bucket.insert(*remote.id(), remote.clone());
            if inserted && bucket.len() > self.config.bag_size {
                self.oversize.lock().insert(class);
            }
        }
        if inserted {
            self.peer_count.fetch_add(1, AtomicOrdering::Relaxed);
            self.change_listeners.notify(|l| l.peer_inserted(remote));
        } else {
            self.change_listeners.notify(|l| l.peer_updated(remote));
        }
        inserted
    }

    /// Drops the peer from its bucket and the maintenance queue, fixing
    /// the oversize index inside the same critical section. Notifies
    /// `removed` only on an actual removal, `offline` either way.
    fn remove(&self, remote: &PeerAddress) -> bool {
        let class = match distance_class(&self.local, remote.id()) {
            Some(class) => class,
            None => return false,
        };
        let removed;
        {
            let mut bucket = self.buckets[class].write();
            removed = bucket.remove(remote.id()).is_some();
            if removed && bucket.len() <= self.config.bag_size {
                self.oversize.lock().remove(&class);
            }
        }
        if removed {
            self.maintenance.remove(remote.id());
            self.peer_count.fetch_sub(1, AtomicOrdering::Relaxed);
            debug!(peer = %remote, class, "removed peer");
            self.change_listeners.notify(|l| l.peer_removed(remote));
        }
        self.offline_listeners.notify(|l| l.peer_offline(remote));
        removed
    }

    /// Reclaims one global slot by evicting the least-recently-seen
    /// entry of an oversize bucket. Peers never confirmed online are
    /// evicted first. At most one eviction per call; returns whether
    /// one happened.
    fn evict_oversize(&self) -> bool {
        let classes: Vec<usize> = self.oversize.lock().iter().copied().collect();
        for class in classes {
            let victim = {
                let bucket = self.buckets[class].read();
                if bucket.len() <= self.config.bag_size {
                    continue;
                }
                let mut min_seen = i64::MAX;
                let mut victim: Option<PeerAddress> = None;
                for peer in bucket.values() {
                    let seen = self.stats.last_seen_online(peer.id()).as_millis();
                    if seen < min_seen {
                        min_seen = seen;
                        victim = Some(peer.clone());
                    }
                    if min_seen == 0 {
                        break;
                    }
                }
                victim
            };
            let Some(victim) = victim else { continue };

            let removed;
            {
                let mut bucket = self.buckets[class].write();
                removed = bucket.remove(victim.id()).is_some();
                if removed && bucket.len() <= self.config.bag_size {
                    self.oversize.lock().remove(&class);
                }
            }
            if removed {
                self.maintenance.remove(victim.id());
                self.peer_count.fetch_sub(1, AtomicOrdering::Relaxed);
                debug!(peer = %victim, class, "evicted oversize peer");
                self.change_listeners.notify(|l| l.peer_removed(&victim));
            }
            return removed;
        }
        false
    }
}

impl fmt::Debug for RoutingTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("RoutingTable");
        s.field("local", &self.local).field("len", &self.len());
        for (class, bucket) in self.buckets.iter().enumerate() {
            let len = bucket.read().len();
            if len > 0 {
                s.field(&format!("class{class}"), &len);
            }
        }
        s.finish()
    }
}
