//! Failure accounting for recently-dead peers.
//!
//! Every failure report lands in a bounded LRU of per-peer counters. A
//! peer that accumulates `max_fail` failures within `cache_timeout` is
//! removed from the buckets and suppressed from re-insertion until the
//! window passes. An entry that goes quiet for longer than the window
//! is no longer evidence of anything and gets purged.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use kelp_core::{PeerId, Timestamp};
use lru::LruCache;
use parking_lot::Mutex;

/// Failure counter for one peer.
#[derive(Debug, Default)]
struct FailureLog {
    counter: u32,
    last_offline: Timestamp,
}

/// Bounded LRU of per-peer failure logs.
///
/// Lock order is map, then entry, never the reverse. Entries are held
/// behind `Arc` so a log observed by one thread stays valid if the LRU
/// evicts it concurrently.
pub(crate) struct OfflineLog {
    entries: Mutex<LruCache<PeerId, Arc<Mutex<FailureLog>>>>,
    cache_timeout: Duration,
    max_fail: u32,
}

impl OfflineLog {
    pub(crate) fn new(cache_size: usize, cache_timeout: Duration, max_fail: u32) -> Self {
        let capacity = NonZeroUsize::new(cache_size.max(1)).expect("capacity is at least one");
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            cache_timeout,
            max_fail,
        }
    }

    /// Drops any record of the peer. First-hand contact calls this: a
    /// peer we just spoke to is trusted over its failure history.
    pub(crate) fn forget(&self, id: &PeerId) {
        self.entries.lock().pop(id);
    }

    /// Records one failure report and decides the peer's fate.
    ///
    /// Returns true when the peer should now be removed from the
    /// buckets: either the report was forced, or the failure count
    /// reached `max_fail` within the window.
    pub(crate) fn record_failure(&self, id: &PeerId, force: bool) -> bool {
        let entry = self.entry(id);
        let mut log = entry.lock();
        if force {
            log.counter = self.max_fail;
            log.last_offline = Timestamp::now();
            return true;
        }
        if self.is_removal_due(&log) {
            return true;
        }
        log.counter += 1;
        log.last_offline = Timestamp::now();
        self.is_removal_due(&log)
    }

    /// Returns true while the peer is suppressed: enough recent
    /// failures that re-admission is refused. A stale entry (quiet for
    /// longer than the window) is purged on the way out.
    pub(crate) fn is_suppressed(&self, id: &PeerId) -> bool {
        let entry = match self.entries.lock().get(id) {
            Some(entry) => entry.clone(),
            None => return false,
        };
        let (suppressed, stale) = {
            let log = entry.lock();
            (
                self.is_removal_due(&log),
                log.last_offline.elapsed() > self.cache_timeout,
            )
        };
        if suppressed {
            return true;
        }
        if stale {
            self.entries.lock().pop(id);
        }
        false
    }

    fn entry(&self, id: &PeerId) -> Arc<Mutex<FailureLog>> {
        self.entries
            .lock()
            .get_or_insert(*id, || Arc::new(Mutex::new(FailureLog::default())))
            .clone()
    }

    // Recent failures only count as evidence while the window holds.
    fn is_removal_due(&self, log: &FailureLog) -> bool {
        log.last_offline.elapsed() <= self.cache_timeout && log.counter >= self.max_fail
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removal_after_max_fail() {
        let log = OfflineLog::new(16, Duration::from_secs(10), 3);
        let id = PeerId::random();

        assert!(!log.record_failure(&id, false));
        assert!(!log.record_failure(&id, false));
        assert!(log.record_failure(&id, false));
        assert!(log.is_suppressed(&id));
    }

    #[test]
    fn test_force_removes_immediately() {
        let log = OfflineLog::new(16, Duration::from_secs(10), 3);
        let id = PeerId::random();

        assert!(log.record_failure(&id, true));
        assert!(log.is_suppressed(&id));
    }

    #[test]
    fn test_forget_clears_suppression() {
        let log = OfflineLog::new(16, Duration::from_secs(10), 3);
        let id = PeerId::random();

        log.record_failure(&id, true);
        log.forget(&id);
        assert!(!log.is_suppressed(&id));
    }

    #[test]
    fn test_stale_entry_purged() {
        let log = OfflineLog::new(16, Duration::from_millis(30), 2);
        let id = PeerId::random();

        log.record_failure(&id, false);
        log.record_failure(&id, false);
        assert!(log.is_suppressed(&id));

        std::thread::sleep(Duration::from_millis(50));
        // window passed: no longer suppressed, and the entry is gone
        assert!(!log.is_suppressed(&id));
        assert!(log.entries.lock().peek(&id).is_none());
    }

    #[test]
    fn test_counter_survives_the_window() {
        let log = OfflineLog::new(16, Duration::from_millis(30), 2);
        let id = PeerId::random();

        log.record_failure(&id, false);
        std::thread::sleep(Duration::from_millis(50));
        // the old count still stands and the new stamp is fresh
        assert!(log.record_failure(&id, false));
    }

    #[test]
    fn test_stale_purge_resets_counter() {
        let log = OfflineLog::new(16, Duration::from_millis(30), 2);
        let id = PeerId::random();

        log.record_failure(&id, false);
        std::thread::sleep(Duration::from_millis(50));
        // the suppression check purges the stale entry on the way out
        assert!(!log.is_suppressed(&id));
        assert!(!log.record_failure(&id, false));
    }

    #[test]
    fn test_lru_capacity_bound() {
        let log = OfflineLog::new(2, Duration::from_secs(10), 1);

        let a = PeerId::random();
        let b = PeerId::random();
        let c = PeerId::random();
        log.record_failure(&a, false);
        log.record_failure(&b, false);
        log.record_failure(&c, false);

        assert_eq!(log.entries.lock().len(), 2);
        // the eldest entry fell out
        assert!(log.entries.lock().peek(&a).is_none());
    }
}
