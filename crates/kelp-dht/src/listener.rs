//! Peer map subscriber capabilities.
//!
//! Two kinds of subscribers: change listeners see the bucket contents
//! evolve (insert, remove, update), offline listeners see failure
//! reports and confirmed departures.
//!
//! Callbacks run while the listener list's lock is held and must not
//! call back into the peer map for the same logical event; doing so may
//! deadlock. A panicking listener aborts the remainder of that
//! notification pass but leaves the map itself intact (the internal
//! locks do not poison).

use std::sync::Arc;

use parking_lot::Mutex;

use crate::peer::PeerAddress;

/// Subscriber notified when the bucket contents change.
pub trait ChangeListener: Send + Sync {
    /// A peer was newly inserted into a bucket.
    fn peer_inserted(&self, peer: &PeerAddress);

    /// A peer was removed from a bucket.
    fn peer_removed(&self, peer: &PeerAddress);

    /// An already-tracked peer was observed again and refreshed in
    /// place.
    fn peer_updated(&self, peer: &PeerAddress);
}

/// Subscriber notified about peer failures.
pub trait OfflineListener: Send + Sync {
    /// A failure was reported for the peer. Fires on every report,
    /// whether or not the peer ends up removed.
    fn peer_fail(&self, peer: &PeerAddress);

    /// The peer was reported offline often enough (or forcibly) that
    /// the map gave up on it.
    fn peer_offline(&self, peer: &PeerAddress);
}

/// A set of subscribers of one capability.
///
/// Registration and removal serialize against notification: a
/// notification pass observes a consistent snapshot of subscribers.
/// Removal compares by `Arc` identity.
pub(crate) struct ListenerSet<T: ?Sized> {
    listeners: Mutex<Vec<Arc<T>>>,
}

impl<T: ?Sized> ListenerSet<T> {
    pub(crate) fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn add(&self, listener: Arc<T>) {
        self.listeners.lock().push(listener);
    }

    pub(crate) fn remove(&self, listener: &Arc<T>) {
        self.listeners
            .lock()
            .retain(|l| !Arc::ptr_eq(l, listener));
    }

    pub(crate) fn notify(&self, mut f: impl FnMut(&T)) {
        let listeners = self.listeners.lock();
        for listener in listeners.iter() {
            f(listener);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    trait Probe: Send + Sync {
        fn poke(&self);
    }

    struct Counter(AtomicUsize);

    impl Probe for Counter {
        fn poke(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_notify_reaches_all() {
        let set: ListenerSet<dyn Probe> = ListenerSet::new();
        let a = Arc::new(Counter(AtomicUsize::new(0)));
        let b = Arc::new(Counter(AtomicUsize::new(0)));
        set.add(a.clone());
        set.add(b.clone());

        set.notify(|l| l.poke());

        assert_eq!(a.0.load(Ordering::SeqCst), 1);
        assert_eq!(b.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_remove_is_symmetric() {
        let set: ListenerSet<dyn Probe> = ListenerSet::new();
        let a = Arc::new(Counter(AtomicUsize::new(0)));
        let kept = Arc::new(Counter(AtomicUsize::new(0)));

        let a_dyn: Arc<dyn Probe> = a.clone();
        set.add(a_dyn.clone());
        set.add(kept.clone());
        set.remove(&a_dyn);

        set.notify(|l| l.poke());

        assert_eq!(a.0.load(Ordering::SeqCst), 0);
        assert_eq!(kept.0.load(Ordering::SeqCst), 1);
    }
}
