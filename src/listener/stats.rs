use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

/// Per-watcher receive counters.
#[derive(Debug, Default)]
pub struct ListenerStats {
    received: AtomicU64,
    dispatched: AtomicU64,
    filtered: AtomicU64,
    dropped: AtomicU64,
}

/// Point-in-time copy of [`ListenerStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Notifications taken off the channel
    pub received: u64,
    /// Handed to the update callback
    pub dispatched: u64,
    /// Skipped because this replica sent them
    pub filtered: u64,
    /// Undecodable, or no callback registered, or the callback panicked
    pub dropped: u64,
}

impl ListenerStats {
    pub(crate) fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dispatched(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_filtered(&self) {
        self.filtered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            filtered: self.filtered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}
