//! Load sequencing so late responses can't overwrite newer ones.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};

/// Issues monotonically increasing tickets per resource key and remembers the
/// latest one issued.
#[derive(Debug)]
pub(crate) struct LoadSequencer<K> {
    next: AtomicU64,
    latest: Mutex<HashMap<K, u64>>,
}

impl<K: Eq + Hash> LoadSequencer<K> {
    pub(crate) fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
            latest: Mutex::new(HashMap::new()),
        }
    }

    /// Start a load for `key`; any earlier ticket for the same key is now stale.
    pub(crate) fn issue(&self, key: K) -> u64 {
        let ticket = self.next.fetch_add(1, Ordering::Relaxed);
        self.latest.lock().insert(key, ticket);
        ticket
    }

    /// Whether `ticket` is still the newest load for `key`.
    pub(crate) fn is_latest(&self, key: &K, ticket: u64) -> bool {
        self.latest.lock().get(key) == Some(&ticket)
    }
}
