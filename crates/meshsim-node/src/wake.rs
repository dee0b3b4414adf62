//! Wake-time registry.
//!
//! An ordered multiset of absolute deadlines the firmware has asked to be
//! woken at. At the end of each step the worker purges expired entries and
//! uses the earliest remaining deadline as the `wake_millis` hint in the
//! step result.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Identifier for a registered deadline, usable with [`WakeRegistry::cancel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WakeId(u64);

pub struct WakeRegistry {
    deadlines: Mutex<BTreeSet<(u64, u64)>>,
    next_id: AtomicU64,
}

impl WakeRegistry {
    pub fn new() -> Self {
        Self {
            deadlines: Mutex::new(BTreeSet::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register an absolute deadline in simulated milliseconds.
    pub fn schedule(&self, deadline_ms: u64) -> WakeId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.deadlines.lock().unwrap().insert((deadline_ms, id));
        WakeId(id)
    }

    /// Remove one registered deadline. Returns false if it already expired
    /// or was never registered.
    pub fn cancel(&self, id: WakeId) -> bool {
        let mut deadlines = self.deadlines.lock().unwrap();
        let found = deadlines
            .iter()
            .find(|&&(_, entry_id)| entry_id == id.0)
            .copied();
        match found {
            Some(entry) => deadlines.remove(&entry),
            None => false,
        }
    }

    /// The minimum deadline strictly greater than `now`, if any.
    pub fn next_wake(&self, now: u64) -> Option<u64> {
        self.deadlines
            .lock()
            .unwrap()
            .iter()
            .map(|&(deadline, _)| deadline)
            .find(|&deadline| deadline > now)
    }

    /// Evict every deadline at or before `now`.
    pub fn clear_expired(&self, now: u64) {
        let mut deadlines = self.deadlines.lock().unwrap();
        // (now, u64::MAX) splits off everything strictly after `now`.
        let keep = deadlines.split_off(&(now, u64::MAX));
        *deadlines = keep;
    }

    /// Drop everything (reboot re-apply).
    pub fn clear(&self) {
        self.deadlines.lock().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.deadlines.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.deadlines.lock().unwrap().is_empty()
    }
}

impl Default for WakeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
