// Copyright (c) 2018-2025 The Botho Foundation

//! [`HistoryRing`]: the coordinator's bounded in-memory history of
//! `SlotExecution` snapshots (spec.md §4.4 "History & snapshots", §9 "History
//! bounds").
//!
//! Bounded at ≈1000 entries with oldest-slot eviction; the WAL is the
//! authoritative recovery source beyond that.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use sp_types::slot_execution::SlotExecution;

/// Default bound on the number of slots retained in memory.
pub const DEFAULT_MAX_ENTRIES: usize = 1000;

struct Inner {
    entries: BTreeMap<u64, SlotExecution>,
    max_entries: usize,
}

/// A bounded, slot-keyed ring of [`SlotExecution`] snapshots.
pub struct HistoryRing {
    inner: Mutex<Inner>,
}

impl HistoryRing {
    pub fn new(max_entries: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: BTreeMap::new(),
                max_entries,
            }),
        }
    }

    /// Append a snapshot for `execution.slot`, evicting the oldest entry if
    /// the ring is at capacity.
    pub fn push(&self, execution: SlotExecution) {
        let mut inner = self.inner.lock();
        inner.entries.insert(execution.slot, execution);
        while inner.entries.len() > inner.max_entries {
            if let Some(&oldest) = inner.entries.keys().next() {
                inner.entries.remove(&oldest);
            } else {
                break;
            }
        }
    }

    /// The snapshot for `slot`, if still retained.
    pub fn get(&self, slot: u64) -> Option<SlotExecution> {
        self.inner.lock().entries.get(&slot).cloned()
    }

    /// Remove every snapshot for `slot >= from` (spec.md §4.7 step 8, "erase
    /// history entries for slots >= rolledBackSlot").
    pub fn erase_from(&self, from: u64) {
        let mut inner = self.inner.lock();
        inner.entries.retain(|&slot, _| slot < from);
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for HistoryRing {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sp_types::hashing::ZERO_HASH;

    fn execution(slot: u64) -> SlotExecution {
        SlotExecution::starting(slot, slot + 1, ZERO_HASH)
    }

    #[test]
    fn oldest_is_evicted_at_capacity() {
        let ring = HistoryRing::new(2);
        ring.push(execution(1));
        ring.push(execution(2));
        ring.push(execution(3));
        assert_eq!(ring.len(), 2);
        assert!(ring.get(1).is_none());
        assert!(ring.get(2).is_some());
        assert!(ring.get(3).is_some());
    }

    #[test]
    fn erase_from_removes_inclusive_upper_entries() {
        let ring = HistoryRing::new(10);
        for slot in 1..=5 {
            ring.push(execution(slot));
        }
        ring.erase_from(3);
        assert!(ring.get(1).is_some());
        assert!(ring.get(2).is_some());
        assert!(ring.get(3).is_none());
        assert!(ring.get(5).is_none());
    }
}
