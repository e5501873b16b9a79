//! Versioned Snapshot Cache of the Metric Name Index
//!
//! The cache holds up to [`SLOT_COUNT`] immutable snapshots of the metric
//! name index in a fixed slot table. The periodic tick drives
//! [`SnapshotCache::refresh`]; request handlers borrow the newest ready
//! snapshot with [`SnapshotCache::acquire`] and release it by dropping the
//! returned guard.
//!
//! # Why multiple slots
//!
//! A refresh must not invalidate the snapshot a handler is currently
//! reading. Keeping the previous snapshot alive until every reader has
//! released lets the writer produce the new one without coordinating with
//! readers beyond ref/unref. A slot is reclaimed only when it is ready,
//! unreferenced, and not the current snapshot.
//!
//! # Locking discipline
//!
//! One mutex guards the whole table and is held only across O(1)
//! bookkeeping. The expensive [`NameSource::get_names`] call runs with the
//! lock released; the chosen slot is not marked ready until the copy is
//! complete, so readers can never observe a torn snapshot.

use crate::source::{unix_now, NameIndex, NameSource};
use pwrpc_common::protocol::{PwrpcError, Result};
use std::ops::Deref;
use std::sync::{Arc, Mutex};
use tracing::{debug, error};

/// Number of slots in the snapshot table.
///
/// With a bounded handler duration two slots are in use at any time; the
/// headroom absorbs slow readers.
pub const SLOT_COUNT: usize = 6;

#[derive(Default)]
struct Slot {
    data: Option<Arc<NameIndex>>,
    update_time: u64,
    refs: u32,
    ready: bool,
}

impl Slot {
    fn reclaim(&mut self) {
        self.data = None;
        self.update_time = 0;
        self.refs = 0;
        self.ready = false;
    }
}

/// Internal state snapshot for self-metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheStats {
    /// Number of ready slots
    pub ready_count: usize,
    /// Reference count per slot (0 for non-ready slots)
    pub slot_refs: [u32; SLOT_COUNT],
    /// Entry count of the current snapshot (0 if none)
    pub current_len: usize,
}

/// The slot table. See the module docs for the discipline.
pub struct SnapshotCache {
    slots: Mutex<[Slot; SLOT_COUNT]>,
    expiration_secs: u64,
}

/// A borrowed reference to one ready snapshot.
///
/// While the guard is alive the slot stays ready and its index is not
/// mutated or reclaimed. Dropping the guard releases the slot.
pub struct SnapshotRef {
    cache: Arc<SnapshotCache>,
    slot: usize,
    data: Arc<NameIndex>,
}

impl Deref for SnapshotRef {
    type Target = NameIndex;

    fn deref(&self) -> &NameIndex {
        &self.data
    }
}

impl Drop for SnapshotRef {
    fn drop(&mut self) {
        self.cache.release(self.slot);
    }
}

impl SnapshotCache {
    pub fn new(expiration_secs: u64) -> Self {
        Self {
            slots: Mutex::new(Default::default()),
            expiration_secs,
        }
    }

    /// Index of the current slot: greatest `update_time` among ready
    /// slots, lowest index on ties.
    fn current_index(slots: &[Slot; SLOT_COUNT]) -> Option<usize> {
        let mut best: Option<usize> = None;
        let mut best_time = 0;
        for (i, slot) in slots.iter().enumerate() {
            if slot.ready && slot.update_time > best_time {
                best_time = slot.update_time;
                best = Some(i);
            }
        }
        best
    }

    /// Refresh the cache if the current snapshot is absent or expired.
    ///
    /// Also reclaims every slot that is ready, unreferenced and not
    /// current. Idempotent; driven by the periodic tick, which is its only
    /// caller, so at most one slot is ever being populated.
    pub fn refresh(&self, source: &dyn NameSource) -> Result<()> {
        self.refresh_at(source, unix_now())
    }

    fn refresh_at(&self, source: &dyn NameSource, now: u64) -> Result<()> {
        let free = {
            let mut slots = self.slots.lock().unwrap();
            let current = Self::current_index(&slots);

            for i in 0..SLOT_COUNT {
                if slots[i].ready && slots[i].refs == 0 && Some(i) != current {
                    slots[i].reclaim();
                }
            }

            let update_needed = match current {
                None => true,
                Some(c) => now.saturating_sub(slots[c].update_time) >= self.expiration_secs,
            };
            if !update_needed {
                return Ok(());
            }

            match slots.iter().position(|s| !s.ready) {
                Some(free) => free,
                None => {
                    // The table is sized so that this cannot happen under
                    // bounded handler duration.
                    error!(
                        "no free snapshot slot; restarting is probably the best solution"
                    );
                    return Err(PwrpcError::NoFreeSlot);
                }
            }
        };

        // The copy may be slow; never hold the table lock across it.
        let index = source.get_names()?;
        debug!(entries = index.len(), "refreshed metric name snapshot");

        let mut slots = self.slots.lock().unwrap();
        slots[free].data = Some(Arc::new(index));
        slots[free].update_time = now;
        slots[free].refs = 0;
        slots[free].ready = true;

        Ok(())
    }

    /// Borrow the current snapshot, or `None` when no slot is ready yet.
    pub fn acquire(self: &Arc<Self>) -> Option<SnapshotRef> {
        let mut slots = self.slots.lock().unwrap();
        let slot = Self::current_index(&slots)?;
        slots[slot].refs += 1;
        let data = slots[slot]
            .data
            .clone()
            .expect("ready slot always has data");
        Some(SnapshotRef {
            cache: Arc::clone(self),
            slot,
            data,
        })
    }

    fn release(&self, slot: usize) {
        let mut slots = self.slots.lock().unwrap();
        assert!(slots[slot].refs > 0, "snapshot ref underflow");
        slots[slot].refs -= 1;
    }

    pub fn stats(&self) -> CacheStats {
        let slots = self.slots.lock().unwrap();
        let mut slot_refs = [0; SLOT_COUNT];
        let mut ready_count = 0;
        for (i, slot) in slots.iter().enumerate() {
            if slot.ready {
                ready_count += 1;
                slot_refs[i] = slot.refs;
            }
        }
        let current_len = Self::current_index(&slots)
            .and_then(|c| slots[c].data.as_ref())
            .map(|d| d.len())
            .unwrap_or(0);
        CacheStats {
            ready_count,
            slot_refs,
            current_len,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubSource {
        index: Mutex<NameIndex>,
        calls: AtomicUsize,
    }

    impl StubSource {
        fn new(names: &[(&str, u64)]) -> Self {
            Self {
                index: Mutex::new(index_of(names)),
                calls: AtomicUsize::new(0),
            }
        }

        fn set(&self, names: &[(&str, u64)]) {
            *self.index.lock().unwrap() = index_of(names);
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl NameSource for StubSource {
        fn get_names(&self) -> Result<NameIndex> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.index.lock().unwrap().clone())
        }
    }

    struct FailingSource;

    impl NameSource for FailingSource {
        fn get_names(&self) -> Result<NameIndex> {
            Err(PwrpcError::Transport("index unavailable".into()))
        }
    }

    fn index_of(names: &[(&str, u64)]) -> NameIndex {
        NameIndex {
            names: names.iter().map(|(n, _)| n.to_string()).collect(),
            times: names.iter().map(|(_, t)| *t).collect(),
        }
    }

    #[test]
    fn test_acquire_before_refresh_is_none() {
        let cache = Arc::new(SnapshotCache::new(60));
        assert!(cache.acquire().is_none());
    }

    #[test]
    fn test_refresh_then_acquire() {
        let cache = Arc::new(SnapshotCache::new(60));
        let source = StubSource::new(&[("a/cpu/idle", 10)]);

        cache.refresh_at(&source, 1000).unwrap();

        let snap = cache.acquire().unwrap();
        assert_eq!(snap.names, vec!["a/cpu/idle"]);
        assert_eq!(snap.times, vec![10]);
        assert_eq!(cache.stats().ready_count, 1);
    }

    #[test]
    fn test_refresh_is_noop_before_expiration() {
        let cache = Arc::new(SnapshotCache::new(60));
        let source = StubSource::new(&[("a/cpu/idle", 10)]);

        cache.refresh_at(&source, 1000).unwrap();
        cache.refresh_at(&source, 1030).unwrap();
        cache.refresh_at(&source, 1059).unwrap();

        assert_eq!(source.calls(), 1);
        assert_eq!(cache.stats().ready_count, 1);
    }

    #[test]
    fn test_refresh_after_expiration() {
        let cache = Arc::new(SnapshotCache::new(60));
        let source = StubSource::new(&[("a/cpu/idle", 10)]);

        cache.refresh_at(&source, 1000).unwrap();
        cache.refresh_at(&source, 1060).unwrap();

        assert_eq!(source.calls(), 2);
    }

    #[test]
    fn test_held_reference_survives_refresh() {
        let cache = Arc::new(SnapshotCache::new(60));
        let source = StubSource::new(&[("a/cpu/idle", 10)]);

        cache.refresh_at(&source, 1000).unwrap();
        let old = cache.acquire().unwrap();

        source.set(&[("b/cpu/idle", 20)]);
        cache.refresh_at(&source, 1100).unwrap();

        // The held reference still sees the old copy; a fresh acquire
        // sees the new one.
        assert_eq!(old.names, vec!["a/cpu/idle"]);
        let new = cache.acquire().unwrap();
        assert_eq!(new.names, vec!["b/cpu/idle"]);
        assert_eq!(cache.stats().ready_count, 2);
    }

    #[test]
    fn test_released_slot_is_reclaimed() {
        let cache = Arc::new(SnapshotCache::new(60));
        let source = StubSource::new(&[("a/cpu/idle", 10)]);

        cache.refresh_at(&source, 1000).unwrap();
        let old = cache.acquire().unwrap();
        cache.refresh_at(&source, 1100).unwrap();
        assert_eq!(cache.stats().ready_count, 2);

        drop(old);
        // The next refresh pass reclaims the unreferenced non-current slot
        // without needing an update.
        cache.refresh_at(&source, 1110).unwrap();
        assert_eq!(cache.stats().ready_count, 1);
        assert_eq!(source.calls(), 2);
    }

    #[test]
    fn test_current_slot_never_reclaimed() {
        let cache = Arc::new(SnapshotCache::new(60));
        let source = StubSource::new(&[("a/cpu/idle", 10)]);

        cache.refresh_at(&source, 1000).unwrap();
        // Unreferenced but current: repeated passes keep it.
        cache.refresh_at(&source, 1010).unwrap();
        cache.refresh_at(&source, 1020).unwrap();
        assert_eq!(cache.stats().ready_count, 1);
        assert!(cache.acquire().is_some());
    }

    #[test]
    fn test_slot_exhaustion_reports_error() {
        let cache = Arc::new(SnapshotCache::new(1));
        let source = StubSource::new(&[("a/cpu/idle", 10)]);

        // Hold a reference to every snapshot so nothing can be reclaimed.
        let mut held = Vec::new();
        for i in 0..SLOT_COUNT {
            cache.refresh_at(&source, 1000 + i as u64).unwrap();
            held.push(cache.acquire().unwrap());
        }
        assert_eq!(cache.stats().ready_count, SLOT_COUNT);

        let result = cache.refresh_at(&source, 2000);
        assert!(matches!(result, Err(PwrpcError::NoFreeSlot)));
        // Nothing was overwritten.
        assert_eq!(cache.stats().ready_count, SLOT_COUNT);
        drop(held);
    }

    #[test]
    fn test_failing_source_leaves_no_ready_slot() {
        let cache = Arc::new(SnapshotCache::new(60));
        assert!(cache.refresh_at(&FailingSource, 1000).is_err());
        assert!(cache.acquire().is_none());
        assert_eq!(cache.stats().ready_count, 0);
    }

    #[test]
    fn test_ref_counts_in_stats() {
        let cache = Arc::new(SnapshotCache::new(60));
        let source = StubSource::new(&[("a/cpu/idle", 10)]);
        cache.refresh_at(&source, 1000).unwrap();

        let r1 = cache.acquire().unwrap();
        let r2 = cache.acquire().unwrap();
        assert_eq!(cache.stats().slot_refs.iter().sum::<u32>(), 2);

        drop(r1);
        assert_eq!(cache.stats().slot_refs.iter().sum::<u32>(), 1);
        drop(r2);
        assert_eq!(cache.stats().slot_refs.iter().sum::<u32>(), 0);
    }

    #[test]
    fn test_stats_current_len() {
        let cache = Arc::new(SnapshotCache::new(60));
        let source = StubSource::new(&[("a/cpu/idle", 10), ("b/cpu/idle", 20)]);
        assert_eq!(cache.stats().current_len, 0);

        cache.refresh_at(&source, 1000).unwrap();
        assert_eq!(cache.stats().current_len, 2);
    }

    #[test]
    fn test_concurrent_acquire_release() {
        let cache = Arc::new(SnapshotCache::new(60));
        let source = StubSource::new(&[("a/cpu/idle", 10)]);
        cache.refresh_at(&source, 1000).unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            handles.push(std::thread::spawn(move || {
                for _ in 0..500 {
                    let snap = cache.acquire().unwrap();
                    assert_eq!(snap.names.len(), 1);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.stats().slot_refs.iter().sum::<u32>(), 0);
    }
}
