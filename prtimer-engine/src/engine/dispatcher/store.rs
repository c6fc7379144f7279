//! Per-timer state owned by the dispatcher.
//!
//! Three maps keyed by id: the platform handle, the absolute deadline and,
//! while paused, the pause instant. An id is known iff it has a handle.
//! Nothing outside the dispatcher module can name this type.

use std::collections::HashMap;

use prtimer_core::command::{TimerId, TimerSnapshot};

pub(super) struct TimerStore<H> {
    handles: HashMap<TimerId, H>,
    deadlines: HashMap<TimerId, u64>,
    paused_at: HashMap<TimerId, u64>,
}

impl<H> TimerStore<H> {
    pub(super) fn new() -> Self {
        Self {
            handles: HashMap::new(),
            deadlines: HashMap::new(),
            paused_at: HashMap::new(),
        }
    }

    pub(super) fn insert(&mut self, id: TimerId, handle: H, deadline_ns: u64) {
        self.handles.insert(id, handle);
        self.deadlines.insert(id, deadline_ns);
        self.paused_at.remove(&id);
    }

    #[inline]
    pub(super) fn contains(&self, id: TimerId) -> bool {
        self.handles.contains_key(&id)
    }

    #[inline]
    pub(super) fn handle(&self, id: TimerId) -> Option<&H> {
        self.handles.get(&id)
    }

    #[inline]
    pub(super) fn deadline(&self, id: TimerId) -> Option<u64> {
        self.deadlines.get(&id).copied()
    }

    pub(super) fn set_deadline(&mut self, id: TimerId, deadline_ns: u64) {
        if self.contains(id) {
            self.deadlines.insert(id, deadline_ns);
        }
    }

    #[inline]
    pub(super) fn paused_at(&self, id: TimerId) -> Option<u64> {
        self.paused_at.get(&id).copied()
    }

    pub(super) fn mark_paused(&mut self, id: TimerId, at_ns: u64) {
        debug_assert!(self.contains(id), "pausing unknown {id}");
        if self.contains(id) {
            self.paused_at.insert(id, at_ns);
        }
    }

    pub(super) fn clear_pause(&mut self, id: TimerId) -> Option<u64> {
        self.paused_at.remove(&id)
    }

    /// Forgets `id` entirely, handing back its platform handle.
    pub(super) fn erase(&mut self, id: TimerId) -> Option<H> {
        self.deadlines.remove(&id);
        self.paused_at.remove(&id);
        self.handles.remove(&id)
    }

    /// Empties the store, yielding every handle.
    pub(super) fn drain(&mut self) -> impl Iterator<Item = (TimerId, H)> + '_ {
        self.deadlines.clear();
        self.paused_at.clear();
        self.handles.drain()
    }

    pub(super) fn snapshot(&self, id: TimerId) -> Option<TimerSnapshot> {
        self.contains(id).then(|| TimerSnapshot {
            id,
            deadline_ns: self.deadline(id).unwrap_or_default(),
            paused_at_ns: self.paused_at(id),
        })
    }

    #[inline]
    pub(super) fn len(&self) -> usize {
        self.handles.len()
    }

    #[inline]
    pub(super) fn paused_len(&self) -> usize {
        self.paused_at.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: u64) -> TimerId {
        TimerId::from_raw(raw)
    }

    #[test]
    fn erase_clears_every_map() {
        let mut store = TimerStore::new();
        store.insert(id(1), "handle", 1_000);
        store.mark_paused(id(1), 400);
        assert_eq!(store.paused_len(), 1);

        assert_eq!(store.erase(id(1)), Some("handle"));
        assert!(!store.contains(id(1)));
        assert_eq!(store.deadline(id(1)), None);
        assert_eq!(store.paused_at(id(1)), None);
        assert_eq!(store.paused_len(), 0);
    }

    #[test]
    fn snapshot_reflects_pause() {
        let mut store = TimerStore::new();
        store.insert(id(2), (), 5_000);
        assert!(!store.snapshot(id(2)).unwrap().is_paused());

        store.mark_paused(id(2), 3_000);
        let snapshot = store.snapshot(id(2)).unwrap();
        assert_eq!(snapshot.deadline_ns, 5_000);
        assert_eq!(snapshot.paused_at_ns, Some(3_000));

        assert_eq!(store.clear_pause(id(2)), Some(3_000));
        assert!(store.snapshot(id(3)).is_none());
    }

    #[test]
    fn deadline_updates_ignore_unknown_ids() {
        let mut store: TimerStore<()> = TimerStore::new();
        store.set_deadline(id(9), 10);
        assert_eq!(store.deadline(id(9)), None);
    }

    #[test]
    fn drain_yields_all_handles() {
        let mut store = TimerStore::new();
        for raw in 1..=3 {
            store.insert(id(raw), raw, raw * 10);
        }
        store.mark_paused(id(2), 5);
        let mut drained: Vec<_> = store.drain().map(|(_, handle)| handle).collect();
        drained.sort_unstable();
        assert_eq!(drained, vec![1, 2, 3]);
        assert_eq!(store.len(), 0);
        assert_eq!(store.paused_len(), 0);
    }
}
