//! The entry pool: every register rule lives in one fixed array, and unused
//! slots are chained together through their `next` index into a free list.
//!
//! The same `next` link chains in-use entries into bucket chains, so an entry
//! is always on exactly one list: the free list, or one bucket chain of one
//! state level.

use crate::config::{EntryIdx, INVALID_ENTRY_IDX};
use crate::RegisterRule;

#[derive(Debug, Clone, Copy)]
pub(crate) struct Entry {
    pub(crate) regnum: u32,
    pub(crate) rule: RegisterRule,
    pub(crate) value: i64,
    /// Next entry on whichever list this entry is on.
    pub(crate) next: EntryIdx,
}

impl Entry {
    const UNUSED: Self = Self {
        regnum: 0,
        rule: RegisterRule::Undefined,
        value: 0,
        next: INVALID_ENTRY_IDX,
    };
}

pub(crate) struct EntryPool<const N: usize> {
    entries: [Entry; N],
    free_list: EntryIdx,
}

impl<const N: usize> EntryPool<N> {
    /// Builds a pool where every slot is on the free list, in index order.
    pub(crate) const fn new() -> Self {
        let mut entries = [Entry::UNUSED; N];

        // `for` is not allowed in const fn.
        let mut i = 0;
        while i + 1 < N {
            entries[i].next = (i + 1) as EntryIdx;
            i += 1;
        }
        // The last slot keeps `INVALID_ENTRY_IDX` from `UNUSED`.

        Self {
            entries,
            free_list: if N == 0 { INVALID_ENTRY_IDX } else { 0 },
        }
    }

    /// Takes the head of the free list. The entry's contents are stale; the
    /// caller initializes all of it.
    pub(crate) fn allocate(&mut self) -> Option<EntryIdx> {
        let idx = self.free_list;
        if idx == INVALID_ENTRY_IDX {
            debug!("entry pool exhausted");
            return None;
        }
        self.free_list = self.entries[idx as usize].next;
        trace!(idx, "allocated entry");
        Some(idx)
    }

    /// Puts `idx` back at the head of the free list. The caller must already
    /// have unlinked it from its bucket chain.
    pub(crate) fn release(&mut self, idx: EntryIdx) {
        debug_assert!((idx as usize) < N);
        self.entries[idx as usize].next = self.free_list;
        self.free_list = idx;
        trace!(idx, "released entry");
    }

    pub(crate) fn get(&self, idx: EntryIdx) -> &Entry {
        &self.entries[idx as usize]
    }

    pub(crate) fn get_mut(&mut self, idx: EntryIdx) -> &mut Entry {
        &mut self.entries[idx as usize]
    }

    /// Walks the free list. Diagnostics only, this is O(N).
    pub(crate) fn free_len(&self) -> usize {
        let mut len = 0;
        let mut idx = self.free_list;
        while idx != INVALID_ENTRY_IDX {
            len += 1;
            idx = self.entries[idx as usize].next;
        }
        len
    }
}

#[cfg(test)]
mod tests {
    use super::EntryPool;

    #[test]
    fn allocates_in_index_order() {
        let mut pool = EntryPool::<4>::new();
        assert_eq!(pool.free_len(), 4);

        assert_eq!(pool.allocate(), Some(0));
        assert_eq!(pool.allocate(), Some(1));
        assert_eq!(pool.allocate(), Some(2));
        assert_eq!(pool.allocate(), Some(3));
        assert_eq!(pool.allocate(), None);
        assert_eq!(pool.free_len(), 0);
    }

    #[test]
    fn release_is_lifo() {
        let mut pool = EntryPool::<3>::new();
        let a = pool.allocate().unwrap();
        let b = pool.allocate().unwrap();

        pool.release(a);
        pool.release(b);
        assert_eq!(pool.free_len(), 3);

        assert_eq!(pool.allocate(), Some(b));
        assert_eq!(pool.allocate(), Some(a));
        assert_eq!(pool.allocate(), Some(2));
        assert_eq!(pool.allocate(), None);
    }

    #[test]
    fn single_entry_pool() {
        let mut pool = EntryPool::<1>::new();
        assert_eq!(pool.allocate(), Some(0));
        assert_eq!(pool.allocate(), None);
        pool.release(0);
        assert_eq!(pool.allocate(), Some(0));
    }
}
