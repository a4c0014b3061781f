//! One level's register table: an array of bucket heads, each the start of a
//! chain of pool entries linked through `Entry::next`.

use crate::config::{EntryIdx, INVALID_ENTRY_IDX};
use crate::pool::EntryPool;

#[derive(Clone, Copy)]
pub(crate) struct BucketTable<const B: usize> {
    heads: [EntryIdx; B],
}

/// Where a register sits in its bucket chain.
pub(crate) enum Slot {
    /// The register has an entry. `prev` is the entry before it in the chain,
    /// or `None` when it is the bucket head.
    Found { idx: EntryIdx, prev: Option<EntryIdx> },
    /// No entry; a new one gets linked after `tail` (or becomes the head).
    Vacant { tail: Option<EntryIdx> },
}

impl<const B: usize> BucketTable<B> {
    pub(crate) const EMPTY: Self = Self {
        heads: [INVALID_ENTRY_IDX; B],
    };

    pub(crate) const fn bucket(regnum: u32) -> usize {
        regnum as usize % B
    }

    pub(crate) fn head(&self, bucket: usize) -> EntryIdx {
        self.heads[bucket]
    }

    /// Points every bucket at nothing. The entries the chains pointed to are
    /// not touched, and not released.
    pub(crate) fn clear(&mut self) {
        self.heads.fill(INVALID_ENTRY_IDX);
    }

    pub(crate) fn find<const N: usize>(&self, pool: &EntryPool<N>, regnum: u32) -> Slot {
        let mut prev = None;
        let mut idx = self.heads[Self::bucket(regnum)];
        while idx != INVALID_ENTRY_IDX {
            let entry = pool.get(idx);
            if entry.regnum == regnum {
                return Slot::Found { idx, prev };
            }
            prev = Some(idx);
            idx = entry.next;
        }
        Slot::Vacant { tail: prev }
    }

    /// Links a fresh entry at the end of `regnum`'s chain. `idx.next` must
    /// already be `INVALID_ENTRY_IDX`.
    pub(crate) fn link<const N: usize>(
        &mut self,
        pool: &mut EntryPool<N>,
        regnum: u32,
        tail: Option<EntryIdx>,
        idx: EntryIdx,
    ) {
        match tail {
            Some(tail) => pool.get_mut(tail).next = idx,
            None => self.heads[Self::bucket(regnum)] = idx,
        }
    }

    /// Takes `idx` out of `regnum`'s chain. Does not release it.
    pub(crate) fn unlink<const N: usize>(
        &mut self,
        pool: &mut EntryPool<N>,
        regnum: u32,
        prev: Option<EntryIdx>,
        idx: EntryIdx,
    ) {
        let next = pool.get(idx).next;
        match prev {
            Some(prev) => pool.get_mut(prev).next = next,
            None => self.heads[Self::bucket(regnum)] = next,
        }
    }
}
