use core::iter::FusedIterator;

use crate::config::{EntryIdx, INVALID_ENTRY_IDX};
use crate::{CfaStack, RegisterEntry};

/// Walks the rules of a [`CfaStack`]'s current state: buckets in ascending
/// order, each chain in the order its registers were first set.
///
/// There is no snapshot. The iterator borrows the stack and reads the live
/// table, which is fine because the borrow keeps anyone from changing it.
/// Start over by asking the stack for a new iterator.
pub struct CfaStackIter<'a, const R: usize, const S: usize, const B: usize> {
    stack: &'a CfaStack<R, S, B>,
    bucket: usize,
    /// Entry returned last, or `INVALID_ENTRY_IDX` if we are between chains.
    current: EntryIdx,
}

impl<'a, const R: usize, const S: usize, const B: usize> CfaStackIter<'a, R, S, B> {
    pub(crate) fn new(stack: &'a CfaStack<R, S, B>) -> Self {
        Self {
            stack,
            bucket: 0,
            current: INVALID_ENTRY_IDX,
        }
    }
}

impl<const R: usize, const S: usize, const B: usize> Iterator for CfaStackIter<'_, R, S, B> {
    type Item = RegisterEntry;

    fn next(&mut self) -> Option<RegisterEntry> {
        let pool = &self.stack.pool;
        let table = &self.stack.tables[self.stack.depth];

        if self.current != INVALID_ENTRY_IDX {
            self.current = pool.get(self.current).next;
            if self.current == INVALID_ENTRY_IDX {
                self.bucket += 1;
            }
        }

        // Between chains: find the next bucket with anything in it.
        if self.current == INVALID_ENTRY_IDX {
            while self.bucket < B {
                let head = table.head(self.bucket);
                if head != INVALID_ENTRY_IDX {
                    self.current = head;
                    break;
                }
                self.bucket += 1;
            }

            if self.current == INVALID_ENTRY_IDX {
                return None;
            }
        }

        let entry = pool.get(self.current);
        Some(RegisterEntry {
            regnum: entry.regnum,
            rule: entry.rule,
            value: entry.value,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.stack.get_register_count()))
    }
}

// Once `bucket` reaches `B` it stays there.
impl<const R: usize, const S: usize, const B: usize> FusedIterator for CfaStackIter<'_, R, S, B> {}
