//! The register rule stack a CFA program is evaluated into.
//!
//! Each state level owns a [`BucketTable`]; all levels share one
//! [`EntryPool`]. `DW_CFA_remember_state` bumps the depth and hands the
//! program a fresh, empty table. `DW_CFA_restore_state` drops the depth
//! again, which exposes the old table exactly as it was: nothing is copied in
//! either direction, so both are O(1).
//!
//! # Signal safety
//!
//! The stack itself never allocates, locks, or calls into libc. A `CfaStack`
//! is a plain value of fixed size and can be built on a signal handler's
//! stack. There is no internal synchronization either; one unwinding pass
//! owns one stack.
//!
//! What it does do is emit `tracing` spans and events, and those end up in
//! whatever subscriber is the current default. With none installed they go
//! nowhere. A host that installs a subscriber which locks or allocates (most
//! do) must keep it off the signal path, e.g. by running the handler's work
//! under `tracing::dispatcher::with_default(&Dispatch::none(), ..)`.


use core::fmt;

use tracing::instrument;

use crate::config::{self, DEFAULT_BUCKET_COUNT, DEFAULT_MAX_REGISTERS, DEFAULT_MAX_STATES};
use crate::pool::EntryPool;
use crate::table::{BucketTable, Slot};
use crate::{CfaStackIter, Error, RegisterEntry, RegisterRule, Result};

pub struct CfaStack<
    const MAX_REGISTERS: usize = DEFAULT_MAX_REGISTERS,
    const MAX_STATES: usize = DEFAULT_MAX_STATES,
    const BUCKET_COUNT: usize = DEFAULT_BUCKET_COUNT,
> {
    pub(crate) pool: EntryPool<MAX_REGISTERS>,
    pub(crate) tables: [BucketTable<BUCKET_COUNT>; MAX_STATES],
    register_count: [u8; MAX_STATES],
    /// Always below `MAX_STATES`. Only `tables[depth]` is ever read or written.
    pub(crate) depth: usize,
}

impl<const MAX_REGISTERS: usize, const MAX_STATES: usize, const BUCKET_COUNT: usize>
    CfaStack<MAX_REGISTERS, MAX_STATES, BUCKET_COUNT>
{
    /// An empty stack at depth 0.
    pub const fn new() -> Self {
        const { config::check(MAX_REGISTERS, MAX_STATES, BUCKET_COUNT) };

        Self {
            pool: EntryPool::new(),
            tables: [BucketTable::<BUCKET_COUNT>::EMPTY; MAX_STATES],
            register_count: [0; MAX_STATES],
            depth: 0,
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Saves the current register rules (`DW_CFA_remember_state`). The new
    /// level starts out empty; rules set below it stay where they are and come
    /// back on [`pop_state`](Self::pop_state).
    ///
    /// Entries still chained from an earlier use of the new level are not
    /// returned to the pool. Only [`remove_register`](Self::remove_register)
    /// gives entries back, so a CFA program that sets registers after a
    /// remember and restores without removing them keeps those entries
    /// allocated for the rest of the pass.
    #[instrument(level = "trace", skip(self), fields(depth = self.depth))]
    pub fn push_state(&mut self) -> Result<()> {
        if self.depth + 1 == MAX_STATES {
            debug!("cannot remember state, stack is full");
            return Err(Error::StackFull);
        }

        self.depth += 1;
        self.register_count[self.depth] = 0;
        self.tables[self.depth].clear();
        Ok(())
    }

    /// Drops the current level and goes back to the rules as they were at the
    /// matching [`push_state`](Self::push_state) (`DW_CFA_restore_state`).
    #[instrument(level = "trace", skip(self), fields(depth = self.depth))]
    pub fn pop_state(&mut self) -> Result<()> {
        if self.depth == 0 {
            debug!("cannot restore state, nothing was remembered");
            return Err(Error::StackEmpty);
        }

        self.depth -= 1;
        Ok(())
    }

    /// Sets the rule for `regnum` in the current state, replacing any rule it
    /// already has there. Replacing never allocates.
    ///
    /// Fails only if `regnum` is new and the pool is out of entries, in which
    /// case nothing changed.
    pub fn set_register(&mut self, regnum: u32, rule: RegisterRule, value: i64) -> Result<()> {
        let table = &mut self.tables[self.depth];

        let tail = match table.find(&self.pool, regnum) {
            Slot::Found { idx, .. } => {
                let entry = self.pool.get_mut(idx);
                entry.rule = rule;
                entry.value = value;
                trace!(regnum, ?rule, value, "updated register");
                return Ok(());
            }
            Slot::Vacant { tail } => tail,
        };

        let Some(idx) = self.pool.allocate() else {
            debug!(regnum, depth = self.depth, "no entry left for register");
            return Err(Error::RegistersExhausted);
        };

        *self.pool.get_mut(idx) = crate::pool::Entry {
            regnum,
            rule,
            value,
            next: config::INVALID_ENTRY_IDX,
        };
        table.link(&mut self.pool, regnum, tail, idx);
        self.register_count[self.depth] += 1;

        trace!(regnum, ?rule, value, idx, "added register");
        Ok(())
    }

    /// The rule and payload for `regnum` in the current state.
    pub fn get_register_rule(&self, regnum: u32) -> Option<(RegisterRule, i64)> {
        match self.tables[self.depth].find(&self.pool, regnum) {
            Slot::Found { idx, .. } => {
                let entry = self.pool.get(idx);
                Some((entry.rule, entry.value))
            }
            Slot::Vacant { .. } => None,
        }
    }

    /// Forgets the rule for `regnum` in the current state and gives its entry
    /// back to the pool. Does nothing if there is none.
    pub fn remove_register(&mut self, regnum: u32) {
        let table = &mut self.tables[self.depth];

        if let Slot::Found { idx, prev } = table.find(&self.pool, regnum) {
            table.unlink(&mut self.pool, regnum, prev, idx);
            self.pool.release(idx);
            self.register_count[self.depth] -= 1;
            trace!(regnum, idx, "removed register");
        }
    }

    /// Number of registers with a rule in the current state.
    pub fn get_register_count(&self) -> usize {
        self.register_count[self.depth] as usize
    }

    pub fn is_empty(&self) -> bool {
        self.get_register_count() == 0
    }

    /// Entries nobody holds right now, across all levels. Walks the free
    /// list, so this is O(`MAX_REGISTERS`).
    pub fn free_entries(&self) -> usize {
        self.pool.free_len()
    }

    /// Iterates the current state's rules, in bucket order and then in the
    /// order the registers were added.
    pub fn iter(&self) -> CfaStackIter<'_, MAX_REGISTERS, MAX_STATES, BUCKET_COUNT> {
        CfaStackIter::new(self)
    }

    /// Writes the current state's rules, one per line. Doesn't allocate, so
    /// `out` may be [`LibCStdoutWriter`](crate::stdext::LibCStdoutWriter)
    /// inside a signal handler.
    pub fn write_rules(&self, out: &mut impl fmt::Write) -> fmt::Result {
        for entry in self {
            writeln!(out, "{entry}")?;
        }
        Ok(())
    }
}

impl<const MAX_REGISTERS: usize, const MAX_STATES: usize, const BUCKET_COUNT: usize> Default
    for CfaStack<MAX_REGISTERS, MAX_STATES, BUCKET_COUNT>
{
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, const MAX_REGISTERS: usize, const MAX_STATES: usize, const BUCKET_COUNT: usize>
    IntoIterator for &'a CfaStack<MAX_REGISTERS, MAX_STATES, BUCKET_COUNT>
{
    type Item = RegisterEntry;
    type IntoIter = CfaStackIter<'a, MAX_REGISTERS, MAX_STATES, BUCKET_COUNT>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

struct Rules<'a, const R: usize, const S: usize, const B: usize>(&'a CfaStack<R, S, B>);

impl<const R: usize, const S: usize, const B: usize> fmt::Debug for Rules<'_, R, S, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.0.iter().map(|e| (e.regnum, (e.rule, e.value))))
            .finish()
    }
}

impl<const MAX_REGISTERS: usize, const MAX_STATES: usize, const BUCKET_COUNT: usize> fmt::Debug
    for CfaStack<MAX_REGISTERS, MAX_STATES, BUCKET_COUNT>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CfaStack")
            .field("depth", &self.depth)
            .field("register_count", &&self.register_count[..=self.depth])
            .field("rules", &Rules(self))
            .finish()
    }
}
