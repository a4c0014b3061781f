//! Compile-time sizing of [`CfaStack`](crate::CfaStack).
//!
//! Nothing here can be tuned at runtime. The three numbers bound the whole
//! memory footprint of a stack, which is what lets it live on a signal
//! handler's stack.

/// Index of an entry in the entry pool.
pub(crate) type EntryIdx = u8;

/// Stands in for a null link. Every valid entry index is strictly below it.
pub(crate) const INVALID_ENTRY_IDX: EntryIdx = EntryIdx::MAX;

/// Number of register rules the entry pool holds, shared by all saved states.
pub const DEFAULT_MAX_REGISTERS: usize = 100;

/// Number of state levels, including the initial one. Allows
/// `DEFAULT_MAX_STATES - 1` nested `DW_CFA_remember_state`.
pub const DEFAULT_MAX_STATES: usize = 6;

/// Width of the per-level bucket table. Register numbers hash by modulo.
pub const DEFAULT_BUCKET_COUNT: usize = 14;

/// Rejects configurations that cannot work. Evaluated in a `const` block,
/// so a bad configuration is a build error instead of a runtime one.
pub(crate) const fn check(max_registers: usize, max_states: usize, bucket_count: usize) {
    assert!(max_registers > 0, "the entry pool needs at least one entry");
    assert!(
        max_registers < INVALID_ENTRY_IDX as usize,
        "the entry pool must be smaller than the invalid entry index"
    );
    assert!(max_states > 0, "the state stack needs at least one level");
    assert!(bucket_count > 0, "the bucket table needs at least one bucket");
}
