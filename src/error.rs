/// Why a stack operation did not happen.
///
/// None of these are fatal. The interpreter driving the stack is expected to
/// give up on the current frame, not the process: aborting from inside a crash
/// handler would defeat the point of having one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[must_use]
pub enum Error {
    /// Every entry in the pool is in use by some state level.
    #[error("no free register entries left")]
    RegistersExhausted,
    /// `DW_CFA_remember_state` nested deeper than the stack allows.
    #[error("state stack is full")]
    StackFull,
    /// `DW_CFA_restore_state` without a matching remember.
    #[error("no saved state to restore")]
    StackEmpty,
    /// A raw tag passed to `RegisterRule::try_from` names no rule.
    #[error("invalid register rule tag {0}")]
    InvalidRule(u8),
}

pub type Result<T, E = Error> = core::result::Result<T, E>;
