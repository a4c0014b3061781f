use cfa_stack::stdext::{self, LibCStdoutWriter};
use cfa_stack::{CfaStack, RegisterRule};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// x86-64 DWARF register numbers.
const RBX: u32 = 3;
const RBP: u32 = 6;
const RSP: u32 = 7;
const RA: u32 = 16;

/// What a CFA interpreter would do to the stack for one row.
#[derive(Debug, Clone, Copy)]
enum Op {
    Set(u32, RegisterRule, i64),
    Remove(u32),
    Remember,
    Restore,
}

/// A function with a `push rbp; push rbx` prologue and an early return in the
/// middle, which is where compilers emit remember/restore:
///
/// ```text
/// DW_CFA_offset: RIP -8
/// DW_CFA_offset: RBP -16
/// DW_CFA_offset: RBX -24
/// DW_CFA_remember_state:
/// DW_CFA_same_value: RBX
/// DW_CFA_same_value: RBP
/// DW_CFA_val_offset: RSP +0
/// DW_CFA_restore_state:
/// ```
const PROGRAM: &[Op] = &[
    Op::Set(RA, RegisterRule::Offset, -8),
    Op::Set(RBP, RegisterRule::Offset, -16),
    Op::Set(RBX, RegisterRule::Offset, -24),
    Op::Remember,
    Op::Set(RBX, RegisterRule::SameValue, 0),
    Op::Set(RBP, RegisterRule::SameValue, 0),
    Op::Set(RSP, RegisterRule::ValOffset, 0),
    Op::Remove(RSP),
    Op::Remove(RBP),
    Op::Remove(RBX),
    Op::Restore,
];

fn replay(stack: &mut CfaStack, program: &[Op]) -> cfa_stack::Result<()> {
    for op in program {
        match *op {
            Op::Set(regnum, rule, value) => stack.set_register(regnum, rule, value)?,
            Op::Remove(regnum) => stack.remove_register(regnum),
            Op::Remember => stack.push_state()?,
            Op::Restore => stack.pop_state()?,
        }
    }
    Ok(())
}

/// Runs `f` with no subscriber, so the store's spans and events stop at the
/// callsite instead of reaching the tree layer (which locks and allocates).
///
/// Swapping in `Dispatch::none()` only touches this thread's scoped
/// dispatcher slot; [`prime_untraced`] makes sure that slot already exists.
fn untraced<R>(f: impl FnOnce() -> R) -> R {
    tracing::dispatcher::with_default(&tracing::Dispatch::none(), f)
}

/// Sets up the thread-local `untraced` uses outside of signal context, so the
/// handler never runs its lazy initialization.
fn prime_untraced() {
    untraced(|| {});
}

extern "C" fn on_sigusr1(_signal: libc::c_int) {
    // Nothing in here may allocate or lock.
    let mut stack: CfaStack = CfaStack::new();
    if untraced(|| replay(&mut stack, PROGRAM)).is_err() {
        stdext::abort();
    }

    let printed = stdext::print(format_args!(
        "in SIGUSR1 handler: {} rules, {} free entries\n",
        stack.get_register_count(),
        stack.free_entries()
    ))
    .and_then(|()| stack.write_rules(&mut LibCStdoutWriter));
    // stdout is all the handler has; if that is gone there is nobody to tell.
    if printed.is_err() {
        stdext::abort();
    }
}

fn main() {
    let registry = tracing_subscriber::Registry::default().with(
        EnvFilter::builder()
            .with_default_directive(tracing::Level::TRACE.into())
            .from_env()
            .unwrap(),
    );

    let tree_layer = tracing_tree::HierarchicalLayer::new(2)
        .with_targets(true)
        .with_bracketed_fields(true);

    registry.with(tree_layer).init();

    let mut stack: CfaStack = CfaStack::new();
    for (i, op) in PROGRAM.iter().enumerate() {
        let _span = tracing::info_span!("op", i, ?op).entered();
        if let Err(err) = replay(&mut stack, core::slice::from_ref(op)) {
            tracing::error!("{err}");
            return;
        }
        tracing::info!(depth = stack.depth(), ?stack);
    }

    for entry in &stack {
        tracing::info!("{entry}");
    }

    // Remembering too deep and restoring too often are reported, not fatal.
    while stack.push_state().is_ok() {}
    tracing::warn!(err = %stack.push_state().unwrap_err(), depth = stack.depth());
    while stack.pop_state().is_ok() {}
    tracing::warn!(err = %stack.pop_state().unwrap_err(), depth = stack.depth());

    prime_untraced();

    // SAFETY: `sigaction` is plain old data, so all zeroes is a valid (empty)
    // action. The handler is an `extern "C" fn(c_int)`, which is what
    // `sa_sigaction` holds when `SA_SIGINFO` is not set, and it only calls
    // async-signal-safe code.
    unsafe {
        let mut action: libc::sigaction = core::mem::zeroed();
        action.sa_sigaction = on_sigusr1 as extern "C" fn(libc::c_int) as libc::sighandler_t;
        libc::sigemptyset(&mut action.sa_mask);
        if libc::sigaction(libc::SIGUSR1, &action, core::ptr::null_mut()) != 0 {
            tracing::error!("sigaction failed: {}", std::io::Error::last_os_error());
            return;
        }
        libc::raise(libc::SIGUSR1);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use tracing::span::{Attributes, Id, Record};
    use tracing::subscriber::Interest;
    use tracing::{Event, Metadata, Subscriber};

    use super::{replay, untraced, CfaStack, PROGRAM};

    /// Counts every call that would hand data to a subscriber.
    /// `register_callsite` is left out: callsites register with every live
    /// dispatcher, not just the current one. It answers `sometimes` so each
    /// call still asks the current dispatcher.
    struct Counting(Arc<AtomicUsize>);

    impl Counting {
        fn hit(&self) {
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }

    impl Subscriber for Counting {
        fn register_callsite(&self, _: &'static Metadata<'static>) -> Interest {
            Interest::sometimes()
        }
        fn enabled(&self, _: &Metadata<'_>) -> bool {
            self.hit();
            true
        }
        fn new_span(&self, _: &Attributes<'_>) -> Id {
            self.hit();
            Id::from_u64(1)
        }
        fn record(&self, _: &Id, _: &Record<'_>) {
            self.hit();
        }
        fn record_follows_from(&self, _: &Id, _: &Id) {
            self.hit();
        }
        fn event(&self, _: &Event<'_>) {
            self.hit();
        }
        fn enter(&self, _: &Id) {
            self.hit();
        }
        fn exit(&self, _: &Id) {
            self.hit();
        }
    }

    fn run_store(stack: &mut CfaStack) {
        replay(stack, PROGRAM).unwrap();
        assert_eq!(stack.get_register_count(), 3);
        // The failure paths log too.
        while stack.push_state().is_ok() {}
        while stack.pop_state().is_ok() {}
    }

    #[test]
    fn untraced_store_never_reaches_the_subscriber() {
        let hits = Arc::new(AtomicUsize::new(0));
        let subscriber = Counting(hits.clone());

        tracing::subscriber::with_default(subscriber, || {
            let mut stack: CfaStack = CfaStack::new();
            untraced(|| run_store(&mut stack));
            assert_eq!(hits.load(Ordering::Relaxed), 0);

            // Without it the same calls do arrive.
            let mut stack: CfaStack = CfaStack::new();
            run_store(&mut stack);
            assert!(hits.load(Ordering::Relaxed) > 0);
        });
    }
}
