//! Per-strand current-node binding.
//!
//! The firmware is written as if it owns the machine: it reaches the clock
//! and serial port through free functions in [`crate::hal`]. To let N nodes
//! share one process, each worker strand installs its own `Arc<NodeContext>`
//! into a strand-local slot at entry; the hal functions read that slot.
//!
//! Coordinator-strand code must never use this accessor; it reaches the
//! substitutes through the `Arc` held by `SimNode`. On the coordinator
//! strand the slot is empty and [`with_current`] returns `None`.

use std::cell::RefCell;
use std::sync::Arc;

use crate::context::NodeContext;

thread_local! {
    static CURRENT: RefCell<Option<Arc<NodeContext>>> = const { RefCell::new(None) };
}

/// Bind `ctx` as this strand's current node; unbinds on drop.
pub(crate) struct CurrentGuard;

pub(crate) fn install(ctx: Arc<NodeContext>) -> CurrentGuard {
    CURRENT.with(|slot| {
        let mut slot = slot.borrow_mut();
        debug_assert!(slot.is_none(), "strand already bound to a node");
        *slot = Some(ctx);
    });
    CurrentGuard
}

impl Drop for CurrentGuard {
    fn drop(&mut self) {
        CURRENT.with(|slot| slot.borrow_mut().take());
    }
}

/// Run `f` against the strand's current node, or `None` off the worker.
pub fn with_current<R>(f: impl FnOnce(&NodeContext) -> R) -> Option<R> {
    CURRENT.with(|slot| slot.borrow().as_ref().map(|ctx| f(ctx)))
}

/// Whether this strand has a node bound (true only on worker strands).
pub fn is_bound() -> bool {
    CURRENT.with(|slot| slot.borrow().is_some())
}
