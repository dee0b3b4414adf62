//! Step handshake between the coordinator strand and the worker strand.
//!
//! A mutex+condvar rendezvous around a single state token. Exactly one side
//! holds logical ownership of the node context at any time:
//!
//! ```text
//! Idle ──step_begin──▶ Running ──worker yields──▶ Yielded ──step_wait──▶ Idle
//!   │
//!   └──reboot──▶ Rebooting ──worker re-runs setup──▶ Idle
//! ```
//!
//! `Shutdown` is reachable from any state and is terminal. The release /
//! acquire pairing across the state transitions is what makes all step-N
//! writes visible to the other side in step N.

use std::sync::{Condvar, Mutex};

/// Ownership token for the node context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Coordinator owns the context; worker parked.
    Idle,
    /// Worker owns the context and is running firmware loops.
    Running,
    /// Worker owns the context and is re-applying config + setup.
    Rebooting,
    /// Worker finished a step; result ready for the coordinator.
    Yielded,
    /// Terminal; worker exits.
    Shutdown,
}

pub struct StepGate {
    state: Mutex<RunState>,
    cv: Condvar,
}

impl StepGate {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RunState::Idle),
            cv: Condvar::new(),
        }
    }

    pub fn current(&self) -> RunState {
        *self.state.lock().unwrap()
    }

    /// Transition to `next` and wake both sides.
    pub fn set(&self, next: RunState) {
        let mut state = self.state.lock().unwrap();
        // Shutdown is terminal; nothing overrides it.
        if *state != RunState::Shutdown || next == RunState::Shutdown {
            *state = next;
        }
        drop(state);
        self.cv.notify_all();
    }

    fn wait_until(&self, accept: impl Fn(RunState) -> bool) -> RunState {
        let mut state = self.state.lock().unwrap();
        while !accept(*state) {
            state = self.cv.wait(state).unwrap();
        }
        *state
    }

    /// Worker: park until there is work (`Running`, `Rebooting`) or shutdown.
    pub fn wait_for_work(&self) -> RunState {
        self.wait_until(|s| {
            matches!(s, RunState::Running | RunState::Rebooting | RunState::Shutdown)
        })
    }

    /// Coordinator: park until the worker yielded or shut down.
    pub fn wait_for_yield(&self) -> RunState {
        self.wait_until(|s| matches!(s, RunState::Yielded | RunState::Shutdown))
    }

    /// Coordinator: park until the worker is quiescent (not mid-step).
    pub fn wait_for_quiescent(&self) -> RunState {
        self.wait_until(|s| {
            matches!(s, RunState::Idle | RunState::Yielded | RunState::Shutdown)
        })
    }

    /// Coordinator: park until the context token is back to `Idle`.
    pub fn wait_for_idle(&self) -> RunState {
        self.wait_until(|s| matches!(s, RunState::Idle | RunState::Shutdown))
    }
}

impl Default for StepGate {
    fn default() -> Self {
        Self::new()
    }
}
