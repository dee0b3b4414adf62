//! Worker strand: runs one firmware instance under the step protocol.
//!
//! The strand binds itself as the current node, applies the initial config,
//! runs firmware `setup`, then parks on the step gate. Each time the
//! coordinator hands it the `Running` token it drives `loop_once` under the
//! idle-detection policy, assembles the step result, and yields.
//!
//! Firmware code never unwinds out of the strand: `setup` and `loop_once`
//! run under `catch_unwind`, and a panic poisons the node (every later step
//! yields `Error`) until a reboot re-runs `setup`.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::context::NodeContext;
use crate::firmware::Firmware;
use crate::handshake::RunState;
use crate::isolation;

/// Run `f`, converting a panic into a node fault.
fn run_guarded(ctx: &NodeContext, what: &str, f: impl FnOnce()) -> bool {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(()) => true,
        Err(payload) => {
            let detail = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            ctx.set_fault(format!("firmware panicked in {what}: {detail}"));
            false
        }
    }
}

pub(crate) fn worker_main<F: Firmware>(ctx: Arc<NodeContext>, mut firmware: F) {
    let _bound = isolation::install(ctx.clone());

    ctx.apply_config();
    log::debug!("[{}] worker up ({})", ctx.name(), firmware.node_type());
    run_guarded(&ctx, "setup", || firmware.setup(&ctx.hw));

    loop {
        match ctx.gate.wait_for_work() {
            RunState::Shutdown => break,
            RunState::Rebooting => {
                reboot(&ctx, &mut firmware);
                ctx.gate.set(RunState::Idle);
            }
            RunState::Running => {
                run_step(&ctx, &mut firmware);
                ctx.finalize_step();
                ctx.gate.set(RunState::Yielded);
            }
            RunState::Idle | RunState::Yielded => {}
        }
    }

    log::debug!("[{}] worker down", ctx.name());
}

/// Re-apply the pending config and re-run `setup` on this strand, keeping
/// every strand-local binding valid. The filesystem is preserved.
fn reboot<F: Firmware>(ctx: &NodeContext, firmware: &mut F) {
    if let Some(config) = ctx.pending_reboot.lock().unwrap().take() {
        *ctx.config.lock().unwrap() = config;
    }
    ctx.apply_config();
    ctx.clear_fault();
    log::debug!("[{}] reboot: re-running setup", ctx.name());
    run_guarded(ctx, "setup", || firmware.setup(&ctx.hw));
}

/// Drive firmware loops until a yield condition holds.
///
/// An iteration is productive when serial TX grew, the radio went
/// not-pending -> pending, or a reboot/power-off was requested. Productive
/// iterations reset the idle counter; after `idle_loops_before_yield`
/// consecutive non-producing iterations the step ends. TX start, reboot and
/// power-off short-circuit immediately.
fn run_step<F: Firmware>(ctx: &NodeContext, firmware: &mut F) {
    ctx.spin.loop_iterations_this_step.store(0, Ordering::Relaxed);

    if ctx.fault().is_some() {
        // Poisoned: don't re-enter firmware code.
        return;
    }

    let idle_limit = ctx.spin.idle_loops_before_yield.load(Ordering::Relaxed);
    let mut loops_without_output = 0;

    while loops_without_output < idle_limit {
        let serial_tx_before = ctx.hw.serial.tx_len();
        let had_pending_tx_before = ctx.hw.radio.has_pending_tx();

        if !run_guarded(ctx, "loop", || firmware.loop_once(&ctx.hw)) {
            return;
        }

        ctx.spin.loop_iterations_this_step.fetch_add(1, Ordering::Relaxed);
        ctx.spin.total_loop_iterations.fetch_add(1, Ordering::Relaxed);

        let has_pending_tx = ctx.hw.radio.has_pending_tx();
        if has_pending_tx && !had_pending_tx_before {
            // TX started; yield for radio handling.
            break;
        }
        if ctx.hw.board.was_reboot_requested() || ctx.hw.board.was_power_off_requested() {
            break;
        }

        let had_serial_output = ctx.hw.serial.tx_len() > serial_tx_before;
        if had_serial_output || has_pending_tx {
            loops_without_output = 0;
            if has_pending_tx {
                break;
            }
        } else {
            loops_without_output += 1;
        }
    }

    if ctx.spin.log_loop_iterations.load(Ordering::Relaxed) {
        log::debug!(
            "[{}] step done: {} iterations this step, {} total",
            ctx.name(),
            ctx.spin.loop_iterations_this_step.load(Ordering::Relaxed),
            ctx.spin.total_loop_iterations.load(Ordering::Relaxed),
        );
    }
}
