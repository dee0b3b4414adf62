//! Node instance: context + worker strand, bracketed by create/destroy.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use meshsim_api::{NodeConfig, StepResult, PUB_KEY_SIZE};

use crate::context::NodeContext;
use crate::firmware::Firmware;
use crate::handshake::RunState;
use crate::worker;

/// One simulated node.
///
/// Owns the shared context and the worker strand's join handle; the strand
/// holds its own clone of the context. All methods are callable from the
/// coordinator strand while the worker is parked or running: injection
/// endpoints go through the interior locks of the substitutes, and the step
/// protocol goes through the gate.
pub struct SimNode {
    ctx: Arc<NodeContext>,
    worker: Option<JoinHandle<()>>,
}

impl SimNode {
    /// Allocate the context and spawn the worker strand. The firmware
    /// object is moved onto the strand and lives there.
    pub fn spawn<F: Firmware>(config: NodeConfig, firmware: F) -> Self {
        let ctx = Arc::new(NodeContext::new(config));
        let worker_ctx = ctx.clone();
        let name = ctx.name();
        let worker = thread::Builder::new()
            .name(if name.is_empty() { "sim-node".into() } else { format!("sim-{name}") })
            .spawn(move || worker::worker_main(worker_ctx, firmware))
            .expect("failed to spawn worker strand");
        Self {
            ctx,
            worker: Some(worker),
        }
    }

    /// Write the step inputs and hand the context to the worker.
    pub fn step_begin(&self, sim_millis: u64, sim_rtc_secs: u32) {
        self.ctx.hw.millis_clock.set_millis(sim_millis);
        self.ctx.hw.rtc_clock.set_current_time(sim_rtc_secs);
        self.ctx.hw.board.clear_reboot_request();
        self.ctx.hw.board.clear_power_off_request();
        self.ctx.gate.set(RunState::Running);
    }

    /// Park until the worker yields, then take the step result back.
    pub fn step_wait(&self) -> StepResult {
        match self.ctx.gate.wait_for_yield() {
            RunState::Shutdown => StepResult::error("node is shut down"),
            _ => {
                let result = self.ctx.step_result.lock().unwrap().clone();
                self.ctx.gate.set(RunState::Idle);
                result
            }
        }
    }

    /// Fused `step_begin` + `step_wait`.
    pub fn step(&self, sim_millis: u64, sim_rtc_secs: u32) -> StepResult {
        self.step_begin(sim_millis, sim_rtc_secs);
        self.step_wait()
    }

    /// Enqueue a received radio packet for the next step.
    pub fn inject_radio_rx(&self, data: &[u8], rssi: f32, snr: f32) {
        self.ctx.hw.radio.inject_rx(data, rssi, snr);
    }

    /// Enqueue serial input for the next step.
    pub fn inject_serial_rx(&self, data: &[u8]) {
        self.ctx.hw.serial.inject_rx(data);
    }

    /// Finalize the outbound radio frame.
    pub fn notify_tx_complete(&self) {
        self.ctx.hw.radio.notify_tx_complete();
    }

    /// Advisory radio state-version bump.
    pub fn notify_state_change(&self, state_version: u32) {
        self.ctx.hw.radio.notify_state_change(state_version);
    }

    pub fn public_key(&self) -> [u8; PUB_KEY_SIZE] {
        self.ctx.public_key()
    }

    pub fn fs_write(&self, path: &str, data: &[u8]) -> usize {
        self.ctx.hw.filesystem.write_file(path, data)
    }

    pub fn fs_read(&self, path: &str, max_len: usize) -> Option<Vec<u8>> {
        self.ctx.hw.filesystem.read_file(path, max_len)
    }

    pub fn fs_exists(&self, path: &str) -> bool {
        self.ctx.hw.filesystem.exists(path)
    }

    pub fn fs_remove(&self, path: &str) -> bool {
        self.ctx.hw.filesystem.remove(path)
    }

    /// Wait for quiescence, then have the worker re-apply `config` and
    /// re-run firmware `setup`. The filesystem is preserved.
    pub fn reboot(&self, config: NodeConfig) {
        if self.ctx.gate.wait_for_quiescent() == RunState::Shutdown {
            return;
        }
        *self.ctx.pending_reboot.lock().unwrap() = Some(config);
        self.ctx.gate.set(RunState::Rebooting);
        self.ctx.gate.wait_for_idle();
    }

    /// The shared context (test observation point).
    pub fn context(&self) -> &Arc<NodeContext> {
        &self.ctx
    }
}

impl Drop for SimNode {
    fn drop(&mut self) {
        self.ctx.gate.set(RunState::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
