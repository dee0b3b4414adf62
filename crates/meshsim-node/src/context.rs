//! Per-node state bundle.
//!
//! One [`NodeContext`] per node, shared behind `Arc` between the coordinator
//! strand (through the handle in [`crate::node::SimNode`]) and the worker
//! strand (through its own clone plus the strand-local slot installed at
//! entry). The hardware substitutes live inside [`Hardware`] with interior
//! locks/atomics, so coordinator-side injection can run concurrently with a
//! parked or running worker.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;

use meshsim_api::{NodeConfig, StepResult, YieldReason};

use crate::board::SimBoard;
use crate::clock::{MillisClock, RtcClock};
use crate::fs::SimFilesystem;
use crate::handshake::StepGate;
use crate::radio::SimRadio;
use crate::rng::SimRng;
use crate::serial::SerialPort;
use crate::wake::WakeRegistry;

/// The per-node hardware substitutes, as the firmware sees them.
pub struct Hardware {
    pub board: SimBoard,
    pub radio: SimRadio,
    pub millis_clock: MillisClock,
    pub rtc_clock: RtcClock,
    pub rng: SimRng,
    pub filesystem: SimFilesystem,
    pub serial: SerialPort,
    pub wake: WakeRegistry,
}

impl Hardware {
    fn new(config: &NodeConfig) -> Self {
        Self {
            board: SimBoard::new(),
            radio: SimRadio::new(),
            millis_clock: MillisClock::new(config.initial_millis),
            rtc_clock: RtcClock::new(config.initial_rtc),
            rng: SimRng::new(config.rng_seed),
            filesystem: SimFilesystem::new(),
            serial: SerialPort::new(),
            wake: WakeRegistry::new(),
        }
    }

    /// Shorthand for the current simulated time.
    pub fn millis(&self) -> u64 {
        self.millis_clock.millis()
    }
}

/// Idle-detection and diagnostics knobs plus loop-iteration counters.
pub struct SpinConfig {
    pub idle_loops_before_yield: AtomicU32,
    pub log_loop_iterations: AtomicBool,
    pub loop_iterations_this_step: AtomicU32,
    pub total_loop_iterations: AtomicU64,
}

impl SpinConfig {
    fn new() -> Self {
        Self {
            idle_loops_before_yield: AtomicU32::new(meshsim_api::DEFAULT_IDLE_LOOPS_BEFORE_YIELD),
            log_loop_iterations: AtomicBool::new(false),
            loop_iterations_this_step: AtomicU32::new(0),
            total_loop_iterations: AtomicU64::new(0),
        }
    }
}

/// Per-step scratch owned by the worker while `Running`.
pub(crate) struct StepScratch {
    /// Sticky error message; once set the node yields `Error` every step
    /// until a reboot re-runs setup.
    pub(crate) fault: Option<String>,
}

pub struct NodeContext {
    pub hw: Hardware,
    pub(crate) gate: StepGate,
    pub(crate) step_result: Mutex<StepResult>,
    pub(crate) scratch: Mutex<StepScratch>,
    pub(crate) spin: SpinConfig,
    pub(crate) config: Mutex<NodeConfig>,
    pub(crate) pending_reboot: Mutex<Option<NodeConfig>>,
}

impl NodeContext {
    pub(crate) fn new(config: NodeConfig) -> Self {
        let hw = Hardware::new(&config);
        let ctx = Self {
            hw,
            gate: StepGate::new(),
            step_result: Mutex::new(StepResult::new()),
            scratch: Mutex::new(StepScratch { fault: None }),
            spin: SpinConfig::new(),
            config: Mutex::new(config),
            pending_reboot: Mutex::new(None),
        };
        ctx.apply_spin_config();
        ctx
    }

    /// Re-apply the stored config to the substitutes: radio parameters,
    /// board flags, RNG seed, clocks, spin knobs. The filesystem is
    /// deliberately untouched (it survives reboot).
    pub(crate) fn apply_config(&self) {
        let config = self.config.lock().unwrap().clone();
        self.hw.radio.configure(
            config.lora_freq,
            config.lora_bw,
            config.lora_sf,
            config.lora_cr,
            config.lora_tx_power,
        );
        self.hw.radio.begin();
        self.hw.board.init();
        self.hw.rng.seed(config.rng_seed);
        self.hw.millis_clock.set_millis(config.initial_millis);
        self.hw.rtc_clock.set_current_time(config.initial_rtc);
        self.hw.wake.clear();
        self.apply_spin_config();
    }

    fn apply_spin_config(&self) {
        let config = self.config.lock().unwrap();
        self.hw.radio.set_spin_detection(
            config.spin_detection_threshold,
            config.log_spin_detection != 0,
        );
        self.spin
            .idle_loops_before_yield
            .store(config.idle_loops_before_yield.max(1), Ordering::Relaxed);
        self.spin
            .log_loop_iterations
            .store(config.log_loop_iterations != 0, Ordering::Relaxed);
    }

    /// Record a fault; the current and all later steps yield `Error` until
    /// the next reboot.
    pub(crate) fn set_fault(&self, message: String) {
        log::warn!("[{}] firmware fault: {message}", self.name());
        self.scratch.lock().unwrap().fault = Some(message);
    }

    pub(crate) fn clear_fault(&self) {
        self.scratch.lock().unwrap().fault = None;
    }

    pub(crate) fn fault(&self) -> Option<String> {
        self.scratch.lock().unwrap().fault.clone()
    }

    pub fn name(&self) -> String {
        self.config.lock().unwrap().name().to_string()
    }

    /// Firmware loop iterations in the most recent step.
    pub fn loops_this_step(&self) -> u32 {
        self.spin.loop_iterations_this_step.load(Ordering::Relaxed)
    }

    /// Firmware loop iterations since the worker started.
    pub fn total_loops(&self) -> u64 {
        self.spin.total_loop_iterations.load(Ordering::Relaxed)
    }

    pub fn public_key(&self) -> [u8; meshsim_api::PUB_KEY_SIZE] {
        self.config.lock().unwrap().public_key
    }

    /// Build the wire result for the step that just finished and publish it
    /// for the coordinator. Reason priority: Error, then TX_STARTED, then
    /// REBOOT, then POWER_OFF, then IDLE.
    pub(crate) fn finalize_step(&self) {
        let now = self.hw.millis();
        let mut result = StepResult::new();
        result.current_millis = now;

        if let Some(message) = self.fault() {
            result.reason = YieldReason::Error;
            result.set_error_msg(&message);
        } else if self.hw.radio.has_pending_tx() {
            result.reason = YieldReason::TxStarted;
            if let Some(frame) = self.hw.radio.pending_frame() {
                let len = frame.data.len().min(meshsim_api::MAX_RADIO_PACKET);
                result.radio_tx_data[..len].copy_from_slice(&frame.data[..len]);
                result.radio_tx_len = len;
                result.radio_tx_airtime_ms = frame.airtime_ms;
            }
        } else if self.hw.board.was_reboot_requested() {
            result.reason = YieldReason::Reboot;
        } else if self.hw.board.was_power_off_requested() {
            result.reason = YieldReason::PowerOff;
        } else {
            self.hw.wake.clear_expired(now);
            result.reason = YieldReason::Idle;
            result.wake_millis = self.hw.wake.next_wake(now).unwrap_or(now + 100);
        }

        let serial_tx = self.hw.serial.drain_tx(meshsim_api::MAX_SERIAL_TX);
        result.serial_tx_data[..serial_tx.len()].copy_from_slice(&serial_tx);
        result.serial_tx_len = serial_tx.len();

        let log_bytes = self.hw.serial.drain_log(meshsim_api::MAX_LOG_OUTPUT);
        result.log_data[..log_bytes.len()].copy_from_slice(&log_bytes);
        result.log_len = log_bytes.len();

        *self.step_result.lock().unwrap() = result;
    }
}
