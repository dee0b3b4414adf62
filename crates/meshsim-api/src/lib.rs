//! # meshsim-api
//!
//! C-ABI wire types shared between the meshsim node libraries and the host
//! loader.
//!
//! A node library (one per firmware flavor) is loaded into the coordinator
//! process as a shared library and driven through a small set of `sim_*`
//! entry points. Everything that crosses that boundary is defined here:
//! [`NodeConfig`] (passed to `sim_create` / `sim_reboot`), [`StepResult`]
//! (returned by `sim_step_wait` / `sim_step`) and [`YieldReason`].
//!
//! The structs are `#[repr(C)]` with fixed-size buffers so the layout is
//! identical on both sides regardless of which crate versions each side was
//! built with. Changing any field here is a wire-format break; the
//! `_reserved` tail of [`NodeConfig`] exists so new knobs can be added
//! without one.

// ============================================================================
// Size Constants
// ============================================================================

/// Size of an Ed25519 public key in bytes.
pub const PUB_KEY_SIZE: usize = 32;
/// Size of an expanded Ed25519 private key in bytes.
pub const PRV_KEY_SIZE: usize = 64;
/// Maximum length of a node name, including the NUL terminator.
pub const MAX_NODE_NAME: usize = 32;
/// Maximum radio frame size in bytes.
pub const MAX_RADIO_PACKET: usize = 256;
/// Maximum serial TX bytes drained per step.
pub const MAX_SERIAL_TX: usize = 32768;
/// Maximum log bytes drained per step.
pub const MAX_LOG_OUTPUT: usize = 4096;
/// Maximum error message length, including the NUL terminator.
pub const MAX_ERROR_MSG: usize = 256;

/// Default initial RTC Unix timestamp (Nov 2023).
pub const DEFAULT_INITIAL_RTC_SECS: u32 = 1_700_000_000;
/// Default radio poll count before spin detection triggers.
pub const DEFAULT_SPIN_DETECTION_THRESHOLD: u32 = 3;
/// Default number of consecutive non-producing loop iterations before yield.
pub const DEFAULT_IDLE_LOOPS_BEFORE_YIELD: u32 = 2;

// ============================================================================
// Yield Reason
// ============================================================================

/// Why the worker strand stopped a step.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YieldReason {
    /// Nothing left to do; `wake_millis` hints when to run again.
    Idle = 0,
    /// The firmware started a radio transmission; the frame is in the result.
    TxStarted = 1,
    /// The firmware requested a reboot.
    Reboot = 2,
    /// The firmware requested power-off.
    PowerOff = 3,
    /// The step failed; `error_msg` is populated.
    Error = 4,
}

// ============================================================================
// Node Configuration
// ============================================================================

/// Configuration supplied by the coordinator at `sim_create` / `sim_reboot`.
///
/// Identity keys are injected into the firmware after it has initialized,
/// overriding any firmware-generated identity. The private key uses the
/// expanded 64-byte Ed25519 form (SHA-512 of the seed, scalar clamped).
#[repr(C)]
#[derive(Clone)]
pub struct NodeConfig {
    /// Ed25519 public key.
    pub public_key: [u8; PUB_KEY_SIZE],
    /// Expanded Ed25519 private key.
    pub private_key: [u8; PRV_KEY_SIZE],

    /// LoRa frequency in MHz (e.g. 915.0).
    pub lora_freq: f32,
    /// LoRa bandwidth in kHz (e.g. 250.0).
    pub lora_bw: f32,
    /// LoRa spreading factor (7-12).
    pub lora_sf: u8,
    /// LoRa coding rate (5-8).
    pub lora_cr: u8,
    /// TX power in dBm.
    pub lora_tx_power: u8,

    /// Initial millisecond clock value.
    pub initial_millis: u64,
    /// Initial RTC time (Unix timestamp).
    pub initial_rtc: u32,

    /// Seed for the deterministic RNG.
    pub rng_seed: u32,

    /// Node display name (NUL-terminated).
    pub node_name: [u8; MAX_NODE_NAME],

    /// Radio poll count before spin detection triggers.
    pub spin_detection_threshold: u32,
    /// Consecutive non-producing loop iterations before yield.
    pub idle_loops_before_yield: u32,
    /// Log spin detection events (bool as u8).
    pub log_spin_detection: u8,
    /// Log per-step loop iteration counts (bool as u8).
    pub log_loop_iterations: u8,
    _padding: [u8; 2],

    _reserved: [u8; 56],
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            public_key: [0; PUB_KEY_SIZE],
            private_key: [0; PRV_KEY_SIZE],
            lora_freq: 915.0,
            lora_bw: 250.0,
            lora_sf: 11,
            lora_cr: 5,
            lora_tx_power: 20,
            initial_millis: 0,
            initial_rtc: DEFAULT_INITIAL_RTC_SECS,
            rng_seed: 12345,
            node_name: [0; MAX_NODE_NAME],
            spin_detection_threshold: DEFAULT_SPIN_DETECTION_THRESHOLD,
            idle_loops_before_yield: DEFAULT_IDLE_LOOPS_BEFORE_YIELD,
            log_spin_detection: 0,
            log_loop_iterations: 0,
            _padding: [0; 2],
            _reserved: [0; 56],
        }
    }
}

impl NodeConfig {
    /// Set the node name, truncating to [`MAX_NODE_NAME`] - 1 bytes.
    pub fn with_name(mut self, name: &str) -> Self {
        let bytes = name.as_bytes();
        let len = bytes.len().min(MAX_NODE_NAME - 1);
        self.node_name[..len].copy_from_slice(&bytes[..len]);
        self.node_name[len..].fill(0);
        self
    }

    /// Set the identity keys.
    pub fn with_keys(mut self, public_key: &[u8; PUB_KEY_SIZE], private_key: &[u8; PRV_KEY_SIZE]) -> Self {
        self.public_key.copy_from_slice(public_key);
        self.private_key.copy_from_slice(private_key);
        self
    }

    /// Set the RNG seed.
    pub fn with_rng_seed(mut self, seed: u32) -> Self {
        self.rng_seed = seed;
        self
    }

    /// Set the initial clock values.
    pub fn with_initial_time(mut self, millis: u64, rtc: u32) -> Self {
        self.initial_millis = millis;
        self.initial_rtc = rtc;
        self
    }

    /// Set the LoRa radio parameters.
    pub fn with_lora(mut self, freq: f32, bw: f32, sf: u8, cr: u8, tx_power: u8) -> Self {
        self.lora_freq = freq;
        self.lora_bw = bw;
        self.lora_sf = sf;
        self.lora_cr = cr;
        self.lora_tx_power = tx_power;
        self
    }

    /// Set the idle/spin detection knobs.
    pub fn with_spin_detection(mut self, threshold: u32, idle_loops: u32) -> Self {
        self.spin_detection_threshold = threshold;
        self.idle_loops_before_yield = idle_loops;
        self
    }

    /// Set the spin/loop diagnostics logging flags.
    pub fn with_spin_logging(mut self, log_spin: bool, log_loops: bool) -> Self {
        self.log_spin_detection = log_spin as u8;
        self.log_loop_iterations = log_loops as u8;
        self
    }

    /// The node name as a string slice (up to the first NUL).
    pub fn name(&self) -> &str {
        let end = self
            .node_name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(MAX_NODE_NAME);
        std::str::from_utf8(&self.node_name[..end]).unwrap_or("")
    }
}

impl std::fmt::Debug for NodeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeConfig")
            .field("name", &self.name())
            .field("lora_freq", &self.lora_freq)
            .field("lora_bw", &self.lora_bw)
            .field("lora_sf", &self.lora_sf)
            .field("lora_cr", &self.lora_cr)
            .field("lora_tx_power", &self.lora_tx_power)
            .field("initial_millis", &self.initial_millis)
            .field("initial_rtc", &self.initial_rtc)
            .field("rng_seed", &self.rng_seed)
            .finish()
    }
}

// ============================================================================
// Step Result
// ============================================================================

/// Result of one simulation step, returned by value across the C ABI.
///
/// Only the first `*_len` bytes of each buffer are meaningful. The buffers
/// are hard caps: a step that produces more output than fits is drained
/// short (the node logs the truncation, the coordinator sees the prefix).
#[repr(C)]
#[derive(Clone)]
pub struct StepResult {
    /// Why the step yielded.
    pub reason: YieldReason,

    /// Simulated time when the step completed.
    pub current_millis: u64,
    /// Requested next wake time (absolute ms; 0 when not applicable).
    pub wake_millis: u64,

    /// Outbound radio frame (valid when `reason == TxStarted`).
    pub radio_tx_data: [u8; MAX_RADIO_PACKET],
    /// Length of the outbound radio frame.
    pub radio_tx_len: usize,
    /// Estimated TX airtime in milliseconds.
    pub radio_tx_airtime_ms: u32,

    /// Serial TX bytes drained this step.
    pub serial_tx_data: [u8; MAX_SERIAL_TX],
    /// Length of serial TX data.
    pub serial_tx_len: usize,

    /// Log bytes (firmware print output) drained this step.
    pub log_data: [u8; MAX_LOG_OUTPUT],
    /// Length of log data.
    pub log_len: usize,

    /// NUL-terminated error message (valid when `reason == Error`).
    pub error_msg: [u8; MAX_ERROR_MSG],
}

impl StepResult {
    /// An empty idle result.
    pub fn new() -> Self {
        Self {
            reason: YieldReason::Idle,
            current_millis: 0,
            wake_millis: 0,
            radio_tx_data: [0; MAX_RADIO_PACKET],
            radio_tx_len: 0,
            radio_tx_airtime_ms: 0,
            serial_tx_data: [0; MAX_SERIAL_TX],
            serial_tx_len: 0,
            log_data: [0; MAX_LOG_OUTPUT],
            log_len: 0,
            error_msg: [0; MAX_ERROR_MSG],
        }
    }

    /// An error result with the given message (used for invalid handles).
    pub fn error(msg: &str) -> Self {
        let mut result = Self::new();
        result.reason = YieldReason::Error;
        result.set_error_msg(msg);
        result
    }

    /// Store `msg` as the NUL-terminated error message, truncating if needed.
    pub fn set_error_msg(&mut self, msg: &str) {
        let bytes = msg.as_bytes();
        let len = bytes.len().min(MAX_ERROR_MSG - 1);
        self.error_msg[..len].copy_from_slice(&bytes[..len]);
        self.error_msg[len..].fill(0);
    }

    /// The outbound radio frame.
    pub fn radio_tx(&self) -> &[u8] {
        &self.radio_tx_data[..self.radio_tx_len]
    }

    /// The serial TX bytes drained this step.
    pub fn serial_tx(&self) -> &[u8] {
        &self.serial_tx_data[..self.serial_tx_len]
    }

    /// The log bytes drained this step.
    pub fn log_bytes(&self) -> &[u8] {
        &self.log_data[..self.log_len]
    }

    /// The log output as a lossy string.
    pub fn log_output(&self) -> String {
        String::from_utf8_lossy(self.log_bytes()).into_owned()
    }

    /// The error message, when `reason == Error`.
    pub fn error_message(&self) -> Option<String> {
        if self.reason != YieldReason::Error {
            return None;
        }
        let end = self
            .error_msg
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(MAX_ERROR_MSG);
        Some(String::from_utf8_lossy(&self.error_msg[..end]).into_owned())
    }
}

impl Default for StepResult {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StepResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepResult")
            .field("reason", &self.reason)
            .field("current_millis", &self.current_millis)
            .field("wake_millis", &self.wake_millis)
            .field("radio_tx_len", &self.radio_tx_len)
            .field("radio_tx_airtime_ms", &self.radio_tx_airtime_ms)
            .field("serial_tx_len", &self.serial_tx_len)
            .field("log_len", &self.log_len)
            .finish()
    }
}
