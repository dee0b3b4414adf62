//! # meshsim-node
//!
//! Per-node simulation runtime for mesh-radio firmware.
//!
//! Production firmware is written against a small hardware surface: a board,
//! a LoRa transceiver, a millisecond clock, an RTC, an RNG, a flash
//! filesystem and a serial UART. This crate replaces that surface with
//! software substitutes and drives one firmware instance per dedicated
//! worker strand, so many nodes can run in one host process under an
//! external coordinator that owns virtual time and the radio medium.
//!
//! ## Architecture
//!
//! - [`node::SimNode`]: one node, the shared [`context::NodeContext`] plus the
//!   worker strand driving firmware `setup`/`loop_once`.
//! - [`handshake::StepGate`]: the coordinator/worker rendezvous; the state
//!   token decides which strand owns the context.
//! - [`context::Hardware`]: the substitutes ([`board::SimBoard`],
//!   [`radio::SimRadio`], clocks, [`rng::SimRng`], [`fs::SimFilesystem`],
//!   [`serial::SerialPort`], [`wake::WakeRegistry`]).
//! - [`isolation`] / [`hal`]: the strand-local "current node" binding and
//!   the firmware-facing global functions resolved through it.
//! - [`ffi`] / [`export_node_api!`]: the C-ABI surface each flavor library
//!   exports.
//!
//! ## Stepping
//!
//! The coordinator writes virtual time, injects pending radio or serial RX,
//! then calls `step_begin`. The worker wakes and runs firmware loop
//! iterations until an idle predicate holds or a yield condition fires (TX
//! start, reboot, power-off), fills the step result, and parks again. All
//! firmware-observable timing is a deterministic function of the coordinator
//! input sequence.

pub mod board;
pub mod clock;
pub mod context;
pub mod ffi;
pub mod firmware;
pub mod fs;
pub mod hal;
pub mod handshake;
pub mod isolation;
pub mod node;
pub mod radio;
pub mod rng;
pub mod serial;
pub mod wake;

mod worker;

pub use context::{Hardware, NodeContext};
pub use firmware::Firmware;
pub use node::SimNode;

// Re-exported so `export_node_api!` and flavor crates see the wire types
// through a single dependency.
pub use meshsim_api::{
    NodeConfig, StepResult, YieldReason, DEFAULT_IDLE_LOOPS_BEFORE_YIELD,
    DEFAULT_INITIAL_RTC_SECS, DEFAULT_SPIN_DETECTION_THRESHOLD, MAX_LOG_OUTPUT, MAX_NODE_NAME,
    MAX_RADIO_PACKET, MAX_SERIAL_TX, PRV_KEY_SIZE, PUB_KEY_SIZE,
};
