//! Firmware-facing global surface.
//!
//! Free functions mirroring the well-known names embedded firmware reaches
//! for. They resolve through the strand-local binding installed by the
//! worker entry point, so each firmware instance sees only its own node.
//! All of them degrade to inert defaults when called off a worker strand.

use crate::isolation::with_current;

/// Simulated milliseconds since node start.
pub fn millis() -> u64 {
    with_current(|ctx| ctx.hw.millis()).unwrap_or(0)
}

/// `millis() * 1000`; no sub-millisecond resolution exists.
pub fn micros() -> u64 {
    with_current(|ctx| ctx.hw.millis_clock.micros()).unwrap_or(0)
}

/// No-op: time is advanced by the coordinator between steps.
pub fn delay(_ms: u64) {}

/// RTC seconds since epoch.
pub fn rtc_secs() -> u32 {
    with_current(|ctx| ctx.hw.rtc_clock.current_time()).unwrap_or(0)
}

/// Next value from the node's deterministic RNG.
pub fn random() -> u32 {
    with_current(|ctx| ctx.hw.rng.next()).unwrap_or(0)
}

/// Bytes waiting on the serial RX queue.
pub fn serial_available() -> usize {
    with_current(|ctx| ctx.hw.serial.available()).unwrap_or(0)
}

/// Pop one serial RX byte.
pub fn serial_read() -> Option<u8> {
    with_current(|ctx| ctx.hw.serial.read()).flatten()
}

/// Write to the serial TX queue (mirrored into the log buffer).
pub fn serial_write(data: &[u8]) {
    with_current(|ctx| {
        ctx.hw.serial.write(data);
    });
}

pub fn print(text: &str) {
    serial_write(text.as_bytes());
}

pub fn println(text: &str) {
    with_current(|ctx| ctx.hw.serial.println(text));
}

/// Ask the coordinator to run this node again at the given absolute time.
pub fn request_wake_at(deadline_ms: u64) {
    with_current(|ctx| {
        ctx.hw.wake.schedule(deadline_ms);
    });
}

/// The identity public key injected at node creation.
pub fn public_key() -> [u8; 32] {
    with_current(|ctx| ctx.public_key()).unwrap_or([0; 32])
}

/// The configured display name.
pub fn node_name() -> String {
    with_current(|ctx| ctx.name()).unwrap_or_default()
}
