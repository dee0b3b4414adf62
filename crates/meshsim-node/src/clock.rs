//! Simulated clocks.
//!
//! Both clocks are pure views over coordinator-written values. The worker
//! never advances them; any apparent timing race in the firmware is a
//! deterministic function of the (millis, rtc) sequence the coordinator
//! supplies.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Monotonic simulated millisecond clock.
pub struct MillisClock {
    millis: AtomicU64,
}

impl MillisClock {
    pub fn new(initial: u64) -> Self {
        Self {
            millis: AtomicU64::new(initial),
        }
    }

    pub fn millis(&self) -> u64 {
        self.millis.load(Ordering::Acquire)
    }

    /// `millis * 1000`; the simulation has no sub-millisecond resolution.
    pub fn micros(&self) -> u64 {
        self.millis() * 1000
    }

    /// No-op: time is externally controlled, the coordinator advances it
    /// between steps.
    pub fn delay(&self, _ms: u64) {}

    /// Coordinator-side write at `step_begin`.
    pub fn set_millis(&self, millis: u64) {
        self.millis.store(millis, Ordering::Release);
    }
}

/// Simulated wall-clock RTC (seconds since epoch).
pub struct RtcClock {
    secs: AtomicU32,
}

impl RtcClock {
    pub fn new(initial: u32) -> Self {
        Self {
            secs: AtomicU32::new(initial),
        }
    }

    pub fn current_time(&self) -> u32 {
        self.secs.load(Ordering::Acquire)
    }

    /// Firmware may set the RTC (e.g. from a protocol timestamp); the
    /// coordinator overwrites it at every `step_begin`.
    pub fn set_current_time(&self, secs: u32) {
        self.secs.store(secs, Ordering::Release);
    }

    /// No-op: time is externally controlled.
    pub fn tick(&self) {}
}
