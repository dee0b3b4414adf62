//! Simulated main board.
//!
//! `reboot()` and `power_off()` are request flags, not process-level actions:
//! the worker strand observes them after each firmware loop iteration and
//! yields with the matching reason. The coordinator clears both flags at the
//! start of the next step.

use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};

/// Startup reason reported to the firmware.
pub const STARTUP_NORMAL: u8 = 0;

/// Simulated board: battery, identity strings, reboot/power-off requests.
pub struct SimBoard {
    battery_mv: AtomicU16,
    reboot_requested: AtomicBool,
    poweroff_requested: AtomicBool,
}

impl SimBoard {
    pub fn new() -> Self {
        Self {
            battery_mv: AtomicU16::new(4200),
            reboot_requested: AtomicBool::new(false),
            poweroff_requested: AtomicBool::new(false),
        }
    }

    /// Clear both request flags (worker entry and reboot re-apply).
    pub fn init(&self) {
        self.reboot_requested.store(false, Ordering::Release);
        self.poweroff_requested.store(false, Ordering::Release);
    }

    pub fn battery_millivolts(&self) -> u16 {
        self.battery_mv.load(Ordering::Relaxed)
    }

    pub fn set_battery_millivolts(&self, mv: u16) {
        self.battery_mv.store(mv, Ordering::Relaxed);
    }

    pub fn manufacturer_name(&self) -> &'static str {
        "Simulator"
    }

    pub fn startup_reason(&self) -> u8 {
        STARTUP_NORMAL
    }

    /// Firmware-facing: request a reboot at the end of this step.
    pub fn reboot(&self) {
        self.reboot_requested.store(true, Ordering::Release);
    }

    /// Firmware-facing: request power-off at the end of this step.
    pub fn power_off(&self) {
        self.poweroff_requested.store(true, Ordering::Release);
    }

    pub fn was_reboot_requested(&self) -> bool {
        self.reboot_requested.load(Ordering::Acquire)
    }

    pub fn was_power_off_requested(&self) -> bool {
        self.poweroff_requested.load(Ordering::Acquire)
    }

    pub fn clear_reboot_request(&self) {
        self.reboot_requested.store(false, Ordering::Release);
    }

    pub fn clear_power_off_request(&self) {
        self.poweroff_requested.store(false, Ordering::Release);
    }
}

impl Default for SimBoard {
    fn default() -> Self {
        Self::new()
    }
}
