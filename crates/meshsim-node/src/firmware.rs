//! The surface a firmware flavor presents to the runtime.

use crate::context::Hardware;

/// One firmware instance, driven cooperatively by the worker strand.
///
/// `setup` runs once when the strand starts (and again on reboot, on the
/// same strand; it must tolerate already-initialized state). `loop_once`
/// is a single pass of the firmware main loop; the runtime calls it
/// repeatedly within a step under the idle-detection policy and expects it
/// to return promptly.
///
/// The firmware object is constructed on the worker strand and never leaves
/// it; `Send` is required only for the construction hand-off.
pub trait Firmware: Send + 'static {
    /// Short flavor name ("repeater", "companion", ...).
    fn node_type(&self) -> &'static str;

    /// One-time initialization. The injected identity and radio parameters
    /// are available through `hw` and the node config.
    fn setup(&mut self, hw: &Hardware);

    /// One pass of the firmware main loop.
    fn loop_once(&mut self, hw: &Hardware);
}
