//! Safe handle around one created node.

use std::ffi::CString;
use std::sync::Arc;

use meshsim_api::{NodeConfig, StepResult, PUB_KEY_SIZE};

use crate::library::{LibraryError, LibraryInner, RawHandle};

/// A running node inside a loaded library.
///
/// Methods mirror the `sim_*` C API. The node is destroyed on drop; the
/// owning library stays loaded as long as any of its nodes exist. One
/// strand drives a node at a time (`&mut self` on every mutating call).
pub struct HostNode {
    library: Arc<LibraryInner>,
    handle: RawHandle,
}

impl HostNode {
    pub(crate) fn new(library: Arc<LibraryInner>, handle: RawHandle) -> Self {
        Self { library, handle }
    }

    /// Begin an asynchronous step; `step_wait` collects the result.
    pub fn step_begin(&mut self, sim_millis: u64, sim_rtc_secs: u32) {
        unsafe { (self.library.symbols.sim_step_begin)(self.handle, sim_millis, sim_rtc_secs) }
    }

    /// Wait for the asynchronous step to finish.
    pub fn step_wait(&mut self) -> StepResult {
        unsafe { (self.library.symbols.sim_step_wait)(self.handle) }
    }

    /// Fused `step_begin` + `step_wait`.
    pub fn step(&mut self, sim_millis: u64, sim_rtc_secs: u32) -> StepResult {
        unsafe { (self.library.symbols.sim_step)(self.handle, sim_millis, sim_rtc_secs) }
    }

    /// Enqueue a received radio packet.
    pub fn inject_radio_rx(&mut self, data: &[u8], rssi: f32, snr: f32) {
        unsafe {
            (self.library.symbols.sim_inject_radio_rx)(
                self.handle,
                data.as_ptr(),
                data.len(),
                rssi,
                snr,
            )
        }
    }

    /// Enqueue serial input bytes.
    pub fn inject_serial_rx(&mut self, data: &[u8]) {
        unsafe {
            (self.library.symbols.sim_inject_serial_rx)(self.handle, data.as_ptr(), data.len())
        }
    }

    /// Inject a serial frame (frame-based flavors; byte-based flavors stub it).
    pub fn inject_serial_frame(&mut self, data: &[u8]) {
        unsafe {
            (self.library.symbols.sim_inject_serial_frame)(self.handle, data.as_ptr(), data.len())
        }
    }

    /// Collect one outbound serial frame, if the flavor produces them.
    pub fn collect_serial_frame(&mut self) -> Option<Vec<u8>> {
        let mut buffer = vec![0u8; 256];
        let len = unsafe {
            (self.library.symbols.sim_collect_serial_frame)(
                self.handle,
                buffer.as_mut_ptr(),
                buffer.len(),
            )
        };
        if len > 0 {
            buffer.truncate(len);
            Some(buffer)
        } else {
            None
        }
    }

    /// Finalize the node's outbound radio frame.
    pub fn notify_tx_complete(&mut self) {
        unsafe { (self.library.symbols.sim_notify_tx_complete)(self.handle) }
    }

    /// Advisory radio state-version bump.
    pub fn notify_state_change(&mut self, state_version: u32) {
        unsafe { (self.library.symbols.sim_notify_state_change)(self.handle, state_version) }
    }

    /// Read back the node's configured identity.
    pub fn public_key(&self) -> [u8; PUB_KEY_SIZE] {
        let mut key = [0u8; PUB_KEY_SIZE];
        unsafe { (self.library.symbols.sim_get_public_key)(self.handle, key.as_mut_ptr()) }
        key
    }

    /// Re-apply config and re-run firmware setup, preserving the filesystem.
    pub fn reboot(&mut self, config: &NodeConfig) {
        unsafe { (self.library.symbols.sim_reboot)(self.handle, config) }
    }

    /// Write a file into the node's filesystem.
    pub fn fs_write(&mut self, path: &str, data: &[u8]) -> Result<usize, LibraryError> {
        let c_path = c_path(path)?;
        let written = unsafe {
            (self.library.symbols.sim_fs_write)(
                self.handle,
                c_path.as_ptr(),
                data.as_ptr(),
                data.len(),
            )
        };
        if written < 0 {
            Err(LibraryError::Filesystem(written))
        } else {
            Ok(written as usize)
        }
    }

    /// Read a file from the node's filesystem.
    pub fn fs_read(&mut self, path: &str, max_len: usize) -> Result<Vec<u8>, LibraryError> {
        let c_path = c_path(path)?;
        let mut buffer = vec![0u8; max_len];
        let read = unsafe {
            (self.library.symbols.sim_fs_read)(
                self.handle,
                c_path.as_ptr(),
                buffer.as_mut_ptr(),
                max_len,
            )
        };
        if read < 0 {
            Err(LibraryError::Filesystem(read))
        } else {
            buffer.truncate(read as usize);
            Ok(buffer)
        }
    }

    pub fn fs_exists(&self, path: &str) -> Result<bool, LibraryError> {
        let c_path = c_path(path)?;
        Ok(unsafe { (self.library.symbols.sim_fs_exists)(self.handle, c_path.as_ptr()) } != 0)
    }

    pub fn fs_remove(&mut self, path: &str) -> Result<bool, LibraryError> {
        let c_path = c_path(path)?;
        Ok(unsafe { (self.library.symbols.sim_fs_remove)(self.handle, c_path.as_ptr()) } != 0)
    }
}

fn c_path(path: &str) -> Result<CString, LibraryError> {
    CString::new(path).map_err(|_| LibraryError::InvalidPath(path.to_string()))
}

impl Drop for HostNode {
    fn drop(&mut self) {
        unsafe { (self.library.symbols.sim_destroy)(self.handle) }
    }
}

// SAFETY: the node library serializes all per-node state behind its own
// locks; the handle may move between strands as long as one strand uses it
// at a time, which `&mut self` enforces.
unsafe impl Send for HostNode {}
