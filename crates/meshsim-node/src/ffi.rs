//! C-ABI entry points.
//!
//! The helpers here hold the real logic; the [`export_node_api!`] macro
//! stamps out the `sim_*` symbol set for a concrete firmware type, so each
//! flavor cdylib is a thin shell around [`crate::SimNode`].
//!
//! Contract at the boundary (mirrored by the host loader):
//! - a null or destroyed handle is silently ignored (`0` / empty), except
//!   `sim_step_wait`, which returns a result with `reason = Error` and a
//!   populated message;
//! - nothing ever unwinds across the boundary: every body runs under
//!   `catch_unwind` with an inert fallback.

use std::ffi::CStr;
use std::os::raw::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};

use meshsim_api::{NodeConfig, StepResult, PUB_KEY_SIZE};

use crate::firmware::Firmware;
use crate::node::SimNode;

/// Opaque handle passed across the C ABI.
pub type NodeHandle = *mut SimNode;

fn guarded<R>(fallback: impl FnOnce() -> R, body: impl FnOnce() -> R) -> R {
    match catch_unwind(AssertUnwindSafe(body)) {
        Ok(value) => value,
        Err(_) => {
            log::error!("panic caught at C-ABI boundary");
            fallback()
        }
    }
}

unsafe fn path_from(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    Some(CStr::from_ptr(ptr).to_string_lossy().into_owned())
}

/// # Safety
/// `config` must be null or point to a valid [`NodeConfig`].
pub unsafe fn create<F: Firmware + Default>(config: *const NodeConfig) -> NodeHandle {
    if config.is_null() {
        return std::ptr::null_mut();
    }
    let config = (*config).clone();
    guarded(std::ptr::null_mut, || {
        Box::into_raw(Box::new(SimNode::spawn(config, F::default())))
    })
}

/// # Safety
/// `handle` must be null or a pointer previously returned by [`create`]
/// that has not been destroyed.
pub unsafe fn destroy(handle: NodeHandle) {
    if handle.is_null() {
        return;
    }
    guarded(|| (), || drop(Box::from_raw(handle)));
}

/// # Safety
/// `handle` as in [`destroy`]; the node must not be destroyed concurrently.
pub unsafe fn step_begin(handle: NodeHandle, sim_millis: u64, sim_rtc_secs: u32) {
    if let Some(node) = handle.as_ref() {
        guarded(|| (), || node.step_begin(sim_millis, sim_rtc_secs));
    }
}

/// # Safety
/// `handle` as in [`destroy`].
pub unsafe fn step_wait(handle: NodeHandle) -> StepResult {
    match handle.as_ref() {
        None => StepResult::error("invalid node handle"),
        Some(node) => guarded(
            || StepResult::error("internal fault in step_wait"),
            || node.step_wait(),
        ),
    }
}

/// # Safety
/// `handle` as in [`destroy`].
pub unsafe fn step(handle: NodeHandle, sim_millis: u64, sim_rtc_secs: u32) -> StepResult {
    match handle.as_ref() {
        None => StepResult::error("invalid node handle"),
        Some(node) => guarded(
            || StepResult::error("internal fault in step"),
            || node.step(sim_millis, sim_rtc_secs),
        ),
    }
}

/// # Safety
/// `handle` as in [`destroy`]; `data` must point to `len` readable bytes.
pub unsafe fn inject_radio_rx(handle: NodeHandle, data: *const u8, len: usize, rssi: f32, snr: f32) {
    let Some(node) = handle.as_ref() else { return };
    if data.is_null() && len > 0 {
        return;
    }
    let bytes = if len == 0 { &[][..] } else { std::slice::from_raw_parts(data, len) };
    guarded(|| (), || node.inject_radio_rx(bytes, rssi, snr));
}

/// # Safety
/// `handle` as in [`destroy`]; `data` must point to `len` readable bytes.
pub unsafe fn inject_serial_rx(handle: NodeHandle, data: *const u8, len: usize) {
    let Some(node) = handle.as_ref() else { return };
    if data.is_null() && len > 0 {
        return;
    }
    let bytes = if len == 0 { &[][..] } else { std::slice::from_raw_parts(data, len) };
    guarded(|| (), || node.inject_serial_rx(bytes));
}

/// # Safety
/// `handle` as in [`destroy`].
pub unsafe fn notify_tx_complete(handle: NodeHandle) {
    if let Some(node) = handle.as_ref() {
        guarded(|| (), || node.notify_tx_complete());
    }
}

/// # Safety
/// `handle` as in [`destroy`].
pub unsafe fn notify_state_change(handle: NodeHandle, state_version: u32) {
    if let Some(node) = handle.as_ref() {
        guarded(|| (), || node.notify_state_change(state_version));
    }
}

/// # Safety
/// `handle` as in [`destroy`]; `out_key` must point to 32 writable bytes.
pub unsafe fn get_public_key(handle: NodeHandle, out_key: *mut u8) {
    let Some(node) = handle.as_ref() else { return };
    if out_key.is_null() {
        return;
    }
    let key = guarded(|| [0u8; PUB_KEY_SIZE], || node.public_key());
    std::ptr::copy_nonoverlapping(key.as_ptr(), out_key, PUB_KEY_SIZE);
}

/// # Safety
/// `handle` as in [`destroy`]; `path` must be a NUL-terminated string;
/// `data` must point to `len` readable bytes.
pub unsafe fn fs_write(handle: NodeHandle, path: *const c_char, data: *const u8, len: usize) -> i32 {
    let Some(node) = handle.as_ref() else { return -1 };
    let Some(path) = path_from(path) else { return -1 };
    if data.is_null() && len > 0 {
        return -1;
    }
    let bytes = if len == 0 { &[][..] } else { std::slice::from_raw_parts(data, len) };
    guarded(|| -1, || node.fs_write(&path, bytes) as i32)
}

/// # Safety
/// `handle` as in [`destroy`]; `path` must be a NUL-terminated string;
/// `data` must point to `max_len` writable bytes.
pub unsafe fn fs_read(handle: NodeHandle, path: *const c_char, data: *mut u8, max_len: usize) -> i32 {
    let Some(node) = handle.as_ref() else { return -1 };
    let Some(path) = path_from(path) else { return -1 };
    if data.is_null() {
        return -1;
    }
    guarded(
        || -1,
        || match node.fs_read(&path, max_len) {
            None => -1,
            Some(bytes) => {
                std::ptr::copy_nonoverlapping(bytes.as_ptr(), data, bytes.len());
                bytes.len() as i32
            }
        },
    )
}

/// # Safety
/// `handle` as in [`destroy`]; `path` must be a NUL-terminated string.
pub unsafe fn fs_exists(handle: NodeHandle, path: *const c_char) -> i32 {
    let Some(node) = handle.as_ref() else { return 0 };
    let Some(path) = path_from(path) else { return 0 };
    guarded(|| 0, || node.fs_exists(&path) as i32)
}

/// # Safety
/// `handle` as in [`destroy`]; `path` must be a NUL-terminated string.
pub unsafe fn fs_remove(handle: NodeHandle, path: *const c_char) -> i32 {
    let Some(node) = handle.as_ref() else { return 0 };
    let Some(path) = path_from(path) else { return 0 };
    guarded(|| 0, || node.fs_remove(&path) as i32)
}

/// # Safety
/// `handle` as in [`destroy`]; `config` must be null or point to a valid
/// [`NodeConfig`].
pub unsafe fn reboot(handle: NodeHandle, config: *const NodeConfig) {
    let Some(node) = handle.as_ref() else { return };
    if config.is_null() {
        return;
    }
    let config = (*config).clone();
    guarded(|| (), || node.reboot(config));
}

/// Stamp out the `sim_*` C symbol set for a firmware type.
///
/// `$firmware` must implement [`Firmware`] + `Default`; `$node_type` is the
/// flavor string returned by `sim_get_node_type`.
#[macro_export]
macro_rules! export_node_api {
    ($firmware:ty, $node_type:literal) => {
        #[no_mangle]
        pub unsafe extern "C" fn sim_create(
            config: *const $crate::NodeConfig,
        ) -> $crate::ffi::NodeHandle {
            $crate::ffi::create::<$firmware>(config)
        }

        #[no_mangle]
        pub unsafe extern "C" fn sim_destroy(handle: $crate::ffi::NodeHandle) {
            $crate::ffi::destroy(handle)
        }

        #[no_mangle]
        pub unsafe extern "C" fn sim_reboot(
            handle: $crate::ffi::NodeHandle,
            config: *const $crate::NodeConfig,
        ) {
            $crate::ffi::reboot(handle, config)
        }

        #[no_mangle]
        pub unsafe extern "C" fn sim_step_begin(
            handle: $crate::ffi::NodeHandle,
            sim_millis: u64,
            sim_rtc_secs: u32,
        ) {
            $crate::ffi::step_begin(handle, sim_millis, sim_rtc_secs)
        }

        #[no_mangle]
        pub unsafe extern "C" fn sim_step_wait(
            handle: $crate::ffi::NodeHandle,
        ) -> $crate::StepResult {
            $crate::ffi::step_wait(handle)
        }

        #[no_mangle]
        pub unsafe extern "C" fn sim_step(
            handle: $crate::ffi::NodeHandle,
            sim_millis: u64,
            sim_rtc_secs: u32,
        ) -> $crate::StepResult {
            $crate::ffi::step(handle, sim_millis, sim_rtc_secs)
        }

        #[no_mangle]
        pub unsafe extern "C" fn sim_inject_radio_rx(
            handle: $crate::ffi::NodeHandle,
            data: *const u8,
            len: usize,
            rssi: f32,
            snr: f32,
        ) {
            $crate::ffi::inject_radio_rx(handle, data, len, rssi, snr)
        }

        #[no_mangle]
        pub unsafe extern "C" fn sim_inject_serial_rx(
            handle: $crate::ffi::NodeHandle,
            data: *const u8,
            len: usize,
        ) {
            $crate::ffi::inject_serial_rx(handle, data, len)
        }

        #[no_mangle]
        pub unsafe extern "C" fn sim_notify_tx_complete(handle: $crate::ffi::NodeHandle) {
            $crate::ffi::notify_tx_complete(handle)
        }

        #[no_mangle]
        pub unsafe extern "C" fn sim_notify_state_change(
            handle: $crate::ffi::NodeHandle,
            state_version: u32,
        ) {
            $crate::ffi::notify_state_change(handle, state_version)
        }

        #[no_mangle]
        pub unsafe extern "C" fn sim_get_public_key(
            handle: $crate::ffi::NodeHandle,
            out_key: *mut u8,
        ) {
            $crate::ffi::get_public_key(handle, out_key)
        }

        #[no_mangle]
        pub unsafe extern "C" fn sim_fs_write(
            handle: $crate::ffi::NodeHandle,
            path: *const ::std::os::raw::c_char,
            data: *const u8,
            len: usize,
        ) -> i32 {
            $crate::ffi::fs_write(handle, path, data, len)
        }

        #[no_mangle]
        pub unsafe extern "C" fn sim_fs_read(
            handle: $crate::ffi::NodeHandle,
            path: *const ::std::os::raw::c_char,
            data: *mut u8,
            max_len: usize,
        ) -> i32 {
            $crate::ffi::fs_read(handle, path, data, max_len)
        }

        #[no_mangle]
        pub unsafe extern "C" fn sim_fs_exists(
            handle: $crate::ffi::NodeHandle,
            path: *const ::std::os::raw::c_char,
        ) -> i32 {
            $crate::ffi::fs_exists(handle, path)
        }

        #[no_mangle]
        pub unsafe extern "C" fn sim_fs_remove(
            handle: $crate::ffi::NodeHandle,
            path: *const ::std::os::raw::c_char,
        ) -> i32 {
            $crate::ffi::fs_remove(handle, path)
        }

        #[no_mangle]
        pub extern "C" fn sim_get_node_type() -> *const ::std::os::raw::c_char {
            concat!($node_type, "\0").as_ptr() as *const ::std::os::raw::c_char
        }

        // Frame-based serial interface: byte-based flavors provide stubs.
        #[no_mangle]
        pub unsafe extern "C" fn sim_inject_serial_frame(
            _handle: $crate::ffi::NodeHandle,
            _data: *const u8,
            _len: usize,
        ) {
        }

        #[no_mangle]
        pub unsafe extern "C" fn sim_collect_serial_frame(
            _handle: $crate::ffi::NodeHandle,
            _buffer: *mut u8,
            _max_len: usize,
        ) -> usize {
            0
        }
    };
}
