//! Library loading and symbol resolution.

use std::ffi::CStr;
use std::os::raw::c_char;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use libloading::Library;
use meshsim_api::{NodeConfig, StepResult};
use thiserror::Error;

use crate::node::HostNode;

/// Errors from loading or driving a node library.
#[derive(Debug, Error)]
pub enum LibraryError {
    /// The dynamic loader failed.
    #[error("failed to load library: {0}")]
    Load(#[from] libloading::Error),

    /// No library file found in the search path.
    #[error("library not found: {0}")]
    NotFound(String),

    /// `sim_create` returned null.
    #[error("failed to create node")]
    CreateFailed,

    /// A path contained an interior NUL byte.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// A `sim_fs_*` call reported failure.
    #[error("filesystem error: {0}")]
    Filesystem(i32),
}

/// Firmware flavors shipped as node libraries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeFlavor {
    Repeater,
    Companion,
    RoomServer,
}

impl NodeFlavor {
    /// Platform file name of this flavor's library.
    pub fn library_name(&self) -> String {
        let stem = match self {
            NodeFlavor::Repeater => "meshsim_repeater",
            NodeFlavor::Companion => "meshsim_companion",
            NodeFlavor::RoomServer => "meshsim_room_server",
        };
        format!(
            "{}{stem}{}",
            std::env::consts::DLL_PREFIX,
            std::env::consts::DLL_SUFFIX
        )
    }
}

/// Opaque handle type matching the node side.
#[repr(C)]
pub(crate) struct OpaqueNode {
    _private: [u8; 0],
}

pub(crate) type RawHandle = *mut OpaqueNode;

pub(crate) type FnSimCreate = unsafe extern "C" fn(*const NodeConfig) -> RawHandle;
pub(crate) type FnSimDestroy = unsafe extern "C" fn(RawHandle);
pub(crate) type FnSimReboot = unsafe extern "C" fn(RawHandle, *const NodeConfig);
pub(crate) type FnSimStepBegin = unsafe extern "C" fn(RawHandle, u64, u32);
pub(crate) type FnSimStepWait = unsafe extern "C" fn(RawHandle) -> StepResult;
pub(crate) type FnSimStep = unsafe extern "C" fn(RawHandle, u64, u32) -> StepResult;
pub(crate) type FnSimInjectRadioRx = unsafe extern "C" fn(RawHandle, *const u8, usize, f32, f32);
pub(crate) type FnSimInjectSerialRx = unsafe extern "C" fn(RawHandle, *const u8, usize);
pub(crate) type FnSimInjectSerialFrame = unsafe extern "C" fn(RawHandle, *const u8, usize);
pub(crate) type FnSimCollectSerialFrame = unsafe extern "C" fn(RawHandle, *mut u8, usize) -> usize;
pub(crate) type FnSimNotifyTxComplete = unsafe extern "C" fn(RawHandle);
pub(crate) type FnSimNotifyStateChange = unsafe extern "C" fn(RawHandle, u32);
pub(crate) type FnSimGetNodeType = unsafe extern "C" fn() -> *const c_char;
pub(crate) type FnSimGetPublicKey = unsafe extern "C" fn(RawHandle, *mut u8);
pub(crate) type FnSimFsWrite = unsafe extern "C" fn(RawHandle, *const c_char, *const u8, usize) -> i32;
pub(crate) type FnSimFsRead = unsafe extern "C" fn(RawHandle, *const c_char, *mut u8, usize) -> i32;
pub(crate) type FnSimFsExists = unsafe extern "C" fn(RawHandle, *const c_char) -> i32;
pub(crate) type FnSimFsRemove = unsafe extern "C" fn(RawHandle, *const c_char) -> i32;

/// The resolved symbol table of one node library.
pub(crate) struct Symbols {
    pub(crate) sim_create: FnSimCreate,
    pub(crate) sim_destroy: FnSimDestroy,
    pub(crate) sim_reboot: FnSimReboot,
    pub(crate) sim_step_begin: FnSimStepBegin,
    pub(crate) sim_step_wait: FnSimStepWait,
    pub(crate) sim_step: FnSimStep,
    pub(crate) sim_inject_radio_rx: FnSimInjectRadioRx,
    pub(crate) sim_inject_serial_rx: FnSimInjectSerialRx,
    pub(crate) sim_inject_serial_frame: FnSimInjectSerialFrame,
    pub(crate) sim_collect_serial_frame: FnSimCollectSerialFrame,
    pub(crate) sim_notify_tx_complete: FnSimNotifyTxComplete,
    pub(crate) sim_notify_state_change: FnSimNotifyStateChange,
    pub(crate) sim_get_node_type: FnSimGetNodeType,
    pub(crate) sim_get_public_key: FnSimGetPublicKey,
    pub(crate) sim_fs_write: FnSimFsWrite,
    pub(crate) sim_fs_read: FnSimFsRead,
    pub(crate) sim_fs_exists: FnSimFsExists,
    pub(crate) sim_fs_remove: FnSimFsRemove,
}

/// A loaded node library.
///
/// Kept alive (via `Arc`) as long as any node created from it exists.
pub struct NodeLibrary {
    inner: Arc<LibraryInner>,
    flavor: NodeFlavor,
}

pub(crate) struct LibraryInner {
    // Field order matters: symbols borrow from the library and must drop
    // before it is unloaded.
    pub(crate) symbols: Symbols,
    _library: Library,
}

impl NodeLibrary {
    /// Load a flavor's library from the standard search path.
    pub fn load(flavor: NodeFlavor) -> Result<Self, LibraryError> {
        let path = find_library_path(flavor)?;
        Self::load_from_path(&path, flavor)
    }

    /// Load a node library from an explicit path.
    pub fn load_from_path(path: &Path, flavor: NodeFlavor) -> Result<Self, LibraryError> {
        log::debug!("loading {flavor:?} node library from {}", path.display());
        // SAFETY: the library is one of our own node cdylibs.
        let library = unsafe { Library::new(path)? };

        // SAFETY: symbol names and signatures are fixed by meshsim-api.
        let symbols = unsafe {
            Symbols {
                sim_create: *library.get::<FnSimCreate>(b"sim_create")?,
                sim_destroy: *library.get::<FnSimDestroy>(b"sim_destroy")?,
                sim_reboot: *library.get::<FnSimReboot>(b"sim_reboot")?,
                sim_step_begin: *library.get::<FnSimStepBegin>(b"sim_step_begin")?,
                sim_step_wait: *library.get::<FnSimStepWait>(b"sim_step_wait")?,
                sim_step: *library.get::<FnSimStep>(b"sim_step")?,
                sim_inject_radio_rx: *library.get::<FnSimInjectRadioRx>(b"sim_inject_radio_rx")?,
                sim_inject_serial_rx: *library.get::<FnSimInjectSerialRx>(b"sim_inject_serial_rx")?,
                sim_inject_serial_frame: *library
                    .get::<FnSimInjectSerialFrame>(b"sim_inject_serial_frame")?,
                sim_collect_serial_frame: *library
                    .get::<FnSimCollectSerialFrame>(b"sim_collect_serial_frame")?,
                sim_notify_tx_complete: *library
                    .get::<FnSimNotifyTxComplete>(b"sim_notify_tx_complete")?,
                sim_notify_state_change: *library
                    .get::<FnSimNotifyStateChange>(b"sim_notify_state_change")?,
                sim_get_node_type: *library.get::<FnSimGetNodeType>(b"sim_get_node_type")?,
                sim_get_public_key: *library.get::<FnSimGetPublicKey>(b"sim_get_public_key")?,
                sim_fs_write: *library.get::<FnSimFsWrite>(b"sim_fs_write")?,
                sim_fs_read: *library.get::<FnSimFsRead>(b"sim_fs_read")?,
                sim_fs_exists: *library.get::<FnSimFsExists>(b"sim_fs_exists")?,
                sim_fs_remove: *library.get::<FnSimFsRemove>(b"sim_fs_remove")?,
            }
        };

        Ok(Self {
            inner: Arc::new(LibraryInner {
                symbols,
                _library: library,
            }),
            flavor,
        })
    }

    pub fn flavor(&self) -> NodeFlavor {
        self.flavor
    }

    /// The flavor string the library reports (`sim_get_node_type`).
    pub fn node_type(&self) -> String {
        unsafe {
            let ptr = (self.inner.symbols.sim_get_node_type)();
            if ptr.is_null() {
                return String::new();
            }
            CStr::from_ptr(ptr).to_string_lossy().into_owned()
        }
    }

    /// Create a node; the returned handle keeps the library alive.
    pub fn create_node(&self, config: &NodeConfig) -> Result<HostNode, LibraryError> {
        let handle = unsafe { (self.inner.symbols.sim_create)(config) };
        if handle.is_null() {
            return Err(LibraryError::CreateFailed);
        }
        Ok(HostNode::new(self.inner.clone(), handle))
    }
}

/// Search for a flavor's library: current directory, the running
/// executable's directory, then the cargo target directories.
fn find_library_path(flavor: NodeFlavor) -> Result<PathBuf, LibraryError> {
    let name = flavor.library_name();

    let local = PathBuf::from(&name);
    if local.exists() {
        return Ok(local);
    }

    if let Ok(exe_path) = std::env::current_exe() {
        // Test binaries live one level below target/<profile>.
        for dir in exe_path.ancestors().skip(1).take(3) {
            let candidate = dir.join(&name);
            if candidate.exists() {
                return Ok(candidate);
            }
        }
    }

    for profile in ["debug", "release"] {
        let candidate = PathBuf::from("target").join(profile).join(&name);
        if candidate.exists() {
            return Ok(candidate);
        }
    }

    Err(LibraryError::NotFound(name))
}
