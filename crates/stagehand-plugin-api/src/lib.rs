#![allow(clippy::missing_safety_doc)]

//! C ABI contract between the stagehand host and its plugins.
//!
//! A plugin is a dynamic library exporting [`STAGEHAND_PLUGIN_ENTRY_SYMBOL`].
//! The host calls the entry with a [`ShHostVTable`] and receives a
//! [`ShPluginModule`] table describing the plugin's exported contract
//! implementations and their constructors. All types here are `#[repr(C)]`
//! and must stay ABI-stable within one api version.

use core::ffi::c_void;

// Single in-development ABI version (early-stage project).
// Note: this ABI may change in place during early development.
pub const STAGEHAND_PLUGIN_API_VERSION: u32 = 1;
pub const STAGEHAND_PLUGIN_ENTRY_SYMBOL: &str = "stagehand_plugin_entry";

// Status codes (non-exhaustive). Plugins may use other non-zero codes, but the SDK uses these.
pub const SH_ERR_INVALID_ARG: i32 = 1;
pub const SH_ERR_UNSUPPORTED: i32 = 2;
pub const SH_ERR_IO: i32 = 3;
pub const SH_ERR_STAGE_FAILED: i32 = 4;
pub const SH_ERR_INTERNAL: i32 = 5;

// Pipeline stage bitmask flags for stage-runner exports.
/// Discover artifacts in the source system
pub const SH_STAGE_DISCOVER: u32 = 1 << 0;
/// Parse discovered artifacts into the model
pub const SH_STAGE_PARSE: u32 = 1 << 1;
/// Analyze the parsed model
pub const SH_STAGE_ANALYZE: u32 = 1 << 2;
/// Report on analysis results
pub const SH_STAGE_REPORT: u32 = 1 << 3;
/// Convert the model to target artifacts
pub const SH_STAGE_CONVERT: u32 = 1 << 4;
/// Verify converted artifacts
pub const SH_STAGE_VERIFY: u32 = 1 << 5;
/// Runs in every stage
pub const SH_STAGE_ALL: u32 = 0x3F;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShVersion {
    pub major: u16,
    pub minor: u16,
    pub patch: u16,
    pub reserved: u16,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShLogLevel {
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

/// Immutable UTF-8 bytes. Not NUL-terminated.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShStr {
    pub ptr: *const u8,
    pub len: usize,
}

impl ShStr {
    pub const fn empty() -> Self {
        Self {
            ptr: core::ptr::null(),
            len: 0,
        }
    }
}

// Immutable byte view used across FFI boundaries. Callers are responsible for lifetime validity.
unsafe impl Send for ShStr {}
unsafe impl Sync for ShStr {}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShStatus {
    /// 0 = OK, non-zero = error.
    pub code: i32,
    /// Optional error message (plugin-owned; free via `plugin_free`).
    pub message: ShStr,
}

impl ShStatus {
    pub const fn ok() -> Self {
        Self {
            code: 0,
            message: ShStr::empty(),
        }
    }
}

/// The contract a plugin export implements.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShContractKind {
    StageRunner = 1,
    ModelProvider = 2,
}

/// One exported contract implementation, as declared by the plugin module.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShExportDescriptor {
    pub kind: ShContractKind,
    pub type_id_utf8: ShStr,
    pub display_name_utf8: ShStr,
    /// Bitmask over `SH_STAGE_*`. Only meaningful for stage-runner exports.
    pub stage_mask: u32,
    /// Execution priority within a stage. Lower runs earlier.
    pub priority: i32,
    pub reserved0: u32,
    pub reserved1: u64,
}

/// Host services handed to the plugin entry and to logger-aware constructors.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ShHostVTable {
    pub api_version: u32,
    pub user_data: *mut c_void,
    pub log_utf8: Option<extern "C" fn(user_data: *mut c_void, level: ShLogLevel, msg: ShStr)>,
    /// Free host-owned UTF-8 strings returned by host callbacks.
    pub free_host_str_utf8: Option<extern "C" fn(user_data: *mut c_void, s: ShStr)>,
}

// Raw pointers make this not auto-Send/Sync. The host vtable is treated as immutable and
// requires `user_data` to be thread-safe when used across threads.
unsafe impl Send for ShHostVTable {}
unsafe impl Sync for ShHostVTable {}

pub type ShPluginEntry = unsafe extern "C" fn(host: *const ShHostVTable) -> *const ShPluginModule;

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ShStageRunnerVTable {
    /// Run one pipeline stage. `stage` is a single `SH_STAGE_*` flag.
    pub run: extern "C" fn(handle: *mut c_void, stage: u32, config_json_utf8: ShStr) -> ShStatus,
    pub destroy: extern "C" fn(handle: *mut c_void),
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShStageRunnerInstanceRef {
    pub handle: *mut c_void,
    pub vtable: *const ShStageRunnerVTable,
    pub reserved0: u32,
    pub reserved1: u64,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ShModelProviderVTable {
    /// Returns the serialized application model.
    /// Result is plugin-owned and must be freed via `plugin_free`.
    pub model_json_utf8: extern "C" fn(handle: *mut c_void, out: *mut ShStr) -> ShStatus,
    pub destroy: extern "C" fn(handle: *mut c_void),
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShModelProviderInstanceRef {
    pub handle: *mut c_void,
    pub vtable: *const ShModelProviderVTable,
    pub reserved0: u32,
    pub reserved1: u64,
}

impl ShStageRunnerInstanceRef {
    pub const fn null() -> Self {
        Self {
            handle: core::ptr::null_mut(),
            vtable: core::ptr::null(),
            reserved0: 0,
            reserved1: 0,
        }
    }
}

impl ShModelProviderInstanceRef {
    pub const fn null() -> Self {
        Self {
            handle: core::ptr::null_mut(),
            vtable: core::ptr::null(),
            reserved0: 0,
            reserved1: 0,
        }
    }
}

/// Module table returned by the plugin entry.
///
/// Each contract kind has two optional constructors. The host tries the
/// `*_with_logger` variant first (a host vtable scoped to the exported type)
/// and falls back to the parameterless variant. A kind with neither
/// constructor cannot be instantiated.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ShPluginModule {
    pub api_version: u32,
    pub plugin_version: ShVersion,
    /// Optional free hook for plugin-owned UTF-8 bytes returned by plugin APIs.
    pub plugin_free: Option<extern "C" fn(ptr: *mut c_void, len: usize, align: usize)>,
    pub metadata_json_utf8: extern "C" fn() -> ShStr,

    pub export_count: extern "C" fn() -> usize,
    pub export_get: extern "C" fn(index: usize) -> *const ShExportDescriptor,

    pub create_stage_runner_with_logger: Option<
        extern "C" fn(
            type_id_utf8: ShStr,
            logger: *const ShHostVTable,
            out: *mut ShStageRunnerInstanceRef,
        ) -> ShStatus,
    >,
    pub create_stage_runner:
        Option<extern "C" fn(type_id_utf8: ShStr, out: *mut ShStageRunnerInstanceRef) -> ShStatus>,

    pub create_model_provider_with_logger: Option<
        extern "C" fn(
            type_id_utf8: ShStr,
            logger: *const ShHostVTable,
            out: *mut ShModelProviderInstanceRef,
        ) -> ShStatus,
    >,
    pub create_model_provider: Option<
        extern "C" fn(type_id_utf8: ShStr, out: *mut ShModelProviderInstanceRef) -> ShStatus,
    >,

    /// Optional module shutdown hook before the host drops the dynamic library.
    pub shutdown: Option<extern "C" fn() -> ShStatus>,
}
