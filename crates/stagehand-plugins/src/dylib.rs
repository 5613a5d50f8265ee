use core::ffi::c_void;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use libloading::{Library, Symbol};
use stagehand_plugin_api::{
    ShHostVTable, ShLogLevel, ShModelProviderInstanceRef, ShModelProviderVTable, ShPluginEntry,
    ShPluginModule, ShStageRunnerInstanceRef, ShStageRunnerVTable, ShStatus, ShStr,
    STAGEHAND_PLUGIN_API_VERSION, STAGEHAND_PLUGIN_ENTRY_SYMBOL,
};
use tracing::debug;

use crate::error::{Error, Result};
use crate::instance::{ModelProvider, PluginInstance, StageRunner};
use crate::loader::{LibraryHandle, LoadedLibrary, ModuleHandle, ModuleLoader};
use crate::manifest::ModuleManifest;
use crate::types::{ContractKind, ExportDescriptor, Stage, StageFlags};

/// Copy UTF-8 bytes out of an ABI string view.
///
/// # Safety
///
/// `s.ptr` must point at `s.len` live bytes, or be null.
unsafe fn copy_utf8(s: ShStr) -> String {
    if s.ptr.is_null() {
        return String::new();
    }
    let bytes = unsafe { core::slice::from_raw_parts(s.ptr, s.len) };
    String::from_utf8_lossy(bytes).into_owned()
}

/// Production loader over `libloading` and the plugin ABI.
#[derive(Debug, Default)]
pub struct DylibModuleLoader;

impl DylibModuleLoader {
    pub fn new() -> Self {
        Self
    }
}

impl ModuleLoader for DylibModuleLoader {
    fn load_module(&self, manifest: &ModuleManifest) -> Result<Arc<dyn ModuleHandle>> {
        let module = DylibModule::open(manifest.module_path())?;
        Ok(Arc::new(DylibModuleHandle {
            inner: Arc::new(module),
        }))
    }

    fn load_library(&self, identity: &str, path: &Path) -> Result<LibraryHandle> {
        if !path.is_file() {
            return Err(Error::missing_dependency(identity, path));
        }
        // SAFETY: loading dynamic libraries is inherently unsafe; the
        // library's initializers run here.
        let lib = unsafe { Library::new(path) }
            .map_err(|e| Error::unsupported_binary_format(path, e.to_string()))?;
        debug!(
            target: "stagehand_plugins::boundary",
            identity,
            path = %path.display(),
            "dependency library loaded"
        );
        Ok(LibraryHandle::new(identity, Arc::new(DylibLibrary { _lib: lib })))
    }
}

struct DylibLibrary {
    _lib: Library,
}

impl LoadedLibrary for DylibLibrary {}

extern "C" fn entry_host_log(_: *mut c_void, level: ShLogLevel, msg: ShStr) {
    let text = unsafe { copy_utf8(msg) };
    match level {
        ShLogLevel::Error => tracing::error!(target: "stagehand_plugins::plugin", "{text}"),
        ShLogLevel::Warn => tracing::warn!(target: "stagehand_plugins::plugin", "{text}"),
        ShLogLevel::Info => tracing::info!(target: "stagehand_plugins::plugin", "{text}"),
        ShLogLevel::Debug => tracing::debug!(target: "stagehand_plugins::plugin", "{text}"),
        ShLogLevel::Trace => tracing::trace!(target: "stagehand_plugins::plugin", "{text}"),
    }
}

fn entry_host_vtable() -> ShHostVTable {
    ShHostVTable {
        api_version: STAGEHAND_PLUGIN_API_VERSION,
        user_data: core::ptr::null_mut(),
        log_utf8: Some(entry_host_log),
        free_host_str_utf8: None,
    }
}

/// A loaded plugin dynamic library plus its module table.
struct DylibModule {
    path: PathBuf,
    module: ShPluginModule,
    exports: Vec<ExportDescriptor>,
    metadata_json: Option<String>,
    // The plugin may retain the vtable pointer for its lifetime.
    _host_vtable: Box<ShHostVTable>,
    _lib: Library,
}

impl DylibModule {
    fn open(path: &Path) -> Result<Self> {
        // SAFETY: loading dynamic libraries and invoking plugin
        // entrypoints is inherently unsafe.
        let lib = unsafe { Library::new(path) }
            .map_err(|e| Error::unsupported_binary_format(path, e.to_string()))?;

        // SAFETY: symbol type matches the current ABI contract.
        let entry: Symbol<ShPluginEntry> = unsafe {
            lib.get(STAGEHAND_PLUGIN_ENTRY_SYMBOL.as_bytes()).map_err(|_| {
                Error::unsupported_binary_format(
                    path,
                    format!("missing entry symbol `{STAGEHAND_PLUGIN_ENTRY_SYMBOL}`"),
                )
            })?
        };

        let host_vtable = Box::new(entry_host_vtable());
        // SAFETY: entrypoint is trusted by ABI contract; null/version
        // checked below.
        let module_ptr = unsafe { (entry)(host_vtable.as_ref() as *const ShHostVTable) };
        if module_ptr.is_null() {
            return Err(Error::unsupported_binary_format(
                path,
                "entry returned null module",
            ));
        }
        // SAFETY: module pointer remains valid while the library is loaded.
        let module = unsafe { *module_ptr };
        if module.api_version != STAGEHAND_PLUGIN_API_VERSION {
            return Err(Error::unsupported_binary_format(
                path,
                format!(
                    "api_version mismatch: plugin={}, host={}",
                    module.api_version, STAGEHAND_PLUGIN_API_VERSION
                ),
            ));
        }

        let metadata_json = {
            let raw = unsafe { copy_utf8((module.metadata_json_utf8)()) };
            (!raw.is_empty()).then_some(raw)
        };

        let mut exports = Vec::new();
        let count = (module.export_count)();
        for index in 0..count {
            let descriptor_ptr = (module.export_get)(index);
            if descriptor_ptr.is_null() {
                continue;
            }
            // SAFETY: descriptor pointers remain valid while the library is
            // loaded; strings are copied out immediately.
            let descriptor = unsafe { *descriptor_ptr };
            exports.push(ExportDescriptor {
                kind: descriptor.kind.into(),
                type_id: unsafe { copy_utf8(descriptor.type_id_utf8) },
                display_name: unsafe { copy_utf8(descriptor.display_name_utf8) },
                stages: StageFlags(descriptor.stage_mask),
                priority: descriptor.priority,
            });
        }

        Ok(Self {
            path: path.to_path_buf(),
            module,
            exports,
            metadata_json,
            _host_vtable: host_vtable,
            _lib: lib,
        })
    }

    /// Copy a plugin-owned string and return the bytes through the
    /// module's free hook, if it has one.
    fn take_string(&self, s: ShStr) -> String {
        let text = unsafe { copy_utf8(s) };
        if let Some(free) = self.module.plugin_free {
            if !s.ptr.is_null() && s.len != 0 {
                free(s.ptr as *mut c_void, s.len, 1);
            }
        }
        text
    }

    fn status_message(&self, status: ShStatus) -> String {
        let msg = self.take_string(status.message);
        if msg.is_empty() {
            format!("status code {}", status.code)
        } else {
            msg
        }
    }
}

impl Drop for DylibModule {
    fn drop(&mut self) {
        if let Some(shutdown) = self.module.shutdown {
            let status = shutdown();
            if status.code != 0 {
                let msg = self.status_message(status);
                debug!(
                    target: "stagehand_plugins::boundary",
                    module = %self.path.display(),
                    msg,
                    "plugin shutdown reported an error"
                );
            }
        }
    }
}

struct DylibModuleHandle {
    inner: Arc<DylibModule>,
}

impl ModuleHandle for DylibModuleHandle {
    fn module_path(&self) -> &Path {
        &self.inner.path
    }

    fn metadata_json(&self) -> Option<String> {
        self.inner.metadata_json.clone()
    }

    fn exports(&self) -> Vec<ExportDescriptor> {
        self.inner.exports.clone()
    }

    fn instantiate(&self, export: &ExportDescriptor) -> Result<PluginInstance> {
        match export.kind {
            ContractKind::StageRunner => self.instantiate_stage_runner(export),
            ContractKind::ModelProvider => self.instantiate_model_provider(export),
        }
    }
}

impl DylibModuleHandle {
    fn instantiate_stage_runner(&self, export: &ExportDescriptor) -> Result<PluginInstance> {
        let module = &self.inner.module;
        let type_id = ShStr {
            ptr: export.type_id.as_ptr(),
            len: export.type_id.len(),
        };
        let mut out = ShStageRunnerInstanceRef::null();
        let Some((status, logger)) = construct(
            module.create_stage_runner_with_logger,
            module.create_stage_runner,
            type_id,
            &export.display_name,
            &mut out,
        ) else {
            return Err(Error::instantiation(
                &export.type_id,
                &self.inner.path,
                "module provides no stage runner constructor",
            ));
        };
        if status.code != 0 {
            let details = self.inner.status_message(status);
            return Err(Error::instantiation(&export.type_id, &self.inner.path, details));
        }
        if out.handle.is_null() || out.vtable.is_null() {
            return Err(Error::instantiation(
                &export.type_id,
                &self.inner.path,
                "constructor returned a null instance",
            ));
        }

        // SAFETY: vtable pointer was checked non-null and stays valid for
        // the instance's lifetime.
        let vtable = unsafe { *out.vtable };
        Ok(PluginInstance::StageRunner(Box::new(DylibStageRunner {
            descriptor: export.clone(),
            module: self.inner.clone(),
            handle: out.handle,
            vtable,
            _logger: logger,
        })))
    }

    fn instantiate_model_provider(&self, export: &ExportDescriptor) -> Result<PluginInstance> {
        let module = &self.inner.module;
        let type_id = ShStr {
            ptr: export.type_id.as_ptr(),
            len: export.type_id.len(),
        };
        let mut out = ShModelProviderInstanceRef::null();
        let Some((status, logger)) = construct(
            module.create_model_provider_with_logger,
            module.create_model_provider,
            type_id,
            &export.display_name,
            &mut out,
        ) else {
            return Err(Error::instantiation(
                &export.type_id,
                &self.inner.path,
                "module provides no model provider constructor",
            ));
        };
        if status.code != 0 {
            let details = self.inner.status_message(status);
            return Err(Error::instantiation(&export.type_id, &self.inner.path, details));
        }
        if out.handle.is_null() || out.vtable.is_null() {
            return Err(Error::instantiation(
                &export.type_id,
                &self.inner.path,
                "constructor returned a null instance",
            ));
        }

        // SAFETY: vtable pointer was checked non-null and stays valid for
        // the instance's lifetime.
        let vtable = unsafe { *out.vtable };
        Ok(PluginInstance::ModelProvider(Box::new(DylibModelProvider {
            descriptor: export.clone(),
            module: self.inner.clone(),
            handle: out.handle,
            vtable,
            _logger: logger,
        })))
    }
}

/// Pick a constructor for one export. The logger-aware constructor is
/// authoritative when the module declares it; the parameterless one is
/// only a fallback for modules that declare no logger-aware constructor,
/// never a retry after a failed call. Returns `None` when the module has
/// neither.
fn construct<R>(
    with_logger: Option<extern "C" fn(ShStr, *const ShHostVTable, *mut R) -> ShStatus>,
    plain: Option<extern "C" fn(ShStr, *mut R) -> ShStatus>,
    type_id: ShStr,
    scope: &str,
    out: &mut R,
) -> Option<(ShStatus, Option<InstanceLogger>)> {
    if let Some(create) = with_logger {
        let logger = InstanceLogger::new(scope);
        let status = create(type_id, logger.vtable_ptr(), out);
        let keep = (status.code == 0).then_some(logger);
        Some((status, keep))
    } else {
        plain.map(|create| (create(type_id, out), None))
    }
}

struct LoggerCtx {
    scope: String,
}

extern "C" fn instance_log(user_data: *mut c_void, level: ShLogLevel, msg: ShStr) {
    if user_data.is_null() {
        return entry_host_log(user_data, level, msg);
    }
    // SAFETY: user_data points at the LoggerCtx owned by the instance's
    // InstanceLogger, which outlives the instance.
    let ctx = unsafe { &*(user_data as *const LoggerCtx) };
    let text = unsafe { copy_utf8(msg) };
    match level {
        ShLogLevel::Error => {
            tracing::error!(target: "stagehand_plugins::plugin", plugin = %ctx.scope, "{text}")
        }
        ShLogLevel::Warn => {
            tracing::warn!(target: "stagehand_plugins::plugin", plugin = %ctx.scope, "{text}")
        }
        ShLogLevel::Info => {
            tracing::info!(target: "stagehand_plugins::plugin", plugin = %ctx.scope, "{text}")
        }
        ShLogLevel::Debug => {
            tracing::debug!(target: "stagehand_plugins::plugin", plugin = %ctx.scope, "{text}")
        }
        ShLogLevel::Trace => {
            tracing::trace!(target: "stagehand_plugins::plugin", plugin = %ctx.scope, "{text}")
        }
    }
}

/// Per-instance logger vtable scoped by exported display name.
struct InstanceLogger {
    vtable: Box<ShHostVTable>,
    _ctx: Box<LoggerCtx>,
}

impl InstanceLogger {
    fn new(scope: &str) -> Self {
        let ctx = Box::new(LoggerCtx {
            scope: scope.to_string(),
        });
        let vtable = Box::new(ShHostVTable {
            api_version: STAGEHAND_PLUGIN_API_VERSION,
            user_data: ctx.as_ref() as *const LoggerCtx as *mut c_void,
            log_utf8: Some(instance_log),
            free_host_str_utf8: None,
        });
        Self { vtable, _ctx: ctx }
    }

    fn vtable_ptr(&self) -> *const ShHostVTable {
        self.vtable.as_ref()
    }
}

struct DylibStageRunner {
    descriptor: ExportDescriptor,
    module: Arc<DylibModule>,
    handle: *mut c_void,
    vtable: ShStageRunnerVTable,
    _logger: Option<InstanceLogger>,
}

// Instances are required by the ABI contract to be thread-safe.
unsafe impl Send for DylibStageRunner {}
unsafe impl Sync for DylibStageRunner {}

impl StageRunner for DylibStageRunner {
    fn descriptor(&self) -> &ExportDescriptor {
        &self.descriptor
    }

    fn run(&self, stage: Stage, config_json: &str) -> Result<()> {
        let config = ShStr {
            ptr: config_json.as_ptr(),
            len: config_json.len(),
        };
        let status = (self.vtable.run)(self.handle, stage.mask(), config);
        if status.code != 0 {
            let details = self.module.status_message(status);
            return Err(Error::operation("stage run", details));
        }
        Ok(())
    }
}

impl Drop for DylibStageRunner {
    fn drop(&mut self) {
        (self.vtable.destroy)(self.handle);
    }
}

struct DylibModelProvider {
    descriptor: ExportDescriptor,
    module: Arc<DylibModule>,
    handle: *mut c_void,
    vtable: ShModelProviderVTable,
    _logger: Option<InstanceLogger>,
}

// Instances are required by the ABI contract to be thread-safe.
unsafe impl Send for DylibModelProvider {}
unsafe impl Sync for DylibModelProvider {}

impl ModelProvider for DylibModelProvider {
    fn descriptor(&self) -> &ExportDescriptor {
        &self.descriptor
    }

    fn model_json(&self) -> Result<String> {
        let mut out = ShStr::empty();
        let status = (self.vtable.model_json_utf8)(self.handle, &mut out);
        if status.code != 0 {
            let details = self.module.status_message(status);
            return Err(Error::operation("model provider", details));
        }
        Ok(self.module.take_string(out))
    }
}

impl Drop for DylibModelProvider {
    fn drop(&mut self) {
        (self.vtable.destroy)(self.handle);
    }
}
