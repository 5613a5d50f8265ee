use core::ffi::c_void;

use crate::{
    borrow_utf8, leak_utf8, utf8_from, ShContractKind, ShExportDescriptor,
    ShModelProviderInstanceRef, ShModelProviderVTable, ShStageRunnerInstanceRef,
    ShStageRunnerVTable, ShStatus, ShStr, SH_ERR_INTERNAL, SH_ERR_INVALID_ARG,
    SH_ERR_STAGE_FAILED,
};

fn failure(code: i32, message: String) -> ShStatus {
    ShStatus {
        code,
        message: leak_utf8(message),
    }
}

fn invalid_arg() -> ShStatus {
    ShStatus {
        code: SH_ERR_INVALID_ARG,
        message: ShStr::empty(),
    }
}

/// Safe surface for a stage-runner export. The SDK turns an implementation
/// into the ABI handle and vtable.
pub trait StageRunnerPlugin: Send + Sync + 'static {
    /// `stage` is a single `SH_STAGE_*` flag.
    fn run(&self, stage: u32, config_json: &str) -> Result<(), String>;
}

/// Safe surface for a model-provider export.
pub trait ModelProviderPlugin: Send + Sync + 'static {
    fn model_json(&self) -> Result<String, String>;
}

pub const fn stage_runner_export(
    type_id: &'static str,
    display_name: &'static str,
    stage_mask: u32,
    priority: i32,
) -> ShExportDescriptor {
    ShExportDescriptor {
        kind: ShContractKind::StageRunner,
        type_id_utf8: borrow_utf8(type_id),
        display_name_utf8: borrow_utf8(display_name),
        stage_mask,
        priority,
        reserved0: 0,
        reserved1: 0,
    }
}

pub const fn model_provider_export(
    type_id: &'static str,
    display_name: &'static str,
) -> ShExportDescriptor {
    ShExportDescriptor {
        kind: ShContractKind::ModelProvider,
        type_id_utf8: borrow_utf8(type_id),
        display_name_utf8: borrow_utf8(display_name),
        stage_mask: 0,
        priority: 0,
        reserved0: 0,
        reserved1: 0,
    }
}

// The vtable is embedded in the same allocation as the plugin value, so the
// instance ref's vtable pointer stays valid exactly as long as the handle.
struct ExportedRunner<T> {
    vtable: ShStageRunnerVTable,
    plugin: T,
}

struct ExportedProvider<T> {
    vtable: ShModelProviderVTable,
    plugin: T,
}

extern "C" fn runner_run<T: StageRunnerPlugin>(
    handle: *mut c_void,
    stage: u32,
    config_json_utf8: ShStr,
) -> ShStatus {
    if handle.is_null() {
        return invalid_arg();
    }
    // Safety: handle was produced by `stage_runner_instance::<T>`.
    let exported = unsafe { &*(handle as *const ExportedRunner<T>) };
    // Safety: the host guarantees the config bytes outlive this call.
    let Some(config) = (unsafe { utf8_from(&config_json_utf8) }) else {
        return invalid_arg();
    };
    match exported.plugin.run(stage, config) {
        Ok(()) => ShStatus::ok(),
        Err(msg) => failure(SH_ERR_STAGE_FAILED, msg),
    }
}

extern "C" fn runner_destroy<T: StageRunnerPlugin>(handle: *mut c_void) {
    if handle.is_null() {
        return;
    }
    // Safety: handle was produced by `Box::into_raw` in `stage_runner_instance`.
    drop(unsafe { Box::from_raw(handle as *mut ExportedRunner<T>) });
}

/// Box a stage-runner implementation into an ABI instance ref. Ownership
/// transfers to the caller; the vtable's `destroy` reclaims it.
pub fn stage_runner_instance<T: StageRunnerPlugin>(plugin: T) -> ShStageRunnerInstanceRef {
    let exported = Box::into_raw(Box::new(ExportedRunner {
        vtable: ShStageRunnerVTable {
            run: runner_run::<T>,
            destroy: runner_destroy::<T>,
        },
        plugin,
    }));
    // Safety: `exported` is a live allocation; the vtable field pointer is
    // stable until `destroy` frees the box.
    let vtable = unsafe { &(*exported).vtable as *const ShStageRunnerVTable };
    ShStageRunnerInstanceRef {
        handle: exported as *mut c_void,
        vtable,
        reserved0: 0,
        reserved1: 0,
    }
}

extern "C" fn provider_model_json<T: ModelProviderPlugin>(
    handle: *mut c_void,
    out: *mut ShStr,
) -> ShStatus {
    if handle.is_null() || out.is_null() {
        return invalid_arg();
    }
    // Safety: handle was produced by `model_provider_instance::<T>`.
    let exported = unsafe { &*(handle as *const ExportedProvider<T>) };
    match exported.plugin.model_json() {
        Ok(json) => {
            // Safety: `out` is a valid destination supplied by the host.
            unsafe { *out = leak_utf8(json) };
            ShStatus::ok()
        }
        Err(msg) => failure(SH_ERR_INTERNAL, msg),
    }
}

extern "C" fn provider_destroy<T: ModelProviderPlugin>(handle: *mut c_void) {
    if handle.is_null() {
        return;
    }
    // Safety: handle was produced by `Box::into_raw` in `model_provider_instance`.
    drop(unsafe { Box::from_raw(handle as *mut ExportedProvider<T>) });
}

/// Box a model-provider implementation into an ABI instance ref.
pub fn model_provider_instance<T: ModelProviderPlugin>(plugin: T) -> ShModelProviderInstanceRef {
    let exported = Box::into_raw(Box::new(ExportedProvider {
        vtable: ShModelProviderVTable {
            model_json_utf8: provider_model_json::<T>,
            destroy: provider_destroy::<T>,
        },
        plugin,
    }));
    // Safety: same embedding scheme as `stage_runner_instance`.
    let vtable = unsafe { &(*exported).vtable as *const ShModelProviderVTable };
    ShModelProviderInstanceRef {
        handle: exported as *mut c_void,
        vtable,
        reserved0: 0,
        reserved1: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{release_utf8, SH_STAGE_CONVERT};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct Recorder {
        calls: Arc<AtomicU32>,
    }

    impl StageRunnerPlugin for Recorder {
        fn run(&self, stage: u32, config_json: &str) -> Result<(), String> {
            if config_json == "fail" {
                return Err(format!("stage {stage} failed"));
            }
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FixedModel;

    impl ModelProviderPlugin for FixedModel {
        fn model_json(&self) -> Result<String, String> {
            Ok(r#"{"apps":[]}"#.to_string())
        }
    }

    #[test]
    fn stage_runner_round_trips_through_the_vtable() {
        let calls = Arc::new(AtomicU32::new(0));
        let instance = stage_runner_instance(Recorder {
            calls: calls.clone(),
        });
        let vtable = unsafe { *instance.vtable };

        let config = "{}";
        let status = (vtable.run)(
            instance.handle,
            SH_STAGE_CONVERT,
            ShStr {
                ptr: config.as_ptr(),
                len: config.len(),
            },
        );
        assert_eq!(status.code, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let fail = "fail";
        let status = (vtable.run)(
            instance.handle,
            SH_STAGE_CONVERT,
            ShStr {
                ptr: fail.as_ptr(),
                len: fail.len(),
            },
        );
        assert_eq!(status.code, SH_ERR_STAGE_FAILED);
        let msg = unsafe { utf8_from(&status.message) }.unwrap().to_string();
        assert!(msg.contains("failed"));
        release_utf8(status.message.ptr as *mut _, status.message.len, 1);

        (vtable.destroy)(instance.handle);
    }

    #[test]
    fn model_provider_returns_owned_json() {
        let instance = model_provider_instance(FixedModel);
        let vtable = unsafe { *instance.vtable };

        let mut out = ShStr::empty();
        let status = (vtable.model_json_utf8)(instance.handle, &mut out);
        assert_eq!(status.code, 0);
        let json = unsafe { utf8_from(&out) }.unwrap().to_string();
        assert_eq!(json, r#"{"apps":[]}"#);
        release_utf8(out.ptr as *mut _, out.len, 1);

        (vtable.destroy)(instance.handle);
    }

    #[test]
    fn export_descriptor_helpers_fill_the_fields() {
        let descriptor = stage_runner_export("conv", "Converter", SH_STAGE_CONVERT, 3);
        assert_eq!(descriptor.kind, ShContractKind::StageRunner);
        assert_eq!(descriptor.stage_mask, SH_STAGE_CONVERT);
        assert_eq!(descriptor.priority, 3);

        let descriptor = model_provider_export("model", "Model Provider");
        assert_eq!(descriptor.kind, ShContractKind::ModelProvider);
        assert_eq!(descriptor.stage_mask, 0);
    }
}
