use std::path::Path;
use std::sync::Arc;

use crate::error::Result;
use crate::instance::PluginInstance;
use crate::manifest::ModuleManifest;
use crate::types::ExportDescriptor;

/// Marker for a privately loaded library. Dropping the last handle releases
/// the library.
pub trait LoadedLibrary: Send + Sync {}

/// Keep-alive for a dependency library resolved inside a boundary.
#[derive(Clone)]
pub struct LibraryHandle {
    identity: String,
    _keep: Arc<dyn LoadedLibrary>,
}

impl LibraryHandle {
    pub fn new(identity: impl Into<String>, keep: Arc<dyn LoadedLibrary>) -> Self {
        Self {
            identity: identity.into(),
            _keep: keep,
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }
}

impl std::fmt::Debug for LibraryHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibraryHandle")
            .field("identity", &self.identity)
            .finish()
    }
}

/// A loaded plugin module: its declared exports and the ability to
/// construct instances from them.
pub trait ModuleHandle: Send + Sync {
    fn module_path(&self) -> &Path;

    /// Module-level metadata JSON, if the module provides any.
    fn metadata_json(&self) -> Option<String>;

    /// Exported contract implementations in the module's declared order.
    fn exports(&self) -> Vec<ExportDescriptor>;

    fn instantiate(&self, export: &ExportDescriptor) -> Result<PluginInstance>;
}

/// Module namespace capability: how boundaries load module and library code.
///
/// The production implementation is `DylibModuleLoader`. Tests substitute a
/// stub that reads descriptor files instead of machine code.
pub trait ModuleLoader: Send + Sync {
    fn load_module(&self, manifest: &ModuleManifest) -> Result<Arc<dyn ModuleHandle>>;

    fn load_library(&self, identity: &str, path: &Path) -> Result<LibraryHandle>;
}
