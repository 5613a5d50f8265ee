use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::boundary::ModuleBoundary;
use crate::error::{Error, Result};
use crate::instance::PluginInstance;
use crate::loader::{LibraryHandle, ModuleLoader};
use crate::shared::SharedTypeSet;
use crate::types::contract_library_file_name;

/// Instances constructed from one module path.
#[derive(Debug, Clone)]
pub struct PluginRecord {
    module_path: PathBuf,
    instances: Vec<Arc<PluginInstance>>,
}

impl PluginRecord {
    pub fn module_path(&self) -> &Path {
        &self.module_path
    }

    pub fn instances(&self) -> &[Arc<PluginInstance>] {
        &self.instances
    }
}

/// Persistent owner of loaded plugin modules and their instances.
///
/// The host keeps one boundary per containing directory, created on first
/// use and kept for the host's lifetime. A module path is loaded at most
/// once; repeat loads are no-ops.
pub struct PluginHost {
    loader: Arc<dyn ModuleLoader>,
    boundaries: Mutex<Vec<Arc<ModuleBoundary>>>,
    records: Mutex<Vec<PluginRecord>>,
    resolving: AtomicBool,
}

impl PluginHost {
    pub fn new(loader: Arc<dyn ModuleLoader>) -> Self {
        Self {
            loader,
            boundaries: Mutex::new(Vec::new()),
            records: Mutex::new(Vec::new()),
            resolving: AtomicBool::new(false),
        }
    }

    /// Load the given module paths and construct every exported type.
    ///
    /// Per-type instantiation failures are logged and the remaining types
    /// are still attempted; any other error aborts the load. Returns the
    /// number of instances constructed by this call.
    pub fn load(&self, module_paths: &[PathBuf], shared: &SharedTypeSet) -> Result<usize> {
        let contract_file = contract_library_file_name();
        let mut constructed = 0usize;

        for path in module_paths {
            let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            if file_name == contract_file {
                debug!(
                    target: "stagehand_plugins::host",
                    module = %path.display(),
                    "skipping contract library"
                );
                continue;
            }
            if self.is_loaded(path)? {
                debug!(
                    target: "stagehand_plugins::host",
                    module = %path.display(),
                    "module already loaded"
                );
                continue;
            }

            let boundary = self.boundary_for(path, shared)?;
            let module = boundary.load_module(path)?;
            if let Some(metadata) = module.metadata_json() {
                debug!(
                    target: "stagehand_plugins::host",
                    module = %path.display(),
                    metadata,
                    "module metadata"
                );
            }

            let mut instances = Vec::new();
            for export in module.exports() {
                match module.instantiate(&export) {
                    Ok(instance) => instances.push(Arc::new(instance)),
                    Err(err @ Error::Instantiation { .. }) => {
                        warn!(
                            target: "stagehand_plugins::host",
                            module = %path.display(),
                            type_id = export.type_id,
                            %err,
                            "failed to instantiate plugin type"
                        );
                    }
                    Err(err) => return Err(err),
                }
            }
            constructed += instances.len();

            let Ok(mut records) = self.records.lock() else {
                return Err(Error::operation("host", "record table lock poisoned"));
            };
            records.push(PluginRecord {
                module_path: path.clone(),
                instances,
            });
        }

        let total: usize = self.plugins().len();
        info!(
            target: "stagehand_plugins::host",
            constructed,
            total,
            "loaded plugins"
        );
        Ok(constructed)
    }

    fn is_loaded(&self, path: &Path) -> Result<bool> {
        let Ok(records) = self.records.lock() else {
            return Err(Error::operation("host", "record table lock poisoned"));
        };
        Ok(records.iter().any(|r| r.module_path == path))
    }

    /// Boundary for the module's containing directory, creating one
    /// anchored at this module if the directory has none yet.
    fn boundary_for(&self, path: &Path, shared: &SharedTypeSet) -> Result<Arc<ModuleBoundary>> {
        let dir = path.parent().unwrap_or_else(|| Path::new(""));
        let Ok(mut boundaries) = self.boundaries.lock() else {
            return Err(Error::operation("host", "boundary table lock poisoned"));
        };
        if let Some(existing) = boundaries.iter().find(|b| b.dir() == dir) {
            if existing.shared() != shared {
                warn!(
                    target: "stagehand_plugins::host",
                    boundary_dir = %dir.display(),
                    "shared type set differs from the directory's existing boundary; keeping the original"
                );
            }
            return Ok(existing.clone());
        }
        let boundary = Arc::new(ModuleBoundary::new(
            path,
            shared.clone(),
            false,
            self.loader.clone(),
        )?);
        debug!(
            target: "stagehand_plugins::host",
            boundary_dir = %dir.display(),
            "created boundary for directory"
        );
        boundaries.push(boundary.clone());
        Ok(boundary)
    }

    /// Every constructed instance, in load order.
    pub fn plugins(&self) -> Vec<Arc<PluginInstance>> {
        let Ok(records) = self.records.lock() else {
            return Vec::new();
        };
        records
            .iter()
            .flat_map(|r| r.instances.iter().cloned())
            .collect()
    }

    pub fn records(&self) -> Vec<PluginRecord> {
        let Ok(records) = self.records.lock() else {
            return Vec::new();
        };
        records.clone()
    }

    pub fn boundary_count(&self) -> usize {
        self.boundaries.lock().map(|b| b.len()).unwrap_or(0)
    }

    /// Fallback resolution across every boundary, in load order, via each
    /// boundary's sibling-file lookup.
    ///
    /// Re-entrant calls (a resolution triggering another resolution) return
    /// `None` immediately; the guard is released even when nothing is
    /// found.
    pub fn resolve_across_boundaries(&self, identity: &str) -> Option<LibraryHandle> {
        if self.resolving.swap(true, Ordering::Acquire) {
            return None;
        }
        let _guard = ResolveGuard(&self.resolving);

        let boundaries = {
            let Ok(boundaries) = self.boundaries.lock() else {
                return None;
            };
            boundaries.clone()
        };
        for boundary in &boundaries {
            match boundary.resolve_sibling(identity) {
                Ok(Some(handle)) => {
                    debug!(
                        target: "stagehand_plugins::host",
                        identity,
                        boundary_dir = %boundary.dir().display(),
                        "identity resolved from boundary directory"
                    );
                    return Some(handle);
                }
                Ok(None) => {}
                Err(err) => {
                    debug!(
                        target: "stagehand_plugins::host",
                        identity,
                        boundary_dir = %boundary.dir().display(),
                        %err,
                        "boundary failed to resolve identity; trying next"
                    );
                }
            }
        }
        None
    }
}

struct ResolveGuard<'a>(&'a AtomicBool);

impl Drop for ResolveGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[cfg(test)]
#[path = "tests/host_tests.rs"]
mod tests;
