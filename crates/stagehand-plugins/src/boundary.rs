use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::error::{Error, Result};
use crate::loader::{LibraryHandle, ModuleHandle, ModuleLoader};
use crate::manifest::ModuleManifest;
use crate::shared::SharedTypeSet;
use crate::types::dylib_file_name;

/// Outcome of resolving a library identity inside a boundary.
#[derive(Debug, Clone)]
pub enum Resolution {
    /// The identity is in the shared set. The host's already-loaded copy is
    /// authoritative; nothing is loaded privately.
    Shared,
    /// Loaded privately inside this boundary.
    Loaded(LibraryHandle),
    /// Unknown to this boundary. Not an error.
    NotFound,
}

/// An isolation boundary for plugin code.
///
/// Libraries resolved here stay private to the boundary unless their
/// identity is in the shared set. The persistent host keeps one boundary
/// per containing directory; discovery probes use single-use unloadable
/// boundaries. The dependency resolver is anchored at the first module's
/// manifest.
pub struct ModuleBoundary {
    anchor: ModuleManifest,
    shared: SharedTypeSet,
    unloadable: bool,
    loader: Arc<dyn ModuleLoader>,
    modules: Mutex<Vec<(String, Arc<dyn ModuleHandle>)>>,
    libraries: Mutex<HashMap<String, LibraryHandle>>,
    natives: Mutex<HashMap<String, LibraryHandle>>,
}

impl ModuleBoundary {
    /// `anchor_path` is the module whose manifest anchors dependency
    /// resolution for the whole boundary.
    pub fn new(
        anchor_path: impl Into<PathBuf>,
        shared: SharedTypeSet,
        unloadable: bool,
        loader: Arc<dyn ModuleLoader>,
    ) -> Result<Self> {
        let anchor = ModuleManifest::new(anchor_path)?;
        Ok(Self {
            anchor,
            shared,
            unloadable,
            loader,
            modules: Mutex::new(Vec::new()),
            libraries: Mutex::new(HashMap::new()),
            natives: Mutex::new(HashMap::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        self.anchor.dir()
    }

    pub fn shared(&self) -> &SharedTypeSet {
        &self.shared
    }

    pub fn is_unloadable(&self) -> bool {
        self.unloadable
    }

    /// Load a module into this boundary, or return the cached handle for a
    /// module already loaded here. A different path with the same file name
    /// is an identity collision.
    pub fn load_module(&self, path: &Path) -> Result<Arc<dyn ModuleHandle>> {
        let manifest = if path == self.anchor.module_path() {
            self.anchor.clone()
        } else {
            ModuleManifest::new(path)?
        };
        let key = manifest.file_name().to_string();

        let Ok(mut modules) = self.modules.lock() else {
            return Err(Error::operation("boundary", "module table lock poisoned"));
        };
        if let Some((_, handle)) = modules.iter().find(|(name, _)| *name == key) {
            if handle.module_path() != path {
                return Err(Error::duplicate_load(path));
            }
            return Ok(handle.clone());
        }
        let handle = self.loader.load_module(&manifest)?;
        debug!(
            target: "stagehand_plugins::boundary",
            module = %path.display(),
            boundary_dir = %self.anchor.dir().display(),
            "module loaded into boundary"
        );
        modules.push((key, handle.clone()));
        Ok(handle)
    }

    /// Resolve a managed library identity. Shared identities never touch
    /// the loader; manifest-declared dependencies load privately and are
    /// cached; anything else is `NotFound`.
    pub fn resolve(&self, identity: &str) -> Result<Resolution> {
        if self.shared.contains(identity) {
            return Ok(Resolution::Shared);
        }
        let Some(path) = self.anchor.resolve_dependency(identity) else {
            return Ok(Resolution::NotFound);
        };
        let handle = self.load_cached(&self.libraries, identity, &path)?;
        Ok(Resolution::Loaded(handle))
    }

    /// Resolve a native library identity over the manifest's native table.
    pub fn resolve_native(&self, identity: &str) -> Result<Resolution> {
        if self.shared.contains(identity) {
            return Ok(Resolution::Shared);
        }
        let Some(path) = self.anchor.resolve_native(identity) else {
            return Ok(Resolution::NotFound);
        };
        let handle = self.load_cached(&self.natives, identity, &path)?;
        Ok(Resolution::Loaded(handle))
    }

    /// Fallback used by cross-boundary resolution: load the platform
    /// library file for `identity` from this boundary's directory, if one
    /// exists there.
    pub fn resolve_sibling(&self, identity: &str) -> Result<Option<LibraryHandle>> {
        let path = self.anchor.dir().join(dylib_file_name(identity));
        if !path.is_file() {
            return Ok(None);
        }
        let handle = self.load_cached(&self.libraries, identity, &path)?;
        Ok(Some(handle))
    }

    fn load_cached(
        &self,
        cache: &Mutex<HashMap<String, LibraryHandle>>,
        identity: &str,
        path: &Path,
    ) -> Result<LibraryHandle> {
        let Ok(mut cache) = cache.lock() else {
            return Err(Error::operation("boundary", "library cache lock poisoned"));
        };
        if let Some(handle) = cache.get(identity) {
            return Ok(handle.clone());
        }
        let handle = self.loader.load_library(identity, path)?;
        debug!(
            target: "stagehand_plugins::boundary",
            identity,
            path = %path.display(),
            "library loaded privately into boundary"
        );
        cache.insert(identity.to_string(), handle.clone());
        Ok(handle)
    }

    /// Tear down a probe boundary. Module handles and private libraries
    /// drop synchronously before the caller moves to the next candidate.
    pub fn unload(self) -> Result<()> {
        if !self.unloadable {
            return Err(Error::operation(
                "boundary unload",
                "boundary is not unloadable",
            ));
        }
        debug!(
            target: "stagehand_plugins::boundary",
            boundary_dir = %self.anchor.dir().display(),
            "unloading probe boundary"
        );
        drop(self);
        Ok(())
    }
}

impl std::fmt::Debug for ModuleBoundary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleBoundary")
            .field("dir", &self.anchor.dir())
            .field("unloadable", &self.unloadable)
            .finish()
    }
}

#[cfg(test)]
#[path = "tests/boundary_tests.rs"]
mod tests;
