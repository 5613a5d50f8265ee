use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};

pub const DEPS_SIDECAR_SUFFIX: &str = ".deps.json";

#[derive(Debug, Clone, Deserialize, Default)]
struct DependencySidecar {
    #[serde(default)]
    libraries: Vec<DependencyEntry>,
    #[serde(default)]
    native: Vec<DependencyEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct DependencyEntry {
    name: String,
    path: String,
}

/// Immutable description of one module on disk: its path plus the private
/// dependency table from the optional `<file name>.deps.json` sidecar.
///
/// A missing sidecar is an empty table. A malformed sidecar is
/// `InvalidManifest`, not a default.
#[derive(Debug, Clone)]
pub struct ModuleManifest {
    module_path: PathBuf,
    dir: PathBuf,
    file_name: String,
    libraries: Vec<(String, PathBuf)>,
    native: Vec<(String, PathBuf)>,
}

impl ModuleManifest {
    pub fn new(module_path: impl Into<PathBuf>) -> Result<Self> {
        let module_path = module_path.into();
        let file_name = module_path
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string)
            .ok_or_else(|| Error::invalid_manifest(&module_path, "module path has no file name"))?;
        let dir = module_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        let sidecar_path = dir.join(format!("{file_name}{DEPS_SIDECAR_SUFFIX}"));
        let sidecar = match std::fs::read_to_string(&sidecar_path) {
            Ok(text) => {
                debug!(
                    target: "stagehand_plugins::boundary",
                    sidecar = %sidecar_path.display(),
                    "reading module dependency manifest"
                );
                serde_json::from_str::<DependencySidecar>(&text)
                    .map_err(|e| Error::invalid_manifest(&module_path, e.to_string()))?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => DependencySidecar::default(),
            Err(e) => return Err(Error::io_at(&sidecar_path, e)),
        };

        let resolve_entries = |entries: Vec<DependencyEntry>| {
            entries
                .into_iter()
                .map(|entry| {
                    let path = dir.join(entry.path);
                    (entry.name, path)
                })
                .collect::<Vec<_>>()
        };

        let libraries = resolve_entries(sidecar.libraries);
        let native = resolve_entries(sidecar.native);
        Ok(Self {
            module_path,
            dir,
            file_name,
            libraries,
            native,
        })
    }

    pub fn module_path(&self) -> &Path {
        &self.module_path
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Absolute path for a manifest-declared private library dependency.
    pub fn resolve_dependency(&self, identity: &str) -> Option<PathBuf> {
        self.libraries
            .iter()
            .find(|(name, _)| name == identity)
            .map(|(_, path)| path.clone())
    }

    /// Absolute path for a manifest-declared native library.
    pub fn resolve_native(&self, identity: &str) -> Option<PathBuf> {
        self.native
            .iter()
            .find(|(name, _)| name == identity)
            .map(|(_, path)| path.clone())
    }
}
