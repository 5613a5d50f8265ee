use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::boundary::ModuleBoundary;
use crate::error::{Error, Result};
use crate::loader::ModuleLoader;
use crate::pattern::FilePattern;
use crate::shared::SharedTypeSet;
use crate::types::{contract_library_file_name, ContractKind};

/// Ordered module paths produced by a discovery pass, deduplicated by file
/// name (first occurrence across roots wins).
#[derive(Debug, Clone, Default)]
pub struct DiscoveryResult {
    module_paths: Vec<PathBuf>,
}

impl DiscoveryResult {
    pub fn module_paths(&self) -> &[PathBuf] {
        &self.module_paths
    }

    pub fn is_empty(&self) -> bool {
        self.module_paths.is_empty()
    }

    pub fn len(&self) -> usize {
        self.module_paths.len()
    }
}

/// Scans plugin roots for library files matching a pattern and probes each
/// candidate in a throwaway boundary. A candidate counts as a plugin only
/// when it exports at least one implementation of the requested contract.
pub struct PluginFinder {
    loader: Arc<dyn ModuleLoader>,
}

impl PluginFinder {
    pub fn new(loader: Arc<dyn ModuleLoader>) -> Self {
        Self { loader }
    }

    /// Scan every root.
    pub fn discover(
        &self,
        roots: &[PathBuf],
        pattern: &FilePattern,
        kind: ContractKind,
        shared: &SharedTypeSet,
    ) -> Result<DiscoveryResult> {
        self.discover_inner(roots, pattern, kind, shared, false)
    }

    /// Stop at the first root that yields any module for the contract.
    pub fn discover_first(
        &self,
        roots: &[PathBuf],
        pattern: &FilePattern,
        kind: ContractKind,
        shared: &SharedTypeSet,
    ) -> Result<DiscoveryResult> {
        self.discover_inner(roots, pattern, kind, shared, true)
    }

    fn discover_inner(
        &self,
        roots: &[PathBuf],
        pattern: &FilePattern,
        kind: ContractKind,
        shared: &SharedTypeSet,
        first_root_wins: bool,
    ) -> Result<DiscoveryResult> {
        let contract_file = contract_library_file_name();
        let mut seen_file_names = HashSet::<String>::new();
        let mut result = DiscoveryResult::default();

        for root in roots {
            info!(
                target: "stagehand_plugins::discover",
                root = %root.display(),
                pattern = pattern.as_str(),
                contract = ?kind,
                "searching for plugin modules"
            );
            if !root.is_dir() {
                let err = Error::path_not_found(root);
                error!(
                    target: "stagehand_plugins::discover",
                    root = %root.display(),
                    %err,
                    "plugin root is missing; skipping"
                );
                continue;
            }

            let candidates = collect_candidates(root, pattern);
            info!(
                target: "stagehand_plugins::discover",
                root = %root.display(),
                candidates = candidates.len(),
                "candidate libraries found"
            );

            let mut matched_in_root = 0usize;
            for candidate in candidates {
                let Some(file_name) = candidate.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                if file_name == contract_file {
                    debug!(
                        target: "stagehand_plugins::discover",
                        candidate = %candidate.display(),
                        "skipping contract library"
                    );
                    continue;
                }
                if seen_file_names.contains(file_name) {
                    debug!(
                        target: "stagehand_plugins::discover",
                        candidate = %candidate.display(),
                        "skipping duplicate module file name"
                    );
                    continue;
                }

                match self.probe(&candidate, kind, shared) {
                    Ok(true) => {
                        info!(
                            target: "stagehand_plugins::discover",
                            module = %candidate.display(),
                            "plugin module discovered"
                        );
                        seen_file_names.insert(file_name.to_string());
                        result.module_paths.push(candidate);
                        matched_in_root += 1;
                    }
                    Ok(false) => {
                        debug!(
                            target: "stagehand_plugins::discover",
                            candidate = %candidate.display(),
                            contract = ?kind,
                            "library exports nothing for the contract; not a plugin"
                        );
                    }
                    Err(err) if err.is_tolerable_in_discovery() => {
                        debug!(
                            target: "stagehand_plugins::discover",
                            candidate = %candidate.display(),
                            %err,
                            "candidate rejected"
                        );
                    }
                    Err(err) => return Err(err),
                }
            }

            if matched_in_root == 0 {
                info!(
                    target: "stagehand_plugins::discover",
                    root = %root.display(),
                    "no plugin modules found in root"
                );
            } else if first_root_wins {
                break;
            }
        }

        info!(
            target: "stagehand_plugins::discover",
            modules = result.len(),
            "discovery complete"
        );
        Ok(result)
    }

    /// Probe one candidate in a single-use boundary. The boundary is torn
    /// down before the next candidate regardless of outcome.
    fn probe(&self, candidate: &Path, kind: ContractKind, shared: &SharedTypeSet) -> Result<bool> {
        let boundary =
            ModuleBoundary::new(candidate, shared.clone(), true, self.loader.clone())?;
        let outcome = boundary
            .load_module(candidate)
            .map(|module| module.exports().iter().any(|e| e.kind == kind));
        let unloaded = boundary.unload();
        let implements_contract = outcome?;
        unloaded?;
        Ok(implements_contract)
    }
}

fn collect_candidates(root: &Path, pattern: &FilePattern) -> Vec<PathBuf> {
    let mut out = Vec::new();
    for entry in walkdir::WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                debug!(
                    target: "stagehand_plugins::discover",
                    %err,
                    "skipping unreadable directory entry"
                );
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(file_name) = entry.file_name().to_str() else {
            continue;
        };
        if pattern.matches(file_name) {
            out.push(entry.path().to_path_buf());
        }
    }
    // Stable candidate order per run.
    out.sort();
    out
}

#[cfg(test)]
#[path = "tests/finder_tests.rs"]
mod tests;
