use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use crate::error::Result;
use crate::finder::PluginFinder;
use crate::host::PluginHost;
use crate::instance::PluginInstance;
use crate::loader::ModuleLoader;
use crate::pattern::FilePattern;
use crate::shared::SharedTypeSet;
use crate::types::ContractKind;

// Library identities that must bridge to the host's copies inside every
// plugin boundary. The contract library also carries the shared model
// types.
const STAGE_RUNNER_SHARED_IDENTITIES: &[&str] = &[
    "stagehand_plugin_api",
    "tracing",
    "serde",
    "serde_json",
];

const MODEL_PROVIDER_SHARED_IDENTITIES: &[&str] =
    &["stagehand_plugin_api", "tracing", "serde", "serde_json"];

/// Discovers and loads every stage-runner plugin across the configured
/// roots, keeping the modules alive in a persistent host.
pub struct StageRunnerCatalog {
    finder: PluginFinder,
    host: PluginHost,
    shared: SharedTypeSet,
}

impl StageRunnerCatalog {
    pub fn new(loader: Arc<dyn ModuleLoader>) -> Self {
        Self {
            finder: PluginFinder::new(loader.clone()),
            host: PluginHost::new(loader),
            shared: SharedTypeSet::new(STAGE_RUNNER_SHARED_IDENTITIES.iter().copied()),
        }
    }

    /// All stage-runner instances from every root, in discovery order.
    pub fn find_all(
        &self,
        roots: &[PathBuf],
        pattern: &FilePattern,
    ) -> Result<Vec<Arc<PluginInstance>>> {
        let discovered =
            self.finder
                .discover(roots, pattern, ContractKind::StageRunner, &self.shared)?;
        if discovered.is_empty() {
            warn!(
                target: "stagehand_plugins::host",
                pattern = pattern.as_str(),
                "no stage runner plugins found"
            );
            return Ok(Vec::new());
        }
        self.host.load(discovered.module_paths(), &self.shared)?;

        let runners: Vec<_> = self
            .host
            .plugins()
            .into_iter()
            .filter(|p| p.kind() == ContractKind::StageRunner)
            .collect();
        info!(
            target: "stagehand_plugins::host",
            runners = runners.len(),
            "stage runner catalog ready"
        );
        Ok(runners)
    }

    pub fn host(&self) -> &PluginHost {
        &self.host
    }
}

/// Discovers the application-model provider. Exactly one is expected; the
/// first root that yields any provider module wins.
pub struct ModelProviderCatalog {
    finder: PluginFinder,
    host: PluginHost,
    shared: SharedTypeSet,
}

impl ModelProviderCatalog {
    pub fn new(loader: Arc<dyn ModuleLoader>) -> Self {
        Self {
            finder: PluginFinder::new(loader.clone()),
            host: PluginHost::new(loader),
            shared: SharedTypeSet::new(MODEL_PROVIDER_SHARED_IDENTITIES.iter().copied()),
        }
    }

    pub fn find_one(
        &self,
        roots: &[PathBuf],
        pattern: &FilePattern,
    ) -> Result<Option<Arc<PluginInstance>>> {
        let discovered = self.finder.discover_first(
            roots,
            pattern,
            ContractKind::ModelProvider,
            &self.shared,
        )?;
        if discovered.is_empty() {
            warn!(
                target: "stagehand_plugins::host",
                pattern = pattern.as_str(),
                "no model provider plugin found"
            );
            return Ok(None);
        }
        self.host.load(discovered.module_paths(), &self.shared)?;

        let provider = self
            .host
            .plugins()
            .into_iter()
            .find(|p| p.kind() == ContractKind::ModelProvider);
        if provider.is_none() {
            warn!(
                target: "stagehand_plugins::host",
                "discovered modules exported no model provider"
            );
        }
        Ok(provider)
    }

    pub fn host(&self) -> &PluginHost {
        &self.host
    }
}

#[cfg(test)]
#[path = "tests/catalog_tests.rs"]
mod tests;
