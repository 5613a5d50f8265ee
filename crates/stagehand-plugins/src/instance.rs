use crate::error::Result;
use crate::types::{ContractKind, ExportDescriptor, Stage};

/// A constructed pipeline stage runner. Instances keep their module's code
/// alive for as long as they exist.
pub trait StageRunner: Send + Sync {
    fn descriptor(&self) -> &ExportDescriptor;

    /// Run one pipeline stage with the run configuration as JSON.
    fn run(&self, stage: Stage, config_json: &str) -> Result<()>;
}

/// A constructed application-model provider.
pub trait ModelProvider: Send + Sync {
    fn descriptor(&self) -> &ExportDescriptor;

    /// Serialized application model.
    fn model_json(&self) -> Result<String>;
}

/// One live plugin instance of either contract kind.
pub enum PluginInstance {
    StageRunner(Box<dyn StageRunner>),
    ModelProvider(Box<dyn ModelProvider>),
}

impl PluginInstance {
    pub fn descriptor(&self) -> &ExportDescriptor {
        match self {
            Self::StageRunner(runner) => runner.descriptor(),
            Self::ModelProvider(provider) => provider.descriptor(),
        }
    }

    pub fn kind(&self) -> ContractKind {
        match self {
            Self::StageRunner(_) => ContractKind::StageRunner,
            Self::ModelProvider(_) => ContractKind::ModelProvider,
        }
    }

    pub fn type_id(&self) -> &str {
        &self.descriptor().type_id
    }

    pub fn display_name(&self) -> &str {
        &self.descriptor().display_name
    }

    pub fn stage_runner(&self) -> Option<&dyn StageRunner> {
        match self {
            Self::StageRunner(runner) => Some(runner.as_ref()),
            Self::ModelProvider(_) => None,
        }
    }

    pub fn model_provider(&self) -> Option<&dyn ModelProvider> {
        match self {
            Self::StageRunner(_) => None,
            Self::ModelProvider(provider) => Some(provider.as_ref()),
        }
    }
}

impl std::fmt::Debug for PluginInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginInstance")
            .field("kind", &self.kind())
            .field("type_id", &self.type_id())
            .finish()
    }
}
