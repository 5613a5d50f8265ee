//! Plugin discovery and isolated loading for the stagehand pipeline.
//!
//! Discovery scans configured roots for library files, probes each
//! candidate inside a throwaway isolation boundary, and reports the ones
//! that declare plugin exports. The persistent [`PluginHost`] then loads
//! the surviving modules, one boundary per directory, constructs their
//! exported stage runners and model providers, and keeps everything alive
//! for the run. [`StageRunnerCatalog`] and [`ModelProviderCatalog`] tie the
//! two halves together.

mod boundary;
mod catalog;
mod dylib;
pub mod error;
mod finder;
mod host;
mod instance;
mod loader;
mod manifest;
mod pattern;
mod shared;
mod types;

pub use boundary::{ModuleBoundary, Resolution};
pub use catalog::{ModelProviderCatalog, StageRunnerCatalog};
pub use dylib::DylibModuleLoader;
pub use error::{Error, Result};
pub use finder::{DiscoveryResult, PluginFinder};
pub use host::{PluginHost, PluginRecord};
pub use instance::{ModelProvider, PluginInstance, StageRunner};
pub use loader::{LibraryHandle, LoadedLibrary, ModuleHandle, ModuleLoader};
pub use manifest::{ModuleManifest, DEPS_SIDECAR_SUFFIX};
pub use pattern::FilePattern;
pub use shared::SharedTypeSet;
pub use types::{
    contract_library_file_name, dylib_file_name, ContractKind, ExportDescriptor, Stage,
    StageFlags,
};

#[cfg(test)]
#[path = "tests/stub_loader.rs"]
mod stub_loader;
