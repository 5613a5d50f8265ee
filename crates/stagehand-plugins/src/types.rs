use stagehand_plugin_api::{
    ShContractKind, SH_STAGE_ALL, SH_STAGE_ANALYZE, SH_STAGE_CONVERT, SH_STAGE_DISCOVER,
    SH_STAGE_PARSE, SH_STAGE_REPORT, SH_STAGE_VERIFY,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContractKind {
    StageRunner,
    ModelProvider,
}

impl From<ShContractKind> for ContractKind {
    fn from(kind: ShContractKind) -> Self {
        match kind {
            ShContractKind::StageRunner => Self::StageRunner,
            ShContractKind::ModelProvider => Self::ModelProvider,
        }
    }
}

/// One pipeline stage of the migration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Discover,
    Parse,
    Analyze,
    Report,
    Convert,
    Verify,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::Discover,
        Stage::Parse,
        Stage::Analyze,
        Stage::Report,
        Stage::Convert,
        Stage::Verify,
    ];

    pub const fn mask(self) -> u32 {
        match self {
            Stage::Discover => SH_STAGE_DISCOVER,
            Stage::Parse => SH_STAGE_PARSE,
            Stage::Analyze => SH_STAGE_ANALYZE,
            Stage::Report => SH_STAGE_REPORT,
            Stage::Convert => SH_STAGE_CONVERT,
            Stage::Verify => SH_STAGE_VERIFY,
        }
    }
}

/// Bitmask over [`Stage`] values, as declared by stage-runner exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StageFlags(pub u32);

impl StageFlags {
    pub const NONE: StageFlags = StageFlags(0);
    pub const ALL: StageFlags = StageFlags(SH_STAGE_ALL);

    pub fn contains(self, stage: Stage) -> bool {
        self.0 & stage.mask() != 0
    }

    pub fn stages(self) -> impl Iterator<Item = Stage> {
        Stage::ALL.into_iter().filter(move |s| self.contains(*s))
    }
}

/// Host-side view of one exported contract implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportDescriptor {
    pub kind: ContractKind,
    pub type_id: String,
    pub display_name: String,
    pub stages: StageFlags,
    pub priority: i32,
}

/// Platform file name for a dynamic library identity, e.g. `foo` ->
/// `libfoo.so` on linux.
pub fn dylib_file_name(identity: &str) -> String {
    format!(
        "{}{}{}",
        std::env::consts::DLL_PREFIX,
        identity,
        std::env::consts::DLL_SUFFIX
    )
}

/// File name of the library that defines the plugin contract itself. It
/// matches discovery patterns but must never be probed as a plugin.
pub fn contract_library_file_name() -> String {
    dylib_file_name("stagehand_plugin_api")
}
