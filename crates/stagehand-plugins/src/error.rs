use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("path not found: `{path}`")]
    PathNotFound { path: PathBuf },
    #[error("invalid manifest for `{path}`: {details}")]
    InvalidManifest { path: PathBuf, details: String },
    #[error("unsupported binary format at `{path}`: {details}")]
    UnsupportedBinaryFormat { path: PathBuf, details: String },
    #[error("missing dependency `{identity}` for `{path}`")]
    MissingDependency { identity: String, path: PathBuf },
    #[error("failed to instantiate `{type_id}` from `{path}`: {details}")]
    Instantiation {
        type_id: String,
        path: PathBuf,
        details: String,
    },
    #[error("module already loaded: `{path}`")]
    DuplicateLoad { path: PathBuf },
    #[error("{operation} failed: {details}")]
    Operation {
        operation: &'static str,
        details: String,
    },
    #[error("io failed at `{path}`: {source}")]
    IoAt {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn path_not_found(path: impl Into<PathBuf>) -> Self {
        Self::PathNotFound { path: path.into() }
    }

    pub fn invalid_manifest(path: impl Into<PathBuf>, details: impl Into<String>) -> Self {
        Self::InvalidManifest {
            path: path.into(),
            details: details.into(),
        }
    }

    pub fn unsupported_binary_format(
        path: impl Into<PathBuf>,
        details: impl Into<String>,
    ) -> Self {
        Self::UnsupportedBinaryFormat {
            path: path.into(),
            details: details.into(),
        }
    }

    pub fn missing_dependency(identity: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::MissingDependency {
            identity: identity.into(),
            path: path.into(),
        }
    }

    pub fn instantiation(
        type_id: impl Into<String>,
        path: impl Into<PathBuf>,
        details: impl Into<String>,
    ) -> Self {
        Self::Instantiation {
            type_id: type_id.into(),
            path: path.into(),
            details: details.into(),
        }
    }

    pub fn duplicate_load(path: impl Into<PathBuf>) -> Self {
        Self::DuplicateLoad { path: path.into() }
    }

    pub fn operation(operation: &'static str, details: impl Into<String>) -> Self {
        Self::Operation {
            operation,
            details: details.into(),
        }
    }

    pub fn io_at(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::IoAt {
            path: path.into(),
            source,
        }
    }

    /// Errors a discovery probe treats as "not one of ours" rather than fatal.
    pub fn is_tolerable_in_discovery(&self) -> bool {
        matches!(
            self,
            Self::InvalidManifest { .. }
                | Self::UnsupportedBinaryFormat { .. }
                | Self::MissingDependency { .. }
        )
    }
}
