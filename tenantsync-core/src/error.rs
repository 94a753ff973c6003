//! Error types for tenantsync-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::AssetType;

/// Errors from locating, reading or interpreting the run configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure, with the path that was being read.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML serialization error (write path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load, with the offending file.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    #[error("config not found at {path}")]
    NotFound { path: PathBuf },

    /// An environment override could not be interpreted.
    #[error("invalid value for {key}: {message}")]
    InvalidOverride { key: String, message: String },

    /// The configuration parsed but is not usable.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Errors from building or checking a [`TenantState`](crate::TenantState).
#[derive(Debug, Error)]
pub enum StateError {
    #[error("desired state must be a mapping of asset type to value")]
    NotAMapping,

    #[error("unknown asset type '{0}'")]
    UnknownType(String),

    #[error("{asset_type} must be {expected}")]
    Shape {
        asset_type: AssetType,
        expected: &'static str,
    },

    /// Structural schema violations, one message per violation.
    #[error("schema validation failed: {}", errors.join("; "))]
    Schema { errors: Vec<String> },

    #[error("failed to parse document: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Convenience constructor for [`ConfigError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}
