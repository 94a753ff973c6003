//! Error types for tenantsync-sync.

use std::path::PathBuf;

use thiserror::Error;

use tenantsync_core::{AssetType, ConfigError, Stage, StateError};
use tenantsync_keywords::KeywordError;
use tenantsync_remote::RemoteError;

use crate::orchestrator::Phase;

/// All errors that can arise from a sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Remote API failure, including pagination integrity errors.
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Desired state failed parsing or the structural schema check.
    #[error("{0}")]
    State(#[from] StateError),

    #[error("{0}")]
    Keyword(#[from] KeywordError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A handler rejected the desired state of its type.
    #[error("invalid {asset_type}: {message}")]
    Validation { asset_type: AssetType, message: String },

    /// An asset cannot be addressed remotely.
    #[error("{asset_type} '{asset}' has no '{field}' to address it by")]
    MissingIdentifier {
        asset_type: AssetType,
        field: String,
        asset: String,
    },

    /// A handler failed; names the type and stage it failed in.
    #[error("{stage} failed for {asset_type}: {source}")]
    Handler {
        asset_type: AssetType,
        stage: Stage,
        #[source]
        source: Box<SyncError>,
    },

    /// The run already failed; no further stages may run.
    #[error("run aborted by an earlier stage failure")]
    Aborted,

    /// A stage was called before the stages it depends on.
    #[error("{stage} needs a {expected} run, but the run is {actual}")]
    OutOfOrder { stage: Stage, expected: Phase, actual: Phase },

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SyncError {
    /// Attribute this error to `asset_type` / `stage`, unless it already is.
    pub fn in_stage(self, asset_type: AssetType, stage: Stage) -> Self {
        match self {
            e @ SyncError::Handler { .. } => e,
            e => SyncError::Handler { asset_type, stage, source: Box::new(e) },
        }
    }
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
