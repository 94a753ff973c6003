//! Desired-state documents in and exported documents out.
//!
//! A document is one YAML (or JSON) text keyed by asset type. On the way in
//! its keywords are expanded before parsing; on the way out the remote state
//! has its keyword-bearing fields pinned back to the placeholders of the
//! existing local document.
//!
//! Writes use an atomic `.tmp` + rename.

use std::path::Path;

use serde_json::Value;
use tenantsync_core::{KeywordMapping, SyncConfig, TenantState};
use tenantsync_keywords::{expand, preserve_keywords, FieldAddress};
use tracing::{debug, info, warn};

use crate::error::{io_err, SyncError};

// ---------------------------------------------------------------------------
// Desired state
// ---------------------------------------------------------------------------

/// Expand `text` with `mapping` and parse it into a [`TenantState`].
///
/// Any placeholder left after expansion is an error.
pub fn parse_desired(text: &str, mapping: &KeywordMapping) -> Result<TenantState, SyncError> {
    let expanded = expand(text, mapping)?;
    let document: Value = serde_yaml::from_str(&expanded)?;
    Ok(TenantState::from_value(document)?)
}

/// Read and parse the desired-state document at `path`.
pub fn load_desired(path: &Path, mapping: &KeywordMapping) -> Result<TenantState, SyncError> {
    let text = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    let state = parse_desired(&text, mapping)?;
    debug!(path = %path.display(), types = state.types().count(), "desired state loaded");
    Ok(state)
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

/// An exported document and what keyword preservation did to it.
#[derive(Debug)]
pub struct Export {
    pub document: Value,
    pub drifted: Vec<FieldAddress>,
    pub restored: usize,
}

/// Turn `current` into a document, preserving placeholders found in `local`.
///
/// `local` is the existing unexpanded document, if any. Preservation is
/// skipped when it is absent or `preserve_keywords` is off.
pub fn export_document(current: &TenantState, local: Option<&Value>, config: &SyncConfig) -> Export {
    let remote = current.to_value();
    match local {
        Some(local) if config.preserve_keywords => {
            let preserved = preserve_keywords(local, remote, &config.keyword_mappings);
            if !preserved.drifted.is_empty() {
                warn!(count = preserved.drifted.len(), "exported fields drifted from their templates");
            }
            Export { document: preserved.tree, drifted: preserved.drifted, restored: preserved.restored }
        }
        _ => Export { document: remote, drifted: Vec::new(), restored: 0 },
    }
}

/// The existing document at `path`, unexpanded.
///
/// `None` when the file does not exist or cannot be parsed as-is (bare
/// `@@KEY@@` scalars are not valid YAML before expansion).
pub fn read_local(path: &Path) -> Result<Option<Value>, SyncError> {
    if !path.exists() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    match serde_yaml::from_str::<Value>(&text) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "existing document unreadable, keywords will not be preserved");
            Ok(None)
        }
    }
}

/// Serialize `document` as YAML and write it to `path` atomically.
pub fn write_document(path: &Path, document: &Value) -> Result<(), SyncError> {
    let yaml = serde_yaml::to_string(document)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = std::path::PathBuf::from(tmp);
    std::fs::write(&tmp, yaml).map_err(|e| io_err(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| io_err(path, e))?;
    info!(path = %path.display(), "document written");
    Ok(())
}
