//! Dry-run change calculation and the report it feeds.
//!
//! Unlike [`calculate_changes`](crate::changes::calculate_changes), a matched
//! pair only counts as an update when the desired asset actually differs from
//! the remote one. Only keys present in the desired asset are compared; the
//! remote is free to carry extra, server-managed fields.
//!
//! Comparison rules:
//! - maps compare key by key, recursively
//! - lists of primitives compare as multisets (order is not significant)
//! - lists containing objects compare element by element, in order
//! - numbers compare numerically (`1` equals `1.0`)

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};
use tenantsync_core::{Asset, AssetType, Identifier};

use crate::changes::{pin_identifiers, CalculatedChanges};

// ---------------------------------------------------------------------------
// Calculation
// ---------------------------------------------------------------------------

/// Partition `desired` and `current` without merging object fields.
///
/// Identifiers are tried in declared order per desired asset; `conflicts`
/// is always empty.
pub fn calculate_dry_run_changes(
    asset_type: AssetType,
    desired: &[Asset],
    current: &[Asset],
    identifiers: &[Identifier],
) -> CalculatedChanges {
    let mut matched = vec![false; current.len()];
    let mut changes = CalculatedChanges::default();

    for asset in desired {
        let found = identifiers.iter().enumerate().find_map(|(rank, identifier)| {
            let key = identifier.key_of(asset)?;
            current
                .iter()
                .enumerate()
                .position(|(i, c)| !matched[i] && identifier.key_of(c).as_deref() == Some(key.as_str()))
                .map(|i| (i, rank))
        });

        match found {
            Some((i, rank)) => {
                matched[i] = true;
                if !map_matches(asset, &current[i]) {
                    let mut update = asset.clone();
                    pin_identifiers(&mut update, &current[i], &identifiers[..=rank]);
                    changes.update.push(update);
                }
            }
            None => changes.create.push(asset.clone()),
        }
    }

    changes.delete = current
        .iter()
        .zip(&matched)
        .filter(|(_, m)| !**m)
        .map(|(c, _)| c.clone())
        .collect();
    tracing::debug!(
        asset_type = %asset_type,
        create = changes.create.len(),
        update = changes.update.len(),
        delete = changes.delete.len(),
        "dry-run changes calculated"
    );
    changes
}

/// `true` when every key of `desired` has an equal value in `current`.
pub fn map_matches(desired: &Map<String, Value>, current: &Map<String, Value>) -> bool {
    desired.iter().all(|(key, d)| match current.get(key) {
        Some(c) => values_match(d, c),
        None => is_blank(d),
    })
}

/// Deep comparison of a desired value against its remote counterpart.
pub fn values_match(desired: &Value, current: &Value) -> bool {
    match (desired, current) {
        (Value::Object(d), Value::Object(c)) => map_matches(d, c),
        (Value::Array(d), Value::Array(c)) => {
            if d.len() != c.len() {
                return false;
            }
            if d.iter().chain(c).all(is_primitive) {
                let mut d: Vec<String> = d.iter().map(canonical).collect();
                let mut c: Vec<String> = c.iter().map(canonical).collect();
                d.sort();
                c.sort();
                d == c
            } else {
                d.iter().zip(c).all(|(d, c)| values_match(d, c))
            }
        }
        (Value::Number(d), Value::Number(c)) => d.as_f64() == c.as_f64(),
        (d, c) => d == c,
    }
}

fn is_primitive(v: &Value) -> bool {
    !matches!(v, Value::Object(_) | Value::Array(_))
}

fn is_blank(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::Object(m) => m.is_empty(),
        Value::Array(a) => a.is_empty(),
        _ => false,
    }
}

fn canonical(v: &Value) -> String {
    match v {
        Value::Number(n) => n.as_f64().map_or_else(|| n.to_string(), |f| f.to_string()),
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeAction {
    Create,
    Update,
    Delete,
}

/// One line of a dry-run report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DryRunChange {
    pub action: ChangeAction,
    pub identifier: String,
    pub details: Asset,
}

/// Dry-run result for one asset type.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DryRunEntry {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub changes: Vec<DryRunChange>,
}

impl DryRunEntry {
    /// Flatten calculated changes; `identify` labels each asset.
    pub fn from_changes(changes: &CalculatedChanges, identify: impl Fn(&Asset) -> String) -> Self {
        let mut entry = Self {
            created: changes.create.len(),
            updated: changes.update.len(),
            deleted: changes.delete.len(),
            changes: Vec::new(),
        };
        for (action, assets) in [
            (ChangeAction::Create, &changes.create),
            (ChangeAction::Update, &changes.update),
            (ChangeAction::Delete, &changes.delete),
        ] {
            entry.changes.extend(assets.iter().map(|a| DryRunChange {
                action,
                identifier: identify(a),
                details: a.clone(),
            }));
        }
        entry
    }
}

/// Per-type dry-run results, keyed by document name when serialized.
pub type DryRunReport = BTreeMap<AssetType, DryRunEntry>;
