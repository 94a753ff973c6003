//! Change calculation for one asset type.
//!
//! # Protocol
//!
//! 1. Start with `delete = current`, `create = desired`.
//! 2. For each identifier in declared order, pair every asset still in
//!    `create` with the asset still in `delete` that has the same key. Each
//!    pair becomes one update carrying the desired asset (object fields
//!    merged) with the current asset's values pinned in for the matching
//!    identifier and every identifier declared before it.
//! 3. When `name` is an identifier, find remote assets that hold a name the
//!    run is about to claim under a different primary identifier. Those are
//!    returned as conflicts, already renamed, so the caller can move them
//!    aside before creating or updating.
//!
//! Unmatched assets become creates or deletes; nothing here fails.

use std::collections::HashSet;

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::{Map, Value};
use tenantsync_core::{Asset, AssetType, Identifier};

const CONFLICT_SUFFIX_LEN: usize = 5;

/// Partition of one type's desired and current assets.
///
/// `create`, `update` and `delete` are pairwise disjoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalculatedChanges {
    pub create: Vec<Asset>,
    pub update: Vec<Asset>,
    pub delete: Vec<Asset>,
    /// Pre-existing remote assets with their new, suffixed names.
    pub conflicts: Vec<Asset>,
    /// Non-fatal notices raised while merging object fields.
    pub warnings: Vec<String>,
}

/// Diff `desired` against `current` for one asset type.
pub fn calculate_changes(
    asset_type: AssetType,
    desired: &[Asset],
    current: &[Asset],
    identifiers: &[Identifier],
    object_fields: &[String],
    allow_delete: bool,
) -> CalculatedChanges {
    let mut create: Vec<Asset> = desired.to_vec();
    let mut delete: Vec<Asset> = current.to_vec();
    let mut update: Vec<Asset> = Vec::new();
    let mut warnings: Vec<String> = Vec::new();
    // (name, primary key) each update lays claim to.
    let mut update_claims: Vec<(Option<String>, Option<String>)> = Vec::new();
    let primary = identifiers.first();

    for (rank, identifier) in identifiers.iter().enumerate() {
        let mut unmatched = Vec::with_capacity(create.len());
        for asset in create.drain(..) {
            let Some(key) = identifier.key_of(&asset) else {
                unmatched.push(asset);
                continue;
            };
            let Some(pos) = delete
                .iter()
                .position(|c| identifier.key_of(c).as_deref() == Some(key.as_str()))
            else {
                unmatched.push(asset);
                continue;
            };
            let found = delete.remove(pos);

            let claim = primary.and_then(|p| p.key_of(&asset).or_else(|| p.key_of(&found)));
            update_claims.push((name_of(&asset).map(str::to_owned), claim));

            let mut merged = if object_fields.is_empty() {
                asset
            } else {
                process_changed_object_fields(
                    asset_type,
                    &asset,
                    &found,
                    object_fields,
                    allow_delete,
                    &mut warnings,
                )
            };
            pin_identifiers(&mut merged, &found, &identifiers[..=rank]);
            update.push(merged);
        }
        create = unmatched;
    }

    let conflicts = match primary {
        Some(primary) if identifiers.contains(&Identifier::field("name")) => {
            let create_claims = create
                .iter()
                .map(|a| (name_of(a).map(str::to_owned), primary.key_of(a)));
            let claims: Vec<_> = create_claims.chain(update_claims).collect();
            find_conflicts(&claims, current, &delete, primary)
        }
        _ => Vec::new(),
    };

    for warning in &warnings {
        tracing::warn!(asset_type = %asset_type, "{warning}");
    }

    CalculatedChanges { create, update, delete, conflicts, warnings }
}

/// Merge `object_fields` of a matched desired/current pair.
///
/// Properties the remote has but the desired asset dropped are only removed
/// (sent as `null`, or the whole field as `{}`) when `allow_delete` is set;
/// otherwise they are left alone and a warning is recorded.
pub fn process_changed_object_fields(
    asset_type: AssetType,
    desired: &Asset,
    current: &Asset,
    object_fields: &[String],
    allow_delete: bool,
    warnings: &mut Vec<String>,
) -> Asset {
    let mut merged = desired.clone();

    for field in object_fields {
        let desired_obj = desired.get(field).and_then(Value::as_object);
        let current_obj = current.get(field).and_then(Value::as_object);
        let desired_empty = desired_obj.map_or(true, Map::is_empty);
        let current_empty = current_obj.map_or(true, Map::is_empty);

        if desired_empty && current_empty {
            continue;
        }

        match desired_obj.filter(|d| !d.is_empty()) {
            Some(desired_obj) => {
                let mut obj = desired_obj.clone();
                let dropped: Vec<String> = current_obj
                    .into_iter()
                    .flat_map(Map::keys)
                    .filter(|k| !obj.contains_key(*k))
                    .cloned()
                    .collect();
                if !dropped.is_empty() {
                    if allow_delete {
                        for key in dropped {
                            obj.insert(key, Value::Null);
                        }
                    } else {
                        warnings.push(format!(
                            "{asset_type} '{}': {field} properties [{}] are absent from desired state \
                             but will not be removed while allow_delete is off",
                            describe(desired),
                            dropped.join(", "),
                        ));
                    }
                }
                merged.insert(field.clone(), Value::Object(obj));
            }
            None if allow_delete => {
                merged.insert(field.clone(), Value::Object(Map::new()));
            }
            None => {
                merged.remove(field);
                warnings.push(format!(
                    "{asset_type} '{}': {field} is empty in desired state but will not be cleared \
                     while allow_delete is off",
                    describe(desired),
                ));
            }
        }
    }
    merged
}

/// Copy every identifier field of `found` onto `asset`.
pub(crate) fn pin_identifiers(asset: &mut Asset, found: &Asset, identifiers: &[Identifier]) {
    for field in identifiers.iter().flat_map(Identifier::fields) {
        if let Some(value) = found.get(field).filter(|v| !v.is_null()) {
            asset.insert(field.clone(), value.clone());
        }
    }
}

fn find_conflicts(
    claims: &[(Option<String>, Option<String>)],
    current: &[Asset],
    delete: &[Asset],
    primary: &Identifier,
) -> Vec<Asset> {
    let mut conflicts = Vec::new();
    let mut seen: HashSet<Option<String>> = HashSet::new();

    for (name, claim) in claims {
        let Some(name) = name.as_deref() else { continue };
        let holds_name =
            |e: &&Asset| name_of(e) == Some(name) && primary.key_of(e).as_ref() != claim.as_ref();

        // Being deleted in this run: the name is freed, not contested.
        if delete.iter().any(|e| holds_name(&e)) {
            continue;
        }
        if let Some(existing) = current.iter().find(holds_name) {
            if !seen.insert(primary.key_of(existing)) {
                continue;
            }
            let mut renamed = existing.clone();
            renamed.insert("name".into(), Value::String(conflict_name(name)));
            conflicts.push(renamed);
        }
    }
    conflicts
}

fn conflict_name(name: &str) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(CONFLICT_SUFFIX_LEN)
        .map(|c| char::from(c).to_ascii_lowercase())
        .collect();
    format!("{name}-{suffix}")
}

pub(crate) fn name_of(asset: &Asset) -> Option<&str> {
    asset.get("name").and_then(Value::as_str)
}

/// Short human label for diagnostics.
pub(crate) fn describe(asset: &Asset) -> String {
    name_of(asset)
        .map(str::to_owned)
        .or_else(|| {
            ["id", "client_id", "identifier"]
                .iter()
                .find_map(|f| asset.get(*f).and_then(Value::as_str).map(str::to_owned))
        })
        .unwrap_or_else(|| "<unnamed>".to_owned())
}
