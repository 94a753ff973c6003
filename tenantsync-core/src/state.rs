//! [`TenantState`]: the map of asset type to collection or singleton that
//! every stage reads from and merges into.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StateError;
use crate::types::{Asset, AssetCollection, AssetKind, AssetType};

/// The value stored for one asset type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AssetValue {
    Collection(AssetCollection),
    Singleton(Asset),
}

impl AssetValue {
    pub fn as_collection(&self) -> Option<&[Asset]> {
        match self {
            AssetValue::Collection(items) => Some(items),
            AssetValue::Singleton(_) => None,
        }
    }

    pub fn as_singleton(&self) -> Option<&Asset> {
        match self {
            AssetValue::Singleton(asset) => Some(asset),
            AssetValue::Collection(_) => None,
        }
    }
}

/// Asset type to value. Absent types were never loaded or declared.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantState(BTreeMap<AssetType, AssetValue>);

impl TenantState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a state from a parsed desired-state document.
    ///
    /// Top-level keys must name a known asset type; `null` entries are
    /// skipped; each value must match its type's kind.
    pub fn from_value(document: Value) -> Result<Self, StateError> {
        let map = match document {
            Value::Object(map) => map,
            Value::Null => return Ok(Self::default()),
            _ => return Err(StateError::NotAMapping),
        };

        let mut state = Self::default();
        for (key, value) in map {
            let asset_type: AssetType = key
                .parse()
                .map_err(|_| StateError::UnknownType(key.clone()))?;
            if value.is_null() {
                continue;
            }
            state.insert(asset_type, asset_value(asset_type, value)?);
        }
        Ok(state)
    }

    /// Parse a YAML (or JSON) desired-state document.
    pub fn from_yaml_str(text: &str) -> Result<Self, StateError> {
        let document: Value = serde_yaml::from_str(text)?;
        Self::from_value(document)
    }

    pub fn get(&self, asset_type: AssetType) -> Option<&AssetValue> {
        self.0.get(&asset_type)
    }

    pub fn collection(&self, asset_type: AssetType) -> Option<&[Asset]> {
        self.get(asset_type).and_then(AssetValue::as_collection)
    }

    pub fn singleton(&self, asset_type: AssetType) -> Option<&Asset> {
        self.get(asset_type).and_then(AssetValue::as_singleton)
    }

    pub fn contains(&self, asset_type: AssetType) -> bool {
        self.0.contains_key(&asset_type)
    }

    pub fn insert(&mut self, asset_type: AssetType, value: AssetValue) -> Option<AssetValue> {
        self.0.insert(asset_type, value)
    }

    /// Shallow merge: every type present in `patch` replaces ours.
    pub fn merge(&mut self, patch: TenantState) {
        self.0.extend(patch.0);
    }

    pub fn types(&self) -> impl Iterator<Item = AssetType> + '_ {
        self.0.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// JSON view, keyed by document names.
    pub fn to_value(&self) -> Value {
        let map = self
            .0
            .iter()
            .map(|(ty, value)| {
                let v = match value {
                    AssetValue::Collection(items) => {
                        Value::Array(items.iter().cloned().map(Value::Object).collect())
                    }
                    AssetValue::Singleton(asset) => Value::Object(asset.clone()),
                };
                (ty.as_str().to_owned(), v)
            })
            .collect();
        Value::Object(map)
    }
}

impl FromIterator<(AssetType, AssetValue)> for TenantState {
    fn from_iter<I: IntoIterator<Item = (AssetType, AssetValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

fn asset_value(asset_type: AssetType, value: Value) -> Result<AssetValue, StateError> {
    let shape_err = |expected: &'static str| StateError::Shape { asset_type, expected };
    match (asset_type.kind(), value) {
        (AssetKind::Singleton, Value::Object(map)) => Ok(AssetValue::Singleton(map)),
        (AssetKind::Singleton, _) => Err(shape_err("a mapping")),
        (AssetKind::Collection, Value::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(map) => Ok(map),
                _ => Err(shape_err("a list of mappings")),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(AssetValue::Collection),
        (AssetKind::Collection, _) => Err(shape_err("a list of mappings")),
    }
}
