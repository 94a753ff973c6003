//! Domain types shared by every tenantsync crate.
//!
//! Assets are kept as open JSON maps: the remote platform owns their shape and
//! the reconciliation engine only ever looks at identifier and object fields.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One configuration entity, as an open string-keyed record.
pub type Asset = Map<String, Value>;

/// Ordered sequence of assets of a single type.
pub type AssetCollection = Vec<Asset>;

// ---------------------------------------------------------------------------
// Asset types
// ---------------------------------------------------------------------------

/// Every entity type the engine knows how to reconcile.
///
/// The serde name doubles as the top-level key of a desired-state document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AssetType {
    Tenant,
    EmailProvider,
    ResourceServers,
    Clients,
    Connections,
    Roles,
    Rules,
    Actions,
    ClientGrants,
    Organizations,
}

/// Whether a type holds a list of assets or one tenant-wide settings object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Collection,
    Singleton,
}

impl AssetType {
    /// Declaration order; also the order handlers are registered in.
    pub const ALL: [AssetType; 10] = [
        AssetType::Tenant,
        AssetType::EmailProvider,
        AssetType::ResourceServers,
        AssetType::Clients,
        AssetType::Connections,
        AssetType::Roles,
        AssetType::Rules,
        AssetType::Actions,
        AssetType::ClientGrants,
        AssetType::Organizations,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AssetType::Tenant => "tenant",
            AssetType::EmailProvider => "emailProvider",
            AssetType::ResourceServers => "resourceServers",
            AssetType::Clients => "clients",
            AssetType::Connections => "connections",
            AssetType::Roles => "roles",
            AssetType::Rules => "rules",
            AssetType::Actions => "actions",
            AssetType::ClientGrants => "clientGrants",
            AssetType::Organizations => "organizations",
        }
    }

    pub fn kind(self) -> AssetKind {
        match self {
            AssetType::Tenant | AssetType::EmailProvider => AssetKind::Singleton,
            _ => AssetKind::Collection,
        }
    }

    /// Fields every desired asset of this type must carry.
    pub fn required_fields(self) -> &'static [&'static str] {
        match self {
            AssetType::Tenant | AssetType::EmailProvider => &[],
            AssetType::ResourceServers => &["identifier"],
            AssetType::ClientGrants => &["client_id", "audience"],
            AssetType::Rules => &["name", "script"],
            AssetType::Connections => &["name", "strategy"],
            AssetType::Clients
            | AssetType::Roles
            | AssetType::Actions
            | AssetType::Organizations => &["name"],
        }
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AssetType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown asset type '{s}'"))
    }
}

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// A field, or an ordered list of fields, whose value(s) identify an asset.
///
/// Composite identifiers are serialized as a YAML/JSON list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Identifier {
    Field(String),
    Composite(Vec<String>),
}

impl Identifier {
    pub fn field(name: &str) -> Self {
        Identifier::Field(name.to_owned())
    }

    pub fn composite(names: &[&str]) -> Self {
        Identifier::Composite(names.iter().map(|s| (*s).to_owned()).collect())
    }

    /// The field names making up this identifier.
    pub fn fields(&self) -> &[String] {
        match self {
            Identifier::Field(f) => std::slice::from_ref(f),
            Identifier::Composite(fs) => fs,
        }
    }

    /// Key for `asset`, composite parts joined with `-`.
    ///
    /// `None` when any part is missing or null.
    pub fn key_of(&self, asset: &Asset) -> Option<String> {
        let mut parts = Vec::with_capacity(self.fields().len());
        for field in self.fields() {
            parts.push(scalar_key(asset.get(field)?)?);
        }
        Some(parts.join("-"))
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fields().join("+"))
    }
}

fn scalar_key(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Keyword mapping
// ---------------------------------------------------------------------------

/// A replacement value for a keyword placeholder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeywordValue {
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
    List(Vec<KeywordValue>),
}

impl KeywordValue {
    /// Plain-text form used by `##KEY##` substitution; lists join with `,`.
    pub fn scalar_form(&self) -> String {
        match self {
            KeywordValue::Bool(b) => b.to_string(),
            KeywordValue::Number(n) => n.to_string(),
            KeywordValue::Text(s) => s.clone(),
            KeywordValue::List(items) => items
                .iter()
                .map(KeywordValue::scalar_form)
                .collect::<Vec<_>>()
                .join(","),
        }
    }

    /// JSON form used by `@@KEY@@` substitution.
    pub fn json_form(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| self.scalar_form())
    }
}

impl From<&str> for KeywordValue {
    fn from(s: &str) -> Self {
        KeywordValue::Text(s.to_owned())
    }
}

impl From<String> for KeywordValue {
    fn from(s: String) -> Self {
        KeywordValue::Text(s)
    }
}

impl From<Vec<&str>> for KeywordValue {
    fn from(items: Vec<&str>) -> Self {
        KeywordValue::List(items.into_iter().map(KeywordValue::from).collect())
    }
}

/// Placeholder name to replacement value. Keys are case-sensitive.
pub type KeywordMapping = BTreeMap<String, KeywordValue>;

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

/// A phase a handler participates in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Stage {
    Load,
    Validate,
    ProcessChanges,
    DryRun,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Load => write!(f, "load"),
            Stage::Validate => write!(f, "validate"),
            Stage::ProcessChanges => write!(f, "processChanges"),
            Stage::DryRun => write!(f, "dryRun"),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn asset(v: Value) -> Asset {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn composite_key_joins_with_dash() {
        let id = Identifier::composite(&["client_id", "audience"]);
        let a = asset(json!({"client_id": "abc", "audience": "https://api"}));
        assert_eq!(id.key_of(&a).as_deref(), Some("abc-https://api"));
    }

    #[test]
    fn composite_key_missing_part_is_none() {
        let id = Identifier::composite(&["client_id", "audience"]);
        let a = asset(json!({"client_id": "abc"}));
        assert_eq!(id.key_of(&a), None);
    }

    #[test]
    fn null_field_has_no_key() {
        let id = Identifier::field("id");
        assert_eq!(id.key_of(&asset(json!({"id": null}))), None);
        assert_eq!(id.key_of(&asset(json!({"id": 7}))).as_deref(), Some("7"));
    }

    #[test]
    fn identifier_deserializes_from_string_or_list() {
        let ids: Vec<Identifier> =
            serde_yaml::from_str("- id\n- [client_id, audience]\n").unwrap();
        assert_eq!(
            ids,
            vec![
                Identifier::field("id"),
                Identifier::composite(&["client_id", "audience"])
            ]
        );
    }

    #[test]
    fn asset_type_round_trips_through_str() {
        for ty in AssetType::ALL {
            assert_eq!(ty.as_str().parse::<AssetType>().unwrap(), ty);
        }
        assert!("widgets".parse::<AssetType>().is_err());
    }

    #[test]
    fn keyword_value_forms() {
        let list = KeywordValue::from(vec!["x", "y"]);
        assert_eq!(list.scalar_form(), "x,y");
        assert_eq!(list.json_form(), r#"["x","y"]"#);
        let n: KeywordValue = serde_json::from_str("3").unwrap();
        assert_eq!(n.scalar_form(), "3");
        assert_eq!(n.json_form(), "3");
    }
}
