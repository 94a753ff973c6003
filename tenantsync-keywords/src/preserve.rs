//! Keyword preservation on export.
//!
//! Exporting a tenant yields fully expanded values. For every field the local
//! document still writes as a placeholder, the exported tree gets the
//! placeholder back so the next deploy stays templated.
//!
//! Fields are addressed by a [`FieldAddress`]: map keys by name, list
//! elements by their `name` property. List elements without a `name` cannot
//! be addressed and are never preserved.

use std::fmt;

use serde_json::Value;
use tenantsync_core::KeywordMapping;
use tracing::{debug, warn};

use crate::template::keyword_replace;

// ---------------------------------------------------------------------------
// Addresses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressSegment {
    /// A map key.
    Key(String),
    /// The list element whose `name` equals this value.
    Named(String),
}

/// Path from the document root to one leaf.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldAddress(Vec<AddressSegment>);

impl FieldAddress {
    fn child(&self, segment: AddressSegment) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment);
        Self(segments)
    }

    /// The same address with placeholders in element names expanded.
    pub fn expanded(&self, mapping: &KeywordMapping) -> Self {
        Self(
            self.0
                .iter()
                .map(|s| match s {
                    AddressSegment::Named(name) => {
                        AddressSegment::Named(keyword_replace(name, mapping))
                    }
                    key => key.clone(),
                })
                .collect(),
        )
    }

    /// Resolve against `tree`.
    pub fn resolve<'a>(&self, tree: &'a Value) -> Option<&'a Value> {
        self.0.iter().try_fold(tree, |node, segment| match segment {
            AddressSegment::Key(key) => node.as_object()?.get(key),
            AddressSegment::Named(name) => node
                .as_array()?
                .iter()
                .find(|el| element_name(el) == Some(name.as_str())),
        })
    }

    pub fn resolve_mut<'a>(&self, tree: &'a mut Value) -> Option<&'a mut Value> {
        self.0.iter().try_fold(tree, |node, segment| match segment {
            AddressSegment::Key(key) => node.as_object_mut()?.get_mut(key),
            AddressSegment::Named(name) => node
                .as_array_mut()?
                .iter_mut()
                .find(|el| element_name(el) == Some(name.as_str())),
        })
    }
}

impl fmt::Display for FieldAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            match segment {
                AddressSegment::Key(key) => f.write_str(key)?,
                AddressSegment::Named(name) => write!(f, "[name={name}]")?,
            }
        }
        Ok(())
    }
}

fn element_name(el: &Value) -> Option<&str> {
    el.get("name").and_then(Value::as_str)
}

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

/// Whether `value` contains a placeholder for a key of `mapping`.
pub fn should_field_be_preserved(value: &str, mapping: &KeywordMapping) -> bool {
    mapping.keys().any(|key| {
        value.contains(&format!("##{key}##")) || value.contains(&format!("@@{key}@@"))
    })
}

/// Addresses of every string leaf in `tree` that carries a known placeholder.
pub fn preservable_fields(tree: &Value, mapping: &KeywordMapping) -> Vec<FieldAddress> {
    let mut out = Vec::new();
    collect(tree, &FieldAddress::default(), mapping, &mut out);
    out
}

fn collect(node: &Value, at: &FieldAddress, mapping: &KeywordMapping, out: &mut Vec<FieldAddress>) {
    match node {
        Value::Object(map) => {
            for (key, child) in map {
                collect(child, &at.child(AddressSegment::Key(key.clone())), mapping, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                if let Some(name) = element_name(item) {
                    collect(item, &at.child(AddressSegment::Named(name.to_owned())), mapping, out);
                }
            }
        }
        Value::String(s) if should_field_be_preserved(s, mapping) => out.push(at.clone()),
        _ => {}
    }
}

// ---------------------------------------------------------------------------
// Preservation
// ---------------------------------------------------------------------------

/// Result of [`preserve_keywords`].
#[derive(Debug, Clone, PartialEq)]
pub struct Preserved {
    /// The remote tree with placeholders restored.
    pub tree: Value,
    /// Fields whose remote value no longer matched the expanded template.
    pub drifted: Vec<FieldAddress>,
    /// Number of fields overwritten with their placeholder.
    pub restored: usize,
}

/// Pin every preservable field of `remote` back to its placeholder in `local`.
///
/// A remote value that differs from the expanded local value is logged as
/// drift but overwritten all the same. Addresses missing from `remote` are
/// skipped.
pub fn preserve_keywords(local: &Value, remote: Value, mapping: &KeywordMapping) -> Preserved {
    let mut preserved = Preserved { tree: remote, drifted: Vec::new(), restored: 0 };
    if mapping.is_empty() {
        return preserved;
    }

    for address in preservable_fields(local, mapping) {
        let Some(Value::String(raw)) = address.resolve(local) else {
            continue;
        };
        let candidates = [address.clone(), address.expanded(mapping)];
        let Some(target) = candidates
            .iter()
            .find(|c| c.resolve(&preserved.tree).is_some())
        else {
            debug!(field = %address, "field absent from remote, nothing to preserve");
            continue;
        };
        let Some(slot) = target.resolve_mut(&mut preserved.tree) else {
            continue;
        };

        let expanded = keyword_replace(raw, mapping);
        if !matches_expanded(&expanded, slot) {
            warn!(
                field = %address,
                remote = %slot,
                expected = %expanded,
                "remote value drifted from its keyword template; restoring placeholder"
            );
            preserved.drifted.push(address.clone());
        }
        *slot = Value::String(raw.clone());
        preserved.restored += 1;
    }
    preserved
}

fn matches_expanded(expanded: &str, remote: &Value) -> bool {
    match remote {
        Value::String(s) => s == expanded,
        other => serde_json::from_str::<Value>(expanded)
            .map(|v| &v == other)
            .unwrap_or(false),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tenantsync_core::KeywordValue;

    use super::*;

    fn mapping() -> KeywordMapping {
        let mut m = KeywordMapping::new();
        m.insert("DOMAIN".into(), "acme.example.com".into());
        m.insert("ENV".into(), "prod".into());
        m.insert("ORIGINS".into(), KeywordValue::from(vec!["https://a", "https://b"]));
        m
    }

    #[test]
    fn detects_only_known_keys() {
        let m = mapping();
        assert!(should_field_be_preserved("https://##DOMAIN##/cb", &m));
        assert!(should_field_be_preserved("@@ORIGINS@@", &m));
        assert!(!should_field_be_preserved("##OTHER##", &m));
        assert!(!should_field_be_preserved("plain", &m));
    }

    #[test]
    fn addresses_use_element_names_and_skip_unnamed() {
        let local = json!({
            "tenant": {"friendly_name": "##ENV## tenant"},
            "clients": [
                {"name": "app", "callbacks": "https://##DOMAIN##/cb"},
                {"description": "##ENV##"}
            ]
        });
        let rendered: Vec<String> =
            preservable_fields(&local, &mapping()).iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["clients.[name=app].callbacks", "tenant.friendly_name"]);
    }

    #[test]
    fn restores_placeholder_without_drift() {
        let local = json!({"clients": [{"name": "app", "url": "https://##DOMAIN##/cb"}]});
        let remote = json!({"clients": [{"name": "app", "url": "https://acme.example.com/cb", "id": "c1"}]});
        let out = preserve_keywords(&local, remote, &mapping());
        assert!(out.drifted.is_empty());
        assert_eq!(out.restored, 1);
        assert_eq!(
            out.tree,
            json!({"clients": [{"name": "app", "url": "https://##DOMAIN##/cb", "id": "c1"}]})
        );
    }

    #[test]
    fn drift_is_reported_and_still_overwritten() {
        let local = json!({"tenant": {"support_url": "https://##DOMAIN##/help"}});
        let remote = json!({"tenant": {"support_url": "https://elsewhere/help"}});
        let out = preserve_keywords(&local, remote, &mapping());
        assert_eq!(out.drifted.len(), 1);
        assert_eq!(out.tree["tenant"]["support_url"], "https://##DOMAIN##/help");
    }

    #[test]
    fn structured_placeholder_compares_as_json() {
        let local = json!({"clients": [{"name": "app", "allowed_origins": "@@ORIGINS@@"}]});
        let remote = json!({"clients": [{"name": "app", "allowed_origins": ["https://a", "https://b"]}]});
        let out = preserve_keywords(&local, remote, &mapping());
        assert!(out.drifted.is_empty());
        assert_eq!(out.tree["clients"][0]["allowed_origins"], "@@ORIGINS@@");
    }

    #[test]
    fn templated_element_names_resolve_through_expansion() {
        let local = json!({"roles": [{"name": "##ENV##-admin", "description": "admins in ##ENV##"}]});
        let remote = json!({"roles": [{"name": "prod-admin", "description": "admins in prod"}]});
        let out = preserve_keywords(&local, remote, &mapping());
        assert_eq!(out.restored, 2);
        assert_eq!(
            out.tree,
            json!({"roles": [{"name": "##ENV##-admin", "description": "admins in ##ENV##"}]})
        );
    }

    #[test]
    fn missing_remote_field_is_a_no_op() {
        let local = json!({"clients": [{"name": "gone", "url": "##DOMAIN##"}]});
        let remote = json!({"clients": [{"name": "other", "url": "x"}]});
        let out = preserve_keywords(&local, remote.clone(), &mapping());
        assert_eq!(out.tree, remote);
        assert_eq!(out.restored, 0);
    }
}
