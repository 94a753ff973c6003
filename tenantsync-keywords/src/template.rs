//! Placeholder substitution over raw document text.
//!
//! Substitution is textual and runs before the document is parsed, so a
//! placeholder can sit anywhere: inside a longer string, as a whole value, or
//! as a key.

use std::sync::LazyLock;

use regex::Regex;
use tenantsync_core::KeywordMapping;

use crate::error::KeywordError;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"##[A-Za-z0-9_]+##|@@[A-Za-z0-9_]+@@").expect("PLACEHOLDER is a valid regex pattern")
});

/// Replace every `##KEY##` with the plain-text form of its value.
pub fn keyword_string_replace(text: &str, mapping: &KeywordMapping) -> String {
    mapping.iter().fold(text.to_owned(), |acc, (key, value)| {
        acc.replace(&format!("##{key}##"), &value.scalar_form())
    })
}

/// Replace every `@@KEY@@` (quoted or bare) with the JSON form of its value.
pub fn keyword_array_replace(text: &str, mapping: &KeywordMapping) -> String {
    mapping.iter().fold(text.to_owned(), |acc, (key, value)| {
        let json = value.json_form();
        acc.replace(&format!("\"@@{key}@@\""), &json)
            .replace(&format!("@@{key}@@"), &json)
    })
}

/// Scalar pass, then structured pass. A no-op for an empty mapping.
pub fn keyword_replace(text: &str, mapping: &KeywordMapping) -> String {
    if mapping.is_empty() {
        return text.to_owned();
    }
    keyword_array_replace(&keyword_string_replace(text, mapping), mapping)
}

/// Every distinct placeholder marker still present in `text`, in order of
/// first appearance.
pub fn unresolved_placeholders(text: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for m in PLACEHOLDER.find_iter(text) {
        if !found.iter().any(|f| f == m.as_str()) {
            found.push(m.as_str().to_owned());
        }
    }
    found
}

/// [`keyword_replace`], failing if any marker survives.
pub fn expand(text: &str, mapping: &KeywordMapping) -> Result<String, KeywordError> {
    let expanded = keyword_replace(text, mapping);
    let placeholders = unresolved_placeholders(&expanded);
    if !placeholders.is_empty() {
        return Err(KeywordError::Unresolved { placeholders });
    }
    tracing::debug!(keys = mapping.len(), "expanded keyword placeholders");
    Ok(expanded)
}
