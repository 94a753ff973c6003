//! Structural schema check over a [`TenantState`].
//!
//! Only types present in the state are checked; absent (or `null`) types
//! were never declared and have nothing to validate.

use jsonschema::JSONSchema;
use serde_json::{json, Map, Value};

use crate::error::StateError;
use crate::state::TenantState;
use crate::types::{AssetKind, AssetType};

/// JSON schema for the value of one asset type.
pub fn type_schema(asset_type: AssetType) -> Value {
    match asset_type.kind() {
        AssetKind::Singleton => json!({ "type": "object" }),
        AssetKind::Collection => json!({
            "type": "array",
            "items": {
                "type": "object",
                "required": asset_type.required_fields(),
            },
        }),
    }
}

/// Whole-document schema: every known type optional, nothing else allowed.
pub fn document_schema() -> Value {
    let properties: Map<String, Value> = AssetType::ALL
        .into_iter()
        .map(|ty| (ty.as_str().to_owned(), type_schema(ty)))
        .collect();
    json!({
        "type": "object",
        "properties": properties,
        "additionalProperties": false,
    })
}

/// Validate `state` against [`document_schema`].
///
/// All violations are collected into one [`StateError::Schema`].
pub fn validate_state(state: &TenantState) -> Result<(), StateError> {
    let schema = document_schema();
    let compiled = JSONSchema::compile(&schema)
        .map_err(|e| StateError::Schema { errors: vec![format!("invalid schema: {e}")] })?;

    let instance = state.to_value();
    if let Err(errors) = compiled.validate(&instance) {
        let errors: Vec<String> = errors
            .map(|e| {
                let path = e.instance_path.to_string();
                if path.is_empty() {
                    e.to_string()
                } else {
                    format!("{path}: {e}")
                }
            })
            .collect();
        tracing::debug!(count = errors.len(), "schema validation failed");
        return Err(StateError::Schema { errors });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn valid_state_passes() {
        let state = TenantState::from_value(json!({
            "clients": [{"name": "app"}],
            "clientGrants": [{"client_id": "c", "audience": "a"}],
            "tenant": {},
        }))
        .unwrap();
        validate_state(&state).unwrap();
    }

    #[test]
    fn missing_required_field_is_reported_with_path() {
        let state = TenantState::from_value(json!({
            "clientGrants": [{"client_id": "c"}],
        }))
        .unwrap();
        let err = validate_state(&state).unwrap_err();
        let StateError::Schema { errors } = &err else { panic!("got: {err}") };
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("/clientGrants/0"), "got: {errors:?}");
        assert!(errors[0].contains("audience"), "got: {errors:?}");
    }

    #[test]
    fn empty_state_passes() {
        validate_state(&TenantState::new()).unwrap();
    }
}
