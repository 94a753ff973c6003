//! The seam between the reconciliation engine and a concrete remote API.

use async_trait::async_trait;
use serde_json::Value;
use tenantsync_core::Asset;

use crate::error::RemoteError;

/// Query parameters of one `list` call.
///
/// Empty for unpaginated calls; offset and checkpoint pagination fill in
/// their own fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub include_totals: bool,
    pub from: Option<String>,
    pub take: Option<u32>,
}

impl ListQuery {
    pub fn offset(page: u32, per_page: u32) -> Self {
        Self { page: Some(page), per_page: Some(per_page), include_totals: true, ..Self::default() }
    }

    pub fn checkpoint(from: Option<String>, take: u32) -> Self {
        Self { from, take: Some(take), ..Self::default() }
    }

    /// Wire form, in a stable order.
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(page) = self.page {
            params.push(("page", page.to_string()));
        }
        if let Some(per_page) = self.per_page {
            params.push(("per_page", per_page.to_string()));
        }
        if self.include_totals {
            params.push(("include_totals", "true".to_owned()));
        }
        if let Some(from) = &self.from {
            params.push(("from", from.clone()));
        }
        if let Some(take) = self.take {
            params.push(("take", take.to_string()));
        }
        params
    }
}

/// One page of a `list` response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListPage {
    pub items: Vec<Asset>,
    /// Total across all pages, when the API reported it.
    pub total: Option<u64>,
    /// Cursor for the next checkpoint page.
    pub next: Option<String>,
}

impl ListPage {
    /// Interpret a list response: a bare array, or an object holding the
    /// items under `list_key` plus optional `total` / `next`.
    pub fn from_response(path: &str, list_key: &str, body: Value) -> Result<Self, RemoteError> {
        let decode = |message: String| RemoteError::Decode { path: path.to_owned(), message };
        let (items, total, next) = match body {
            Value::Array(items) => (items, None, None),
            Value::Object(mut map) => {
                let items = match map.remove(list_key) {
                    Some(Value::Array(items)) => items,
                    Some(Value::Null) | None => Vec::new(),
                    Some(_) => return Err(decode(format!("'{list_key}' is not a list"))),
                };
                let total = map.get("total").and_then(Value::as_u64);
                let next = map
                    .get("next")
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty())
                    .map(str::to_owned);
                (items, total, next)
            }
            other => return Err(decode(format!("expected a list or an object, got {other}"))),
        };

        let items = items
            .into_iter()
            .map(|item| match item {
                Value::Object(map) => Ok(map),
                other => Err(decode(format!("list item is not an object: {other}"))),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { items, total, next })
    }
}

/// Raw resource operations against the remote tenant.
///
/// Paths are relative to the API root (`clients`, `clients/abc`,
/// `tenants/settings`).
#[async_trait]
pub trait ResourceApi: Send + Sync {
    async fn list(&self, path: &str, list_key: &str, query: &ListQuery) -> Result<ListPage, RemoteError>;

    async fn get(&self, path: &str) -> Result<Asset, RemoteError>;

    async fn create(&self, path: &str, body: &Asset) -> Result<Asset, RemoteError>;

    async fn update(&self, path: &str, body: &Asset) -> Result<Asset, RemoteError>;

    async fn delete(&self, path: &str) -> Result<(), RemoteError>;
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn bare_array_has_no_metadata() {
        let page = ListPage::from_response("roles", "roles", json!([{"id": "r1"}])).unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.total, None);
        assert_eq!(page.next, None);
    }

    #[test]
    fn wrapped_page_reads_total_and_cursor() {
        let body = json!({"clients": [{"client_id": "a"}], "total": 12, "next": "cur"});
        let page = ListPage::from_response("clients", "clients", body).unwrap();
        assert_eq!(page.total, Some(12));
        assert_eq!(page.next.as_deref(), Some("cur"));
    }

    #[test]
    fn empty_cursor_means_last_page() {
        let body = json!({"organizations": [], "next": ""});
        let page = ListPage::from_response("organizations", "organizations", body).unwrap();
        assert_eq!(page.next, None);
    }

    #[test]
    fn non_object_items_are_rejected() {
        let err = ListPage::from_response("roles", "roles", json!(["r1"])).unwrap_err();
        assert!(matches!(err, RemoteError::Decode { .. }), "got: {err}");
    }

    #[test]
    fn query_params_are_ordered() {
        let params = ListQuery::offset(2, 50).to_params();
        assert_eq!(
            params,
            vec![("page", "2".into()), ("per_page", "50".into()), ("include_totals", "true".into())]
        );
        let params = ListQuery::checkpoint(Some("abc".into()), 50).to_params();
        assert_eq!(params, vec![("from", "abc".into()), ("take", "50".into())]);
    }
}
