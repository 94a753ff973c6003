// Async HTTP implementation of `ResourceApi` for the tenant management API.
//
// Base path: https://<domain>/api/v2/
// Auth: bearer token supplied by configuration

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, RETRY_AFTER};
use reqwest::StatusCode;
use serde_json::Value;
use tenantsync_core::Asset;
use tracing::debug;
use url::Url;

use crate::api::{ListPage, ListQuery, ResourceApi};
use crate::error::RemoteError;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

// ── Client ───────────────────────────────────────────────────────────

pub struct HttpResourceApi {
    http: reqwest::Client,
    base_url: Url,
}

impl HttpResourceApi {
    // ── Constructors ─────────────────────────────────────────────────

    /// Build against `https://<domain>/api/v2/`.
    pub fn from_domain(domain: &str, access_token: &str) -> Result<Self, RemoteError> {
        Self::new(&format!("https://{domain}/api/v2/"), access_token)
    }

    /// Build against an explicit base URL.
    ///
    /// Injects `Authorization: Bearer <token>` as a default header.
    pub fn new(base_url: &str, access_token: &str) -> Result<Self, RemoteError> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {access_token}"))
            .map_err(|e| RemoteError::Config(format!("invalid access token header value: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(DEFAULT_TIMEOUT)
            .build()?;
        Self::with_client(base_url, http)
    }

    /// Wrap an existing `reqwest::Client` (caller manages auth headers).
    pub fn with_client(base_url: &str, http: reqwest::Client) -> Result<Self, RemoteError> {
        let mut url = Url::parse(base_url)?;
        // Joining relative paths needs the trailing slash.
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(Self { http, base_url: url })
    }

    // ── URL builder ──────────────────────────────────────────────────

    fn url(&self, path: &str) -> Result<Url, RemoteError> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    // ── Response handling ────────────────────────────────────────────

    async fn handle_json(&self, path: &str, resp: reqwest::Response) -> Result<Value, RemoteError> {
        let status = resp.status();
        if !status.is_success() {
            return Err(parse_error(status, resp).await);
        }
        let body = resp.text().await?;
        if body.trim().is_empty() {
            return Ok(Value::Object(Default::default()));
        }
        serde_json::from_str(&body).map_err(|e| {
            let preview: String = body.chars().take(200).collect();
            RemoteError::Decode {
                path: path.to_owned(),
                message: format!("{e} (body preview: {preview:?})"),
            }
        })
    }

    async fn handle_asset(&self, path: &str, resp: reqwest::Response) -> Result<Asset, RemoteError> {
        match self.handle_json(path, resp).await? {
            Value::Object(map) => Ok(map),
            other => Err(RemoteError::Decode {
                path: path.to_owned(),
                message: format!("expected an object, got {other}"),
            }),
        }
    }
}

async fn parse_error(status: StatusCode, resp: reqwest::Response) -> RemoteError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = resp
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        return RemoteError::RateLimited { retry_after };
    }

    let raw = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&raw)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_owned))
        .unwrap_or_else(|| if raw.is_empty() { status.to_string() } else { raw });
    RemoteError::Api { status: status.as_u16(), message }
}

// ── ResourceApi ──────────────────────────────────────────────────────

#[async_trait]
impl ResourceApi for HttpResourceApi {
    async fn list(&self, path: &str, list_key: &str, query: &ListQuery) -> Result<ListPage, RemoteError> {
        let url = self.url(path)?;
        let params = query.to_params();
        debug!("GET {url} params={params:?}");

        let resp = self.http.get(url).query(&params).send().await?;
        let body = self.handle_json(path, resp).await?;
        ListPage::from_response(path, list_key, body)
    }

    async fn get(&self, path: &str) -> Result<Asset, RemoteError> {
        let url = self.url(path)?;
        debug!("GET {url}");

        let resp = self.http.get(url).send().await?;
        self.handle_asset(path, resp).await
    }

    async fn create(&self, path: &str, body: &Asset) -> Result<Asset, RemoteError> {
        let url = self.url(path)?;
        debug!("POST {url}");

        let resp = self.http.post(url).json(body).send().await?;
        self.handle_asset(path, resp).await
    }

    async fn update(&self, path: &str, body: &Asset) -> Result<Asset, RemoteError> {
        let url = self.url(path)?;
        debug!("PATCH {url}");

        let resp = self.http.patch(url).json(body).send().await?;
        self.handle_asset(path, resp).await
    }

    async fn delete(&self, path: &str) -> Result<(), RemoteError> {
        let url = self.url(path)?;
        debug!("DELETE {url}");

        let resp = self.http.delete(url).send().await?;
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(parse_error(status, resp).await)
        }
    }
}
