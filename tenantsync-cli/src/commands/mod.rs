pub mod deploy;
pub mod export;

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tenantsync_core::{config, SyncConfig};
use tenantsync_remote::{HttpResourceApi, PagedClient};
use tracing::debug;

/// Config file (explicit or default location) plus environment overrides.
pub fn load_config(path: Option<&Path>) -> Result<SyncConfig> {
    let mut config = match path {
        Some(path) => config::load_from(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => config::load().context("failed to load config")?,
    };
    config
        .apply_overrides(std::env::vars())
        .context("invalid environment override")?;
    config.validate().context("invalid configuration")?;
    debug!(
        domain = ?config.domain,
        base_url = ?config.base_url,
        allow_delete = config.allow_delete,
        "configuration resolved"
    );
    Ok(config)
}

/// HTTP-backed client for the configured tenant.
pub fn build_client(config: &SyncConfig) -> Result<PagedClient> {
    let Some(token) = config.access_token.as_deref() else {
        bail!("no access token; set {}", config::ENV_ACCESS_TOKEN);
    };
    let api = match (&config.base_url, &config.domain) {
        (Some(base_url), _) => HttpResourceApi::new(base_url, token),
        (None, Some(domain)) => HttpResourceApi::from_domain(domain, token),
        (None, None) => bail!(
            "no tenant configured; set `domain` or `base_url` (or {})",
            config::ENV_DOMAIN
        ),
    }
    .context("failed to build HTTP client")?;
    Ok(PagedClient::new(Arc::new(api), &config.pool))
}

pub fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")
}
