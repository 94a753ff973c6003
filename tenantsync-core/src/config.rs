//! Run configuration.
//!
//! # Storage layout
//!
//! ```text
//! ~/.tenantsync/
//!   config.yaml   (optional; every field has a default)
//! ```
//!
//! # API pattern
//!
//! Every loader has two forms:
//! - `fn_at(home: &Path, …)`: explicit home; used in tests with `TempDir`
//! - `fn(…)`: derives home from `dirs::home_dir()`, delegates to `_at`
//!
//! Environment overrides go through [`SyncConfig::apply_overrides`], which
//! takes the variables as an iterator so tests never touch the process env.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{io_err, ConfigError};
use crate::types::{AssetType, KeywordMapping};

pub const ENV_DOMAIN: &str = "TENANTSYNC_DOMAIN";
pub const ENV_BASE_URL: &str = "TENANTSYNC_BASE_URL";
pub const ENV_ACCESS_TOKEN: &str = "TENANTSYNC_ACCESS_TOKEN";
pub const ENV_ALLOW_DELETE: &str = "TENANTSYNC_ALLOW_DELETE";
pub const ENV_INCLUDE: &str = "TENANTSYNC_INCLUDE";
pub const ENV_EXCLUDE: &str = "TENANTSYNC_EXCLUDE";
pub const ENV_KEYWORD_MAPPINGS: &str = "TENANTSYNC_KEYWORD_MAPPINGS";

// ---------------------------------------------------------------------------
// 1. Types
// ---------------------------------------------------------------------------

/// Request pool limits shared by every resource client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSettings {
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    #[serde(default = "default_max_per_second")]
    pub max_per_second: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_max_concurrent() -> usize {
    3
}

fn default_max_per_second() -> usize {
    8
}

fn default_max_retries() -> u32 {
    3
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            max_per_second: default_max_per_second(),
            max_retries: default_max_retries(),
        }
    }
}

/// Everything a deploy or export run needs besides the document itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Tenant domain; the API lives at `https://<domain>/api/v2/`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// Explicit API base URL; wins over `domain`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub allow_delete: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<AssetType>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<AssetType>,
    #[serde(default, skip_serializing_if = "KeywordMapping::is_empty")]
    pub keyword_mappings: KeywordMapping,
    #[serde(default = "default_true")]
    pub preserve_keywords: bool,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default)]
    pub pool: PoolSettings,
}

fn default_true() -> bool {
    true
}

fn default_page_size() -> u32 {
    100
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            domain: None,
            base_url: None,
            access_token: None,
            allow_delete: false,
            include: Vec::new(),
            exclude: Vec::new(),
            keyword_mappings: KeywordMapping::new(),
            preserve_keywords: true,
            page_size: default_page_size(),
            pool: PoolSettings::default(),
        }
    }
}

impl SyncConfig {
    /// Reject combinations no run can honour.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.include.is_empty() && !self.exclude.is_empty() {
            return Err(ConfigError::Invalid(
                "include and exclude are mutually exclusive; set only one".into(),
            ));
        }
        if self.pool.max_concurrent == 0 || self.pool.max_per_second == 0 {
            return Err(ConfigError::Invalid("pool limits must be at least 1".into()));
        }
        if self.page_size == 0 {
            return Err(ConfigError::Invalid("page_size must be at least 1".into()));
        }
        Ok(())
    }

    /// Whether handlers for `asset_type` take part in this run.
    pub fn is_enabled(&self, asset_type: AssetType) -> bool {
        if !self.include.is_empty() {
            return self.include.contains(&asset_type);
        }
        !self.exclude.contains(&asset_type)
    }

    /// Apply `TENANTSYNC_*` overrides from `vars`; unrelated keys are ignored.
    pub fn apply_overrides<I, K, V>(&mut self, vars: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (key, value) in vars {
            let key = key.as_ref();
            let value: String = value.into();
            match key {
                ENV_DOMAIN => self.domain = Some(value),
                ENV_BASE_URL => self.base_url = Some(value),
                ENV_ACCESS_TOKEN => self.access_token = Some(value),
                ENV_ALLOW_DELETE => self.allow_delete = parse_bool(key, &value)?,
                ENV_INCLUDE => self.include = parse_types(key, &value)?,
                ENV_EXCLUDE => self.exclude = parse_types(key, &value)?,
                ENV_KEYWORD_MAPPINGS => {
                    self.keyword_mappings = serde_json::from_str(&value).map_err(|e| {
                        ConfigError::InvalidOverride {
                            key: key.to_owned(),
                            message: e.to_string(),
                        }
                    })?
                }
                _ => {}
            }
        }
        Ok(())
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" | "" => Ok(false),
        other => Err(ConfigError::InvalidOverride {
            key: key.to_owned(),
            message: format!("expected a boolean, got '{other}'"),
        }),
    }
}

fn parse_types(key: &str, value: &str) -> Result<Vec<AssetType>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse().map_err(|message| ConfigError::InvalidOverride {
                key: key.to_owned(),
                message,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// 2. Paths
// ---------------------------------------------------------------------------

/// `<home>/.tenantsync/config.yaml`: pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    home.join(".tenantsync").join("config.yaml")
}

// ---------------------------------------------------------------------------
// 3. Load / save
// ---------------------------------------------------------------------------

/// Load a config file at an explicit path.
///
/// Returns `ConfigError::NotFound` if absent,
/// `ConfigError::Parse` (with path + line context) if malformed YAML.
pub fn load_from(path: &Path) -> Result<SyncConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound { path: path.to_path_buf() });
    }
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    if contents.trim().is_empty() {
        return Ok(SyncConfig::default());
    }
    let config: SyncConfig = serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })?;
    tracing::debug!(path = %path.display(), "loaded config");
    Ok(config)
}

/// Load `<home>/.tenantsync/config.yaml`, falling back to defaults when the
/// file does not exist.
pub fn load_at(home: &Path) -> Result<SyncConfig, ConfigError> {
    let path = config_path_at(home);
    if !path.exists() {
        return Ok(SyncConfig::default());
    }
    load_from(&path)
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<SyncConfig, ConfigError> {
    load_at(&home()?)
}

/// Atomically write `config` to `<home>/.tenantsync/config.yaml`.
///
/// Write flow: serialize → `.yaml.tmp` sibling → `rename`. The access token
/// is never written.
pub fn save_at(home: &Path, config: &SyncConfig) -> Result<PathBuf, ConfigError> {
    let path = config_path_at(home);
    let dir = home.join(".tenantsync");
    std::fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
    let tmp_path = path.with_file_name("config.yaml.tmp");

    let yaml = serde_yaml::to_string(config)?;
    std::fs::write(&tmp_path, yaml).map_err(|e| io_err(&tmp_path, e))?;
    std::fs::rename(&tmp_path, &path).map_err(|e| io_err(&path, e))?;
    Ok(path)
}

// ---------------------------------------------------------------------------
// 4. Helpers
// ---------------------------------------------------------------------------

fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = SyncConfig::default();
        assert!(!config.allow_delete);
        assert!(config.preserve_keywords);
        assert_eq!(config.page_size, 100);
        assert_eq!(config.pool, PoolSettings { max_concurrent: 3, max_per_second: 8, max_retries: 3 });
    }

    #[test]
    fn include_and_exclude_together_are_invalid() {
        let config = SyncConfig {
            include: vec![AssetType::Clients],
            exclude: vec![AssetType::Roles],
            ..SyncConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("mutually exclusive"));
    }

    #[test]
    fn include_filters_types() {
        let config = SyncConfig { include: vec![AssetType::Roles], ..SyncConfig::default() };
        assert!(config.is_enabled(AssetType::Roles));
        assert!(!config.is_enabled(AssetType::Clients));

        let config = SyncConfig { exclude: vec![AssetType::Roles], ..SyncConfig::default() };
        assert!(!config.is_enabled(AssetType::Roles));
        assert!(config.is_enabled(AssetType::Clients));
    }

    #[test]
    fn overrides_parse_each_variable() {
        let mut config = SyncConfig::default();
        config
            .apply_overrides([
                (ENV_DOMAIN, "acme.example.com"),
                (ENV_ALLOW_DELETE, "true"),
                (ENV_INCLUDE, "clients, roles"),
                (ENV_KEYWORD_MAPPINGS, r#"{"ENV":"prod","HOSTS":["a","b"]}"#),
                ("PATH", "/usr/bin"),
            ])
            .unwrap();
        assert_eq!(config.domain.as_deref(), Some("acme.example.com"));
        assert!(config.allow_delete);
        assert_eq!(config.include, vec![AssetType::Clients, AssetType::Roles]);
        assert_eq!(config.keyword_mappings.len(), 2);
    }

    #[test]
    fn bad_override_names_the_variable() {
        let mut config = SyncConfig::default();
        let err = config.apply_overrides([(ENV_EXCLUDE, "widgets")]).unwrap_err();
        assert!(err.to_string().contains(ENV_EXCLUDE), "got: {err}");
    }
}
