//! tenantsync core library: domain types, tenant state, schema check,
//! run configuration, errors.
//!
//! Public API surface:
//! - [`types`]: assets, asset types, identifiers, keyword mappings, stages
//! - [`state`]: [`TenantState`]
//! - [`schema`]: structural validation of a state
//! - [`config`]: [`SyncConfig`] load / save / overrides
//! - [`error`]: [`ConfigError`], [`StateError`]

pub mod config;
pub mod error;
pub mod schema;
pub mod state;
pub mod types;

pub use config::{PoolSettings, SyncConfig};
pub use error::{ConfigError, StateError};
pub use state::{AssetValue, TenantState};
pub use types::{
    Asset, AssetCollection, AssetKind, AssetType, Identifier, KeywordMapping, KeywordValue, Stage,
};
