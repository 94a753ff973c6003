//! Config loading error messages, atomic save and document parsing tests.

use assert_fs::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use tenantsync_core::{
    config::{self, SyncConfig},
    schema, AssetType, ConfigError, StateError, TenantState,
};

// ---------------------------------------------------------------------------
// 1. Load
// ---------------------------------------------------------------------------

#[test]
fn load_at_without_file_returns_defaults() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let config = config::load_at(home.path()).expect("load");
    assert_eq!(config, SyncConfig::default());
}

#[test]
fn load_from_missing_path_returns_not_found() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let err = config::load_from(&home.path().join("nope.yaml")).unwrap_err();
    assert!(matches!(err, ConfigError::NotFound { .. }), "got: {err}");
    assert!(err.to_string().contains("nope.yaml"));
}

#[test]
fn load_corrupt_yaml_returns_parse_error_with_path() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let dir = home.path().join(".tenantsync");
    fs::create_dir_all(&dir).expect("mkdir");
    fs::write(dir.join("config.yaml"), b"allow_delete: [unclosed").expect("write");

    let err = config::load_at(home.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("config.yaml"));
}

#[test]
fn load_reads_every_field() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    home.child(".tenantsync/config.yaml")
        .write_str(
            "domain: acme.example.com\n\
             allow_delete: true\n\
             exclude: [rules, actions]\n\
             keyword_mappings:\n  ENV: prod\n  HOSTS: [a.example.com, b.example.com]\n\
             page_size: 50\n\
             pool:\n  max_concurrent: 5\n",
        )
        .expect("write");

    let config = config::load_at(home.path()).expect("load");
    assert_eq!(config.domain.as_deref(), Some("acme.example.com"));
    assert!(config.allow_delete);
    assert_eq!(config.exclude, vec![AssetType::Rules, AssetType::Actions]);
    assert_eq!(config.keyword_mappings.len(), 2);
    assert_eq!(config.page_size, 50);
    assert_eq!(config.pool.max_concurrent, 5);
    assert_eq!(config.pool.max_per_second, 8);
}

// ---------------------------------------------------------------------------
// 2. Save
// ---------------------------------------------------------------------------

#[test]
fn save_writes_atomically_and_omits_token() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let config = SyncConfig {
        domain: Some("acme.example.com".into()),
        access_token: Some("secret".into()),
        ..SyncConfig::default()
    };
    config::save_at(home.path(), &config).expect("save");

    home.child(".tenantsync/config.yaml").assert(predicate::path::exists());
    home.child(".tenantsync/config.yaml.tmp").assert(predicate::path::missing());
    home.child(".tenantsync/config.yaml")
        .assert(predicate::str::contains("secret").not());

    let reloaded = config::load_at(home.path()).expect("reload");
    assert_eq!(reloaded.domain, config.domain);
    assert_eq!(reloaded.access_token, None);
}

// ---------------------------------------------------------------------------
// 3. Documents
// ---------------------------------------------------------------------------

#[rstest]
#[case("clients: [{name: app}]\n", AssetType::Clients)]
#[case("{\"roles\": [{\"name\": \"admin\"}]}", AssetType::Roles)]
#[case("tenant:\n  friendly_name: Acme\n", AssetType::Tenant)]
fn yaml_and_json_documents_parse(#[case] text: &str, #[case] ty: AssetType) {
    let state = TenantState::from_yaml_str(text).expect("parse");
    assert!(state.contains(ty));
    schema::validate_state(&state).expect("schema");
}

#[rstest]
#[case("rules: [{name: r1}]\n", "script")]
#[case("connections: [{name: db}]\n", "strategy")]
#[case("resourceServers: [{name: api}]\n", "identifier")]
fn schema_reports_missing_required_fields(#[case] text: &str, #[case] field: &str) {
    let state = TenantState::from_yaml_str(text).expect("parse");
    let err = schema::validate_state(&state).unwrap_err();
    assert!(matches!(err, StateError::Schema { .. }));
    assert!(err.to_string().contains(field), "got: {err}");
}

#[test]
fn malformed_document_is_a_parse_error() {
    let err = TenantState::from_yaml_str("clients: [unclosed").unwrap_err();
    assert!(matches!(err, StateError::Parse(_)), "got: {err}");
}
