//! Config module tests

use crate::config::{Config, MasterKeySource};
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn test_config_default() {
    let config = Config::default();

    assert!(config.database.path.is_none());
    assert_eq!(config.database.max_connections, 5);
    assert_eq!(config.security.master_key_source, MasterKeySource::Keyring);
    assert_eq!(config.security.keyring_service, "vcsvault");
    assert_eq!(config.security.keyring_user, "master-encryption-key");
    assert_eq!(config.security.master_key_env, "VCSVAULT_MASTER_KEY");
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_set_and_get() {
    let mut config = Config::default();

    config.set("database.path", "/tmp/vault.db").unwrap();
    assert_eq!(config.get("database.path").unwrap(), "/tmp/vault.db");
    assert_eq!(config.database_path(), PathBuf::from("/tmp/vault.db"));

    config.set("database.max_connections", "8").unwrap();
    assert_eq!(config.database_config().max_connections, 8);

    config.set("security.master_key_source", "ENV").unwrap();
    assert_eq!(config.security.master_key_source, MasterKeySource::Env);
    assert_eq!(config.get("security.master_key_source").unwrap(), "env");

    config.set("security.master_key_env", "CI_VAULT_KEY").unwrap();
    assert_eq!(config.get("security.master_key_env").unwrap(), "CI_VAULT_KEY");

    // blank path falls back to the platform default
    config.set("database.path", "").unwrap();
    assert!(config.database.path.is_none());
}

#[test]
fn test_config_set_rejects_invalid_values() {
    let mut config = Config::default();

    assert!(config.set("database.max_connections", "0").is_err());
    assert!(config.set("database.max_connections", "many").is_err());
    assert!(config.set("security.master_key_source", "vault").is_err());
    assert!(config.set("security.keyring_user", "  ").is_err());
    assert!(config.set("nope", "1").is_err());

    assert_eq!(config, Config::default());
}

#[test]
fn test_master_key_never_in_config() {
    let mut config = Config::default();

    let err = config.set("security.master_key", "00ff").unwrap_err();
    assert!(err.to_string().contains("VCSVAULT_MASTER_KEY"));
    assert!(config.get("security.master_key").is_err());
}

#[test]
fn test_config_list() {
    let list = Config::default().list().unwrap();
    let keys: Vec<&str> = list.iter().map(|(k, _)| k.as_str()).collect();

    assert_eq!(list.len(), 6);
    assert!(keys.contains(&"database.path"));
    assert!(keys.contains(&"security.master_key_source"));
}

#[test]
fn test_config_save_and_load_roundtrip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    let mut config = Config::default();
    config.set("database.path", "/srv/vcsvault/vault.db").unwrap();
    config.set("security.master_key_source", "env").unwrap();
    config.save_to(&path).unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.contains("master_key_source = \"env\""));

    let loaded = Config::load_from(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_load_missing_file_gives_defaults() {
    let dir = TempDir::new().unwrap();
    let loaded = Config::load_from(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(loaded, Config::default());
}

#[test]
fn test_load_partial_file_fills_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[security]\nmaster_key_source = \"env\"\nkeyring_service = \"vcsvault\"\nkeyring_user = \"k\"\nmaster_key_env = \"K\"\n").unwrap();

    let loaded = Config::load_from(&path).unwrap();
    assert_eq!(loaded.security.master_key_source, MasterKeySource::Env);
    assert_eq!(loaded.database.max_connections, 5);
}

#[test]
fn test_load_rejects_invalid_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");

    std::fs::write(&path, "[database]\nmax_connections = 0\n").unwrap();
    assert!(Config::load_from(&path).is_err());

    std::fs::write(&path, "not toml at all [").unwrap();
    assert!(Config::load_from(&path).is_err());
}
