//! Master key storage backends
//!
//! The production backend keeps the master key in the operating system's
//! credential store (macOS Keychain, Windows Credential Manager, Linux
//! Secret Service). Headless hosts can provide the key through an
//! environment variable instead.

use crate::domain::security::{MasterKey, MasterKeyRepository};
use crate::error::{Error, Result};
use async_trait::async_trait;
use keyring::Entry;

/// Service name used for keyring storage
pub const KEYRING_SERVICE: &str = "vcsvault";

/// Default username for keyring entries
pub const KEYRING_USER: &str = "master-encryption-key";

/// Environment variable holding a hex-encoded master key
pub const MASTER_KEY_ENV: &str = "VCSVAULT_MASTER_KEY";

/// OS keyring-based master key repository
///
/// The key is stored as a hex string. Keyring calls block, so every
/// operation runs on the blocking thread pool.
#[derive(Debug, Clone)]
pub struct KeyringMasterKeyRepository {
    service: String,
    user: String,
}

impl Default for KeyringMasterKeyRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyringMasterKeyRepository {
    /// Create a new keyring repository with default service/user
    pub fn new() -> Self {
        Self::with_names(KEYRING_SERVICE, KEYRING_USER)
    }

    /// Create a keyring repository with custom service/user names
    pub fn with_names(service: &str, user: &str) -> Self {
        Self {
            service: service.to_string(),
            user: user.to_string(),
        }
    }

    fn entry(&self) -> Result<Entry> {
        Entry::new(&self.service, &self.user)
            .map_err(|e| Error::Keyring(format!("Failed to create keyring entry: {}", e)))
    }
}

#[async_trait]
impl MasterKeyRepository for KeyringMasterKeyRepository {
    async fn store(&self, key: &MasterKey) -> Result<()> {
        let entry = self.entry()?;
        let hex_key = key.to_hex();

        tokio::task::spawn_blocking(move || {
            entry
                .set_password(&hex_key)
                .map_err(|e| Error::Keyring(format!("Failed to store master key: {}", e)))
        })
        .await
        .map_err(|e| Error::Keyring(format!("Task join error: {}", e)))?
    }

    async fn get(&self) -> Result<Option<MasterKey>> {
        let entry = self.entry()?;

        let result = tokio::task::spawn_blocking(move || entry.get_password())
            .await
            .map_err(|e| Error::Keyring(format!("Task join error: {}", e)))?;

        match result {
            Ok(hex_key) => Ok(Some(MasterKey::from_hex(&hex_key)?)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(Error::Keyring(format!(
                "Failed to retrieve master key: {}",
                e
            ))),
        }
    }

    async fn delete(&self) -> Result<()> {
        let entry = self.entry()?;

        tokio::task::spawn_blocking(move || match entry.delete_password() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(Error::Keyring(format!(
                "Failed to delete master key: {}",
                e
            ))),
        })
        .await
        .map_err(|e| Error::Keyring(format!("Task join error: {}", e)))?
    }

    async fn exists(&self) -> Result<bool> {
        let entry = self.entry()?;

        tokio::task::spawn_blocking(move || match entry.get_password() {
            Ok(_) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(e) => Err(Error::Keyring(format!(
                "Failed to check master key existence: {}",
                e
            ))),
        })
        .await
        .map_err(|e| Error::Keyring(format!("Task join error: {}", e)))?
    }
}

/// Read-only master key repository backed by an environment variable
///
/// Rotation is refused: the new key would have nowhere to go.
#[derive(Debug, Clone)]
pub struct EnvMasterKeyRepository {
    var: String,
}

impl Default for EnvMasterKeyRepository {
    fn default() -> Self {
        Self::new(MASTER_KEY_ENV)
    }
}

impl EnvMasterKeyRepository {
    /// Read the key from the given environment variable
    pub fn new(var: &str) -> Self {
        Self {
            var: var.to_string(),
        }
    }

    /// Name of the variable this repository reads
    pub fn var(&self) -> &str {
        &self.var
    }
}

#[async_trait]
impl MasterKeyRepository for EnvMasterKeyRepository {
    async fn store(&self, _key: &MasterKey) -> Result<()> {
        Err(Error::MasterKeyUnavailable(format!(
            "master key is read from ${} and cannot be replaced",
            self.var
        )))
    }

    async fn get(&self) -> Result<Option<MasterKey>> {
        match std::env::var(&self.var) {
            Ok(value) if !value.trim().is_empty() => Ok(Some(MasterKey::from_hex(&value)?)),
            _ => Ok(None),
        }
    }

    async fn delete(&self) -> Result<()> {
        Err(Error::MasterKeyUnavailable(format!(
            "master key is read from ${} and cannot be deleted",
            self.var
        )))
    }

    async fn exists(&self) -> Result<bool> {
        Ok(self.get().await?.is_some())
    }
}

/// In-memory master key repository for testing
///
/// It should NOT be used in production.
#[derive(Debug, Default)]
pub struct InMemoryMasterKeyRepository {
    key: std::sync::Mutex<Option<MasterKey>>,
}

impl InMemoryMasterKeyRepository {
    /// Create a new empty in-memory repository
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an in-memory repository pre-loaded with `key`
    pub fn with_key(key: MasterKey) -> Self {
        Self {
            key: std::sync::Mutex::new(Some(key)),
        }
    }

    fn slot(&self) -> Result<std::sync::MutexGuard<'_, Option<MasterKey>>> {
        self.key
            .lock()
            .map_err(|_| Error::Other("master key lock poisoned".to_string()))
    }
}

#[async_trait]
impl MasterKeyRepository for InMemoryMasterKeyRepository {
    async fn store(&self, key: &MasterKey) -> Result<()> {
        *self.slot()? = Some(key.clone());
        Ok(())
    }

    async fn get(&self) -> Result<Option<MasterKey>> {
        Ok(self.slot()?.clone())
    }

    async fn delete(&self) -> Result<()> {
        *self.slot()? = None;
        Ok(())
    }

    async fn exists(&self) -> Result<bool> {
        Ok(self.slot()?.is_some())
    }
}
