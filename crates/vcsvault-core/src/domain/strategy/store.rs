//! Credential strategy store
//!
//! High-level API over strategy persistence with secrets encrypted at rest.

use sqlx::SqlitePool;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use super::entity::{ConnectionStrategy, PASSWORD_PLACEHOLDER};
use super::record::{
    PASSWORD_FIELD, ResealedSecrets, SSH_KEY_CONTENT_FIELD, SecretUpdate, StrategyWrite,
    secret_aad,
};
use super::repository::SqliteStrategyRepository;
use super::repository_trait::StrategyRepositoryTrait;
use crate::domain::security::{MasterKey, MasterKeyRepository, SealedSecret};
use crate::error::{Error, Result};

/// Store for the repository connection strategy of each application
///
/// # Security Model
///
/// - `password` and `ssh_key_content` are sealed with AES-256-GCM before
///   they reach the database, bound to their application and field
/// - The master key lives behind a [`MasterKeyRepository`] (OS keyring,
///   environment or memory)
/// - `read_default` never touches the master key and always redacts
/// - `read_clear` is the only path that returns plaintext; callers are
///   trusted
/// - Secret values are never logged
///
/// # Example
///
/// ```ignore
/// let store = StrategyStore::sqlite(db.pool().clone(), Box::new(KeyringMasterKeyRepository::new()));
/// store.initialize().await?;
///
/// let shown = store.write(app_id, &ConnectionStrategy::https("user", "password")).await?;
/// assert_eq!(shown.password, PASSWORD_PLACEHOLDER);
///
/// let clear = store.read_clear(app_id).await?;
/// assert_eq!(clear.password, "password");
/// ```
pub struct StrategyStore {
    repository: Box<dyn StrategyRepositoryTrait>,
    master_key_repository: Box<dyn MasterKeyRepository>,
    // held shared by reads and writes, exclusively by key rotation
    rotation: RwLock<()>,
    // held from the existence check through storing a new master key
    key_creation: Mutex<()>,
}

impl StrategyStore {
    /// Create a new StrategyStore
    pub fn new(
        repository: Box<dyn StrategyRepositoryTrait>,
        master_key_repository: Box<dyn MasterKeyRepository>,
    ) -> Self {
        Self {
            repository,
            master_key_repository,
            rotation: RwLock::new(()),
            key_creation: Mutex::new(()),
        }
    }

    /// Create a store persisting to SQLite
    pub fn sqlite(pool: SqlitePool, master_key_repository: Box<dyn MasterKeyRepository>) -> Self {
        Self::new(
            Box::new(SqliteStrategyRepository::new(pool)),
            master_key_repository,
        )
    }

    /// Create the master key if none exists
    ///
    /// Returns `true` when a new key was generated.
    pub async fn initialize(&self) -> Result<bool> {
        let _guard = self.key_creation.lock().await;
        Ok(self.create_master_key_if_missing().await?.is_some())
    }

    /// Whether a master key is available
    pub async fn has_master_key(&self) -> Result<bool> {
        self.master_key_repository.exists().await
    }

    /// Persist the strategy of an application
    ///
    /// The record fully replaces the stored one, except that a placeholder
    /// password keeps the stored password and, on SSH, an empty or
    /// placeholder key content keeps the stored key content. An HTTPS write
    /// drops the SSH key and its content.
    ///
    /// Returns what [`read_default`](Self::read_default) now returns.
    pub async fn write(
        &self,
        application_id: Uuid,
        strategy: &ConnectionStrategy,
    ) -> Result<ConnectionStrategy> {
        strategy.validate()?;

        let _guard = self.rotation.read().await;

        let password = password_change(strategy);
        let ssh_key_content = ssh_key_content_change(strategy);

        let master_key = if password.needs_key() || ssh_key_content.needs_key() {
            Some(self.master_key().await?)
        } else {
            None
        };

        let write = StrategyWrite {
            application_id,
            connection_type: strategy.connection_type,
            branch: strategy.branch.clone(),
            default_branch: strategy.default_branch.clone(),
            user: strategy.user.clone(),
            ssh_key: if strategy.connection_type.is_ssh() {
                strategy.ssh_key.clone()
            } else {
                String::new()
            },
            password: password.resolve(master_key.as_ref(), application_id, PASSWORD_FIELD)?,
            ssh_key_content: ssh_key_content.resolve(
                master_key.as_ref(),
                application_id,
                SSH_KEY_CONTENT_FIELD,
            )?,
        };

        let stored = self.repository.upsert(&write).await?;

        tracing::info!(
            application_id = %application_id,
            connection_type = %stored.connection_type,
            password_changed = matches!(write.password, SecretUpdate::Set(_)),
            ssh_key_content_changed = matches!(write.ssh_key_content, SecretUpdate::Set(_)),
            "Stored repository strategy"
        );

        Ok(stored.to_redacted())
    }

    /// Read the strategy with its secrets redacted
    ///
    /// The password is always [`PASSWORD_PLACEHOLDER`] and the SSH key
    /// content always empty, whatever is stored.
    pub async fn read_default(&self, application_id: Uuid) -> Result<ConnectionStrategy> {
        let stored = self
            .repository
            .get(application_id)
            .await?
            .ok_or_else(|| Error::StrategyNotFound(application_id.to_string()))?;

        Ok(stored.to_redacted())
    }

    /// Read the strategy with its secrets decrypted
    ///
    /// Only the active lane is revealed: the password under HTTPS, the SSH
    /// key content under SSH. The other lane reads as an empty string but
    /// stays stored. A secret that was never stored reads as an empty
    /// string. Any decryption failure fails the whole read.
    ///
    /// The returned plaintext is not zeroized; drop it as soon as possible.
    pub async fn read_clear(&self, application_id: Uuid) -> Result<ConnectionStrategy> {
        let _guard = self.rotation.read().await;

        let stored = self
            .repository
            .get(application_id)
            .await?
            .ok_or_else(|| Error::StrategyNotFound(application_id.to_string()))?;

        // only the lane selected by the connection type is revealed
        let (password, ssh_key_content) = if stored.connection_type.is_ssh() {
            (None, stored.ssh_key_content.as_ref())
        } else {
            (stored.password.as_ref(), None)
        };

        let mut strategy = stored.to_redacted();
        strategy.password = String::new();

        if password.is_some() || ssh_key_content.is_some() {
            let master_key = self.require_master_key().await?;

            if let Some(sealed) = password {
                strategy.password = open(sealed, &master_key, application_id, PASSWORD_FIELD)?;
            }
            if let Some(sealed) = ssh_key_content {
                strategy.ssh_key_content =
                    open(sealed, &master_key, application_id, SSH_KEY_CONTENT_FIELD)?;
            }
        }

        tracing::info!(
            application_id = %application_id,
            connection_type = %strategy.connection_type,
            "Revealed repository strategy secrets"
        );

        Ok(strategy)
    }

    /// Rotate the master key
    ///
    /// Every stored secret is decrypted with the current key and sealed again
    /// with a fresh one. The new ciphertexts are written in one transaction
    /// before the new key is stored; if storing the key fails the previous
    /// ciphertexts are written back. Returns the number of strategies
    /// re-sealed.
    pub async fn rotate_master_key(&self) -> Result<usize> {
        let _guard = self.rotation.write().await;

        let old_master_key = self.require_master_key().await?;
        let new_master_key = MasterKey::generate();

        let mut resealed = Vec::new();
        let mut previous = Vec::new();

        for stored in self.repository.list().await? {
            if !stored.has_secrets() {
                continue;
            }

            let id = stored.application_id;
            resealed.push(ResealedSecrets {
                application_id: id,
                password: reseal(
                    stored.password.as_ref(),
                    &old_master_key,
                    &new_master_key,
                    &secret_aad(id, PASSWORD_FIELD),
                )?,
                ssh_key_content: reseal(
                    stored.ssh_key_content.as_ref(),
                    &old_master_key,
                    &new_master_key,
                    &secret_aad(id, SSH_KEY_CONTENT_FIELD),
                )?,
            });
            previous.push(ResealedSecrets {
                application_id: id,
                password: stored.password,
                ssh_key_content: stored.ssh_key_content,
            });
        }

        self.repository.replace_secrets(&resealed).await?;

        if let Err(e) = self.master_key_repository.store(&new_master_key).await {
            tracing::warn!(error = %e, "Failed to store rotated master key, restoring previous ciphertexts");
            self.repository.replace_secrets(&previous).await?;
            return Err(e);
        }

        tracing::info!(
            strategies = resealed.len(),
            "Rotated master encryption key and re-sealed all strategy secrets"
        );
        Ok(resealed.len())
    }

    /// Get the master key, initializing if necessary
    async fn master_key(&self) -> Result<MasterKey> {
        if let Some(key) = self.master_key_repository.get().await? {
            return Ok(key);
        }

        // another writer may have created the key while we waited
        let _guard = self.key_creation.lock().await;
        self.create_master_key_if_missing().await?;
        self.require_master_key().await
    }

    /// Must be called with `key_creation` held. Returns the key if one was
    /// generated.
    async fn create_master_key_if_missing(&self) -> Result<Option<MasterKey>> {
        if self.master_key_repository.exists().await? {
            return Ok(None);
        }

        let master_key = MasterKey::generate();
        self.master_key_repository.store(&master_key).await?;
        tracing::info!("Generated and stored new master encryption key");
        Ok(Some(master_key))
    }

    async fn require_master_key(&self) -> Result<MasterKey> {
        self.master_key_repository.get().await?.ok_or_else(|| {
            Error::MasterKeyUnavailable("no master key has been initialized".to_string())
        })
    }
}

/// A secret change requested by a write, before sealing
enum Change<'a> {
    Keep,
    Clear,
    Seal(&'a str),
}

impl Change<'_> {
    fn needs_key(&self) -> bool {
        matches!(self, Self::Seal(_))
    }

    fn resolve(
        self,
        master_key: Option<&MasterKey>,
        application_id: Uuid,
        field: &str,
    ) -> Result<SecretUpdate> {
        match self {
            Self::Keep => Ok(SecretUpdate::Keep),
            Self::Clear => Ok(SecretUpdate::Clear),
            Self::Seal(plaintext) => {
                let master_key = master_key.ok_or_else(|| {
                    Error::MasterKeyUnavailable("no master key to seal with".to_string())
                })?;
                SealedSecret::seal(plaintext, master_key, &secret_aad(application_id, field))
                    .map(SecretUpdate::Set)
            }
        }
    }
}

fn password_change(strategy: &ConnectionStrategy) -> Change<'_> {
    match strategy.password.as_str() {
        PASSWORD_PLACEHOLDER => Change::Keep,
        "" => Change::Clear,
        password => Change::Seal(password),
    }
}

fn ssh_key_content_change(strategy: &ConnectionStrategy) -> Change<'_> {
    if !strategy.connection_type.is_ssh() {
        return Change::Clear;
    }

    match strategy.ssh_key_content.as_str() {
        "" | PASSWORD_PLACEHOLDER => Change::Keep,
        content => Change::Seal(content),
    }
}

fn open(
    sealed: &SealedSecret,
    master_key: &MasterKey,
    application_id: Uuid,
    field: &str,
) -> Result<String> {
    sealed
        .open(master_key, &secret_aad(application_id, field))
        .map(|secret| secret.expose())
        .inspect_err(|e| {
            tracing::warn!(
                application_id = %application_id,
                field = field,
                error = %e,
                "Failed to decrypt strategy secret"
            );
        })
}

fn reseal(
    sealed: Option<&SealedSecret>,
    old_master_key: &MasterKey,
    new_master_key: &MasterKey,
    aad: &[u8],
) -> Result<Option<SealedSecret>> {
    match sealed {
        None => Ok(None),
        Some(sealed) => {
            let plaintext = sealed.open(old_master_key, aad)?;
            SealedSecret::seal(plaintext.as_str(), new_master_key, aad).map(Some)
        }
    }
}
