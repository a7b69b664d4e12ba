//! Security repository traits

use async_trait::async_trait;
use std::sync::Arc;

use super::entity::MasterKey;
use crate::error::Result;

/// Repository for managing the master encryption key
#[async_trait]
pub trait MasterKeyRepository: Send + Sync {
    /// Store the master key, replacing any existing one
    async fn store(&self, key: &MasterKey) -> Result<()>;

    /// Retrieve the master key
    async fn get(&self) -> Result<Option<MasterKey>>;

    /// Delete the master key
    async fn delete(&self) -> Result<()>;

    /// Check if a master key exists
    async fn exists(&self) -> Result<bool>;
}

#[async_trait]
impl<T: MasterKeyRepository + ?Sized> MasterKeyRepository for Arc<T> {
    async fn store(&self, key: &MasterKey) -> Result<()> {
        (**self).store(key).await
    }

    async fn get(&self) -> Result<Option<MasterKey>> {
        (**self).get().await
    }

    async fn delete(&self) -> Result<()> {
        (**self).delete().await
    }

    async fn exists(&self) -> Result<bool> {
        (**self).exists().await
    }
}
