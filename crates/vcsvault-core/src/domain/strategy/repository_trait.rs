//! Repository trait for strategy persistence
//!
//! The trait works on sealed records only; nothing behind it ever sees a
//! plaintext secret.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;

use super::record::{ResealedSecrets, StoredStrategy, StrategyWrite};

/// Repository trait for strategy persistence
#[async_trait]
pub trait StrategyRepositoryTrait: Send + Sync {
    /// Insert or fully overwrite the strategy of an application
    ///
    /// Fails with `Error::ApplicationNotFound` when the owner does not exist.
    /// Secret columns marked `Keep` retain their stored value.
    async fn upsert(&self, write: &StrategyWrite) -> Result<StoredStrategy>;

    /// Get the strategy of an application
    async fn get(&self, application_id: Uuid) -> Result<Option<StoredStrategy>>;

    /// List every stored strategy
    async fn list(&self) -> Result<Vec<StoredStrategy>>;

    /// Replace the sealed secrets of many rows in one transaction
    async fn replace_secrets(&self, secrets: &[ResealedSecrets]) -> Result<u64>;
}
