//! Persisted form of a connection strategy
//!
//! Secrets only ever appear here sealed. Conversion to a plaintext
//! `ConnectionStrategy` happens in the store, which owns the master key.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::entity::{ConnectionStrategy, ConnectionType};
use crate::domain::security::SealedSecret;

/// Secret field names, also used to build the associated data of each
/// sealed value
pub const PASSWORD_FIELD: &str = "password";
pub const SSH_KEY_CONTENT_FIELD: &str = "ssh_key_content";

/// Associated data binding a sealed value to its row and field
pub fn secret_aad(application_id: Uuid, field: &str) -> Vec<u8> {
    format!("{}:{}", application_id, field).into_bytes()
}

/// A strategy row as stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredStrategy {
    pub application_id: Uuid,
    pub connection_type: ConnectionType,
    pub branch: String,
    pub default_branch: String,
    pub user: String,
    pub ssh_key: String,
    pub password: Option<SealedSecret>,
    pub ssh_key_content: Option<SealedSecret>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredStrategy {
    /// The redacted view handed out by default reads
    pub fn to_redacted(&self) -> ConnectionStrategy {
        ConnectionStrategy {
            branch: self.branch.clone(),
            connection_type: self.connection_type,
            default_branch: self.default_branch.clone(),
            user: self.user.clone(),
            ssh_key: self.ssh_key.clone(),
            ..Default::default()
        }
        .redacted()
    }

    /// Whether any sealed value is stored on this row
    pub fn has_secrets(&self) -> bool {
        self.password.is_some() || self.ssh_key_content.is_some()
    }
}

/// What a write does to one secret column pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretUpdate {
    /// Leave the stored value as it is (NULL on first write)
    Keep,
    /// Drop the stored value
    Clear,
    /// Replace the stored value
    Set(SealedSecret),
}

impl SecretUpdate {
    pub fn is_keep(&self) -> bool {
        matches!(self, Self::Keep)
    }

    /// The sealed value to bind for a fresh row or a replacement
    pub fn sealed(&self) -> Option<&SealedSecret> {
        match self {
            Self::Set(sealed) => Some(sealed),
            Self::Keep | Self::Clear => None,
        }
    }
}

/// A full-record write, secrets already sealed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyWrite {
    pub application_id: Uuid,
    pub connection_type: ConnectionType,
    pub branch: String,
    pub default_branch: String,
    pub user: String,
    pub ssh_key: String,
    pub password: SecretUpdate,
    pub ssh_key_content: SecretUpdate,
}

/// Replacement secrets for one row, produced by a key rotation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResealedSecrets {
    pub application_id: Uuid,
    pub password: Option<SealedSecret>,
    pub ssh_key_content: Option<SealedSecret>,
}
