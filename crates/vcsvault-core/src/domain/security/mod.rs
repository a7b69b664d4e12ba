//! Security domain module
//!
//! Encryption primitives shared by everything that stores secrets.
//!
//! - **Entities**: `MasterKey`, `SealedSecret`, `SecureString`
//! - **Repository Traits**: `MasterKeyRepository`
//!
//! Secrets are sealed with AES-256-GCM under a single master key. Each
//! sealed value carries its own random nonce, and callers bind it to its
//! owner through the associated data.

pub mod entity;
pub mod repository;

pub use entity::{AES_KEY_SIZE, MasterKey, SealedSecret, SecureString};
pub use repository::MasterKeyRepository;
