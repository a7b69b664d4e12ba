//! Security infrastructure implementations
//!
//! Master key storage backends: OS keyring, environment variable, memory.

pub mod keyring;

pub use self::keyring::{
    EnvMasterKeyRepository, InMemoryMasterKeyRepository, KEYRING_SERVICE, KEYRING_USER,
    KeyringMasterKeyRepository, MASTER_KEY_ENV,
};
