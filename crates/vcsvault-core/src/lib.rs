//! vcsvault Core Library
//!
//! This crate provides the core functionality for vcsvault, including:
//! - Repository connection strategies with secrets encrypted at rest
//! - Redacted default reads and privileged clear reads
//! - Master key management (OS keyring, environment, rotation)
//! - Storage (SQLite with versioned migrations)
//! - Configuration

pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod storage;

#[cfg(test)]
mod config_tests;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::domain::application::{Application, ApplicationRepository};
    pub use crate::domain::strategy::{
        ConnectionStrategy, ConnectionType, PASSWORD_PLACEHOLDER, StrategyStore,
    };
    pub use crate::error::{Error, Result};
    pub use crate::storage::Database;
}
