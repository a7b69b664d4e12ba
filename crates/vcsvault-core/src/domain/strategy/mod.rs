//! Repository connection strategy domain
//!
//! Each application owns at most one strategy. Its secrets are sealed at
//! rest; [`StrategyStore`] is the only place they are sealed or opened.

pub mod entity;
pub mod record;
pub mod repository;
pub mod repository_trait;
pub mod store;

pub use entity::{ConnectionStrategy, ConnectionType, PASSWORD_PLACEHOLDER};
pub use record::{ResealedSecrets, SecretUpdate, StoredStrategy, StrategyWrite};
pub use repository::SqliteStrategyRepository;
pub use repository_trait::StrategyRepositoryTrait;
pub use store::StrategyStore;
