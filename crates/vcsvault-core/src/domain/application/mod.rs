//! Application domain module
//!
//! The owning entity of a repository connection strategy. Only what the
//! strategy store needs is modelled here: registration, lookup and the
//! existence check performed before every strategy write.

pub mod entity;
pub mod repository;

pub use entity::Application;
pub use repository::ApplicationRepository;
