//! Domain layer
//!
//! Contains the core business logic and domain models.

pub mod application;
pub mod security;
pub mod strategy;
