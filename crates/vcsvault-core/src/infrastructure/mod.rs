//! Infrastructure layer - concrete adapters for domain repository traits

pub mod security;
