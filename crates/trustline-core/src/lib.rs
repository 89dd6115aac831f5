//! Trustline core: domain models, repository traits, and error types
//! shared by every Trustline crate.

pub mod error;
pub mod models;
pub mod repository;

pub use error::{HierarchyViolation, TrustlineError, TrustlineResult};
