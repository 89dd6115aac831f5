//! Trustline Database: SurrealDB connection management and the
//! certificate repository.
//!
//! This crate provides:
//! - Connection management ([`DbManager`], [`DbConfig`])
//! - Schema initialization and migrations ([`run_migrations`])
//! - The [`CertificateRepository`](trustline_core::repository::CertificateRepository)
//!   implementation ([`repository::SurrealCertificateRepository`])
//! - Error types ([`DbError`])

mod connection;
mod error;
pub mod repository;
mod schema;

pub use connection::{DbConfig, DbManager};
pub use error::DbError;
pub use schema::{latest_version, run_migrations};
