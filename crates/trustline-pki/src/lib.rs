//! Trustline PKI: hierarchy policy and certificate lifecycle.
//!
//! Decides whether a certificate may be issued under a given parent,
//! sequences persistence and key generation, and drives revocation of
//! end-entity certificates. Key material itself is produced by an
//! implementation of [`CryptoEngine`].

pub mod config;
pub mod engine;
pub mod error;
pub mod hierarchy;
pub mod lifecycle;
pub mod secret;

pub use config::PkiConfig;
pub use engine::CryptoEngine;
pub use error::EngineError;
pub use lifecycle::{BatchDeleteOutcome, CertificateLifecycle};
pub use secret::{IssuanceSecrets, SigningSecret};
