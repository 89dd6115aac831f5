//! Domain models for Trustline.
//!
//! These are the core types shared across all crates.

pub mod certificate;
pub mod distinguished_name;
