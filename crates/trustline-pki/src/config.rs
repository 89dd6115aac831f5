//! Lifecycle manager configuration.

use std::time::Duration;

use serde::Deserialize;

/// Configuration for the certificate lifecycle manager.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PkiConfig {
    /// Upper bound for a single key-generation call to the crypto engine,
    /// in seconds (default: 120). Exceeding it fails the issuance.
    pub engine_timeout_secs: u64,
    /// Upper bound for a single revocation call, in seconds (default: 60).
    pub revoke_timeout_secs: u64,
}

impl Default for PkiConfig {
    fn default() -> Self {
        Self {
            engine_timeout_secs: 120,
            revoke_timeout_secs: 60,
        }
    }
}

impl PkiConfig {
    pub fn engine_timeout(&self) -> Duration {
        Duration::from_secs(self.engine_timeout_secs)
    }

    pub fn revoke_timeout(&self) -> Duration {
        Duration::from_secs(self.revoke_timeout_secs)
    }
}
