//! Crypto engine error types.

use thiserror::Error;
use trustline_core::error::TrustlineError;
use uuid::Uuid;

/// Failure reported by (or while waiting for) the crypto engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine did not answer within {secs}s")]
    Timeout { secs: u64 },

    #[error("engine rejected the request: {0}")]
    Rejected(String),

    #[error("cryptography error: {0}")]
    Crypto(String),
}

impl EngineError {
    pub(crate) fn into_generation_failure(self, id: Uuid) -> TrustlineError {
        TrustlineError::GenerationFailure {
            id,
            reason: self.to_string(),
        }
    }

    pub(crate) fn into_revocation_failure(self, id: Uuid) -> TrustlineError {
        TrustlineError::RevocationFailure {
            id,
            reason: self.to_string(),
        }
    }
}
