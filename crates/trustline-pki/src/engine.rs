//! Crypto engine contract.
//!
//! The engine produces and revokes the actual key material and X.509
//! documents. The lifecycle manager only decides when each operation runs
//! and with which parameters; it calls every operation at most once per
//! transition, after validation, and never retries.

use trustline_core::models::certificate::Certificate;

use crate::error::EngineError;
use crate::secret::SigningSecret;

pub trait CryptoEngine: Send + Sync {
    /// Create the key pair and self-signed certificate of a root CA.
    fn generate_root_ca(
        &self,
        certificate: &Certificate,
        secret: &SigningSecret,
    ) -> impl Future<Output = Result<(), EngineError>> + Send;

    /// Create an intermediate CA signed with the parent's key.
    fn generate_intermediate_ca(
        &self,
        certificate: &Certificate,
        secret: &SigningSecret,
        parent_secret: &SigningSecret,
    ) -> impl Future<Output = Result<(), EngineError>> + Send;

    /// Issue a TLS server certificate, optionally from a supplied CSR.
    fn generate_server_cert(
        &self,
        certificate: &Certificate,
        secret: &SigningSecret,
        csr_pem: Option<&str>,
    ) -> impl Future<Output = Result<(), EngineError>> + Send;

    /// Issue a TLS client certificate, optionally from a supplied CSR.
    fn generate_client_cert(
        &self,
        certificate: &Certificate,
        secret: &SigningSecret,
        csr_pem: Option<&str>,
    ) -> impl Future<Output = Result<(), EngineError>> + Send;

    fn revoke_server_cert(
        &self,
        certificate: &Certificate,
        secret: &SigningSecret,
    ) -> impl Future<Output = Result<(), EngineError>> + Send;

    fn revoke_client_cert(
        &self,
        certificate: &Certificate,
        secret: &SigningSecret,
    ) -> impl Future<Output = Result<(), EngineError>> + Send;
}
