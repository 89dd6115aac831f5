//! Signing secrets handed to the crypto engine.

use std::fmt;

use zeroize::Zeroizing;

/// Passphrase protecting a CA or certificate private key.
///
/// Always supplied by the caller; there is no default. The buffer is wiped
/// on drop and never printed.
#[derive(Clone)]
pub struct SigningSecret(Zeroizing<String>);

impl SigningSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(Zeroizing::new(secret.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningSecret(<redacted>)")
    }
}

/// Secrets needed to issue one certificate.
#[derive(Debug, Clone)]
pub struct IssuanceSecrets {
    /// Secret for the new certificate's own key.
    pub signing: SigningSecret,
    /// Secret unlocking the parent CA key. Required for intermediates.
    pub parent: Option<SigningSecret>,
}

impl IssuanceSecrets {
    pub fn new(signing: SigningSecret) -> Self {
        Self {
            signing,
            parent: None,
        }
    }

    pub fn with_parent(mut self, parent: SigningSecret) -> Self {
        self.parent = Some(parent);
        self
    }
}
