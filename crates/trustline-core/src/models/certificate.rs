//! Certificate domain models.
//!
//! Trustline manages a private CA hierarchy: root CAs sign intermediate
//! CAs, which in turn sign server and client certificates. A certificate
//! record is written once; the only later change is revocation of an
//! end-entity certificate.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{TrustlineError, TrustlineResult};
use crate::models::distinguished_name::{DistinguishedName, DistinguishedNameFields};

pub const MAX_SHORT_NAME_LEN: usize = 128;
pub const MAX_NAME_LEN: usize = 128;

/// The role a certificate plays in the hierarchy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum CertificateType {
    /// Self-signed top of the hierarchy.
    Root,
    /// CA signed by a root or another intermediate.
    Intermediate,
    /// TLS server end-entity certificate.
    Server,
    /// TLS client end-entity certificate.
    Client,
    /// OCSP response signing certificate.
    Ocsp,
}

impl CertificateType {
    pub const ALL: [CertificateType; 5] = [
        CertificateType::Root,
        CertificateType::Intermediate,
        CertificateType::Server,
        CertificateType::Client,
        CertificateType::Ocsp,
    ];

    /// One-letter storage code.
    pub fn code(&self) -> char {
        match self {
            CertificateType::Root => 'R',
            CertificateType::Intermediate => 'I',
            CertificateType::Server => 'S',
            CertificateType::Client => 'C',
            CertificateType::Ocsp => 'O',
        }
    }

    pub fn from_code(code: char) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.code() == code)
    }

    pub fn label(&self) -> &'static str {
        match self {
            CertificateType::Root => "Root CA Certificate",
            CertificateType::Intermediate => "Intermediate CA Certificate",
            CertificateType::Server => "Server Certificate",
            CertificateType::Client => "Client Certificate",
            CertificateType::Ocsp => "OCSP Signing Certificate",
        }
    }

    /// Whether this role has a revocation path. Only end-entity
    /// certificates can be revoked; CA revocation is handled elsewhere.
    pub fn is_revocable(&self) -> bool {
        matches!(self, CertificateType::Server | CertificateType::Client)
    }

    /// Whether a certificate of this role must be issued by an
    /// intermediate CA.
    pub fn requires_intermediate_parent(&self) -> bool {
        matches!(self, CertificateType::Server | CertificateType::Client)
    }
}

impl fmt::Display for CertificateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Persisted lifecycle state of a certificate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CertificateStatus {
    /// Record written, key material not yet confirmed by the crypto engine.
    PendingGeneration,
    Active,
    /// Claimed by a revocation that is waiting on the crypto engine.
    Revoking,
    Revoked,
}

impl CertificateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CertificateStatus::PendingGeneration => "PendingGeneration",
            CertificateStatus::Active => "Active",
            CertificateStatus::Revoking => "Revoking",
            CertificateStatus::Revoked => "Revoked",
        }
    }
}

impl fmt::Display for CertificateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted certificate record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Certificate {
    pub id: Uuid,
    pub cert_type: CertificateType,
    /// Short token used to name keys and scripts.
    pub short_name: String,
    /// Long display name.
    pub name: String,
    /// Identifier of the owned distinguished name row.
    pub dn_id: Uuid,
    pub dn: DistinguishedName,
    /// Issuing certificate. Not owned: the parent is looked up on demand.
    pub parent_id: Option<Uuid>,
    /// Base URL of the certificate revocation list.
    pub crl_distribution_url: Option<String>,
    /// Host URL of the OCSP responder.
    pub ocsp_distribution_host: Option<String>,
    pub status: CertificateStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: NaiveDate,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl Certificate {
    /// Number of days between creation and expiry.
    pub fn days_valid(&self) -> i64 {
        days_between(self.created_at.date_naive(), self.expires_at)
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    pub fn is_active(&self) -> bool {
        self.status == CertificateStatus::Active
    }
}

pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}

/// A request to issue a new certificate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCertificate {
    pub cert_type: CertificateType,
    pub short_name: String,
    /// Defaults to `<short_name> - <common name>` when absent.
    pub name: Option<String>,
    pub dn: DistinguishedNameFields,
    pub parent_id: Option<Uuid>,
    pub crl_distribution_url: Option<String>,
    pub ocsp_distribution_host: Option<String>,
    pub expires_at: NaiveDate,
    /// PEM-encoded certificate signing request for end-entity
    /// certificates whose key pair is held by the requester.
    pub csr_pem: Option<String>,
}

/// A fully validated certificate ready to be written by a repository.
#[derive(Debug, Clone)]
pub struct NewCertificate {
    pub cert_type: CertificateType,
    pub short_name: String,
    pub name: String,
    pub dn: DistinguishedName,
    pub parent_id: Option<Uuid>,
    pub crl_distribution_url: Option<String>,
    pub ocsp_distribution_host: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: NaiveDate,
}

impl NewCertificate {
    pub fn days_valid(&self) -> i64 {
        days_between(self.created_at.date_naive(), self.expires_at)
    }
}

/// An attempted change to a persisted certificate.
///
/// Certificates are immutable once written: a field that differs from the
/// stored value is rejected, a field repeating it is a no-op. Revocation
/// is a separate operation and has no field here.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CertificatePatch {
    pub cert_type: Option<CertificateType>,
    pub short_name: Option<String>,
    pub name: Option<String>,
    pub parent_id: Option<Option<Uuid>>,
    pub crl_distribution_url: Option<Option<String>>,
    pub ocsp_distribution_host: Option<Option<String>>,
    pub expires_at: Option<NaiveDate>,
}

impl CertificatePatch {
    /// Names of the fields this patch would change on `current`.
    pub fn changed_fields(&self, current: &Certificate) -> Vec<&'static str> {
        fn differs<T: PartialEq>(proposed: &Option<T>, stored: &T) -> bool {
            proposed.as_ref().is_some_and(|p| p != stored)
        }

        let mut fields = Vec::new();
        if differs(&self.cert_type, &current.cert_type) {
            fields.push("cert_type");
        }
        if differs(&self.short_name, &current.short_name) {
            fields.push("short_name");
        }
        if differs(&self.name, &current.name) {
            fields.push("name");
        }
        if differs(&self.parent_id, &current.parent_id) {
            fields.push("parent_id");
        }
        if differs(&self.crl_distribution_url, &current.crl_distribution_url) {
            fields.push("crl_distribution_url");
        }
        if differs(&self.ocsp_distribution_host, &current.ocsp_distribution_host) {
            fields.push("ocsp_distribution_host");
        }
        if differs(&self.expires_at, &current.expires_at) {
            fields.push("expires_at");
        }
        fields
    }
}

/// Validate a short name: non-empty, at most 128 of `[0-9a-zA-Z_.]`.
pub fn validate_short_name(short_name: &str) -> TrustlineResult<()> {
    validate_token(
        "short name",
        short_name,
        MAX_SHORT_NAME_LEN,
        |c| c.is_ascii_alphanumeric() || c == '_' || c == '.',
        "[_.]",
    )
}

/// Validate a display name: non-empty, at most 128 of
/// `[0-9a-zA-Z@#$%^&+=_,-. ]`.
pub fn validate_name(name: &str) -> TrustlineResult<()> {
    validate_token(
        "name",
        name,
        MAX_NAME_LEN,
        |c| c.is_ascii_alphanumeric() || "@#$%^&+=_.-, ".contains(c),
        "[@#$%^&+=_,-. ]",
    )
}

fn validate_token(
    field: &str,
    value: &str,
    max_len: usize,
    allowed: impl Fn(char) -> bool,
    allowed_desc: &str,
) -> TrustlineResult<()> {
    let invalid = |reason: String| TrustlineError::InvalidCharacters {
        field: field.into(),
        reason,
    };
    if value.is_empty() {
        return Err(invalid("must not be empty".into()));
    }
    let len = value.chars().count();
    if len > max_len {
        return Err(invalid(format!(
            "{len} characters exceeds the maximum of {max_len}"
        )));
    }
    if let Some(bad) = value.chars().find(|&c| !allowed(c)) {
        return Err(invalid(format!(
            "character `{bad}` is not allowed; only alphanumerics and \
             {allowed_desc} are allowed"
        )));
    }
    Ok(())
}

/// Validate an optional distribution URL: absolute `http` or `https`.
pub fn validate_distribution_url(field: &str, value: &str) -> TrustlineResult<()> {
    let parsed = url::Url::parse(value).map_err(|e| TrustlineError::Validation {
        message: format!("{field} `{value}` is not a valid URL: {e}"),
    })?;
    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Ok(()),
        scheme => Err(TrustlineError::Validation {
            message: format!("{field} `{value}` must be an http(s) URL with a host, not `{scheme}`"),
        }),
    }
}
