//! Error types for the Trustline system.

use thiserror::Error;
use uuid::Uuid;

use crate::models::certificate::CertificateType;
use crate::models::distinguished_name::DnField;

/// Reasons the hierarchy validator refuses a proposed certificate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HierarchyViolation {
    #[error("a root CA certificate must not have a parent certificate")]
    RootMustNotHaveParent,

    #[error("a {cert_type} must have a parent certificate")]
    NonRootRequiresParent { cert_type: CertificateType },

    #[error("a {cert_type} can only be issued by an intermediate CA, not by a {parent_type}")]
    InvalidParentType {
        cert_type: CertificateType,
        parent_type: CertificateType,
    },

    #[error(
        "{field} of an intermediate CA must match its root CA (policy strict): \
         expected `{expected}`, got `{actual}`"
    )]
    PolicyMismatch {
        field: DnField,
        expected: String,
        actual: String,
    },

    #[error(
        "certificate would be valid for {days_valid} days but its parent \
         is only valid for {parent_days_valid} days"
    )]
    ExpiryExceedsParent {
        days_valid: i64,
        parent_days_valid: i64,
    },

    #[error("parent certificate {parent_id} has been revoked")]
    ParentRevoked { parent_id: Uuid },

    #[error("parent certificate {parent_id} has no key material yet")]
    ParentNotReady { parent_id: Uuid },
}

#[derive(Debug, Error)]
pub enum TrustlineError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Entity already exists: {entity} ({detail})")]
    AlreadyExists { entity: String, detail: String },

    #[error("Invalid characters in {field}: {reason}")]
    InvalidCharacters { field: String, reason: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Not allowed to update {entity} {id}: field `{field}` is immutable")]
    ImmutableRecord {
        entity: String,
        id: Uuid,
        field: String,
    },

    #[error("Hierarchy rule violated: {0}")]
    Hierarchy(#[from] HierarchyViolation),

    #[error("Delete of certificate {id} not allowed: {reason}")]
    InvalidDelete { id: Uuid, reason: String },

    #[error("Key material generation failed for certificate {id}: {reason}")]
    GenerationFailure { id: Uuid, reason: String },

    #[error("Revocation failed for certificate {id}: {reason}")]
    RevocationFailure { id: Uuid, reason: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type TrustlineResult<T> = Result<T, TrustlineError>;

impl TrustlineError {
    /// The hierarchy rule that rejected the request, if any.
    pub fn hierarchy_violation(&self) -> Option<&HierarchyViolation> {
        match self {
            TrustlineError::Hierarchy(v) => Some(v),
            _ => None,
        }
    }
}
