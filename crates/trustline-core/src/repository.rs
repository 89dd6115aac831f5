//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Implementations are expected to
//! serialize writes to a single certificate record (unique indexes or row
//! locks); the lifecycle layer does not lock on its own.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::TrustlineResult;
use crate::models::certificate::{Certificate, NewCertificate};

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

// ---------------------------------------------------------------------------
// Certificates
// ---------------------------------------------------------------------------

pub trait CertificateRepository: Send + Sync {
    /// Write a certificate and its distinguished name in the
    /// `PendingGeneration` state.
    ///
    /// Fails with `AlreadyExists` when a non-revoked certificate of the
    /// same type already uses the short name or an identical DN.
    fn create_pending(
        &self,
        input: NewCertificate,
    ) -> impl Future<Output = TrustlineResult<Certificate>> + Send;

    fn get_by_id(&self, id: Uuid) -> impl Future<Output = TrustlineResult<Certificate>> + Send;

    /// Move a `PendingGeneration` certificate to `Active`.
    fn mark_active(&self, id: Uuid) -> impl Future<Output = TrustlineResult<Certificate>> + Send;

    /// Remove a `PendingGeneration` certificate and its distinguished name.
    /// Records in any other state are left untouched.
    fn discard_pending(&self, id: Uuid) -> impl Future<Output = TrustlineResult<()>> + Send;

    /// Claim an `Active` certificate for revocation by moving it to
    /// `Revoking`. Returns `None` when the record exists but another
    /// caller holds the claim or it is no longer active.
    fn claim_revocation(
        &self,
        id: Uuid,
    ) -> impl Future<Output = TrustlineResult<Option<Certificate>>> + Send;

    /// Return a `Revoking` certificate to `Active` after a failed
    /// revocation.
    fn release_revocation(
        &self,
        id: Uuid,
    ) -> impl Future<Output = TrustlineResult<Certificate>> + Send;

    /// Set `revoked_at` on a certificate claimed with
    /// [`claim_revocation`](Self::claim_revocation). Touches no other
    /// attribute besides the derived status.
    fn mark_revoked(
        &self,
        id: Uuid,
        revoked_at: DateTime<Utc>,
    ) -> impl Future<Output = TrustlineResult<Certificate>> + Send;

    /// All certificates issued directly by `parent_id`, oldest first.
    fn list_children(
        &self,
        parent_id: Uuid,
    ) -> impl Future<Output = TrustlineResult<Vec<Certificate>>> + Send;

    /// Certificates in the `Active` state, oldest first.
    fn list_active(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = TrustlineResult<PaginatedResult<Certificate>>> + Send;

    fn list_revoked(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = TrustlineResult<PaginatedResult<Certificate>>> + Send;
}
