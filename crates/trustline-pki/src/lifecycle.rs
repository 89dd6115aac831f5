//! Certificate issuance and revocation.
//!
//! Issuance runs validation, persistence and key generation strictly in
//! that order:
//!
//! 1. field checks on the request (DN, names, URLs, expiry date);
//! 2. parent lookup and the [`hierarchy`](crate::hierarchy) rules;
//! 3. the record is written as `PendingGeneration`;
//! 4. the crypto engine generates key material for the role;
//! 5. the record becomes `Active`.
//!
//! If step 4 fails or times out the pending record is discarded, so a
//! certificate without key material is never reported as active.

use chrono::Utc;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use trustline_core::error::{TrustlineError, TrustlineResult};
use trustline_core::models::certificate::{
    Certificate, CertificatePatch, CertificateStatus, CertificateType, CreateCertificate,
    NewCertificate, validate_distribution_url, validate_name, validate_short_name,
};
use trustline_core::models::distinguished_name::{DistinguishedName, DistinguishedNameFields};
use trustline_core::repository::{CertificateRepository, PaginatedResult, Pagination};
use uuid::Uuid;

use crate::config::PkiConfig;
use crate::engine::CryptoEngine;
use crate::error::EngineError;
use crate::hierarchy::{self, Candidate};
use crate::secret::{IssuanceSecrets, SigningSecret};

/// Result of revoking several certificates one by one.
#[derive(Debug, Default)]
pub struct BatchDeleteOutcome {
    pub revoked: Vec<Certificate>,
    pub failures: Vec<(Uuid, TrustlineError)>,
}

impl BatchDeleteOutcome {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Certificate lifecycle manager.
///
/// Generic over the repository and the crypto engine so that the policy
/// layer has no dependency on the database crate or on any X.509 library.
pub struct CertificateLifecycle<R: CertificateRepository, E: CryptoEngine> {
    repo: R,
    engine: E,
    config: PkiConfig,
}

impl<R: CertificateRepository, E: CryptoEngine> CertificateLifecycle<R, E> {
    pub fn new(repo: R, engine: E, config: PkiConfig) -> Self {
        Self {
            repo,
            engine,
            config,
        }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Validate, persist and generate a new certificate.
    pub async fn create_certificate(
        &self,
        request: CreateCertificate,
        secrets: IssuanceSecrets,
    ) -> TrustlineResult<Certificate> {
        // 1. Request fields.
        let created_at = Utc::now();
        let dn = DistinguishedName::new(request.dn)?;
        validate_short_name(&request.short_name)?;
        // Only a caller-supplied name is held to the display-name rules.
        let name = match request.name.filter(|n| !n.is_empty()) {
            Some(name) => {
                validate_name(&name)?;
                name
            }
            None => format!("{} - {}", request.short_name, dn.common_name()),
        };
        if let Some(url) = &request.crl_distribution_url {
            validate_distribution_url("CRL distribution URL", url)?;
        }
        if let Some(url) = &request.ocsp_distribution_host {
            validate_distribution_url("OCSP distribution host", url)?;
        }
        if request.expires_at <= created_at.date_naive() {
            return Err(TrustlineError::Validation {
                message: format!("expiry date {} is not in the future", request.expires_at),
            });
        }
        check_secrets(request.cert_type, &secrets)?;

        let new = NewCertificate {
            cert_type: request.cert_type,
            short_name: request.short_name,
            name,
            dn,
            parent_id: request.parent_id,
            crl_distribution_url: request.crl_distribution_url,
            ocsp_distribution_host: request.ocsp_distribution_host,
            created_at,
            expires_at: request.expires_at,
        };

        // 2. Hierarchy rules against a single snapshot of the parent.
        let parent = match new.parent_id {
            Some(parent_id) => Some(self.repo.get_by_id(parent_id).await?),
            None => None,
        };
        let candidate = Candidate {
            cert_type: new.cert_type,
            dn: &new.dn,
            days_valid: new.days_valid(),
        };
        if let Err(violation) = hierarchy::validate(&candidate, parent.as_ref()) {
            debug!(
                cert_type = ?new.cert_type,
                short_name = %new.short_name,
                %violation,
                "Certificate request rejected"
            );
            return Err(violation.into());
        }

        // 3. Persist as pending.
        let pending = self.repo.create_pending(new).await?;
        info!(
            certificate_id = %pending.id,
            cert_type = ?pending.cert_type,
            short_name = %pending.short_name,
            "Certificate stored, generating key material"
        );

        // 4. Key material.
        if let Err(err) = self.generate(&pending, &secrets, request.csr_pem.as_deref()).await {
            warn!(
                certificate_id = %pending.id,
                error = %err,
                "Key generation failed, discarding pending certificate"
            );
            if let Err(discard_err) = self.repo.discard_pending(pending.id).await {
                warn!(
                    certificate_id = %pending.id,
                    error = %discard_err,
                    "Could not discard pending certificate"
                );
            }
            return Err(err.into_generation_failure(pending.id));
        }

        // 5. Activate.
        let active = self.repo.mark_active(pending.id).await?;
        info!(
            certificate_id = %active.id,
            cert_type = ?active.cert_type,
            days_valid = active.days_valid(),
            "Certificate issued"
        );
        Ok(active)
    }

    async fn generate(
        &self,
        certificate: &Certificate,
        secrets: &IssuanceSecrets,
        csr_pem: Option<&str>,
    ) -> Result<(), EngineError> {
        let limit = self.config.engine_timeout();
        let signing = &secrets.signing;
        let call = async {
            match certificate.cert_type {
                CertificateType::Root => self.engine.generate_root_ca(certificate, signing).await,
                CertificateType::Intermediate => {
                    let parent = secrets.parent.as_ref().ok_or_else(|| {
                        EngineError::Rejected("parent signing secret missing".into())
                    })?;
                    self.engine
                        .generate_intermediate_ca(certificate, signing, parent)
                        .await
                }
                CertificateType::Server => {
                    self.engine
                        .generate_server_cert(certificate, signing, csr_pem)
                        .await
                }
                CertificateType::Client => {
                    self.engine
                        .generate_client_cert(certificate, signing, csr_pem)
                        .await
                }
                // No generation hook exists for OCSP signing certificates.
                CertificateType::Ocsp => Ok(()),
            }
        };
        timeout(limit, call).await.map_err(|_| EngineError::Timeout {
            secs: self.config.engine_timeout_secs,
        })?
    }

    /// Revoke a server or client certificate.
    ///
    /// This is the only path that sets `revoked_at`. Other types, and
    /// certificates that are not active, are rejected with `InvalidDelete`.
    /// The record is claimed (`Revoking`) before the engine runs, so
    /// concurrent deletes of one certificate reach the engine once.
    pub async fn delete_certificate(
        &self,
        id: Uuid,
        secret: &SigningSecret,
    ) -> TrustlineResult<Certificate> {
        let certificate = self.repo.get_by_id(id).await?;

        if !certificate.cert_type.is_revocable() {
            warn!(certificate_id = %id, cert_type = ?certificate.cert_type, "Delete rejected");
            return Err(TrustlineError::InvalidDelete {
                id,
                reason: format!("a {} cannot be revoked", certificate.cert_type),
            });
        }
        if certificate.is_revoked() || certificate.status == CertificateStatus::Revoked {
            warn!(certificate_id = %id, "Delete rejected, already revoked");
            return Err(TrustlineError::InvalidDelete {
                id,
                reason: "certificate is already revoked".into(),
            });
        }
        if certificate.status != CertificateStatus::Active {
            return Err(TrustlineError::InvalidDelete {
                id,
                reason: format!("certificate is {}, not active", certificate.status),
            });
        }

        let Some(mut claimed) = self.repo.claim_revocation(id).await? else {
            warn!(certificate_id = %id, "Delete rejected, revocation already in progress");
            return Err(TrustlineError::InvalidDelete {
                id,
                reason: "certificate is already being revoked".into(),
            });
        };

        let revoked_at = Utc::now();
        claimed.revoked_at = Some(revoked_at);

        let call = async {
            match claimed.cert_type {
                CertificateType::Server => self.engine.revoke_server_cert(&claimed, secret).await,
                _ => self.engine.revoke_client_cert(&claimed, secret).await,
            }
        };
        let outcome = timeout(self.config.revoke_timeout(), call)
            .await
            .map_err(|_| EngineError::Timeout {
                secs: self.config.revoke_timeout_secs,
            })
            .and_then(|r| r);
        if let Err(err) = outcome {
            warn!(certificate_id = %id, error = %err, "Revocation failed");
            if let Err(release_err) = self.repo.release_revocation(id).await {
                warn!(
                    certificate_id = %id,
                    error = %release_err,
                    "Could not release revocation claim"
                );
            }
            return Err(err.into_revocation_failure(id));
        }

        let revoked = self.repo.mark_revoked(id, revoked_at).await?;
        info!(
            certificate_id = %id,
            cert_type = ?revoked.cert_type,
            "Certificate revoked"
        );
        Ok(revoked)
    }

    /// Revoke each certificate independently; one failure does not stop
    /// the others.
    pub async fn delete_certificates(
        &self,
        ids: &[Uuid],
        secret: &SigningSecret,
    ) -> BatchDeleteOutcome {
        let mut outcome = BatchDeleteOutcome::default();
        for &id in ids {
            match self.delete_certificate(id, secret).await {
                Ok(cert) => outcome.revoked.push(cert),
                Err(e) => outcome.failures.push((id, e)),
            }
        }
        if !outcome.is_complete() {
            warn!(
                revoked = outcome.revoked.len(),
                failed = outcome.failures.len(),
                "Batch delete finished with failures"
            );
        }
        outcome
    }

    /// Revoke every non-revoked certificate issued directly by `parent_id`.
    pub async fn delete_children(
        &self,
        parent_id: Uuid,
        secret: &SigningSecret,
    ) -> TrustlineResult<BatchDeleteOutcome> {
        let ids: Vec<Uuid> = self
            .repo
            .list_children(parent_id)
            .await?
            .into_iter()
            .filter(|c| !c.is_revoked())
            .map(|c| c.id)
            .collect();
        Ok(self.delete_certificates(&ids, secret).await)
    }

    /// Certificates cannot be edited after creation.
    ///
    /// Fails with `ImmutableRecord` naming the first field the patch would
    /// change. Fields repeating the stored value are accepted as no-ops.
    pub async fn update_certificate(
        &self,
        id: Uuid,
        patch: CertificatePatch,
    ) -> TrustlineResult<Certificate> {
        let certificate = self.repo.get_by_id(id).await?;
        match patch.changed_fields(&certificate).first() {
            Some(field) => Err(TrustlineError::ImmutableRecord {
                entity: "certificate".into(),
                id,
                field: (*field).into(),
            }),
            None => Ok(certificate),
        }
    }

    /// Distinguished names cannot be edited after creation.
    ///
    /// Same rule as [`update_certificate`](Self::update_certificate):
    /// submitting the stored fields is a no-op, any difference fails with
    /// `ImmutableRecord`.
    pub async fn update_distinguished_name(
        &self,
        certificate_id: Uuid,
        fields: DistinguishedNameFields,
    ) -> TrustlineResult<Certificate> {
        let certificate = self.repo.get_by_id(certificate_id).await?;
        let current = DistinguishedNameFields::from(certificate.dn.clone());
        if fields == current {
            return Ok(certificate);
        }
        Err(TrustlineError::ImmutableRecord {
            entity: "distinguished_name".into(),
            id: certificate.dn_id,
            field: first_changed_dn_field(&current, &fields).into(),
        })
    }

    pub async fn get_certificate(&self, id: Uuid) -> TrustlineResult<Certificate> {
        self.repo.get_by_id(id).await
    }

    pub async fn list_children(&self, parent_id: Uuid) -> TrustlineResult<Vec<Certificate>> {
        self.repo.list_children(parent_id).await
    }

    pub async fn list_active(
        &self,
        pagination: Pagination,
    ) -> TrustlineResult<PaginatedResult<Certificate>> {
        self.repo.list_active(pagination).await
    }

    pub async fn list_revoked(
        &self,
        pagination: Pagination,
    ) -> TrustlineResult<PaginatedResult<Certificate>> {
        self.repo.list_revoked(pagination).await
    }
}

fn check_secrets(cert_type: CertificateType, secrets: &IssuanceSecrets) -> TrustlineResult<()> {
    if secrets.signing.is_empty() {
        return Err(TrustlineError::Validation {
            message: "a signing secret is required".into(),
        });
    }
    if cert_type == CertificateType::Intermediate
        && secrets.parent.as_ref().is_none_or(SigningSecret::is_empty)
    {
        return Err(TrustlineError::Validation {
            message: "issuing an intermediate CA requires the parent's signing secret".into(),
        });
    }
    Ok(())
}

fn first_changed_dn_field(
    current: &DistinguishedNameFields,
    proposed: &DistinguishedNameFields,
) -> &'static str {
    if current.country_code != proposed.country_code {
        "country_code"
    } else if current.state_or_province != proposed.state_or_province {
        "state_or_province"
    } else if current.locality != proposed.locality {
        "locality"
    } else if current.organization != proposed.organization {
        "organization"
    } else if current.organizational_unit != proposed.organizational_unit {
        "organizational_unit"
    } else if current.email != proposed.email {
        "email"
    } else {
        "common_name"
    }
}
