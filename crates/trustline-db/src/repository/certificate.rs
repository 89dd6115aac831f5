//! SurrealDB implementation of [`CertificateRepository`].
//!
//! A certificate is stored as two rows: the `distinguished_name` it owns
//! and the `certificate` itself, which references the name by `dn_id`.
//! The OpenSSL subject of the name is copied into `dn_subject` so that the
//! per-type DN uniqueness rule can be enforced by an index.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::{debug, warn};
use trustline_core::error::TrustlineResult;
use trustline_core::models::certificate::{
    Certificate, CertificateStatus, CertificateType, NewCertificate,
};
use trustline_core::models::distinguished_name::{DistinguishedName, DistinguishedNameFields};
use trustline_core::repository::{CertificateRepository, PaginatedResult, Pagination};
use uuid::Uuid;

use crate::error::DbError;

const EXPIRES_AT_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, SurrealValue)]
struct DistinguishedNameRow {
    country_code: String,
    state_or_province: String,
    locality: String,
    organization: String,
    organizational_unit: String,
    email: String,
    common_name: String,
}

impl DistinguishedNameRow {
    fn try_into_dn(self) -> Result<DistinguishedName, DbError> {
        DistinguishedName::new(DistinguishedNameFields {
            country_code: self.country_code,
            state_or_province: self.state_or_province,
            locality: self.locality,
            organization: self.organization,
            organizational_unit: self.organizational_unit,
            email: self.email,
            common_name: self.common_name,
        })
        .map_err(|e| DbError::InvalidRow(format!("distinguished name: {e}")))
    }
}

/// DB-side row struct for queries where the UUID is already known.
#[derive(Debug, SurrealValue)]
struct CertificateRow {
    cert_type: String,
    short_name: String,
    name: String,
    dn_id: String,
    parent_id: Option<String>,
    crl_distribution_url: Option<String>,
    ocsp_distribution_host: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    expires_at: String,
    revoked_at: Option<DateTime<Utc>>,
}

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct CertificateRowWithId {
    record_id: String,
    cert_type: String,
    short_name: String,
    name: String,
    dn_id: String,
    parent_id: Option<String>,
    crl_distribution_url: Option<String>,
    ocsp_distribution_host: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    expires_at: String,
    revoked_at: Option<DateTime<Utc>>,
}

impl CertificateRowWithId {
    fn split(self) -> Result<(Uuid, CertificateRow), DbError> {
        let id = parse_uuid("certificate", &self.record_id)?;
        Ok((
            id,
            CertificateRow {
                cert_type: self.cert_type,
                short_name: self.short_name,
                name: self.name,
                dn_id: self.dn_id,
                parent_id: self.parent_id,
                crl_distribution_url: self.crl_distribution_url,
                ocsp_distribution_host: self.ocsp_distribution_host,
                status: self.status,
                created_at: self.created_at,
                expires_at: self.expires_at,
                revoked_at: self.revoked_at,
            },
        ))
    }
}

/// Row struct for the uniqueness pre-check.
#[derive(Debug, SurrealValue)]
struct ConflictRow {
    short_name: String,
}

/// Row struct for count queries.
#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

fn parse_uuid(what: &str, raw: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(raw).map_err(|e| DbError::InvalidRow(format!("invalid {what} UUID: {e}")))
}

fn type_to_code(t: CertificateType) -> String {
    t.code().to_string()
}

fn parse_type(code: &str) -> Result<CertificateType, DbError> {
    let mut chars = code.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => CertificateType::from_code(c),
        _ => None,
    }
    .ok_or_else(|| DbError::InvalidRow(format!("unknown certificate type: {code}")))
}

fn parse_status(s: &str) -> Result<CertificateStatus, DbError> {
    match s {
        "PendingGeneration" => Ok(CertificateStatus::PendingGeneration),
        "Active" => Ok(CertificateStatus::Active),
        "Revoking" => Ok(CertificateStatus::Revoking),
        "Revoked" => Ok(CertificateStatus::Revoked),
        other => Err(DbError::InvalidRow(format!(
            "unknown certificate status: {other}"
        ))),
    }
}

/// Map a failed insert to [`DbError`]. A unique index violation or a
/// write conflict means another writer took the slot after the
/// uniqueness pre-check.
fn statement_error(entity: &str, err: surrealdb::Error) -> DbError {
    classify_statement_error(entity, err.to_string())
}

fn classify_statement_error(entity: &str, message: String) -> DbError {
    if message.contains("already contains") {
        let detail = if message.contains("idx_certificate_short_name") {
            "short name is in use by a non-revoked certificate of this type"
        } else if message.contains("idx_certificate_dn_subject") {
            "distinguished name is in use by a non-revoked certificate of this type"
        } else {
            "unique index violation"
        };
        return DbError::Conflict {
            entity: entity.into(),
            detail: detail.into(),
        };
    }
    if message.contains("read or write conflict") {
        return DbError::Conflict {
            entity: entity.into(),
            detail: "a concurrent write claimed the same slot".into(),
        };
    }
    DbError::Query(message)
}

fn revocation_key(revoked_at: DateTime<Utc>) -> String {
    revoked_at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

impl CertificateRow {
    fn into_certificate(self, id: Uuid, dn: DistinguishedName) -> Result<Certificate, DbError> {
        let expires_at = NaiveDate::parse_from_str(&self.expires_at, EXPIRES_AT_FORMAT)
            .map_err(|e| DbError::InvalidRow(format!("invalid expires_at: {e}")))?;
        Ok(Certificate {
            id,
            cert_type: parse_type(&self.cert_type)?,
            short_name: self.short_name,
            name: self.name,
            dn_id: parse_uuid("distinguished name", &self.dn_id)?,
            dn,
            parent_id: self
                .parent_id
                .as_deref()
                .map(|p| parse_uuid("parent", p))
                .transpose()?,
            crl_distribution_url: self.crl_distribution_url,
            ocsp_distribution_host: self.ocsp_distribution_host,
            status: parse_status(&self.status)?,
            created_at: self.created_at,
            expires_at,
            revoked_at: self.revoked_at,
        })
    }
}

/// SurrealDB implementation of the Certificate repository.
#[derive(Clone)]
pub struct SurrealCertificateRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealCertificateRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn load_dn(&self, dn_id: &str) -> Result<DistinguishedName, DbError> {
        let mut result = self
            .db
            .query("SELECT * FROM type::record('distinguished_name', $id)")
            .bind(("id", dn_id.to_string()))
            .await?;

        let rows: Vec<DistinguishedNameRow> = result.take(0)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "distinguished_name".into(),
            id: dn_id.to_string(),
        })?;
        row.try_into_dn()
    }

    async fn hydrate(&self, id: Uuid, row: CertificateRow) -> Result<Certificate, DbError> {
        let dn = self.load_dn(&row.dn_id).await?;
        row.into_certificate(id, dn)
    }

    async fn fetch_row(&self, id: Uuid) -> Result<CertificateRow, DbError> {
        let id_str = id.to_string();
        let mut result = self
            .db
            .query("SELECT * FROM type::record('certificate', $id)")
            .bind(("id", id_str.clone()))
            .await?;

        let rows: Vec<CertificateRow> = result.take(0)?;
        rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "certificate".into(),
            id: id_str,
        })
    }

    /// Reject a second live certificate of the same type sharing the
    /// short name or the subject.
    async fn check_unique(&self, input: &NewCertificate, dn_subject: &str) -> Result<(), DbError> {
        let mut result = self
            .db
            .query(
                "SELECT short_name FROM certificate \
                 WHERE cert_type = $cert_type AND revocation_key = '' \
                 AND (short_name = $short_name OR dn_subject = $dn_subject)",
            )
            .bind(("cert_type", type_to_code(input.cert_type)))
            .bind(("short_name", input.short_name.clone()))
            .bind(("dn_subject", dn_subject.to_string()))
            .await?;

        let rows: Vec<ConflictRow> = result.take(0)?;
        match rows.first() {
            None => Ok(()),
            Some(row) if row.short_name == input.short_name => Err(DbError::Conflict {
                entity: "certificate".into(),
                detail: format!(
                    "short name `{}` is in use by a non-revoked {}",
                    input.short_name, input.cert_type
                ),
            }),
            Some(_) => Err(DbError::Conflict {
                entity: "certificate".into(),
                detail: format!(
                    "distinguished name `{dn_subject}` is in use by a non-revoked {}",
                    input.cert_type
                ),
            }),
        }
    }

    async fn list_by_status(
        &self,
        status: CertificateStatus,
        pagination: Pagination,
    ) -> Result<PaginatedResult<Certificate>, DbError> {
        let mut count_result = self
            .db
            .query("SELECT count() AS total FROM certificate WHERE status = $status GROUP ALL")
            .bind(("status", status.as_str()))
            .await?;
        let count_rows: Vec<CountRow> = count_result.take(0)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM certificate \
                 WHERE status = $status \
                 ORDER BY created_at ASC \
                 LIMIT $limit START $offset",
            )
            .bind(("status", status.as_str()))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await?;

        let rows: Vec<CertificateRowWithId> = result.take(0)?;
        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let (id, row) = row.split()?;
            items.push(self.hydrate(id, row).await?);
        }

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}

impl<C: Connection> CertificateRepository for SurrealCertificateRepository<C> {
    async fn create_pending(&self, input: NewCertificate) -> TrustlineResult<Certificate> {
        let dn_subject = input.dn.to_openssl_subject();
        self.check_unique(&input, &dn_subject).await?;

        let dn_id = Uuid::new_v4();
        let dn_id_str = dn_id.to_string();
        let dn = &input.dn;

        self.db
            .query(
                "CREATE type::record('distinguished_name', $id) SET \
                 country_code = $country_code, \
                 state_or_province = $state_or_province, \
                 locality = $locality, \
                 organization = $organization, \
                 organizational_unit = $organizational_unit, \
                 email = $email, \
                 common_name = $common_name",
            )
            .bind(("id", dn_id_str.clone()))
            .bind(("country_code", dn.country_code().to_string()))
            .bind(("state_or_province", dn.state_or_province().to_string()))
            .bind(("locality", dn.locality().to_string()))
            .bind(("organization", dn.organization().to_string()))
            .bind(("organizational_unit", dn.organizational_unit().to_string()))
            .bind(("email", dn.email().to_string()))
            .bind(("common_name", dn.common_name().to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let created = self
            .db
            .query(
                "CREATE type::record('certificate', $id) SET \
                 cert_type = $cert_type, \
                 short_name = $short_name, \
                 name = $name, \
                 dn_id = $dn_id, \
                 dn_subject = $dn_subject, \
                 parent_id = $parent_id, \
                 crl_distribution_url = $crl_distribution_url, \
                 ocsp_distribution_host = $ocsp_distribution_host, \
                 status = $status, \
                 created_at = $created_at, \
                 expires_at = $expires_at, \
                 revocation_key = ''",
            )
            .bind(("id", id_str.clone()))
            .bind(("cert_type", type_to_code(input.cert_type)))
            .bind(("short_name", input.short_name.clone()))
            .bind(("name", input.name.clone()))
            .bind(("dn_id", dn_id_str.clone()))
            .bind(("dn_subject", dn_subject))
            .bind(("parent_id", input.parent_id.map(|p| p.to_string())))
            .bind(("crl_distribution_url", input.crl_distribution_url.clone()))
            .bind(("ocsp_distribution_host", input.ocsp_distribution_host.clone()))
            .bind(("status", CertificateStatus::PendingGeneration.as_str()))
            .bind(("created_at", input.created_at))
            .bind((
                "expires_at",
                input.expires_at.format(EXPIRES_AT_FORMAT).to_string(),
            ))
            .await
            .and_then(|r| r.check())
            .map_err(|e| statement_error("certificate", e));

        let mut result = match created {
            Ok(result) => result,
            Err(e) => {
                // The certificate row was not written; drop the orphaned name.
                let cleanup = self
                    .db
                    .query("DELETE type::record('distinguished_name', $id)")
                    .bind(("id", dn_id_str))
                    .await
                    .and_then(|r| r.check());
                if let Err(cleanup_err) = cleanup {
                    warn!(
                        %dn_id,
                        error = %cleanup_err,
                        "Could not remove orphaned distinguished name"
                    );
                }
                return Err(e.into());
            }
        };

        let rows: Vec<CertificateRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "certificate".into(),
            id: id_str,
        })?;

        debug!(certificate_id = %id, %dn_id, "Stored pending certificate");
        Ok(row.into_certificate(id, input.dn)?)
    }

    async fn get_by_id(&self, id: Uuid) -> TrustlineResult<Certificate> {
        let row = self.fetch_row(id).await?;
        Ok(self.hydrate(id, row).await?)
    }

    async fn mark_active(&self, id: Uuid) -> TrustlineResult<Certificate> {
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "UPDATE type::record('certificate', $id) \
                 SET status = 'Active' \
                 WHERE status = 'PendingGeneration'",
            )
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;
        let mut result = result.check().map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<CertificateRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "pending certificate".into(),
            id: id_str,
        })?;

        Ok(self.hydrate(id, row).await?)
    }

    async fn discard_pending(&self, id: Uuid) -> TrustlineResult<()> {
        let row = self.fetch_row(id).await?;
        if parse_status(&row.status)? != CertificateStatus::PendingGeneration {
            return Err(DbError::NotFound {
                entity: "pending certificate".into(),
                id: id.to_string(),
            }
            .into());
        }

        self.db
            .query(
                "DELETE type::record('certificate', $id) \
                 WHERE status = 'PendingGeneration'",
            )
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        self.db
            .query("DELETE type::record('distinguished_name', $id)")
            .bind(("id", row.dn_id))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        Ok(())
    }

    async fn claim_revocation(&self, id: Uuid) -> TrustlineResult<Option<Certificate>> {
        // Distinguishes a missing record from a lost claim.
        self.fetch_row(id).await?;

        let result = self
            .db
            .query(
                "UPDATE type::record('certificate', $id) \
                 SET status = 'Revoking' \
                 WHERE status = 'Active' AND revoked_at = NONE",
            )
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;
        let mut result = result.check().map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<CertificateRow> = result.take(0).map_err(DbError::from)?;
        match rows.into_iter().next() {
            Some(row) => Ok(Some(self.hydrate(id, row).await?)),
            None => Ok(None),
        }
    }

    async fn release_revocation(&self, id: Uuid) -> TrustlineResult<Certificate> {
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "UPDATE type::record('certificate', $id) \
                 SET status = 'Active' \
                 WHERE status = 'Revoking'",
            )
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;
        let mut result = result.check().map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<CertificateRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "revoking certificate".into(),
            id: id_str,
        })?;

        Ok(self.hydrate(id, row).await?)
    }

    async fn mark_revoked(
        &self,
        id: Uuid,
        revoked_at: DateTime<Utc>,
    ) -> TrustlineResult<Certificate> {
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "UPDATE type::record('certificate', $id) SET \
                 revoked_at = $revoked_at, \
                 revocation_key = $revocation_key, \
                 status = 'Revoked' \
                 WHERE status = 'Revoking' AND revoked_at = NONE",
            )
            .bind(("id", id_str.clone()))
            .bind(("revoked_at", revoked_at))
            .bind(("revocation_key", revocation_key(revoked_at)))
            .await
            .map_err(DbError::from)?;
        let mut result = result.check().map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<CertificateRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "revoking certificate".into(),
            id: id_str,
        })?;

        Ok(self.hydrate(id, row).await?)
    }

    async fn list_children(&self, parent_id: Uuid) -> TrustlineResult<Vec<Certificate>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM certificate \
                 WHERE parent_id = $parent_id \
                 ORDER BY created_at ASC",
            )
            .bind(("parent_id", parent_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CertificateRowWithId> = result.take(0).map_err(DbError::from)?;
        let mut children = Vec::with_capacity(rows.len());
        for row in rows {
            let (id, row) = row.split()?;
            children.push(self.hydrate(id, row).await?);
        }
        Ok(children)
    }

    async fn list_active(
        &self,
        pagination: Pagination,
    ) -> TrustlineResult<PaginatedResult<Certificate>> {
        Ok(self
            .list_by_status(CertificateStatus::Active, pagination)
            .await?)
    }

    async fn list_revoked(
        &self,
        pagination: Pagination,
    ) -> TrustlineResult<PaginatedResult<Certificate>> {
        Ok(self
            .list_by_status(CertificateStatus::Revoked, pagination)
            .await?)
    }
}
