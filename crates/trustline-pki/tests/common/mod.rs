//! Shared fixtures for lifecycle tests: an in-memory certificate store
//! and a crypto engine that records every call.

#![allow(dead_code)]

use std::sync::Mutex;
use std::time::Duration;

use chrono::{Duration as Days, NaiveDate, Utc};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use trustline_core::models::certificate::{Certificate, CertificateType, CreateCertificate};
use trustline_core::models::distinguished_name::DistinguishedNameFields;
use trustline_db::repository::SurrealCertificateRepository;
use trustline_pki::{
    CertificateLifecycle, CryptoEngine, EngineError, IssuanceSecrets, PkiConfig, SigningSecret,
};
use uuid::Uuid;

pub type Lifecycle = CertificateLifecycle<SurrealCertificateRepository<Db>, RecordingEngine>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    RootCa,
    IntermediateCa,
    ServerCert,
    ClientCert,
    RevokeServer,
    RevokeClient,
}

#[derive(Debug, Clone)]
pub struct Call {
    pub op: Op,
    pub certificate_id: Uuid,
    pub secret: String,
    pub parent_secret: Option<String>,
    pub csr_pem: Option<String>,
    pub revoked_at_set: bool,
}

/// Crypto engine fake: records calls, optionally fails or stalls.
#[derive(Default)]
pub struct RecordingEngine {
    calls: Mutex<Vec<Call>>,
    failing: Mutex<Option<Op>>,
    delay: Mutex<Option<Duration>>,
}

impl RecordingEngine {
    pub fn fail_on(&self, op: Op) {
        *self.failing.lock().unwrap() = Some(op);
    }

    pub fn stop_failing(&self) {
        *self.failing.lock().unwrap() = None;
    }

    pub fn stall_for(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, op: Op) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| c.op == op).count()
    }

    async fn handle(
        &self,
        op: Op,
        certificate: &Certificate,
        secret: &SigningSecret,
        parent_secret: Option<&SigningSecret>,
        csr_pem: Option<&str>,
    ) -> Result<(), EngineError> {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.calls.lock().unwrap().push(Call {
            op,
            certificate_id: certificate.id,
            secret: secret.expose().to_string(),
            parent_secret: parent_secret.map(|s| s.expose().to_string()),
            csr_pem: csr_pem.map(str::to_string),
            revoked_at_set: certificate.revoked_at.is_some(),
        });

        let failing = *self.failing.lock().unwrap();
        if failing == Some(op) {
            return Err(EngineError::Crypto("injected failure".into()));
        }
        Ok(())
    }
}

impl CryptoEngine for RecordingEngine {
    async fn generate_root_ca(
        &self,
        certificate: &Certificate,
        secret: &SigningSecret,
    ) -> Result<(), EngineError> {
        self.handle(Op::RootCa, certificate, secret, None, None).await
    }

    async fn generate_intermediate_ca(
        &self,
        certificate: &Certificate,
        secret: &SigningSecret,
        parent_secret: &SigningSecret,
    ) -> Result<(), EngineError> {
        self.handle(Op::IntermediateCa, certificate, secret, Some(parent_secret), None)
            .await
    }

    async fn generate_server_cert(
        &self,
        certificate: &Certificate,
        secret: &SigningSecret,
        csr_pem: Option<&str>,
    ) -> Result<(), EngineError> {
        self.handle(Op::ServerCert, certificate, secret, None, csr_pem)
            .await
    }

    async fn generate_client_cert(
        &self,
        certificate: &Certificate,
        secret: &SigningSecret,
        csr_pem: Option<&str>,
    ) -> Result<(), EngineError> {
        self.handle(Op::ClientCert, certificate, secret, None, csr_pem)
            .await
    }

    async fn revoke_server_cert(
        &self,
        certificate: &Certificate,
        secret: &SigningSecret,
    ) -> Result<(), EngineError> {
        self.handle(Op::RevokeServer, certificate, secret, None, None)
            .await
    }

    async fn revoke_client_cert(
        &self,
        certificate: &Certificate,
        secret: &SigningSecret,
    ) -> Result<(), EngineError> {
        self.handle(Op::RevokeClient, certificate, secret, None, None)
            .await
    }
}

/// Spin up an in-memory store, run migrations, and build a lifecycle
/// manager around it.
pub async fn setup_with(config: PkiConfig) -> Lifecycle {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    trustline_db::run_migrations(&db).await.unwrap();

    CertificateLifecycle::new(
        SurrealCertificateRepository::new(db),
        RecordingEngine::default(),
        config,
    )
}

pub async fn setup() -> Lifecycle {
    setup_with(PkiConfig::default()).await
}

pub fn dn(country: &str, state: &str, org: &str, common_name: &str) -> DistinguishedNameFields {
    DistinguishedNameFields {
        country_code: country.into(),
        state_or_province: state.into(),
        locality: "Amstelveen".into(),
        organization: org.into(),
        organizational_unit: "IT Department".into(),
        email: "ca@repleo.nl".into(),
        common_name: common_name.into(),
    }
}

/// DN matching the root's strict-policy fields.
pub fn repleo_dn(common_name: &str) -> DistinguishedNameFields {
    dn("NL", "Noord Holland", "Repleo", common_name)
}

pub fn in_days(days: i64) -> NaiveDate {
    (Utc::now() + Days::days(days)).date_naive()
}

pub fn request(
    cert_type: CertificateType,
    short_name: &str,
    dn: DistinguishedNameFields,
    parent_id: Option<Uuid>,
    days_valid: i64,
) -> CreateCertificate {
    CreateCertificate {
        cert_type,
        short_name: short_name.into(),
        name: None,
        dn,
        parent_id,
        crl_distribution_url: None,
        ocsp_distribution_host: None,
        expires_at: in_days(days_valid),
        csr_pem: None,
    }
}

pub fn secrets() -> IssuanceSecrets {
    IssuanceSecrets::new(SigningSecret::new("child-pass"))
}

pub fn ca_secrets() -> IssuanceSecrets {
    IssuanceSecrets::new(SigningSecret::new("ca-pass")).with_parent(SigningSecret::new("root-pass"))
}

pub fn revoke_secret() -> SigningSecret {
    SigningSecret::new("intermediate-pass")
}

/// Root (7300 days) → intermediate (3650 days), both active.
pub async fn root_and_intermediate(svc: &Lifecycle) -> (Certificate, Certificate) {
    let root = svc
        .create_certificate(
            request(CertificateType::Root, "root", repleo_dn("Repleo Root CA"), None, 7300),
            IssuanceSecrets::new(SigningSecret::new("root-pass")),
        )
        .await
        .unwrap();
    let intermediate = svc
        .create_certificate(
            request(
                CertificateType::Intermediate,
                "int",
                repleo_dn("Repleo Intermediate CA"),
                Some(root.id),
                3650,
            ),
            ca_secrets(),
        )
        .await
        .unwrap();
    (root, intermediate)
}

pub async fn server_under(svc: &Lifecycle, parent: Uuid, short_name: &str) -> Certificate {
    svc.create_certificate(
        request(
            CertificateType::Server,
            short_name,
            repleo_dn(&format!("{short_name}.repleo.nl")),
            Some(parent),
            365,
        ),
        secrets(),
    )
    .await
    .unwrap()
}
