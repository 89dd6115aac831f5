//! Trustline Server: loads settings, prepares the certificate store and
//! reports the current inventory.

mod settings;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;
use trustline_core::repository::{CertificateRepository, Pagination};
use trustline_db::DbManager;

use crate::settings::{CONFIG_ENV, Settings, resolve_path};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("trustline=info".parse()?))
        .json()
        .init();

    let path = resolve_path(std::env::args().nth(1), std::env::var(CONFIG_ENV).ok());
    tracing::info!(config = %path.display(), "Starting Trustline server...");
    let settings = Settings::from_file(&path)?;

    let db = DbManager::connect(&settings.database)
        .await
        .context("Failed to open the certificate store")?;

    let certificates = db.certificates();
    let active = certificates.list_active(Pagination::default()).await?;
    let revoked = certificates.list_revoked(Pagination::default()).await?;
    tracing::info!(
        active = active.total,
        revoked = revoked.total,
        engine_timeout_secs = settings.pki.engine_timeout_secs,
        revoke_timeout_secs = settings.pki.revoke_timeout_secs,
        "Certificate inventory"
    );

    tracing::info!("Trustline server stopped.");
    Ok(())
}
