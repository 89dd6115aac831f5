//! Schema definitions and migration runner for SurrealDB.
//!
//! All table definitions use SCHEMAFULL mode. Every attribute that is
//! frozen after creation is declared `READONLY`, so the database rejects
//! updates even if a caller bypasses the lifecycle layer. UUIDs are stored
//! as strings; enums are stored as strings with ASSERT constraints.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "ca_hierarchy",
    sql: SCHEMA_V1,
}];

// -----------------------------------------------------------------------
// Schema v1: distinguished names and certificates
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Distinguished names (owned 1:1 by a certificate, never updated)
-- =======================================================================
DEFINE TABLE distinguished_name SCHEMAFULL;
DEFINE FIELD country_code ON TABLE distinguished_name TYPE string \
    READONLY ASSERT string::len($value) = 2;
DEFINE FIELD state_or_province ON TABLE distinguished_name TYPE string \
    READONLY ASSERT string::len($value) <= 128;
DEFINE FIELD locality ON TABLE distinguished_name TYPE string \
    READONLY ASSERT string::len($value) <= 128;
DEFINE FIELD organization ON TABLE distinguished_name TYPE string \
    READONLY ASSERT string::len($value) <= 64;
DEFINE FIELD organizational_unit ON TABLE distinguished_name TYPE string \
    READONLY ASSERT string::len($value) <= 64;
DEFINE FIELD email ON TABLE distinguished_name TYPE string \
    READONLY ASSERT string::len($value) <= 64;
DEFINE FIELD common_name ON TABLE distinguished_name TYPE string \
    READONLY ASSERT string::len($value) <= 64;

-- =======================================================================
-- Certificates
-- =======================================================================
DEFINE TABLE certificate SCHEMAFULL;
DEFINE FIELD cert_type ON TABLE certificate TYPE string READONLY \
    ASSERT $value IN ['R', 'I', 'S', 'C', 'O'];
DEFINE FIELD short_name ON TABLE certificate TYPE string READONLY;
DEFINE FIELD name ON TABLE certificate TYPE string READONLY;
DEFINE FIELD dn_id ON TABLE certificate TYPE string READONLY;
DEFINE FIELD dn_subject ON TABLE certificate TYPE string READONLY;
DEFINE FIELD parent_id ON TABLE certificate TYPE option<string> READONLY;
DEFINE FIELD crl_distribution_url ON TABLE certificate \
    TYPE option<string> READONLY;
DEFINE FIELD ocsp_distribution_host ON TABLE certificate \
    TYPE option<string> READONLY;
DEFINE FIELD created_at ON TABLE certificate TYPE datetime READONLY;
DEFINE FIELD expires_at ON TABLE certificate TYPE string READONLY;
DEFINE FIELD status ON TABLE certificate TYPE string \
    ASSERT $value IN ['PendingGeneration', 'Active', 'Revoking', 'Revoked'];
DEFINE FIELD revoked_at ON TABLE certificate TYPE option<datetime>;
-- Mirrors revoked_at: empty while not revoked, so that all live rows of
-- a type collide in the unique indexes below.
DEFINE FIELD revocation_key ON TABLE certificate TYPE string DEFAULT '';
DEFINE INDEX idx_certificate_short_name ON TABLE certificate \
    COLUMNS short_name, cert_type, revocation_key UNIQUE;
DEFINE INDEX idx_certificate_dn_subject ON TABLE certificate \
    COLUMNS dn_subject, cert_type, revocation_key UNIQUE;
DEFINE INDEX idx_certificate_parent ON TABLE certificate \
    COLUMNS parent_id;
DEFINE INDEX idx_certificate_status ON TABLE certificate \
    COLUMNS status;
";

/// Apply all pending migrations.
///
/// Creates a `_migration` tracking table on first run, then applies
/// each migration whose version exceeds the current maximum.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let mut result = db
        .query("SELECT version FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS
        .iter()
        .filter(|m| m.version > current_version)
    {
        info!(
            version = migration.version,
            name = migration.name,
            "Applying migration"
        );
        db.query(migration.sql).await?.check().map_err(|e| {
            DbError::Migration(format!(
                "v{} '{}' failed: {}",
                migration.version, migration.name, e,
            ))
        })?;

        db.query("CREATE _migration SET version = $version, name = $name")
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "could not record v{}: {}",
                    migration.version, e,
                ))
            })?;
    }

    Ok(())
}

/// Latest schema version known to this build.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
}
