//! Integration tests for schema initialization using in-memory SurrealDB.

use surrealdb::Surreal;
use surrealdb::engine::local::Mem;

async fn setup() -> Surreal<surrealdb::engine::local::Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    trustline_db::run_migrations(&db).await.unwrap();
    db
}

#[tokio::test]
async fn schema_migration_applies_successfully() {
    let db = setup().await;

    let mut result = db.query("INFO FOR DB").await.unwrap();
    let info: Option<surrealdb_types::Value> = result.take(0).unwrap();
    let info_str = format!("{:?}", info.expect("INFO FOR DB should return a value"));

    assert!(
        info_str.contains("distinguished_name"),
        "missing distinguished_name table"
    );
    assert!(info_str.contains("certificate"), "missing certificate table");
    assert!(info_str.contains("_migration"), "missing _migration table");
}

#[tokio::test]
async fn migration_is_idempotent() {
    let db = setup().await;
    trustline_db::run_migrations(&db).await.unwrap();

    let mut result = db.query("SELECT * FROM _migration").await.unwrap();
    let records: Vec<surrealdb_types::Value> = result.take(0).unwrap();
    assert_eq!(
        records.len(),
        trustline_db::latest_version() as usize,
        "expected one record per migration"
    );
}

#[tokio::test]
async fn readonly_dn_fields_reject_updates() {
    let db = setup().await;

    db.query(
        "CREATE distinguished_name:dn1 SET \
         country_code = 'NL', state_or_province = 'Noord Holland', \
         locality = 'Amstelveen', organization = 'Repleo', \
         organizational_unit = 'IT', email = 'ca@repleo.nl', \
         common_name = 'Repleo Root'",
    )
    .await
    .unwrap()
    .check()
    .unwrap();

    let result = db
        .query("UPDATE distinguished_name:dn1 SET organization = 'Other'")
        .await
        .unwrap()
        .check();
    assert!(result.is_err(), "readonly field update should be rejected");
}

#[tokio::test]
async fn unknown_certificate_type_is_rejected() {
    let db = setup().await;

    let result = db
        .query(
            "CREATE certificate SET cert_type = 'X', short_name = 'x', \
             name = 'x', dn_id = 'd', dn_subject = '/CN=x', \
             status = 'Active', created_at = time::now(), \
             expires_at = '2040-01-01'",
        )
        .await
        .unwrap()
        .check();
    assert!(result.is_err(), "cert_type outside R/I/S/C/O should fail");
}
