#![cfg(feature = "sqlite")]

use std::path::Path;
use std::sync::Arc;

use db_tools::prelude::*;
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

fn connection_string(path: &Path) -> String {
    format!("Data Source={}", path.display())
}

async fn seed(path: &Path) -> Result<(), DbToolsError> {
    let mut dbm = DbManager::create(Arc::new(SqliteKit), &connection_string(path), 0, None)?;
    let result = async {
        dbm.open().await?;
        dbm.execute_non_query(
            "CREATE TABLE orders (id INTEGER PRIMARY KEY, customer TEXT NOT NULL);
             CREATE INDEX ix_orders_customer ON orders (customer);
             INSERT INTO orders (customer) VALUES ('a'), ('b'), ('b');",
        )
        .await
    }
    .await;
    dbm.dispose().await;
    result.map(|_| ())
}

async fn scalar(path: &Path, query: &str) -> Result<Option<i64>, DbToolsError> {
    let mut dbm = DbManager::create(Arc::new(SqliteKit), &connection_string(path), 0, None)?;
    dbm.open().await?;
    let value = dbm.execute_scalar::<i64>(query).await;
    dbm.dispose().await;
    value
}

fn sqlite_client(path: &Path) -> Box<dyn DbClient> {
    DbClientOptions::builder(DatabaseProvider::SqLite, "", DbAuthSettings::Integrated)
        .database_name(Some(path.display().to_string()))
        .build()
        .unwrap()
}

#[tokio::test]
async fn full_backup_is_a_usable_copy() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let path = dir.path().join("shop.db");
    let backup = dir.path().join("shop-backup.db");
    seed(&path).await?;

    let client = sqlite_client(&path);
    assert_eq!(client.provider(), DatabaseProvider::SqLite);
    client
        .backup_database(
            "shop",
            &backup.display().to_string(),
            "shop-full",
            BackupType::Full,
            false,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(scalar(&backup, "SELECT count(*) FROM orders").await?, Some(3));
    Ok(())
}

#[tokio::test]
async fn backup_of_an_unknown_schema_fails() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let path = dir.path().join("shop.db");
    let backup = dir.path().join("archive-backup.db");
    seed(&path).await?;

    let errors = sqlite_client(&path)
        .backup_database(
            "archive",
            &backup.display().to_string(),
            "archive-full",
            BackupType::Full,
            false,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert_eq!(errors[0].code, ErrorCode::ErrorIn);
    assert!(errors[0].message.contains("backup_database"));
    assert!(!backup.exists());
    Ok(())
}

#[tokio::test]
async fn only_full_backups_are_supported()-> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let path = dir.path().join("shop.db");
    seed(&path).await?;
    let errors = sqlite_client(&path)
        .backup_database("shop", "x.db", "x", BackupType::Differential, false, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(errors[0].code, ErrorCode::NotImplemented);
    Ok(())
}

#[tokio::test]
async fn integrity_check_and_statistics() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let path = dir.path().join("shop.db");
    seed(&path).await?;
    let client = sqlite_client(&path);
    let cancel = CancellationToken::new();

    client.test_connection(true, &cancel).await.unwrap();
    client.check_repair_database("shop", &cancel).await.unwrap();
    client.update_statistics("shop", &cancel).await.unwrap();
    assert_eq!(
        scalar(&path, "SELECT count(*) FROM sqlite_master WHERE name = 'sqlite_stat1'").await?,
        Some(1)
    );

    cancel.cancel();
    let errors = client.update_statistics("shop", &cancel).await.unwrap_err();
    assert_eq!(errors[0].code, ErrorCode::CancellationRequested);
    Ok(())
}

#[tokio::test]
async fn existence_is_resolved_next_to_the_connected_file() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let path = dir.path().join("shop.db");
    seed(&path).await?;
    let client = sqlite_client(&path);
    let cancel = CancellationToken::new();

    assert!(client.is_database_exists("shop.db", &cancel).await.unwrap());
    assert!(!client.is_database_exists("archive.db", &cancel).await.unwrap());
    assert!(
        client
            .is_database_exists(&path.display().to_string(), &cancel)
            .await
            .unwrap()
    );
    Ok(())
}

#[tokio::test]
async fn server_level_operations() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let path = dir.path().join("shop.db");
    seed(&path).await?;
    let client = sqlite_client(&path);
    let cancel = CancellationToken::new();

    assert!(client.is_server_local(&cancel).await.unwrap());
    assert!(!client.is_server_allows_compression(&cancel).await.unwrap());
    let errors = client.get_database_infos(&cancel).await.unwrap_err();
    assert_eq!(errors[0].code, ErrorCode::NotImplemented);
    let errors = client
        .restore_database("shop", "b.db", None, "", "", "/", &cancel)
        .await
        .unwrap_err();
    assert_eq!(errors[0].code, ErrorCode::NotImplemented);
    client
        .change_database_recovery_model("shop", DatabaseRecoveryModel::Simple, &cancel)
        .await
        .unwrap();
    Ok(())
}
