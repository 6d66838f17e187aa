use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::client::{ClientCore, DbClient, not_implemented};
use crate::error::DbToolsError;
use crate::errors::DbResult;
use crate::kit::ConnectionStringBuilder;
use crate::types::{BackupType, CommandType};

/// Administrative client for `SQLite` database files.
///
/// A database is its file, so backups are `VACUUM INTO` copies, the check is
/// `PRAGMA integrity_check` and statistics come from `ANALYZE`. Server level
/// operations report `NotImplemented`.
#[derive(Debug)]
pub struct SqliteDbClient {
    core: ClientCore,
}

impl SqliteDbClient {
    #[must_use]
    pub fn new(core: ClientCore) -> Self {
        Self { core }
    }

    async fn non_query(&self, operation: &str, text: &str, cancel: &CancellationToken) -> DbResult<()> {
        let mut dbm = self.core.acquire(operation, cancel).await?;
        let result: Result<u64, DbToolsError> = async {
            dbm.open().await?;
            dbm.execute_non_query_with(text, CommandType::Text, cancel)
                .await
        }
        .await;
        self.core.finish(operation, dbm, result, cancel).await?;
        Ok(())
    }

    /// Path of the connected database file.
    fn data_source(&self) -> Option<String> {
        ConnectionStringBuilder::parse(self.core.connection_string())
            .ok()
            .and_then(|b| b.data_source().map(str::to_string))
    }

    /// Schema holding `database`: `main` for the connected file, named
    /// either `main` or by its file stem, otherwise an attached schema.
    fn schema_name(&self, database: &str) -> String {
        let stem = self.data_source().and_then(|source| {
            Path::new(&source)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
        });
        if database.eq_ignore_ascii_case("main") || stem.as_deref() == Some(database) {
            "main".to_string()
        } else {
            database.to_string()
        }
    }

    /// `database` resolved against the folder of the connected file.
    fn database_path(&self, database: &str) -> PathBuf {
        let path = Path::new(database);
        if path.is_absolute() {
            return path.to_path_buf();
        }
        let folder = self
            .data_source()
            .and_then(|source| Path::new(&source).parent().map(Path::to_path_buf))
            .unwrap_or_default();
        folder.join(path)
    }
}

/// SQL string literal with embedded quotes doubled.
fn literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Quoted identifier with embedded double quotes doubled.
fn identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[async_trait]
impl DbClient for SqliteDbClient {
    fn core(&self) -> &ClientCore {
        &self.core
    }

    async fn backup_database(
        &self,
        database: &str,
        backup_file: &str,
        backup_name: &str,
        backup_type: BackupType,
        compression: bool,
        cancel: &CancellationToken,
    ) -> DbResult<()> {
        let _ = (backup_name, compression);
        if backup_type != BackupType::Full {
            return not_implemented(self.provider(), "backup_database");
        }
        self.core
            .notify(&format!("Backup database {database} to {backup_file}..."), cancel)
            .await;
        self.non_query(
            "backup_database",
            &format!(
                "VACUUM {} INTO {}",
                identifier(&self.schema_name(database)),
                literal(backup_file)
            ),
            cancel,
        )
        .await
    }

    async fn check_repair_database(&self, database: &str, cancel: &CancellationToken) -> DbResult<()> {
        const OPERATION: &str = "check_repair_database";
        self.core
            .notify(&format!("Check database {database}..."), cancel)
            .await;
        let mut dbm = self.core.acquire(OPERATION, cancel).await?;
        let result: Result<(), DbToolsError> = async {
            dbm.open().await?;
            let reader = dbm
                .execute_reader_with("PRAGMA integrity_check", CommandType::Text, cancel)
                .await?;
            let mut problems = Vec::new();
            while reader.read() {
                match reader.get_string(0) {
                    Some(line) if line == "ok" => {}
                    Some(line) => problems.push(line),
                    None => {}
                }
            }
            if problems.is_empty() {
                Ok(())
            } else {
                Err(DbToolsError::ExecutionError(problems.join("; ")))
            }
        }
        .await;
        self.core.finish(OPERATION, dbm, result, cancel).await
    }

    async fn update_statistics(&self, database: &str, cancel: &CancellationToken) -> DbResult<()> {
        const OPERATION: &str = "update_statistics";
        if cancel.is_cancelled() {
            return self.core.fail(OPERATION, DbToolsError::Cancelled, cancel).await;
        }
        self.core
            .notify(&format!("Update Statistics for database {database}..."), cancel)
            .await;
        self.non_query(OPERATION, "ANALYZE", cancel).await
    }

    async fn is_database_exists(&self, database: &str, cancel: &CancellationToken) -> DbResult<bool> {
        let _ = cancel;
        let path = self.database_path(database);
        Ok(tokio::fs::try_exists(&path).await.unwrap_or(false))
    }

    async fn is_server_local(&self, cancel: &CancellationToken) -> DbResult<bool> {
        let _ = cancel;
        Ok(true)
    }

    async fn is_server_allows_compression(&self, cancel: &CancellationToken) -> DbResult<bool> {
        let _ = cancel;
        Ok(false)
    }
}
