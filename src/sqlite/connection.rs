use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use super::params::{bind_named, named_values};
use super::query::build_result_set;
use crate::error::DbToolsError;
use crate::kit::{
    ConnectionStringBuilder, DbCommand, DbConnection, TransactionHandle, check_transaction,
};
use crate::results::ResultSet;
use crate::types::{CommandType, ConnectionState};

/// `SQLite` connection. Every call runs on the blocking pool against a
/// connection shared behind a mutex.
#[derive(Debug)]
pub struct SqliteConnection {
    connection_string: String,
    conn: Option<Arc<Mutex<rusqlite::Connection>>>,
    state: ConnectionState,
    transaction: Option<TransactionHandle>,
    next_transaction: u64,
}

impl SqliteConnection {
    #[must_use]
    pub fn new(connection_string: &str) -> Self {
        Self {
            connection_string: connection_string.to_string(),
            conn: None,
            state: ConnectionState::Closed,
            transaction: None,
            next_transaction: 1,
        }
    }

    fn path(&self) -> Option<String> {
        let builder = ConnectionStringBuilder::parse(&self.connection_string).ok()?;
        builder.data_source().map(str::to_string)
    }

    /// Run `func` against the open connection on the blocking pool.
    async fn with_connection<F, R>(&self, func: F) -> Result<R, DbToolsError>
    where
        F: FnOnce(&mut rusqlite::Connection) -> Result<R, DbToolsError> + Send + 'static,
        R: Send + 'static,
    {
        let conn = match (self.state, &self.conn) {
            (ConnectionState::Open, Some(conn)) => Arc::clone(conn),
            _ => {
                return Err(DbToolsError::ConnectionError(
                    "connection is not open".into(),
                ));
            }
        };
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| DbToolsError::ConnectionError("SQLite connection lock poisoned".into()))?;
            func(&mut guard)
        })
        .await?
    }

    async fn batch(&self, sql: &'static str) -> Result<(), DbToolsError> {
        self.with_connection(move |conn| Ok(conn.execute_batch(sql)?))
            .await
    }

    fn statement_text(command: &DbCommand) -> Result<String, DbToolsError> {
        match command.command_type {
            CommandType::Text => Ok(command.text.clone()),
            CommandType::TableDirect => Ok(format!("SELECT * FROM {}", command.text)),
            CommandType::StoredProcedure => Err(DbToolsError::Unimplemented(
                "stored procedures on SQLite".into(),
            )),
        }
    }
}

fn apply_timeout(conn: &rusqlite::Connection, timeout_secs: u32) -> Result<(), DbToolsError> {
    if timeout_secs > 0 {
        conn.busy_timeout(Duration::from_secs(u64::from(timeout_secs)))?;
    }
    Ok(())
}

#[async_trait]
impl DbConnection for SqliteConnection {
    fn state(&self) -> ConnectionState {
        self.state
    }

    fn connection_string(&self) -> &str {
        &self.connection_string
    }

    /// File stem of the database file.
    fn database(&self) -> Option<String> {
        let path = self.path()?;
        Path::new(&path)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| !s.is_empty())
    }

    fn data_source(&self) -> Option<String> {
        self.path()
    }

    async fn open(&mut self) -> Result<(), DbToolsError> {
        if self.state == ConnectionState::Open {
            return Ok(());
        }
        let path = self
            .path()
            .ok_or_else(|| DbToolsError::ConfigError("Data Source is not specified".into()))?;
        let opened = path.clone();
        let conn = tokio::task::spawn_blocking(move || rusqlite::Connection::open(opened)).await??;
        self.conn = Some(Arc::new(Mutex::new(conn)));
        self.state = ConnectionState::Open;
        self.transaction = None;
        info!(data_source = %path, "SQLite connection opened");
        Ok(())
    }

    async fn close(&mut self) -> Result<(), DbToolsError> {
        self.transaction = None;
        self.state = ConnectionState::Closed;
        self.conn = None;
        Ok(())
    }

    async fn begin_transaction(&mut self) -> Result<TransactionHandle, DbToolsError> {
        if self.transaction.is_some() {
            return Err(DbToolsError::ExecutionError(
                "a transaction is already open on this connection".into(),
            ));
        }
        self.batch("BEGIN").await?;
        let handle = TransactionHandle(self.next_transaction);
        self.next_transaction += 1;
        self.transaction = Some(handle);
        Ok(handle)
    }

    async fn commit(&mut self, transaction: TransactionHandle) -> Result<(), DbToolsError> {
        if self.transaction != Some(transaction) {
            return Err(DbToolsError::ExecutionError(
                "transaction is not active on this connection".into(),
            ));
        }
        self.batch("COMMIT").await?;
        self.transaction = None;
        Ok(())
    }

    async fn rollback(&mut self, transaction: TransactionHandle) -> Result<(), DbToolsError> {
        if self.transaction != Some(transaction) {
            return Err(DbToolsError::ExecutionError(
                "transaction is not active on this connection".into(),
            ));
        }
        self.transaction = None;
        self.batch("ROLLBACK").await
    }

    async fn execute_non_query(&mut self, command: &mut DbCommand) -> Result<u64, DbToolsError> {
        check_transaction(command, self.transaction)?;
        let sql = Self::statement_text(command)?;
        let values = named_values(&command.parameters)?;
        let timeout = command.timeout_secs;
        let changed = self
            .with_connection(move |conn| {
                apply_timeout(conn, timeout)?;
                if values.is_empty() {
                    conn.execute_batch(&sql)?;
                    return Ok(u64::try_from(conn.changes()).unwrap_or(0));
                }
                let mut stmt = conn.prepare(&sql)?;
                bind_named(&mut stmt, &values)?;
                Ok(u64::try_from(stmt.raw_execute()?).unwrap_or(0))
            })
            .await?;
        Ok(changed)
    }

    async fn execute_reader(
        &mut self,
        command: &mut DbCommand,
    ) -> Result<ResultSet, DbToolsError> {
        check_transaction(command, self.transaction)?;
        let sql = Self::statement_text(command)?;
        let values = named_values(&command.parameters)?;
        let timeout = command.timeout_secs;
        self.with_connection(move |conn| {
            apply_timeout(conn, timeout)?;
            let mut stmt = conn.prepare(&sql)?;
            build_result_set(&mut stmt, &values)
        })
        .await
    }
}
