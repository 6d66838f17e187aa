use std::fmt;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tiberius::{Client, Config, SqlBrowser};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info};

use super::query::{
    PreparedBatch, build_result_set, execute_batch, execute_batch_with_returns, prepare_batch,
};
use crate::error::DbToolsError;
use crate::kit::{
    ConnectionStringBuilder, DbCommand, DbConnection, InfoMessage, InfoMessageHandler,
    TransactionHandle, check_transaction,
};
use crate::results::ResultSet;
use crate::types::ConnectionState;

/// Type alias for SQL Server client
pub type MssqlClient = Client<Compat<TcpStream>>;

/// Highest server error class relayed as an informational message when a
/// handler is attached. Anything above fails the command.
const MAX_INFO_MESSAGE_CLASS: u8 = 16;

/// Helper function to open a SQL Server client from an ADO.NET style
/// connection string.
///
/// Named instances are resolved through the SQL Browser service. A routing
/// answer from the server is followed once.
///
/// # Errors
/// Returns [`DbToolsError::ConnectionError`] if the address cannot be reached
/// and the driver error if the login fails.
pub async fn create_mssql_client(connection_string: &str) -> Result<MssqlClient, DbToolsError> {
    let config = Config::from_ado_string(connection_string)?;

    let tcp = TcpStream::connect_named(&config)
        .await
        .map_err(|e| DbToolsError::ConnectionError(format!("TCP connection error: {e}")))?;
    tcp.set_nodelay(true)
        .map_err(|e| DbToolsError::ConnectionError(format!("TCP configuration error: {e}")))?;

    match Client::connect(config.clone(), tcp.compat_write()).await {
        Ok(client) => Ok(client),
        Err(tiberius::error::Error::Routing { host, port }) => {
            debug!(%host, port, "SQL Server redirected the connection");
            let mut routed = config;
            routed.host(&host);
            routed.port(port);
            let tcp = TcpStream::connect(routed.get_addr()).await.map_err(|e| {
                DbToolsError::ConnectionError(format!("TCP connection error: {e}"))
            })?;
            Ok(Client::connect(routed, tcp.compat_write()).await?)
        }
        Err(e) => Err(e.into()),
    }
}

/// The informational form of a server message, `None` when its class is
/// severe enough to fail the command.
fn info_message(class: u8, message: &str) -> Option<InfoMessage> {
    (class <= MAX_INFO_MESSAGE_CLASS).then(|| InfoMessage {
        message: message.to_string(),
        class,
    })
}

/// SQL Server connection.
pub struct MssqlConnection {
    connection_string: String,
    client: Option<MssqlClient>,
    info_message: Option<InfoMessageHandler>,
    state: ConnectionState,
    transaction: Option<TransactionHandle>,
    next_transaction: u64,
}

impl MssqlConnection {
    #[must_use]
    pub fn new(connection_string: &str, info_message: Option<InfoMessageHandler>) -> Self {
        Self {
            connection_string: connection_string.to_string(),
            client: None,
            info_message,
            state: ConnectionState::Closed,
            transaction: None,
            next_transaction: 1,
        }
    }

    fn builder(&self) -> Option<ConnectionStringBuilder> {
        ConnectionStringBuilder::parse(&self.connection_string).ok()
    }

    fn client(&mut self) -> Result<&mut MssqlClient, DbToolsError> {
        match (self.state, self.client.as_mut()) {
            (ConnectionState::Open, Some(client)) => Ok(client),
            _ => Err(DbToolsError::ConnectionError(
                "connection is not open".into(),
            )),
        }
    }

    /// Move the client out for the duration of a request; callers put it back.
    fn take_client(&mut self) -> Result<MssqlClient, DbToolsError> {
        if self.state != ConnectionState::Open {
            return Err(DbToolsError::ConnectionError(
                "connection is not open".into(),
            ));
        }
        self.client
            .take()
            .ok_or_else(|| DbToolsError::ConnectionError("connection is not open".into()))
    }

    /// Run `work` under the command timeout. A timed out or dropped request
    /// leaves the wire protocol mid-stream, so the connection is marked broken.
    async fn timed<T, F>(&mut self, timeout_secs: u32, work: F) -> Result<T, DbToolsError>
    where
        F: Future<Output = Result<T, DbToolsError>>,
    {
        self.state = ConnectionState::Broken;
        let result = if timeout_secs == 0 {
            work.await
        } else {
            match tokio::time::timeout(Duration::from_secs(u64::from(timeout_secs)), work).await {
                Ok(r) => r,
                Err(_) => return Err(DbToolsError::Timeout(timeout_secs)),
            }
        };
        self.state = ConnectionState::Open;
        result
    }

    /// Relay a low-severity server error to the info handler instead of
    /// failing. Returns the error back when it must propagate.
    fn relay_info(&self, err: DbToolsError) -> Result<(), DbToolsError> {
        let Some(handler) = &self.info_message else {
            return Err(err);
        };
        let relayed = match &err {
            DbToolsError::MssqlError(tiberius::error::Error::Server(token)) => {
                info_message(token.class(), token.message())
            }
            _ => None,
        };
        match relayed {
            Some(message) => {
                handler(&message);
                Ok(())
            }
            None => Err(err),
        }
    }

    async fn simple(&mut self, sql: &str) -> Result<(), DbToolsError> {
        let client = self.client()?;
        client.execute(sql, &[]).await?;
        Ok(())
    }

    fn batch(&self, command: &DbCommand, collect_returns: bool) -> Result<PreparedBatch, DbToolsError> {
        check_transaction(command, self.transaction)?;
        prepare_batch(command, collect_returns)
    }
}

impl fmt::Debug for MssqlConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MssqlConnection")
            .field("data_source", &self.data_source())
            .field("database", &self.database())
            .field("state", &self.state)
            .field("transaction", &self.transaction)
            .field("info_message", &self.info_message.is_some())
            .finish()
    }
}

#[async_trait]
impl DbConnection for MssqlConnection {
    fn state(&self) -> ConnectionState {
        self.state
    }

    fn connection_string(&self) -> &str {
        &self.connection_string
    }

    fn database(&self) -> Option<String> {
        self.builder()
            .and_then(|b| b.initial_catalog().map(str::to_string))
    }

    fn data_source(&self) -> Option<String> {
        self.builder()
            .and_then(|b| b.data_source().map(str::to_string))
    }

    async fn open(&mut self) -> Result<(), DbToolsError> {
        if self.state == ConnectionState::Open {
            return Ok(());
        }
        let client = create_mssql_client(&self.connection_string).await?;
        self.client = Some(client);
        self.state = ConnectionState::Open;
        self.transaction = None;
        info!(data_source = ?self.data_source(), "SQL Server connection opened");
        Ok(())
    }

    async fn close(&mut self) -> Result<(), DbToolsError> {
        self.transaction = None;
        self.state = ConnectionState::Closed;
        if let Some(client) = self.client.take() {
            client.close().await?;
        }
        Ok(())
    }

    async fn begin_transaction(&mut self) -> Result<TransactionHandle, DbToolsError> {
        if self.transaction.is_some() {
            return Err(DbToolsError::ExecutionError(
                "a transaction is already open on this connection".into(),
            ));
        }
        self.simple("BEGIN TRANSACTION").await?;
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
        self.simple("COMMIT TRANSACTION").await?;
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
        self.simple("IF @@TRANCOUNT > 0 ROLLBACK TRANSACTION").await
    }

    async fn execute_non_query(&mut self, command: &mut DbCommand) -> Result<u64, DbToolsError> {
        let batch = self.batch(command, true)?;
        let timeout = command.timeout_secs;
        let mut client = self.take_client()?;
        let result = if batch.returns.is_empty() {
            self.timed(timeout, execute_batch(&mut client, &batch))
                .await
                .map(|n| (n, Vec::new()))
        } else {
            self.timed(timeout, execute_batch_with_returns(&mut client, &batch))
                .await
        };
        self.client = Some(client);

        match result {
            Ok((rows, values)) => {
                for (name, value) in values {
                    if let Some(p) = command
                        .parameters
                        .iter_mut()
                        .find(|p| p.bare_name() == name.trim_start_matches('@'))
                    {
                        p.value = Some(value);
                    }
                }
                Ok(rows)
            }
            Err(e) => self.relay_info(e).map(|()| 0),
        }
    }

    async fn execute_reader(
        &mut self,
        command: &mut DbCommand,
    ) -> Result<ResultSet, DbToolsError> {
        let batch = self.batch(command, false)?;
        let timeout = command.timeout_secs;
        let mut client = self.take_client()?;
        let result = self
            .timed(timeout, build_result_set(&mut client, &batch))
            .await;
        self.client = Some(client);
        match result {
            Ok(rs) => Ok(rs),
            Err(e) => self.relay_info(e).map(|()| ResultSet::default()),
        }
    }
}
