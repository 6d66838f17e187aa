use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::DbToolsError;
use crate::kit::{DbCommand, DbConnection, DbKit, InfoMessageHandler, TransactionHandle};
use crate::params::{FromRowValue, Parameter, ParametersCollection, ToParamValue};
use crate::results::{DataReader, ResultSet};
use crate::types::{CommandType, ConnectionState, RowValues};

enum Execution {
    NonQuery,
    Reader,
    Scalar,
}

enum Outcome {
    Count(u64),
    Rows(ResultSet),
    Value(Option<RowValues>),
}

/// Owns one connection for the length of an operation, together with the
/// command, reader and transaction in flight on it.
///
/// Parameters added with [`DbManager::add_parameter`] are attached to every
/// command prepared afterwards until [`DbManager::clear_parameters`] runs.
/// Call [`DbManager::dispose`] on every exit path:
///
/// ```rust,no_run
/// # use std::sync::Arc;
/// # use db_tools::prelude::*;
/// # async fn run(kit: Arc<dyn DbKit>) -> Result<(), DbToolsError> {
/// let mut dbm = DbManager::create(kit, "Data Source=app.db", 0, None)?;
/// let result: Result<u64, DbToolsError> = async {
///     dbm.open().await?;
///     dbm.execute_non_query("DELETE FROM jobs").await
/// }
/// .await;
/// dbm.dispose().await;
/// result?;
/// # Ok(())
/// # }
/// ```
pub struct DbManager {
    kit: Arc<dyn DbKit>,
    connection: Option<Box<dyn DbConnection>>,
    command: Option<DbCommand>,
    reader: Option<DataReader>,
    transaction: Option<TransactionHandle>,
    parameters: ParametersCollection,
    command_timeout: u32,
}

impl DbManager {
    /// Build a manager around a fresh, unopened connection from `kit`.
    ///
    /// # Errors
    /// Returns [`DbToolsError::CannotCreateConnection`] when the kit cannot
    /// produce a connection for `connection_string`.
    pub fn create(
        kit: Arc<dyn DbKit>,
        connection_string: &str,
        command_timeout: u32,
        info_message: Option<InfoMessageHandler>,
    ) -> Result<Self, DbToolsError> {
        let connection = kit
            .connection(connection_string, info_message)
            .ok_or(DbToolsError::CannotCreateConnection)?;
        Ok(Self {
            kit,
            connection: Some(connection),
            command: None,
            reader: None,
            transaction: None,
            parameters: ParametersCollection::new(),
            command_timeout,
        })
    }

    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.connection
            .as_ref()
            .map_or(ConnectionState::Closed, |c| c.state())
    }

    #[must_use]
    pub fn connection_string(&self) -> &str {
        self.connection
            .as_deref()
            .map_or("", |c| c.connection_string())
    }

    #[must_use]
    pub fn database(&self) -> Option<String> {
        self.connection.as_ref().and_then(|c| c.database())
    }

    #[must_use]
    pub fn data_source(&self) -> Option<String> {
        self.connection.as_ref().and_then(|c| c.data_source())
    }

    fn connection_mut(&mut self) -> Result<&mut Box<dyn DbConnection>, DbToolsError> {
        self.connection
            .as_mut()
            .ok_or(DbToolsError::CannotCreateConnection)
    }

    /// Open the connection unless it is already open.
    ///
    /// # Errors
    /// Propagates the engine's connect failure.
    pub async fn open(&mut self) -> Result<(), DbToolsError> {
        let connection = self.connection_mut()?;
        match connection.state() {
            ConnectionState::Open => Ok(()),
            ConnectionState::Broken => {
                connection.close().await?;
                connection.open().await
            }
            ConnectionState::Closed => connection.open().await,
        }
    }

    /// Close the connection unless it is already closed.
    ///
    /// # Errors
    /// Propagates the engine's close failure.
    pub async fn close(&mut self) -> Result<(), DbToolsError> {
        match self.connection.as_mut() {
            Some(c) if c.state() != ConnectionState::Closed => {
                self.transaction = None;
                c.close().await
            }
            _ => Ok(()),
        }
    }

    /// Add a parameter for the commands that follow.
    ///
    /// # Errors
    /// Fails when a parameter with the same name is already held.
    pub fn add_parameter(&mut self, parameter: Parameter) -> Result<(), DbToolsError> {
        self.parameters.add(parameter)
    }

    /// Add a typed input parameter; see [`Parameter::typed`].
    ///
    /// # Errors
    /// Fails when a parameter with the same name is already held.
    pub fn add_value<T: ToParamValue>(
        &mut self,
        name: &str,
        value: T,
        check_default: bool,
    ) -> Result<(), DbToolsError> {
        self.parameters.add_value(name, value, check_default)
    }

    #[must_use]
    pub fn parameters(&self) -> &ParametersCollection {
        &self.parameters
    }

    pub fn clear_parameters(&mut self) {
        self.parameters.clear();
    }

    /// Start the single ambient transaction.
    ///
    /// # Errors
    /// Fails if a transaction is already open or the engine rejects it.
    pub async fn begin_transaction(&mut self) -> Result<(), DbToolsError> {
        if self.transaction.is_some() {
            return Err(DbToolsError::ExecutionError(
                "a transaction is already open on this connection".into(),
            ));
        }
        let handle = self.connection_mut()?.begin_transaction().await?;
        self.transaction = Some(handle);
        Ok(())
    }

    /// # Errors
    /// Fails if no transaction is open or the engine rejects the commit.
    pub async fn commit_transaction(&mut self) -> Result<(), DbToolsError> {
        let handle = self
            .transaction
            .take()
            .ok_or_else(|| DbToolsError::ExecutionError("no open transaction".into()))?;
        self.connection_mut()?.commit(handle).await
    }

    /// # Errors
    /// Fails if no transaction is open or the engine rejects the rollback.
    pub async fn rollback_transaction(&mut self) -> Result<(), DbToolsError> {
        let handle = self
            .transaction
            .take()
            .ok_or_else(|| DbToolsError::ExecutionError("no open transaction".into()))?;
        self.connection_mut()?.rollback(handle).await
    }

    fn prepare_command(
        &mut self,
        command_text: &str,
        command_type: CommandType,
    ) -> Result<(), DbToolsError> {
        let mut command = self.kit.command().ok_or(DbToolsError::CommandNotCreated)?;
        command.timeout_secs = self.command_timeout;
        command.command_type = command_type;
        command.text = command_text.to_string();
        command.transaction = self.transaction;
        command.parameters = self
            .parameters
            .iter()
            .filter_map(|p| self.kit.parameter(p))
            .collect();
        self.command = Some(command);
        Ok(())
    }

    async fn execute(
        &mut self,
        command_text: &str,
        command_type: CommandType,
        execution: Execution,
        cancel: Option<&CancellationToken>,
    ) -> Result<Outcome, DbToolsError> {
        self.prepare_command(command_text, command_type)?;
        let mut command = self.command.take().ok_or(DbToolsError::CommandNotCreated)?;
        debug!(command = %command.text, parameters = %self.parameters, "executing command");

        let connection = self
            .connection
            .as_mut()
            .ok_or(DbToolsError::CannotCreateConnection)?;
        let run = async {
            match execution {
                Execution::NonQuery => connection
                    .execute_non_query(&mut command)
                    .await
                    .map(Outcome::Count),
                Execution::Reader => connection
                    .execute_reader(&mut command)
                    .await
                    .map(Outcome::Rows),
                Execution::Scalar => connection
                    .execute_scalar(&mut command)
                    .await
                    .map(Outcome::Value),
            }
        };
        let result = match cancel {
            Some(token) => tokio::select! {
                biased;
                () = token.cancelled() => Err(DbToolsError::Cancelled),
                r = run => r,
            },
            None => run.await,
        };

        if matches!(result, Err(DbToolsError::Cancelled)) {
            // the driver may have been interrupted mid-response
            self.transaction = None;
            if let Some(c) = self.connection.as_mut() {
                if let Err(e) = c.close().await {
                    warn!(error = %e, "closing connection after cancellation failed");
                }
            }
        }

        if matches!(result, Ok(Outcome::Count(_))) {
            for native in command.returned_parameters() {
                if let Some(target) = self.parameters.get_mut(&native.name) {
                    target.value.clone_from(&native.value);
                }
            }
        }
        command.parameters.clear();
        self.command = Some(command);
        result
    }

    /// Run a command and return the first column of its first row, read as
    /// `T`. `None` when no row came back or the value is NULL.
    ///
    /// # Errors
    /// Propagates engine failures; returns [`DbToolsError::ConversionError`]
    /// when the value cannot be read as `T`.
    pub async fn execute_scalar<T: FromRowValue>(
        &mut self,
        command_text: &str,
    ) -> Result<Option<T>, DbToolsError> {
        self.execute_scalar_inner(command_text, CommandType::Text, None)
            .await
    }

    /// Cancellable [`DbManager::execute_scalar`].
    ///
    /// # Errors
    /// Returns [`DbToolsError::Cancelled`] when `cancel` fires first.
    pub async fn execute_scalar_with<T: FromRowValue>(
        &mut self,
        command_text: &str,
        command_type: CommandType,
        cancel: &CancellationToken,
    ) -> Result<Option<T>, DbToolsError> {
        self.execute_scalar_inner(command_text, command_type, Some(cancel))
            .await
    }

    async fn execute_scalar_inner<T: FromRowValue>(
        &mut self,
        command_text: &str,
        command_type: CommandType,
        cancel: Option<&CancellationToken>,
    ) -> Result<Option<T>, DbToolsError> {
        let outcome = self
            .execute(command_text, command_type, Execution::Scalar, cancel)
            .await?;
        let Outcome::Value(value) = outcome else {
            return Ok(None);
        };
        match value {
            None | Some(RowValues::Null) => Ok(None),
            Some(v) => T::from_row_value(&v).map(Some).ok_or_else(|| {
                DbToolsError::ConversionError(format!(
                    "scalar {v:?} cannot be read as {}",
                    std::any::type_name::<T>()
                ))
            }),
        }
    }

    /// Run a command that returns no rows. Output parameters are copied back
    /// into [`DbManager::parameters`].
    ///
    /// # Errors
    /// Propagates engine failures.
    pub async fn execute_non_query(&mut self, command_text: &str) -> Result<u64, DbToolsError> {
        self.execute_non_query_inner(command_text, CommandType::Text, None)
            .await
    }

    /// Cancellable [`DbManager::execute_non_query`].
    ///
    /// # Errors
    /// Returns [`DbToolsError::Cancelled`] when `cancel` fires first.
    pub async fn execute_non_query_with(
        &mut self,
        command_text: &str,
        command_type: CommandType,
        cancel: &CancellationToken,
    ) -> Result<u64, DbToolsError> {
        self.execute_non_query_inner(command_text, command_type, Some(cancel))
            .await
    }

    async fn execute_non_query_inner(
        &mut self,
        command_text: &str,
        command_type: CommandType,
        cancel: Option<&CancellationToken>,
    ) -> Result<u64, DbToolsError> {
        match self
            .execute(command_text, command_type, Execution::NonQuery, cancel)
            .await?
        {
            Outcome::Count(n) => Ok(n),
            Outcome::Rows(rs) => Ok(rs.rows_affected as u64),
            Outcome::Value(_) => Ok(0),
        }
    }

    /// Run a command and return a reader over its first result set. The
    /// reader stays owned by the manager until the next command or disposal.
    ///
    /// # Errors
    /// Propagates engine failures.
    pub async fn execute_reader(
        &mut self,
        command_text: &str,
    ) -> Result<&mut DataReader, DbToolsError> {
        self.execute_reader_inner(command_text, CommandType::Text, None)
            .await
    }

    /// Cancellable [`DbManager::execute_reader`].
    ///
    /// # Errors
    /// Returns [`DbToolsError::Cancelled`] when `cancel` fires first.
    pub async fn execute_reader_with(
        &mut self,
        command_text: &str,
        command_type: CommandType,
        cancel: &CancellationToken,
    ) -> Result<&mut DataReader, DbToolsError> {
        self.execute_reader_inner(command_text, command_type, Some(cancel))
            .await
    }

    async fn execute_reader_inner(
        &mut self,
        command_text: &str,
        command_type: CommandType,
        cancel: Option<&CancellationToken>,
    ) -> Result<&mut DataReader, DbToolsError> {
        self.reader = None;
        let rows = match self
            .execute(command_text, command_type, Execution::Reader, cancel)
            .await?
        {
            Outcome::Rows(rs) => rs,
            Outcome::Count(_) | Outcome::Value(_) => ResultSet::default(),
        };
        Ok(self.reader.insert(DataReader::new(rows)))
    }

    /// Tear down in order: close the connection, drop the command and the
    /// reader, roll back a transaction left open, drop the connection.
    pub async fn dispose(mut self) {
        let transaction = self.transaction.take();
        if let Some(c) = self.connection.as_mut() {
            if let Some(handle) = transaction {
                if c.state() == ConnectionState::Open {
                    if let Err(e) = c.rollback(handle).await {
                        warn!(error = %e, "rolling back abandoned transaction failed");
                    }
                }
            }
            if c.state() != ConnectionState::Closed {
                if let Err(e) = c.close().await {
                    warn!(error = %e, "closing connection failed during dispose");
                }
            }
        }
        self.command = None;
        self.reader = None;
        self.connection = None;
    }
}

impl Drop for DbManager {
    fn drop(&mut self) {
        if self.transaction.is_some() {
            warn!("manager dropped with an open transaction; the server rolls it back on disconnect");
        }
        self.command = None;
        self.reader = None;
        self.transaction = None;
        self.connection = None;
    }
}

impl fmt::Debug for DbManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbManager")
            .field("provider", &self.kit.provider())
            .field("state", &self.connection_state())
            .field("transaction", &self.transaction)
            .field("parameters", &self.parameters.len())
            .finish()
    }
}
