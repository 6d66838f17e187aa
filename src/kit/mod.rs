// Provider kits - per-engine factories for connections, commands and parameters
//
// This module holds the engine-independent contract:
// - connection_string: ordered key/value connection string builder and parser
// - the DbKit capability trait and the DbConnection trait every engine implements
// - DbCommand / NativeParameter, the command shape handed to a connection

pub mod connection_string;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::DbToolsError;
use crate::params::{ParamType, Parameter};
use crate::results::ResultSet;
use crate::types::{
    CommandType, ConnectionState, DatabaseProvider, ParameterDirection, RowValues, SourceVersion,
};

pub use connection_string::ConnectionStringBuilder;

/// A server warning or low-severity error relayed from the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoMessage {
    pub message: String,
    /// Severity class as reported by the server.
    pub class: u8,
}

/// Callback receiving [`InfoMessage`]s.
pub type InfoMessageHandler = Arc<dyn Fn(&InfoMessage) + Send + Sync>;

/// Opaque handle of the transaction open on a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransactionHandle(pub u64);

/// Engine-native form of a [`Parameter`].
#[derive(Debug, Clone, PartialEq)]
pub struct NativeParameter {
    pub name: String,
    pub param_type: ParamType,
    /// Engine type used when the parameter is declared, e.g. `nvarchar(max)`.
    pub native_type: Option<String>,
    /// User-defined table type of a structured parameter.
    pub type_name: Option<String>,
    pub structured: bool,
    pub direction: ParameterDirection,
    pub size: i32,
    pub precision: u8,
    pub scale: u8,
    pub source_column: Option<String>,
    pub source_version: SourceVersion,
    pub value: Option<RowValues>,
}

impl NativeParameter {
    /// Field-by-field copy of a portable parameter. An unset value on a
    /// parameter that carries input becomes NULL.
    #[must_use]
    pub fn from_portable(parameter: &Parameter) -> Self {
        Self {
            name: parameter.name.clone(),
            param_type: parameter.param_type,
            native_type: None,
            type_name: None,
            structured: false,
            direction: parameter.direction,
            size: parameter.size,
            precision: parameter.precision,
            scale: parameter.scale,
            source_column: parameter.source_column.clone(),
            source_version: parameter.source_version,
            value: parameter.bind_value(),
        }
    }

    /// Name without the engine prefix (`@`, `:` or `$`).
    #[must_use]
    pub fn bare_name(&self) -> &str {
        self.name.trim_start_matches(['@', ':', '$'])
    }
}

/// A command ready to run on a [`DbConnection`].
#[derive(Debug, Clone, Default)]
pub struct DbCommand {
    pub text: String,
    pub command_type: CommandType,
    /// Zero means no timeout.
    pub timeout_secs: u32,
    pub parameters: Vec<NativeParameter>,
    pub transaction: Option<TransactionHandle>,
}

impl DbCommand {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Parameters the engine writes back after execution.
    pub fn returned_parameters(&self) -> impl Iterator<Item = &NativeParameter> {
        self.parameters
            .iter()
            .filter(|p| p.direction.returns_value())
    }
}

/// Check that `command` is enlisted in the connection's active transaction.
///
/// # Errors
/// Returns [`DbToolsError::ExecutionError`] if a transaction is active and the
/// command carries a different one, or carries one while none is active.
pub fn check_transaction(
    command: &DbCommand,
    active: Option<TransactionHandle>,
) -> Result<(), DbToolsError> {
    match (active, command.transaction) {
        (None, None) => Ok(()),
        (Some(a), Some(c)) if a == c => Ok(()),
        (Some(_), _) => Err(DbToolsError::ExecutionError(
            "command is not enlisted in the active transaction".into(),
        )),
        (None, Some(_)) => Err(DbToolsError::ExecutionError(
            "command references a transaction that is not active".into(),
        )),
    }
}

/// A live connection to one engine.
#[async_trait]
pub trait DbConnection: Send + fmt::Debug {
    fn state(&self) -> ConnectionState;

    fn connection_string(&self) -> &str;

    /// Database the connection string targets, if any.
    fn database(&self) -> Option<String>;

    /// Server address or file path the connection string targets.
    fn data_source(&self) -> Option<String>;

    async fn open(&mut self) -> Result<(), DbToolsError>;

    async fn close(&mut self) -> Result<(), DbToolsError>;

    async fn begin_transaction(&mut self) -> Result<TransactionHandle, DbToolsError>;

    async fn commit(&mut self, transaction: TransactionHandle) -> Result<(), DbToolsError>;

    async fn rollback(&mut self, transaction: TransactionHandle) -> Result<(), DbToolsError>;

    /// Run a command that returns no rows. Output parameters are written back
    /// into `command.parameters`.
    async fn execute_non_query(&mut self, command: &mut DbCommand) -> Result<u64, DbToolsError>;

    /// Run a command and buffer its first result set.
    async fn execute_reader(&mut self, command: &mut DbCommand)
    -> Result<ResultSet, DbToolsError>;

    /// First column of the first row, `None` when no row came back.
    async fn execute_scalar(
        &mut self,
        command: &mut DbCommand,
    ) -> Result<Option<RowValues>, DbToolsError> {
        let result = self.execute_reader(command).await?;
        Ok(result
            .results
            .first()
            .and_then(|row| row.get_by_index(0))
            .cloned())
    }
}

/// Capability object of one engine.
///
/// Kits hold no per-operation state and are shared behind an `Arc`. Anything
/// an engine cannot produce comes back as `None`.
pub trait DbKit: Send + Sync + fmt::Debug {
    fn provider(&self) -> DatabaseProvider;

    fn connection_string_builder(&self) -> Option<ConnectionStringBuilder> {
        None
    }

    /// Build an unopened connection. With a handler, server messages of low
    /// severity are relayed to it instead of failing the command.
    fn connection(
        &self,
        connection_string: &str,
        info_message: Option<InfoMessageHandler>,
    ) -> Option<Box<dyn DbConnection>>;

    fn command(&self) -> Option<DbCommand> {
        None
    }

    fn parameter(&self, parameter: &Parameter) -> Option<NativeParameter> {
        Some(NativeParameter::from_portable(parameter))
    }

    /// Empty table-valued parameter for a list of GUIDs.
    fn guid_list_parameter(&self) -> Option<NativeParameter> {
        None
    }
}
