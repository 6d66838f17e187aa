use thiserror::Error;

use crate::errors::DbError;

/// Native and internal faults raised below the administrative boundary.
///
/// Administrative operations never return this type; they fold it into a
/// [`DbError`] through [`DbError::from_tools_error`].
#[derive(Debug, Error)]
pub enum DbToolsError {
    #[cfg(feature = "mssql")]
    #[error(transparent)]
    MssqlError(#[from] tiberius::error::Error),

    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Cannot create Database connection")]
    CannotCreateConnection,

    #[error("db command does not create")]
    CommandNotCreated,

    #[error("Parameter error: {0}")]
    ParameterError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),

    #[error("Value conversion error: {0}")]
    ConversionError(String),

    #[error("Command timed out after {0} seconds")]
    Timeout(u32),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Unimplemented feature: {0}")]
    Unimplemented(String),

    #[error("{0}")]
    Reported(DbError),
}

impl From<DbError> for DbToolsError {
    fn from(err: DbError) -> Self {
        DbToolsError::Reported(err)
    }
}

impl From<tokio::task::JoinError> for DbToolsError {
    fn from(err: tokio::task::JoinError) -> Self {
        DbToolsError::ExecutionError(format!("blocking task join error: {err}"))
    }
}
