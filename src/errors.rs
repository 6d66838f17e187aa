//! Error values returned across the administrative boundary.
//!
//! Operations never panic or propagate native driver faults to the caller.
//! They return [`DbResult`], whose error side is a non-empty, ordered list of
//! [`DbError`] values. Each value carries a closed [`ErrorCode`] so callers can
//! branch on the condition without parsing message text.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DbToolsError;

/// Ordered, non-empty collection of errors produced by one operation.
pub type DbErrors = Vec<DbError>;

/// Result type of every public administrative operation.
pub type DbResult<T> = Result<T, DbErrors>;

/// Closed set of failure conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    CannotCreateDatabaseConnection,
    ConnectionServerDoesNotSpecified,
    DatabaseNameIsNotSpecified,
    ConnectionFailed,
    NoRestoreFileNames,
    NoDataPart,
    NoLogPart,
    InvalidSqlServerProductVersion,
    InvalidSqlServerVersionParts,
    ServerStringIsNull,
    ProductVersionIsNotDetected,
    ServerInstanceNameIsNotDetected,
    ClientNetAddressIsNotDetected,
    ServerNameIsNotDetected,
    ErrorWriteRegData,
    ExecuteScalarResultIsNull,
    CancellationRequested,
    ErrorIn,
    IntegratedSecurityIsOffAndCredentialsMissing,
    DatabaseProviderIsNone,
    ServerAddressIsEmpty,
    DatabaseNameIsRequired,
    ProviderIsNotSupportedOnThisPlatform,
    NotImplemented,
}

impl ErrorCode {
    /// Stable textual name of the code.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::CannotCreateDatabaseConnection => "CannotCreateDatabaseConnection",
            ErrorCode::ConnectionServerDoesNotSpecified => "ConnectionServerDoesNotSpecified",
            ErrorCode::DatabaseNameIsNotSpecified => "DatabaseNameIsNotSpecified",
            ErrorCode::ConnectionFailed => "ConnectionFailed",
            ErrorCode::NoRestoreFileNames => "NoRestoreFileNames",
            ErrorCode::NoDataPart => "NoDataPart",
            ErrorCode::NoLogPart => "NoLogPart",
            ErrorCode::InvalidSqlServerProductVersion => "InvalidSqlServerProductVersion",
            ErrorCode::InvalidSqlServerVersionParts => "InvalidSqlServerVersionParts",
            ErrorCode::ServerStringIsNull => "ServerStringIsNull",
            ErrorCode::ProductVersionIsNotDetected => "ProductVersionIsNotDetected",
            ErrorCode::ServerInstanceNameIsNotDetected => "ServerInstanceNameIsNotDetected",
            ErrorCode::ClientNetAddressIsNotDetected => "ClientNetAddressIsNotDetected",
            ErrorCode::ServerNameIsNotDetected => "ServerNameIsNotDetected",
            ErrorCode::ErrorWriteRegData => "ErrorWriteRegData",
            ErrorCode::ExecuteScalarResultIsNull => "ExecuteScalarResultIsNull",
            ErrorCode::CancellationRequested => "CancellationRequested",
            ErrorCode::ErrorIn => "ErrorIn",
            ErrorCode::IntegratedSecurityIsOffAndCredentialsMissing => {
                "IntegratedSecurityIsOffAndCredentialsMissing"
            }
            ErrorCode::DatabaseProviderIsNone => "DatabaseProviderIsNone",
            ErrorCode::ServerAddressIsEmpty => "ServerAddressIsEmpty",
            ErrorCode::DatabaseNameIsRequired => "DatabaseNameIsRequired",
            ErrorCode::ProviderIsNotSupportedOnThisPlatform => {
                "ProviderIsNotSupportedOnThisPlatform"
            }
            ErrorCode::NotImplemented => "NotImplemented",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `(code, message)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbError {
    pub code: ErrorCode,
    pub message: String,
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for DbError {}

impl DbError {
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn cannot_create_database_connection() -> Self {
        Self::new(
            ErrorCode::CannotCreateDatabaseConnection,
            "Cannot create Database connection",
        )
    }

    #[must_use]
    pub fn connection_server_does_not_specified() -> Self {
        Self::new(
            ErrorCode::ConnectionServerDoesNotSpecified,
            "Connection Server does Not specified",
        )
    }

    #[must_use]
    pub fn database_name_is_not_specified() -> Self {
        Self::new(
            ErrorCode::DatabaseNameIsNotSpecified,
            "Test Connection Succeeded, But Database name does Not specified",
        )
    }

    #[must_use]
    pub fn connection_failed(message: &str) -> Self {
        Self::new(
            ErrorCode::ConnectionFailed,
            format!("Connection Failed {message}"),
        )
    }

    #[must_use]
    pub fn no_restore_file_names() -> Self {
        Self::new(
            ErrorCode::NoRestoreFileNames,
            "No information about restore file logical parts",
        )
    }

    #[must_use]
    pub fn no_data_part() -> Self {
        Self::new(
            ErrorCode::NoDataPart,
            "No information about restore file Data Part",
        )
    }

    #[must_use]
    pub fn no_log_part() -> Self {
        Self::new(
            ErrorCode::NoLogPart,
            "No information about restore file Log Part",
        )
    }

    #[must_use]
    pub fn invalid_sql_server_product_version() -> Self {
        Self::new(
            ErrorCode::InvalidSqlServerProductVersion,
            "Invalid Sql Server Product Version",
        )
    }

    #[must_use]
    pub fn invalid_sql_server_version_parts() -> Self {
        Self::new(
            ErrorCode::InvalidSqlServerVersionParts,
            "Invalid Sql Server Version Parts",
        )
    }

    #[must_use]
    pub fn server_string_is_null() -> Self {
        Self::new(ErrorCode::ServerStringIsNull, "Server string is null")
    }

    #[must_use]
    pub fn product_version_is_not_detected() -> Self {
        Self::new(
            ErrorCode::ProductVersionIsNotDetected,
            "Product Version is not detected",
        )
    }

    #[must_use]
    pub fn server_instance_name_is_not_detected() -> Self {
        Self::new(
            ErrorCode::ServerInstanceNameIsNotDetected,
            "Server Instance Name is not detected",
        )
    }

    #[must_use]
    pub fn client_net_address_is_not_detected() -> Self {
        Self::new(
            ErrorCode::ClientNetAddressIsNotDetected,
            "Client Net Address is not detected",
        )
    }

    #[must_use]
    pub fn server_name_is_not_detected() -> Self {
        Self::new(
            ErrorCode::ServerNameIsNotDetected,
            "Server name is not detected",
        )
    }

    #[must_use]
    pub fn error_write_reg_data(parameter_name: &str, new_value: &str) -> Self {
        Self::new(
            ErrorCode::ErrorWriteRegData,
            format!("Error Write Reg Data {parameter_name} => {new_value}"),
        )
    }

    #[must_use]
    pub fn execute_scalar_result_is_null() -> Self {
        Self::new(
            ErrorCode::ExecuteScalarResultIsNull,
            "ExecuteScalarAsync Result Is Null",
        )
    }

    #[must_use]
    pub fn cancellation_requested(operation: &str) -> Self {
        Self::new(
            ErrorCode::CancellationRequested,
            format!("Cancellation Requested in {operation}"),
        )
    }

    #[must_use]
    pub fn error_in(operation: &str, message: &str) -> Self {
        Self::new(
            ErrorCode::ErrorIn,
            format!("error in {operation}: {message}"),
        )
    }

    #[must_use]
    pub fn integrated_security_is_off_and_credentials_missing() -> Self {
        Self::new(
            ErrorCode::IntegratedSecurityIsOffAndCredentialsMissing,
            "WindowsNtIntegratedSecurity is off and serverUser does not specified or serverPass does not specified",
        )
    }

    #[must_use]
    pub fn database_provider_is_none() -> Self {
        Self::new(ErrorCode::DatabaseProviderIsNone, "Database Provider is None")
    }

    #[must_use]
    pub fn server_address_is_empty() -> Self {
        Self::new(
            ErrorCode::ServerAddressIsEmpty,
            "ServerAddress is empty, Cannot create database client",
        )
    }

    #[must_use]
    pub fn database_name_is_required(provider: &str) -> Self {
        Self::new(
            ErrorCode::DatabaseNameIsRequired,
            format!("{provider} requires a database file name"),
        )
    }

    #[must_use]
    pub fn provider_is_not_supported_on_this_platform(provider: &str) -> Self {
        Self::new(
            ErrorCode::ProviderIsNotSupportedOnThisPlatform,
            format!("{provider} is not supported on this platform"),
        )
    }

    #[must_use]
    pub fn not_implemented(provider: &str, operation: &str) -> Self {
        Self::new(
            ErrorCode::NotImplemented,
            format!("{operation} Is Not Implemented for {provider}"),
        )
    }

    /// Fold an internal fault into a public error value for `operation`.
    #[must_use]
    pub fn from_tools_error(operation: &str, err: DbToolsError) -> Self {
        match err {
            DbToolsError::Reported(err) => err,
            DbToolsError::Cancelled => Self::cancellation_requested(operation),
            DbToolsError::CannotCreateConnection => Self::cannot_create_database_connection(),
            other => Self::error_in(operation, &other.to_string()),
        }
    }
}

/// Wrap a single error value into the error side of a [`DbResult`].
#[must_use]
pub fn fail<T>(err: DbError) -> DbResult<T> {
    Err(vec![err])
}
