//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and functions
//! to make it easier to get started with the library.

pub use crate::auth::DbAuthSettings;
pub use crate::client::{
    ChannelMessages, ClientCore, DatabaseInfo, DbClient, DbServerInfo, MessagesDataManager,
    RestoreFileModel,
};
pub use crate::config::DbConnectionSettings;
pub use crate::error::DbToolsError;
pub use crate::errors::{DbError, DbErrors, DbResult, ErrorCode};
pub use crate::factory::{
    DbClientOptions, DbClientOptionsBuilder, get_db_client, get_kit, try_get_db_client,
};
pub use crate::kit::{
    ConnectionStringBuilder, DbCommand, DbConnection, DbKit, InfoMessage, InfoMessageHandler,
    NativeParameter, TransactionHandle,
};
pub use crate::manager::DbManager;
pub use crate::params::{
    FromRowValue, ParamType, Parameter, ParameterOptions, ParametersCollection, ToParamValue,
};
pub use crate::results::{CustomDbRow, DataReader, ResultSet};
pub use crate::types::{
    BackupType, CommandType, ConnectionState, DatabaseProvider, DatabaseRecoveryModel,
    ParameterDirection, RowValues,
};

#[cfg(feature = "mssql")]
pub use crate::mssql::{SqlDbClient, SqlKit};
#[cfg(feature = "sqlite")]
pub use crate::sqlite::{SqliteDbClient, SqliteKit};
