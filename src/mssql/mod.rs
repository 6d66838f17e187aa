// MSSQL module - SQL Server class engines via Tiberius
//
// This module is split into several sub-modules:
// - connection: client creation and the DbConnection implementation
// - params: native type mapping and variable declarations
// - query: batch rewriting, parameter binding and result extraction
// - kit: the SqlKit capability object
// - commands: T-SQL text of the administrative commands
// - client: the SqlDbClient administrative client

pub mod client;
pub mod commands;
pub mod connection;
pub mod kit;
pub mod params;
pub(crate) mod query;

pub use client::SqlDbClient;
pub use connection::{MssqlClient, MssqlConnection, create_mssql_client};
pub use kit::{GUID_LIST_TYPE_NAME, SqlKit};
pub use params::SqlDbType;
