//! Provider-agnostic database administration.
//!
//! A [`DbKit`] knows how to talk to one engine; a [`DbManager`] owns one
//! connection for the length of an operation; a [`DbClient`] runs the
//! administrative operations (backup, restore, verify, integrity check,
//! recompile, statistics, server discovery) on top of them. Operations return
//! [`DbResult`], a value or a list of coded [`DbError`]s.
//!
//! ```rust,no_run
//! use db_tools::prelude::*;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> DbResult<()> {
//! let auth = DbAuthSettings::create(false, Some("sa"), Some("secret"), true)?;
//! let client = DbClientOptions::builder(DatabaseProvider::SqlServer, "db01", auth)
//!     .trust_server_certificate(true)
//!     .build()?;
//! let cancel = CancellationToken::new();
//! client
//!     .backup_database("Sales", r"D:\bak\Sales.bak", "Sales-Full", BackupType::Full, true, &cancel)
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod errors;
pub mod factory;
pub mod kit;
pub mod manager;
pub mod oledb;
pub mod params;
pub mod prelude;
pub mod results;
pub mod types;

#[cfg(feature = "mssql")]
pub mod mssql;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use auth::DbAuthSettings;
pub use client::{ClientCore, DbClient};
pub use error::DbToolsError;
pub use errors::{DbError, DbErrors, DbResult, ErrorCode};
pub use factory::{DbClientOptions, DbClientOptionsBuilder, get_db_client, get_kit, try_get_db_client};
pub use kit::{DbConnection, DbKit};
pub use manager::DbManager;
