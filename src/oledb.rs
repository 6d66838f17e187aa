//! Legacy desktop databases (MS Access) reached through OLE DB.
//!
//! There is no OLE DB driver for Rust, so the kit produces no connections
//! and the client reports every operation as not implemented, except
//! recovery-model changes, which the engine has no notion of.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::client::{ClientCore, DbClient, not_implemented};
use crate::errors::DbResult;
use crate::kit::{ConnectionStringBuilder, DbConnection, DbKit, InfoMessageHandler};
use crate::types::DatabaseProvider;

/// OLE DB provider named in generated connection strings.
pub const ACE_PROVIDER: &str = "Microsoft.ACE.OLEDB.12.0";

#[derive(Debug, Clone, Copy, Default)]
pub struct OleDbKit;

impl DbKit for OleDbKit {
    fn provider(&self) -> DatabaseProvider {
        DatabaseProvider::OleDb
    }

    fn connection_string_builder(&self) -> Option<ConnectionStringBuilder> {
        Some(ConnectionStringBuilder::new())
    }

    fn connection(
        &self,
        _connection_string: &str,
        _info_message: Option<InfoMessageHandler>,
    ) -> Option<Box<dyn DbConnection>> {
        None
    }
}

#[derive(Debug)]
pub struct OleDbClient {
    core: ClientCore,
}

impl OleDbClient {
    #[must_use]
    pub fn new(core: ClientCore) -> Self {
        Self { core }
    }
}

#[async_trait]
impl DbClient for OleDbClient {
    fn core(&self) -> &ClientCore {
        &self.core
    }

    async fn test_connection(&self, with_database: bool, cancel: &CancellationToken) -> DbResult<()> {
        let _ = (with_database, cancel);
        not_implemented(self.provider(), "test_connection")
    }

    async fn execute_command(
        &self,
        command_text: &str,
        log_start: bool,
        log_finish: bool,
        cancel: &CancellationToken,
    ) -> DbResult<()> {
        let _ = (command_text, log_start, log_finish, cancel);
        not_implemented(self.provider(), "execute_command")
    }
}
