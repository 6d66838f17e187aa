use super::connection::SqliteConnection;
use crate::kit::{ConnectionStringBuilder, DbCommand, DbConnection, DbKit, InfoMessageHandler};
use crate::types::DatabaseProvider;

/// Kit for `SQLite` database files. The engine raises no informational
/// messages, so a supplied handler is never called.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteKit;

impl DbKit for SqliteKit {
    fn provider(&self) -> DatabaseProvider {
        DatabaseProvider::SqLite
    }

    fn connection_string_builder(&self) -> Option<ConnectionStringBuilder> {
        Some(ConnectionStringBuilder::new())
    }

    fn connection(
        &self,
        connection_string: &str,
        _info_message: Option<InfoMessageHandler>,
    ) -> Option<Box<dyn DbConnection>> {
        Some(Box::new(SqliteConnection::new(connection_string)))
    }

    fn command(&self) -> Option<DbCommand> {
        Some(DbCommand::default())
    }
}
