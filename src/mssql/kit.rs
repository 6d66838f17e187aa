use super::connection::MssqlConnection;
use super::params::{SqlDbType, assign_native_type};
use crate::kit::{
    ConnectionStringBuilder, DbCommand, DbConnection, DbKit, InfoMessageHandler, NativeParameter,
};
use crate::params::Parameter;
use crate::types::{DatabaseProvider, ParameterDirection, SourceVersion};

/// Table type expected by procedures taking a list of GUIDs.
pub const GUID_LIST_TYPE_NAME: &str = "uniqueidentifier_list_tbltype";

/// Kit for SQL Server class engines.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlKit;

impl DbKit for SqlKit {
    fn provider(&self) -> DatabaseProvider {
        DatabaseProvider::SqlServer
    }

    fn connection_string_builder(&self) -> Option<ConnectionStringBuilder> {
        Some(ConnectionStringBuilder::new())
    }

    fn connection(
        &self,
        connection_string: &str,
        info_message: Option<InfoMessageHandler>,
    ) -> Option<Box<dyn DbConnection>> {
        Some(Box::new(MssqlConnection::new(connection_string, info_message)))
    }

    fn command(&self) -> Option<DbCommand> {
        Some(DbCommand::default())
    }

    fn parameter(&self, parameter: &Parameter) -> Option<NativeParameter> {
        let mut native = NativeParameter::from_portable(parameter);
        assign_native_type(&mut native);
        Some(native)
    }

    fn guid_list_parameter(&self) -> Option<NativeParameter> {
        Some(NativeParameter {
            name: String::new(),
            param_type: SqlDbType::Structured.param_type(),
            native_type: None,
            type_name: Some(GUID_LIST_TYPE_NAME.to_string()),
            structured: true,
            direction: ParameterDirection::Input,
            size: 0,
            precision: 0,
            scale: 0,
            source_column: None,
            source_version: SourceVersion::Current,
            value: None,
        })
    }
}
