use std::sync::OnceLock;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::commands::{self, ServerVersion};
use crate::client::{ClientCore, DatabaseInfo, DbClient, DbServerInfo, RestoreFileModel};
use crate::error::DbToolsError;
use crate::errors::{DbError, DbResult, fail};
use crate::manager::DbManager;
use crate::types::{BackupType, CommandType, DatabaseRecoveryModel, RowValues};

/// Administrative client for SQL Server class engines.
///
/// Product version and instance name are read once per client and reused.
#[derive(Debug)]
pub struct SqlDbClient {
    core: ClientCore,
    product_version: OnceLock<String>,
    instance_name: OnceLock<String>,
}

impl SqlDbClient {
    #[must_use]
    pub fn new(core: ClientCore) -> Self {
        Self {
            core,
            product_version: OnceLock::new(),
            instance_name: OnceLock::new(),
        }
    }

    async fn server_string(
        dbm: &mut DbManager,
        query: &str,
        cancel: &CancellationToken,
        missing: fn() -> DbError,
    ) -> Result<String, DbToolsError> {
        dbm.open().await?;
        match dbm
            .execute_scalar_with::<String>(query, CommandType::Text, cancel)
            .await?
        {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(missing().into()),
        }
    }

    async fn product_version(
        &self,
        dbm: &mut DbManager,
        cancel: &CancellationToken,
    ) -> Result<String, DbToolsError> {
        if let Some(version) = self.product_version.get() {
            return Ok(version.clone());
        }
        let version = Self::server_string(
            dbm,
            commands::PRODUCT_VERSION_QUERY,
            cancel,
            DbError::product_version_is_not_detected,
        )
        .await?;
        Ok(self.product_version.get_or_init(|| version).clone())
    }

    async fn instance_name(
        &self,
        dbm: &mut DbManager,
        cancel: &CancellationToken,
    ) -> Result<String, DbToolsError> {
        if let Some(name) = self.instance_name.get() {
            return Ok(name.clone());
        }
        dbm.open().await?;
        let name = match dbm
            .execute_scalar_with::<String>(commands::INSTANCE_NAME_QUERY, CommandType::Text, cancel)
            .await?
        {
            None => commands::DEFAULT_INSTANCE_NAME.to_string(),
            Some(name) if name.trim().is_empty() => {
                return Err(DbError::server_instance_name_is_not_detected().into());
            }
            Some(name) => name,
        };
        Ok(self.instance_name.get_or_init(|| name).clone())
    }

    async fn server_version(
        &self,
        dbm: &mut DbManager,
        cancel: &CancellationToken,
    ) -> Result<(ServerVersion, String), DbToolsError> {
        let version = ServerVersion::parse(&self.product_version(dbm, cancel).await?)?;
        let instance = self.instance_name(dbm, cancel).await?;
        Ok((version, instance))
    }

    async fn reg_read(
        dbm: &mut DbManager,
        version: &ServerVersion,
        instance: &str,
        sub_folder: Option<&str>,
        parameter: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, DbToolsError> {
        dbm.open().await?;
        let query = version.reg_read_text(instance, sub_folder, parameter);
        let reader = dbm
            .execute_reader_with(&query, CommandType::Text, cancel)
            .await?;
        if reader.read() {
            return Ok(reader.get_string(1).filter(|v| !v.is_empty()));
        }
        Ok(None)
    }

    /// Configured folder, or the folder of the master file named by the
    /// startup argument `fallback_arg` when none is configured.
    async fn default_folder(
        dbm: &mut DbManager,
        version: &ServerVersion,
        instance: &str,
        parameter: &str,
        fallback_arg: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, DbToolsError> {
        if let Some(dir) = Self::reg_read(dbm, version, instance, None, parameter, cancel).await? {
            return Ok(Some(dir));
        }
        let master = Self::reg_read(dbm, version, instance, Some("Parameters"), fallback_arg, cancel).await?;
        Ok(master.as_deref().and_then(commands::master_dir))
    }

    async fn allows_compression(
        dbm: &mut DbManager,
        cancel: &CancellationToken,
    ) -> Result<bool, DbToolsError> {
        dbm.open().await?;
        let count = dbm
            .execute_scalar_with::<i64>(commands::COMPRESSION_QUERY, CommandType::Text, cancel)
            .await?
            .ok_or_else(DbError::execute_scalar_result_is_null)?;
        Ok(count == 1)
    }

    async fn server_info(
        &self,
        dbm: &mut DbManager,
        cancel: &CancellationToken,
    ) -> Result<DbServerInfo, DbToolsError> {
        let server_product_version = self.product_version(dbm, cancel).await?;
        let version = ServerVersion::parse(&server_product_version)?;
        let instance = self.instance_name(dbm, cancel).await?;
        let backup_directory =
            Self::reg_read(dbm, &version, &instance, None, "BackupDirectory", cancel).await?;
        let default_data_directory =
            Self::default_folder(dbm, &version, &instance, "DefaultData", "SqlArg0", cancel).await?;
        let default_log_directory =
            Self::default_folder(dbm, &version, &instance, "DefaultLog", "SqlArg1", cancel).await?;
        let allows_compression = Self::allows_compression(dbm, cancel).await?;
        let server_name = Self::server_string(
            dbm,
            commands::SERVER_NAME_QUERY,
            cancel,
            DbError::server_name_is_not_detected,
        )
        .await?;
        Ok(DbServerInfo {
            server_product_version,
            server_instance_name: instance,
            backup_directory,
            default_data_directory,
            default_log_directory,
            allows_compression,
            server_name,
        })
    }

    /// Rows of `query` run in `database`, mapped by `row`.
    async fn list_objects(
        dbm: &mut DbManager,
        database: &str,
        query: &str,
        cancel: &CancellationToken,
        row: fn(&crate::results::DataReader) -> Option<String>,
    ) -> Result<Vec<String>, DbToolsError> {
        dbm.open().await?;
        let text = format!("{}{query}", commands::use_database(database));
        let reader = dbm
            .execute_reader_with(&text, CommandType::Text, cancel)
            .await?;
        let mut names = Vec::new();
        while reader.read() {
            if cancel.is_cancelled() {
                return Err(DbToolsError::Cancelled);
            }
            if let Some(name) = row(reader) {
                names.push(name);
            }
        }
        Ok(names)
    }

    /// Run `command_for(object)` for each object. One object failing is
    /// logged and skipped; cancellation stops the loop.
    async fn for_each_object(
        &self,
        dbm: &mut DbManager,
        operation: &str,
        database: &str,
        objects: &[String],
        command_for: fn(&str, &str) -> String,
        cancel: &CancellationToken,
    ) -> Result<(), DbToolsError> {
        for object in objects {
            if cancel.is_cancelled() {
                return Err(DbToolsError::Cancelled);
            }
            dbm.open().await?;
            let text = command_for(database, object);
            match dbm
                .execute_non_query_with(&text, CommandType::Text, cancel)
                .await
            {
                Ok(_) => {}
                Err(DbToolsError::Cancelled) => return Err(DbToolsError::Cancelled),
                Err(e) => {
                    warn!(operation, database, object = %object, error = %e, "object skipped");
                    self.core
                        .notify(&format!("{database}: error in {operation} for {object}: {e}"), cancel)
                        .await;
                }
            }
        }
        Ok(())
    }

    async fn non_query(
        &self,
        operation: &str,
        text: &str,
        cancel: &CancellationToken,
    ) -> DbResult<u64> {
        let mut dbm = self.core.acquire(operation, cancel).await?;
        let result: Result<u64, DbToolsError> = async {
            dbm.open().await?;
            dbm.execute_non_query_with(text, CommandType::Text, cancel)
                .await
        }
        .await;
        self.core.finish(operation, dbm, result, cancel).await
    }
}

fn procedure_row(reader: &crate::results::DataReader) -> Option<String> {
    let owner = reader.get_string(1).unwrap_or_default();
    let listed = reader.get_string(2)?;
    let name = commands::procedure_base_name(&listed);
    commands::is_user_procedure(&owner, name)
        .then(|| commands::object_name(Some(owner.as_str()), name))
}

fn schema_object_row(reader: &crate::results::DataReader) -> Option<String> {
    let schema = reader.get_string(0);
    let name = reader.get_string(1)?;
    Some(commands::object_name(schema.as_deref(), &name))
}

#[async_trait]
impl DbClient for SqlDbClient {
    fn core(&self) -> &ClientCore {
        &self.core
    }

    async fn backup_database(
        &self,
        database: &str,
        backup_file: &str,
        backup_name: &str,
        backup_type: BackupType,
        compression: bool,
        cancel: &CancellationToken,
    ) -> DbResult<()> {
        self.core
            .notify(&format!("Backup database {database} to {backup_file}..."), cancel)
            .await;
        let text = commands::backup_command_text(
            database,
            backup_file,
            backup_name,
            backup_type,
            compression,
        );
        self.non_query("backup_database", &text, cancel).await?;
        Ok(())
    }

    async fn verify_backup(
        &self,
        database: &str,
        backup_file: &str,
        cancel: &CancellationToken,
    ) -> DbResult<()> {
        const OPERATION: &str = "verify_backup";
        self.core
            .notify(&format!("Verify backup {backup_file} of {database}..."), cancel)
            .await;
        let mut dbm = self.core.acquire(OPERATION, cancel).await?;
        let result: Result<(), DbToolsError> = async {
            dbm.open().await?;
            dbm.add_value("@database", database, false)?;
            let position = dbm
                .execute_scalar_with::<i64>(commands::LAST_BACKUP_SET_QUERY, CommandType::Text, cancel)
                .await?
                .ok_or_else(|| DbToolsError::ExecutionError(commands::backup_set_not_found(database)))?;
            dbm.clear_parameters();
            let text = commands::verify_command_text(backup_file, position);
            dbm.execute_non_query_with(&text, CommandType::Text, cancel)
                .await?;
            Ok(())
        }
        .await;
        self.core.finish(OPERATION, dbm, result, cancel).await
    }

    async fn get_restore_files(
        &self,
        backup_file: &str,
        cancel: &CancellationToken,
    ) -> DbResult<Vec<RestoreFileModel>> {
        const OPERATION: &str = "get_restore_files";
        let mut dbm = self.core.acquire(OPERATION, cancel).await?;
        let result: Result<Vec<RestoreFileModel>, DbToolsError> = async {
            dbm.open().await?;
            let text = commands::restore_file_list_text(backup_file);
            let reader = dbm
                .execute_reader_with(&text, CommandType::Text, cancel)
                .await?;
            let mut files = Vec::new();
            while reader.read() {
                if cancel.is_cancelled() {
                    return Err(DbToolsError::Cancelled);
                }
                let logical_name = reader.get("LogicalName").and_then(RowValues::as_text);
                let file_type = reader.get("Type").and_then(RowValues::as_text);
                if let (Some(name), Some(kind)) = (logical_name, file_type) {
                    files.push(RestoreFileModel::new(name, kind));
                }
            }
            Ok(files)
        }
        .await;
        self.core.finish(OPERATION, dbm, result, cancel).await
    }

    async fn restore_database(
        &self,
        database: &str,
        backup_file: &str,
        files: Option<&[RestoreFileModel]>,
        data_folder: &str,
        log_folder: &str,
        separator: &str,
        cancel: &CancellationToken,
    ) -> DbResult<()> {
        const OPERATION: &str = "restore_database";
        let targets = match commands::restore_file_targets(
            database,
            files,
            data_folder,
            log_folder,
            separator,
        ) {
            Ok(targets) => targets,
            Err(err) => {
                self.core.report(OPERATION, &err, cancel).await;
                return fail(err);
            }
        };
        self.core
            .notify(&format!("Restore database {database} from {backup_file}..."), cancel)
            .await;
        let text = commands::restore_command_text(database, backup_file, &targets);
        self.non_query(OPERATION, &text, cancel).await?;
        Ok(())
    }

    async fn check_repair_database(
        &self,
        database: &str,
        cancel: &CancellationToken,
    ) -> DbResult<()> {
        self.core
            .notify(&format!("Check database {database}..."), cancel)
            .await;
        let text = commands::check_database_text(database);
        self.non_query("check_repair_database", &text, cancel).await?;
        Ok(())
    }

    async fn recompile_procedures(
        &self,
        database: &str,
        cancel: &CancellationToken,
    ) -> DbResult<()> {
        const OPERATION: &str = "recompile_procedures";
        if cancel.is_cancelled() {
            return self.core.fail(OPERATION, DbToolsError::Cancelled, cancel).await;
        }
        self.core
            .notify(&format!("Recompiling procedures and triggers for database {database}..."), cancel)
            .await;
        let mut dbm = self.core.acquire(OPERATION, cancel).await?;
        let result: Result<(), DbToolsError> = async {
            let procedures = Self::list_objects(
                &mut dbm,
                database,
                commands::STORED_PROCEDURES_QUERY,
                cancel,
                procedure_row,
            )
            .await?;
            self.for_each_object(&mut dbm, OPERATION, database, &procedures, commands::recompile_text, cancel)
                .await?;
            let triggers = Self::list_objects(
                &mut dbm,
                database,
                commands::TRIGGERS_QUERY,
                cancel,
                schema_object_row,
            )
            .await?;
            self.for_each_object(&mut dbm, OPERATION, database, &triggers, commands::recompile_text, cancel)
                .await
        }
        .await;
        self.core.finish(OPERATION, dbm, result, cancel).await
    }

    async fn update_statistics(&self, database: &str, cancel: &CancellationToken) -> DbResult<()> {
        const OPERATION: &str = "update_statistics";
        if cancel.is_cancelled() {
            return self.core.fail(OPERATION, DbToolsError::Cancelled, cancel).await;
        }
        self.core
            .notify(&format!("Update Statistics for database {database}..."), cancel)
            .await;
        let mut dbm = self.core.acquire(OPERATION, cancel).await?;
        let result: Result<(), DbToolsError> = async {
            let tables = Self::list_objects(
                &mut dbm,
                database,
                commands::TABLES_QUERY,
                cancel,
                schema_object_row,
            )
            .await?;
            self.for_each_object(
                &mut dbm,
                OPERATION,
                database,
                &tables,
                commands::update_statistics_text,
                cancel,
            )
            .await
        }
        .await;
        self.core.finish(OPERATION, dbm, result, cancel).await
    }

    async fn get_db_server_info(&self, cancel: &CancellationToken) -> DbResult<DbServerInfo> {
        const OPERATION: &str = "get_db_server_info";
        let mut dbm = self.core.acquire(OPERATION, cancel).await?;
        let result = self.server_info(&mut dbm, cancel).await;
        self.core.finish(OPERATION, dbm, result, cancel).await
    }

    async fn get_database_infos(&self, cancel: &CancellationToken) -> DbResult<Vec<DatabaseInfo>> {
        const OPERATION: &str = "get_database_infos";
        let mut dbm = self.core.acquire(OPERATION, cancel).await?;
        let result: Result<Vec<DatabaseInfo>, DbToolsError> = async {
            dbm.open().await?;
            let reader = dbm
                .execute_reader_with(commands::DATABASES_QUERY, CommandType::Text, cancel)
                .await?;
            let mut infos = Vec::new();
            while reader.read() {
                if cancel.is_cancelled() {
                    return Err(DbToolsError::Cancelled);
                }
                let Some(name) = reader.get_string(0) else {
                    continue;
                };
                if name.eq_ignore_ascii_case(commands::TEMP_DATABASE) {
                    continue;
                }
                let code = reader.get_value::<i64>(1)?;
                let Some(recovery_model) = DatabaseRecoveryModel::from_code(code) else {
                    warn!(database = %name, code, "unknown recovery model, database skipped");
                    continue;
                };
                let flagged = reader
                    .get_by_index(2)
                    .and_then(RowValues::as_bool)
                    .unwrap_or(false);
                let is_system_database = flagged
                    || commands::SYSTEM_DATABASES
                        .iter()
                        .any(|s| s.eq_ignore_ascii_case(&name));
                infos.push(DatabaseInfo {
                    name,
                    recovery_model,
                    is_system_database,
                });
            }
            Ok(infos)
        }
        .await;
        self.core.finish(OPERATION, dbm, result, cancel).await
    }

    async fn is_server_allows_compression(&self, cancel: &CancellationToken) -> DbResult<bool> {
        const OPERATION: &str = "is_server_allows_compression";
        let mut dbm = self.core.acquire(OPERATION, cancel).await?;
        let result = Self::allows_compression(&mut dbm, cancel).await;
        self.core.finish(OPERATION, dbm, result, cancel).await
    }

    async fn is_server_local(&self, cancel: &CancellationToken) -> DbResult<bool> {
        const OPERATION: &str = "is_server_local";
        let mut dbm = self.core.acquire(OPERATION, cancel).await?;
        let result = Self::server_string(
            &mut dbm,
            commands::CLIENT_NET_ADDRESS_QUERY,
            cancel,
            DbError::client_net_address_is_not_detected,
        )
        .await
        .map(|address| commands::LOCAL_ADDRESSES.contains(&address.as_str()));
        self.core.finish(OPERATION, dbm, result, cancel).await
    }

    async fn is_database_exists(&self, database: &str, cancel: &CancellationToken) -> DbResult<bool> {
        const OPERATION: &str = "is_database_exists";
        let mut dbm = self.core.acquire(OPERATION, cancel).await?;
        let result: Result<bool, DbToolsError> = async {
            dbm.open().await?;
            dbm.add_value("@database", database, false)?;
            let count = dbm
                .execute_scalar_with::<i64>(commands::DATABASE_EXISTS_QUERY, CommandType::Text, cancel)
                .await?
                .ok_or_else(DbError::execute_scalar_result_is_null)?;
            Ok(count > 0)
        }
        .await;
        self.core.finish(OPERATION, dbm, result, cancel).await
    }

    async fn set_default_folders(
        &self,
        backup_folder: &str,
        data_folder: &str,
        log_folder: &str,
        cancel: &CancellationToken,
    ) -> DbResult<()> {
        const OPERATION: &str = "set_default_folders";
        let mut dbm = self.core.acquire(OPERATION, cancel).await?;
        let result: Result<(), DbToolsError> = async {
            let (version, instance) = self.server_version(&mut dbm, cancel).await?;
            dbm.open().await?;
            for (parameter, value) in [
                ("BackupDirectory", backup_folder),
                ("DefaultData", data_folder),
                ("DefaultLog", log_folder),
            ] {
                let text = version.reg_write_text(&instance, None, parameter, value);
                let written = dbm
                    .execute_non_query_with(&text, CommandType::Text, cancel)
                    .await?;
                if written != 1 {
                    return Err(DbError::error_write_reg_data(parameter, value).into());
                }
            }
            Ok(())
        }
        .await;
        self.core.finish(OPERATION, dbm, result, cancel).await
    }

    async fn change_database_recovery_model(
        &self,
        database: &str,
        model: DatabaseRecoveryModel,
        cancel: &CancellationToken,
    ) -> DbResult<()> {
        self.core
            .notify(
                &format!("Set recovery model of {database} to {}...", model.keyword()),
                cancel,
            )
            .await;
        let text = commands::change_recovery_model_text(database, model);
        self.non_query("change_database_recovery_model", &text, cancel)
            .await?;
        Ok(())
    }

    async fn host_platform(&self, cancel: &CancellationToken) -> DbResult<String> {
        const OPERATION: &str = "host_platform";
        let mut dbm = self.core.acquire(OPERATION, cancel).await?;
        let result = Self::server_string(
            &mut dbm,
            commands::HOST_PLATFORM_QUERY,
            cancel,
            DbError::server_string_is_null,
        )
        .await;
        self.core.finish(OPERATION, dbm, result, cancel).await
    }

    async fn get_server_name(&self, cancel: &CancellationToken) -> DbResult<String> {
        const OPERATION: &str = "get_server_name";
        let mut dbm = self.core.acquire(OPERATION, cancel).await?;
        let result = Self::server_string(
            &mut dbm,
            commands::SERVER_NAME_QUERY,
            cancel,
            DbError::server_name_is_not_detected,
        )
        .await;
        self.core.finish(OPERATION, dbm, result, cancel).await
    }
}
