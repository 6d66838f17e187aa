// Administrative clients - the operation set run against one server or file
//
// - models: value records produced by administrative queries
// - messages: progress channel long operations report through
// - ClientCore: manager acquisition, progress and error reporting shared by
//   every engine client
// - DbClient: the operation set; engines override what they can express

pub mod messages;
pub mod models;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::DbToolsError;
use crate::errors::{DbError, DbResult, fail};
use crate::kit::{DbKit, InfoMessageHandler};
use crate::manager::DbManager;
use crate::types::{BackupType, DatabaseProvider, DatabaseRecoveryModel};

pub use messages::{ChannelMessages, MessagesDataManager, ProgressMessage};
pub use models::{DatabaseInfo, DbServerInfo, RestoreFileModel};

/// State every engine client is built on: the kit, the connection string and
/// where progress and failures are reported.
#[derive(Clone)]
pub struct ClientCore {
    kit: Arc<dyn DbKit>,
    connection_string: String,
    command_timeout: u32,
    use_console: bool,
    messages: Option<Arc<dyn MessagesDataManager>>,
    user_name: Option<String>,
    info_message: Option<InfoMessageHandler>,
}

impl ClientCore {
    #[must_use]
    pub fn new(kit: Arc<dyn DbKit>, connection_string: impl Into<String>) -> Self {
        Self {
            kit,
            connection_string: connection_string.into(),
            command_timeout: 0,
            use_console: false,
            messages: None,
            user_name: None,
            info_message: None,
        }
    }

    /// Seconds before a command is abandoned; `0` waits forever.
    #[must_use]
    pub fn with_command_timeout(mut self, seconds: u32) -> Self {
        self.command_timeout = seconds;
        self
    }

    /// Echo failures to stderr as well as the log.
    #[must_use]
    pub fn with_console(mut self, use_console: bool) -> Self {
        self.use_console = use_console;
        self
    }

    #[must_use]
    pub fn with_messages(
        mut self,
        messages: Option<Arc<dyn MessagesDataManager>>,
        user_name: Option<String>,
    ) -> Self {
        self.messages = messages;
        self.user_name = user_name;
        self
    }

    /// Relay low-severity server messages here instead of failing commands.
    #[must_use]
    pub fn with_info_message(mut self, handler: Option<InfoMessageHandler>) -> Self {
        self.info_message = handler;
        self
    }

    #[must_use]
    pub fn kit(&self) -> &Arc<dyn DbKit> {
        &self.kit
    }

    #[must_use]
    pub fn provider(&self) -> DatabaseProvider {
        self.kit.provider()
    }

    #[must_use]
    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }

    #[must_use]
    pub fn use_console(&self) -> bool {
        self.use_console
    }

    /// A fresh, unopened manager.
    ///
    /// # Errors
    /// [`DbToolsError::CannotCreateConnection`] when the kit has no connection
    /// for this connection string.
    pub fn manager(&self) -> Result<DbManager, DbToolsError> {
        DbManager::create(
            Arc::clone(&self.kit),
            &self.connection_string,
            self.command_timeout,
            self.info_message.clone(),
        )
    }

    /// [`ClientCore::manager`] with the failure already reported for `operation`.
    ///
    /// # Errors
    /// `CannotCreateDatabaseConnection`.
    pub async fn acquire(
        &self,
        operation: &str,
        cancel: &CancellationToken,
    ) -> DbResult<DbManager> {
        match self.manager() {
            Ok(dbm) => Ok(dbm),
            Err(e) => self.fail(operation, e, cancel).await,
        }
    }

    /// Log a progress line and pass it to the message sink, if any.
    pub async fn notify(&self, message: &str, cancel: &CancellationToken) {
        info!(provider = self.provider().name(), "{message}");
        self.relay(message, cancel).await;
    }

    async fn relay(&self, message: &str, cancel: &CancellationToken) {
        if let Some(messages) = &self.messages {
            if let Err(e) = messages
                .send_message(self.user_name.as_deref(), message, cancel)
                .await
            {
                warn!(error = %e, "progress message was not delivered");
            }
        }
    }

    /// Log a failure as an error, echo it to the console when asked and relay
    /// it to the message sink.
    pub async fn report(&self, operation: &str, err: &DbError, cancel: &CancellationToken) {
        error!(operation, provider = self.provider().name(), code = err.code.as_str(), "{}", err.message);
        if self.use_console {
            eprintln!("{err}");
        }
        self.relay(&err.message, cancel).await;
    }

    /// Fold a native failure into the coded error of `operation` and report it.
    ///
    /// # Errors
    /// Always.
    pub async fn fail<T>(
        &self,
        operation: &str,
        err: DbToolsError,
        cancel: &CancellationToken,
    ) -> DbResult<T> {
        let err = DbError::from_tools_error(operation, err);
        self.report(operation, &err, cancel).await;
        fail(err)
    }

    /// Dispose `dbm` and turn `result` into the operation's outcome.
    ///
    /// # Errors
    /// The reported failure of `result`.
    pub async fn finish<T>(
        &self,
        operation: &str,
        dbm: DbManager,
        result: Result<T, DbToolsError>,
        cancel: &CancellationToken,
    ) -> DbResult<T> {
        dbm.dispose().await;
        match result {
            Ok(value) => Ok(value),
            Err(e) => self.fail(operation, e, cancel).await,
        }
    }

    /// Open and close a connection.
    ///
    /// # Errors
    /// `ConnectionServerDoesNotSpecified` for an empty connection string,
    /// `ConnectionFailed` when the connection cannot be opened and
    /// `DatabaseNameIsNotSpecified` when `with_database` is set but the
    /// connection string names no database.
    pub async fn test_connection(
        &self,
        with_database: bool,
        cancel: &CancellationToken,
    ) -> DbResult<()> {
        const OPERATION: &str = "test_connection";
        let mut dbm = self.acquire(OPERATION, cancel).await?;
        if dbm.connection_string().is_empty() {
            dbm.dispose().await;
            let err = DbError::connection_server_does_not_specified();
            self.report(OPERATION, &err, cancel).await;
            return fail(err);
        }

        let opened: Result<(), DbToolsError> = async {
            dbm.open().await?;
            dbm.close().await
        }
        .await;
        let database = dbm.database().unwrap_or_default();
        dbm.dispose().await;

        if let Err(e) = opened {
            let err = DbError::connection_failed(&e.to_string());
            self.report(OPERATION, &err, cancel).await;
            return fail(err);
        }
        if with_database && database.is_empty() {
            let err = DbError::database_name_is_not_specified();
            self.report(OPERATION, &err, cancel).await;
            return fail(err);
        }
        info!(provider = self.provider().name(), "Test Connection Succeeded");
        Ok(())
    }

    /// Run one command that returns no rows, optionally logging when it starts
    /// and finishes.
    ///
    /// # Errors
    /// The coded failure of the command.
    pub async fn execute_command(
        &self,
        command_text: &str,
        log_start: bool,
        log_finish: bool,
        cancel: &CancellationToken,
    ) -> DbResult<()> {
        const OPERATION: &str = "execute_command";
        let mut dbm = self.acquire(OPERATION, cancel).await?;
        let target = format!(
            "{}.{}",
            dbm.data_source().unwrap_or_default(),
            dbm.database().unwrap_or_default()
        );
        if log_start {
            self.notify(&format!("Start - {command_text} For Database - {target}"), cancel)
                .await;
        }
        let result: Result<u64, DbToolsError> = async {
            dbm.open().await?;
            dbm.execute_non_query_with(command_text, crate::types::CommandType::Text, cancel)
                .await
        }
        .await;
        self.finish(OPERATION, dbm, result, cancel).await?;
        if log_finish {
            self.notify(&format!("Finish - {command_text} For Database - {target}"), cancel)
                .await;
        }
        Ok(())
    }
}

impl fmt::Debug for ClientCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCore")
            .field("provider", &self.provider())
            .field("command_timeout", &self.command_timeout)
            .field("use_console", &self.use_console)
            .field("messages", &self.messages.is_some())
            .field("user_name", &self.user_name)
            .finish_non_exhaustive()
    }
}

/// Administrative operations against one server or database file.
///
/// Every operation returns its value or a non-empty list of coded errors and
/// never panics on a driver failure. Operations an engine cannot express
/// report `NotImplemented`.
#[async_trait]
pub trait DbClient: Send + Sync + fmt::Debug {
    fn core(&self) -> &ClientCore;

    fn provider(&self) -> DatabaseProvider {
        self.core().provider()
    }

    /// # Errors
    /// See [`ClientCore::test_connection`].
    async fn test_connection(&self, with_database: bool, cancel: &CancellationToken) -> DbResult<()> {
        self.core().test_connection(with_database, cancel).await
    }

    /// # Errors
    /// See [`ClientCore::execute_command`].
    async fn execute_command(
        &self,
        command_text: &str,
        log_start: bool,
        log_finish: bool,
        cancel: &CancellationToken,
    ) -> DbResult<()> {
        self.core()
            .execute_command(command_text, log_start, log_finish, cancel)
            .await
    }

    /// # Errors
    /// `NotImplemented` unless the engine supports backups.
    async fn backup_database(
        &self,
        database: &str,
        backup_file: &str,
        backup_name: &str,
        backup_type: BackupType,
        compression: bool,
        cancel: &CancellationToken,
    ) -> DbResult<()> {
        let _ = (database, backup_file, backup_name, backup_type, compression, cancel);
        not_implemented(self.provider(), "backup_database")
    }

    /// # Errors
    /// `NotImplemented` unless overridden.
    async fn verify_backup(
        &self,
        database: &str,
        backup_file: &str,
        cancel: &CancellationToken,
    ) -> DbResult<()> {
        let _ = (database, backup_file, cancel);
        not_implemented(self.provider(), "verify_backup")
    }

    /// # Errors
    /// `NotImplemented` unless overridden.
    async fn get_restore_files(
        &self,
        backup_file: &str,
        cancel: &CancellationToken,
    ) -> DbResult<Vec<RestoreFileModel>> {
        let _ = (backup_file, cancel);
        not_implemented(self.provider(), "get_restore_files")
    }

    /// # Errors
    /// `NotImplemented` unless overridden.
    #[allow(clippy::too_many_arguments)]
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
        let _ = (database, backup_file, files, data_folder, log_folder, separator, cancel);
        not_implemented(self.provider(), "restore_database")
    }

    /// # Errors
    /// `NotImplemented` unless overridden.
    async fn check_repair_database(&self, database: &str, cancel: &CancellationToken) -> DbResult<()> {
        let _ = (database, cancel);
        not_implemented(self.provider(), "check_repair_database")
    }

    /// # Errors
    /// `NotImplemented` unless overridden.
    async fn recompile_procedures(&self, database: &str, cancel: &CancellationToken) -> DbResult<()> {
        let _ = (database, cancel);
        not_implemented(self.provider(), "recompile_procedures")
    }

    /// # Errors
    /// `NotImplemented` unless overridden.
    async fn update_statistics(&self, database: &str, cancel: &CancellationToken) -> DbResult<()> {
        let _ = (database, cancel);
        not_implemented(self.provider(), "update_statistics")
    }

    /// # Errors
    /// `NotImplemented` unless overridden.
    async fn get_db_server_info(&self, cancel: &CancellationToken) -> DbResult<DbServerInfo> {
        let _ = cancel;
        not_implemented(self.provider(), "get_db_server_info")
    }

    /// # Errors
    /// `NotImplemented` unless overridden.
    async fn get_database_infos(&self, cancel: &CancellationToken) -> DbResult<Vec<DatabaseInfo>> {
        let _ = cancel;
        not_implemented(self.provider(), "get_database_infos")
    }

    /// # Errors
    /// `NotImplemented` unless overridden.
    async fn is_server_allows_compression(&self, cancel: &CancellationToken) -> DbResult<bool> {
        let _ = cancel;
        not_implemented(self.provider(), "is_server_allows_compression")
    }

    /// # Errors
    /// `NotImplemented` unless overridden.
    async fn is_server_local(&self, cancel: &CancellationToken) -> DbResult<bool> {
        let _ = cancel;
        not_implemented(self.provider(), "is_server_local")
    }

    /// # Errors
    /// `NotImplemented` unless overridden.
    async fn is_database_exists(&self, database: &str, cancel: &CancellationToken) -> DbResult<bool> {
        let _ = (database, cancel);
        not_implemented(self.provider(), "is_database_exists")
    }

    /// # Errors
    /// `NotImplemented` unless overridden.
    async fn set_default_folders(
        &self,
        backup_folder: &str,
        data_folder: &str,
        log_folder: &str,
        cancel: &CancellationToken,
    ) -> DbResult<()> {
        let _ = (backup_folder, data_folder, log_folder, cancel);
        not_implemented(self.provider(), "set_default_folders")
    }

    /// Engines without recovery models accept any request.
    ///
    /// # Errors
    /// Only from engines that override it.
    async fn change_database_recovery_model(
        &self,
        database: &str,
        model: DatabaseRecoveryModel,
        cancel: &CancellationToken,
    ) -> DbResult<()> {
        let _ = (database, model, cancel);
        Ok(())
    }

    /// # Errors
    /// `NotImplemented` unless overridden.
    async fn host_platform(&self, cancel: &CancellationToken) -> DbResult<String> {
        let _ = cancel;
        not_implemented(self.provider(), "host_platform")
    }

    /// # Errors
    /// `NotImplemented` unless overridden.
    async fn get_server_name(&self, cancel: &CancellationToken) -> DbResult<String> {
        let _ = cancel;
        not_implemented(self.provider(), "get_server_name")
    }
}

/// `NotImplemented` for `operation` on `provider`.
///
/// # Errors
/// Always.
pub fn not_implemented<T>(provider: DatabaseProvider, operation: &str) -> DbResult<T> {
    let err = DbError::not_implemented(provider.name(), operation);
    warn!(operation, provider = provider.name(), "{}", err.message);
    fail(err)
}
