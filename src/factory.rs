use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::auth::DbAuthSettings;
use crate::client::{ClientCore, DbClient, MessagesDataManager};
use crate::errors::{DbError, DbResult, fail};
use crate::kit::{ConnectionStringBuilder, DbKit, InfoMessageHandler};
use crate::oledb::{ACE_PROVIDER, OleDbClient, OleDbKit};
use crate::types::DatabaseProvider;

/// Everything needed to build an administrative client.
#[derive(Clone)]
pub struct DbClientOptions {
    pub provider: DatabaseProvider,
    pub server_address: String,
    pub auth: DbAuthSettings,
    pub trust_server_certificate: bool,
    pub application_name: Option<String>,
    pub database_name: Option<String>,
    pub use_console: bool,
    pub command_timeout: u32,
    pub messages: Option<Arc<dyn MessagesDataManager>>,
    pub user_name: Option<String>,
    pub info_message: Option<InfoMessageHandler>,
}

impl DbClientOptions {
    #[must_use]
    pub fn new(provider: DatabaseProvider, server_address: impl Into<String>, auth: DbAuthSettings) -> Self {
        Self {
            provider,
            server_address: server_address.into(),
            auth,
            trust_server_certificate: false,
            application_name: None,
            database_name: None,
            use_console: false,
            command_timeout: 0,
            messages: None,
            user_name: None,
            info_message: None,
        }
    }

    #[must_use]
    pub fn builder(
        provider: DatabaseProvider,
        server_address: impl Into<String>,
        auth: DbAuthSettings,
    ) -> DbClientOptionsBuilder {
        DbClientOptionsBuilder::new(provider, server_address, auth)
    }
}

impl fmt::Debug for DbClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbClientOptions")
            .field("provider", &self.provider)
            .field("server_address", &self.server_address)
            .field("auth", &self.auth)
            .field("trust_server_certificate", &self.trust_server_certificate)
            .field("application_name", &self.application_name)
            .field("database_name", &self.database_name)
            .field("use_console", &self.use_console)
            .field("command_timeout", &self.command_timeout)
            .field("messages", &self.messages.is_some())
            .field("user_name", &self.user_name)
            .finish_non_exhaustive()
    }
}

/// Fluent builder for [`DbClientOptions`].
#[derive(Debug, Clone)]
pub struct DbClientOptionsBuilder {
    opts: DbClientOptions,
}

impl DbClientOptionsBuilder {
    #[must_use]
    pub fn new(provider: DatabaseProvider, server_address: impl Into<String>, auth: DbAuthSettings) -> Self {
        Self {
            opts: DbClientOptions::new(provider, server_address, auth),
        }
    }

    #[must_use]
    pub fn trust_server_certificate(mut self, trust: bool) -> Self {
        self.opts.trust_server_certificate = trust;
        self
    }

    #[must_use]
    pub fn application_name(mut self, name: Option<String>) -> Self {
        self.opts.application_name = name;
        self
    }

    #[must_use]
    pub fn database_name(mut self, name: Option<String>) -> Self {
        self.opts.database_name = name;
        self
    }

    #[must_use]
    pub fn use_console(mut self, use_console: bool) -> Self {
        self.opts.use_console = use_console;
        self
    }

    #[must_use]
    pub fn command_timeout(mut self, seconds: u32) -> Self {
        self.opts.command_timeout = seconds;
        self
    }

    /// Send progress lines to `messages`, addressed to `user_name`.
    #[must_use]
    pub fn messages(mut self, messages: Arc<dyn MessagesDataManager>, user_name: Option<String>) -> Self {
        self.opts.messages = Some(messages);
        self.opts.user_name = user_name;
        self
    }

    #[must_use]
    pub fn info_message(mut self, handler: InfoMessageHandler) -> Self {
        self.opts.info_message = Some(handler);
        self
    }

    #[must_use]
    pub fn finish(self) -> DbClientOptions {
        self.opts
    }

    /// Build the client; see [`try_get_db_client`].
    ///
    /// # Errors
    /// The reason no client could be built.
    pub fn build(self) -> DbResult<Box<dyn DbClient>> {
        try_get_db_client(&self.finish())
    }
}

/// The kit of `provider`, `None` for providers without one.
#[must_use]
pub fn get_kit(provider: DatabaseProvider) -> Option<Arc<dyn DbKit>> {
    match provider {
        #[cfg(feature = "mssql")]
        DatabaseProvider::SqlServer => Some(Arc::new(crate::mssql::SqlKit)),
        #[cfg(feature = "sqlite")]
        DatabaseProvider::SqLite => Some(Arc::new(crate::sqlite::SqliteKit)),
        DatabaseProvider::OleDb => Some(Arc::new(OleDbKit)),
        _ => None,
    }
}

fn new_builder(kit: &Arc<dyn DbKit>) -> ConnectionStringBuilder {
    kit.connection_string_builder().unwrap_or_default()
}

/// Connection string for a SQL Server class engine.
#[must_use]
pub fn sql_server_connection_string(options: &DbClientOptions) -> String {
    let mut builder = ConnectionStringBuilder::new();
    builder.set("Data Source", options.server_address.as_str());
    match &options.auth {
        DbAuthSettings::Integrated => {
            builder.set("Integrated Security", "True");
        }
        DbAuthSettings::Sql { user, password } => {
            builder.set("Integrated Security", "False");
            builder.set("User ID", user.as_str());
            builder.set("Password", password.as_str());
        }
    }
    if let Some(name) = &options.application_name {
        builder.set("Application Name", name.as_str());
    }
    builder.set(
        "TrustServerCertificate",
        if options.trust_server_certificate { "True" } else { "False" },
    );
    if let Some(database) = &options.database_name {
        builder.set("Initial Catalog", database.as_str());
    }
    builder.to_string()
}

fn core(kit: Arc<dyn DbKit>, connection_string: String, options: &DbClientOptions) -> ClientCore {
    ClientCore::new(kit, connection_string)
        .with_command_timeout(options.command_timeout)
        .with_console(options.use_console)
        .with_messages(options.messages.clone(), options.user_name.clone())
        .with_info_message(options.info_message.clone())
}

fn require_database(options: &DbClientOptions) -> DbResult<&str> {
    match options.database_name.as_deref() {
        Some(name) if !name.trim().is_empty() => Ok(name),
        _ => fail(DbError::database_name_is_required(options.provider.name())),
    }
}

/// Build the administrative client `options` describe.
///
/// # Errors
/// `DatabaseProviderIsNone`, `ServerAddressIsEmpty` for a server engine
/// without an address, `DatabaseNameIsRequired` for file engines without a
/// file, `ProviderIsNotSupportedOnThisPlatform` for OLE DB outside Windows and
/// `NotImplemented` for providers this build cannot serve.
pub fn try_get_db_client(options: &DbClientOptions) -> DbResult<Box<dyn DbClient>> {
    let provider = options.provider;
    let result = match provider {
        DatabaseProvider::None => fail(DbError::database_provider_is_none()),
        DatabaseProvider::SqlServer => sql_server_client(options),
        DatabaseProvider::SqLite => sqlite_client(options),
        DatabaseProvider::OleDb => {
            if cfg!(windows) {
                require_database(options).and_then(|database| {
                    let kit = get_kit(provider)
                        .ok_or_else(|| vec![DbError::not_implemented(provider.name(), "get_db_client")])?;
                    let mut builder = new_builder(&kit);
                    builder.set("Provider", ACE_PROVIDER);
                    builder.set("Data Source", database);
                    builder.set("Persist Security Info", "False");
                    let client: Box<dyn DbClient> =
                        Box::new(OleDbClient::new(core(kit, builder.to_string(), options)));
                    Ok(client)
                })
            } else {
                fail(DbError::provider_is_not_supported_on_this_platform(provider.name()))
            }
        }
        DatabaseProvider::WebAgent => fail(DbError::not_implemented(provider.name(), "get_db_client")),
    };
    match &result {
        Ok(client) => debug!(provider = provider.name(), ?client, "database client created"),
        Err(errs) => {
            for e in errs {
                warn!(provider = provider.name(), code = e.code.as_str(), "{}", e.message);
            }
        }
    }
    result
}

#[cfg(feature = "mssql")]
fn sql_server_client(options: &DbClientOptions) -> DbResult<Box<dyn DbClient>> {
    if options.server_address.trim().is_empty() {
        return fail(DbError::server_address_is_empty());
    }
    let kit: Arc<dyn DbKit> = Arc::new(crate::mssql::SqlKit);
    let connection_string = sql_server_connection_string(options);
    Ok(Box::new(crate::mssql::SqlDbClient::new(core(
        kit,
        connection_string,
        options,
    ))))
}

#[cfg(not(feature = "mssql"))]
fn sql_server_client(options: &DbClientOptions) -> DbResult<Box<dyn DbClient>> {
    fail(DbError::not_implemented(options.provider.name(), "get_db_client"))
}

#[cfg(feature = "sqlite")]
fn sqlite_client(options: &DbClientOptions) -> DbResult<Box<dyn DbClient>> {
    let database = require_database(options)?;
    let kit: Arc<dyn DbKit> = Arc::new(crate::sqlite::SqliteKit);
    let mut builder = new_builder(&kit);
    builder.set("Data Source", database);
    Ok(Box::new(crate::sqlite::SqliteDbClient::new(core(
        kit,
        builder.to_string(),
        options,
    ))))
}

#[cfg(not(feature = "sqlite"))]
fn sqlite_client(options: &DbClientOptions) -> DbResult<Box<dyn DbClient>> {
    fail(DbError::not_implemented(options.provider.name(), "get_db_client"))
}

/// [`try_get_db_client`] with the reason dropped.
#[must_use]
pub fn get_db_client(options: &DbClientOptions) -> Option<Box<dyn DbClient>> {
    try_get_db_client(options).ok()
}
