//! T-SQL text of the administrative commands.
//!
//! Everything here is pure string construction; identifiers are bracket
//! quoted and literals have their quotes doubled.

use crate::client::models::RestoreFileModel;
use crate::errors::DbError;
use crate::types::{BackupType, DatabaseRecoveryModel};

pub(crate) const PRODUCT_VERSION_QUERY: &str =
    "SELECT CAST(SERVERPROPERTY('productversion') AS nvarchar(128))";
pub(crate) const INSTANCE_NAME_QUERY: &str =
    "SELECT CAST(SERVERPROPERTY('InstanceName') AS nvarchar(128))";
pub(crate) const SERVER_NAME_QUERY: &str = "SELECT @@servername";
pub(crate) const HOST_PLATFORM_QUERY: &str = "SELECT host_platform FROM sys.dm_os_host_info";
pub(crate) const CLIENT_NET_ADDRESS_QUERY: &str =
    "SELECT CAST(CONNECTIONPROPERTY('client_net_address') AS nvarchar(48)) AS client_net_address";
pub(crate) const COMPRESSION_QUERY: &str = "SELECT count(value)
FROM sys.configurations
WHERE name = 'backup compression default' AND maximum > 0";
/// Position of the newest backup set recorded for `@database`.
pub(crate) const LAST_BACKUP_SET_QUERY: &str = "SELECT position
FROM msdb..backupset
WHERE database_name = @database AND backup_set_id = (
  SELECT max(backup_set_id)
  FROM msdb..backupset
  WHERE database_name = @database)";
pub(crate) const DATABASE_EXISTS_QUERY: &str =
    "SELECT count(*) FROM master.dbo.sysdatabases WHERE name = @database";
pub(crate) const DATABASES_QUERY: &str = "SELECT name AS dbName, recovery_model AS recoveryModel,
  CAST(CASE WHEN name IN ('master', 'model', 'msdb') THEN 1 ELSE is_distributor END AS int) AS isSystemDatabase
FROM sys.databases
WHERE name <> 'tempdb'";
pub(crate) const STORED_PROCEDURES_QUERY: &str = "EXEC sp_stored_procedures";
pub(crate) const TRIGGERS_QUERY: &str =
    "SELECT OBJECT_SCHEMA_NAME(object_id) AS SchemaName, name FROM sys.triggers WHERE type = 'TR'";
pub(crate) const TABLES_QUERY: &str = "SELECT SCHEMA_NAME(o.uid) AS SchemaName, o.name AS TableName
FROM dbo.sysobjects o
  INNER JOIN dbo.sysindexes i ON o.id = i.id
WHERE (OBJECTPROPERTY(o.id, N'IsTable') = 1)
  AND (i.indid < 2)
  AND (o.name NOT LIKE N'#%')
  AND (OBJECTPROPERTY(o.id, N'tableisfake') <> 1)
  AND SCHEMA_NAME(o.uid) <> 'sys'
ORDER BY TableName";

/// Databases every server carries besides user databases.
pub(crate) const SYSTEM_DATABASES: [&str; 3] = ["master", "model", "msdb"];
pub(crate) const TEMP_DATABASE: &str = "tempdb";
/// Instance name reported as NULL by a default instance.
pub(crate) const DEFAULT_INSTANCE_NAME: &str = "MSSQLSERVER";
/// Client addresses reported for a connection from the server's own host.
pub(crate) const LOCAL_ADDRESSES: [&str; 3] = ["<local machine>", "127.0.0.1", "::1"];

/// `[name]` with embedded `]` doubled.
#[must_use]
pub fn quote_ident(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

/// Contents of an `N'...'` literal with embedded quotes doubled.
#[must_use]
pub fn quote_literal(value: &str) -> String {
    value.replace('\'', "''")
}

/// `USE [db];` prefix running the rest of a batch in `database`.
#[must_use]
pub fn use_database(database: &str) -> String {
    format!("USE {};\n", quote_ident(database))
}

#[must_use]
pub fn backup_command_text(
    database: &str,
    backup_file: &str,
    backup_name: &str,
    backup_type: BackupType,
    compression: bool,
) -> String {
    let kind = match backup_type {
        BackupType::TransactionLog => "LOG",
        BackupType::Full | BackupType::Differential => "DATABASE",
    };
    let differential = if backup_type == BackupType::Differential {
        "DIFFERENTIAL, "
    } else {
        ""
    };
    let compression = if compression { ", COMPRESSION" } else { "" };
    format!(
        "BACKUP {kind} {}\nTO DISK=N'{}'\nWITH {differential}NOFORMAT, NOINIT, NAME = N'{}', SKIP, REWIND, NOUNLOAD{compression}",
        quote_ident(database),
        quote_literal(backup_file),
        quote_literal(backup_name),
    )
}

/// Verify `backup_file` against backup set `position`, as returned by
/// [`LAST_BACKUP_SET_QUERY`].
#[must_use]
pub fn verify_command_text(backup_file: &str, position: i64) -> String {
    format!(
        "RESTORE VERIFYONLY FROM DISK = N'{}' WITH FILE = {position}, NOUNLOAD, NOREWIND",
        quote_literal(backup_file)
    )
}

/// Error text when the server keeps no backup history for `database`.
#[must_use]
pub fn backup_set_not_found(database: &str) -> String {
    format!("Verify failed. Backup information for database '{database}' not found.")
}

#[must_use]
pub fn restore_file_list_text(backup_file: &str) -> String {
    format!(
        "RESTORE FILELISTONLY FROM DISK = N'{}' WITH NOUNLOAD, FILE = 1",
        quote_literal(backup_file)
    )
}

/// Logical members of a backup and where they are restored to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreTargets {
    pub data_logical_name: String,
    pub data_file: String,
    pub log_logical_name: String,
    pub log_file: String,
}

fn with_separator(folder: &str, separator: &str) -> String {
    if separator.is_empty() || folder.ends_with(separator) {
        folder.to_string()
    } else {
        format!("{folder}{separator}")
    }
}

/// Pick the single data and log member of a backup and compute their target
/// paths as `<dir><sep><db>.mdf` and `<dir><sep><db>_log.ldf`.
///
/// # Errors
/// `NoRestoreFileNames` without a manifest; `NoDataPart` / `NoLogPart` unless
/// exactly one member of type `D` / `L` is listed.
pub fn restore_file_targets(
    database: &str,
    files: Option<&[RestoreFileModel]>,
    data_folder: &str,
    log_folder: &str,
    separator: &str,
) -> Result<RestoreTargets, DbError> {
    let files = files.ok_or_else(DbError::no_restore_file_names)?;
    let single = |file_type: &str| {
        let mut parts = files.iter().filter(|f| f.file_type == file_type);
        match (parts.next(), parts.next()) {
            (Some(part), None) => Some(part),
            _ => None,
        }
    };
    let data = single("D").ok_or_else(DbError::no_data_part)?;
    let log = single("L").ok_or_else(DbError::no_log_part)?;
    Ok(RestoreTargets {
        data_logical_name: data.logical_name.clone(),
        data_file: format!("{}{database}.mdf", with_separator(data_folder, separator)),
        log_logical_name: log.logical_name.clone(),
        log_file: format!("{}{database}_log.ldf", with_separator(log_folder, separator)),
    })
}

#[must_use]
pub fn restore_command_text(database: &str, backup_file: &str, targets: &RestoreTargets) -> String {
    format!(
        "RESTORE DATABASE {}
FROM DISK = N'{}' WITH FILE = 1,
MOVE N'{}' TO N'{}',
MOVE N'{}' TO N'{}', NOUNLOAD, REPLACE",
        quote_ident(database),
        quote_literal(backup_file),
        quote_literal(&targets.data_logical_name),
        quote_literal(&targets.data_file),
        quote_literal(&targets.log_logical_name),
        quote_literal(&targets.log_file),
    )
}

#[must_use]
pub fn check_database_text(database: &str) -> String {
    format!(
        "DBCC CHECKDB(N'{}') WITH NO_INFOMSGS",
        quote_literal(database)
    )
}

/// Two-part name of a schema object, bracket quoted.
#[must_use]
pub fn object_name(schema: Option<&str>, name: &str) -> String {
    match schema {
        Some(s) if !s.is_empty() => format!("{}.{}", quote_ident(s), quote_ident(name)),
        _ => quote_ident(name),
    }
}

#[must_use]
pub fn recompile_text(database: &str, object: &str) -> String {
    format!(
        "{}EXEC sp_recompile N'{}'",
        use_database(database),
        quote_literal(object)
    )
}

#[must_use]
pub fn update_statistics_text(database: &str, table: &str) -> String {
    format!(
        "{}UPDATE STATISTICS {table} WITH FULLSCAN",
        use_database(database)
    )
}

#[must_use]
pub fn change_recovery_model_text(database: &str, model: DatabaseRecoveryModel) -> String {
    format!(
        "ALTER DATABASE {} SET RECOVERY {} WITH NO_WAIT",
        quote_ident(database),
        model.keyword()
    )
}

/// Procedure name as listed by `sp_stored_procedures`, without the `;N`
/// group number.
#[must_use]
pub fn procedure_base_name(listed: &str) -> &str {
    listed.split(';').next().unwrap_or(listed)
}

/// Whether a listed procedure is recompiled: not owned by `sys` and not a
/// `dt_` designer procedure.
#[must_use]
pub fn is_user_procedure(owner: &str, name: &str) -> bool {
    owner != "sys" && !name.starts_with("dt_")
}

/// Major and minor number of `SERVERPROPERTY('productversion')`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerVersion {
    pub major: u32,
    pub minor: String,
}

impl ServerVersion {
    /// Parse `15.0.2000.5` style versions.
    ///
    /// # Errors
    /// `InvalidSqlServerProductVersion` when the major part is not a number,
    /// `InvalidSqlServerVersionParts` when there is no minor part.
    pub fn parse(product_version: &str) -> Result<Self, DbError> {
        let parts: Vec<&str> = product_version.trim().split('.').collect();
        let major = parts[0]
            .parse::<u32>()
            .map_err(|_| DbError::invalid_sql_server_product_version())?;
        if parts.len() <= 1 {
            return Err(DbError::invalid_sql_server_version_parts());
        }
        Ok(Self {
            major,
            minor: parts[1].to_string(),
        })
    }

    /// Servers after 2008 R2 expose the instance-aware registry procedures.
    #[must_use]
    pub fn uses_instance_registry(&self) -> bool {
        self.major > 10
    }

    fn registry_key(&self, instance_name: &str, sub_folder: Option<&str>) -> String {
        let sub = sub_folder.map(|s| format!("\\{s}")).unwrap_or_default();
        if self.uses_instance_registry() {
            format!("Software\\Microsoft\\MSSQLServer\\MSSQLServer{sub}")
        } else {
            format!(
                "SOFTWARE\\Microsoft\\Microsoft SQL Server\\MSSQL{}_{}.{instance_name}\\MSSQLServer{sub}",
                self.major, self.minor
            )
        }
    }

    /// Read one value of the server configuration key. The value comes back
    /// in the second column.
    #[must_use]
    pub fn reg_read_text(
        &self,
        instance_name: &str,
        sub_folder: Option<&str>,
        parameter: &str,
    ) -> String {
        let procedure = if self.uses_instance_registry() {
            "xp_instance_regread"
        } else {
            "xp_regread"
        };
        format!(
            "EXEC master.dbo.{procedure} N'HKEY_LOCAL_MACHINE', N'{}', N'{}'",
            quote_literal(&self.registry_key(instance_name, sub_folder)),
            quote_literal(parameter)
        )
    }

    #[must_use]
    pub fn reg_write_text(
        &self,
        instance_name: &str,
        sub_folder: Option<&str>,
        parameter: &str,
        value: &str,
    ) -> String {
        let procedure = if self.uses_instance_registry() {
            "xp_instance_regwrite"
        } else {
            "xp_regwrite"
        };
        format!(
            "EXEC master.dbo.{procedure} N'HKEY_LOCAL_MACHINE', N'{}', N'{}', REG_SZ, N'{}'",
            quote_literal(&self.registry_key(instance_name, sub_folder)),
            quote_literal(parameter),
            quote_literal(value)
        )
    }
}

/// Folder of the master database file given a startup argument such as
/// `-dC:\Data\master.mdf`.
#[must_use]
pub fn master_dir(startup_argument: &str) -> Option<String> {
    let path = startup_argument.get(2..)?;
    let cut = path.rfind(['\\', '/'])?;
    Some(path[..cut].to_string())
}
