use std::path::PathBuf;

use clap::{Parser, Subcommand};
use db_tools::DbToolsError;
use db_tools::config::DbConnectionSettings;
use db_tools::types::{BackupType, DatabaseProvider, DatabaseRecoveryModel};

#[derive(Parser, Debug)]
#[command(author, version, about = "Database administration: backup, restore, verify and maintenance")]
pub(crate) struct Args {
    /// JSON connection settings; flags below override its fields
    #[arg(long, global = true)]
    pub(crate) config: Option<PathBuf>,
    #[arg(long, value_enum, global = true)]
    pub(crate) provider: Option<DatabaseProvider>,
    /// Server address, `host\instance` or `host,port`
    #[arg(long, global = true)]
    pub(crate) server: Option<String>,
    /// Database to connect to; the file path for SQLite
    #[arg(long = "connect-db", global = true)]
    pub(crate) connect_db: Option<String>,
    #[arg(long, global = true)]
    pub(crate) integrated: bool,
    #[arg(long, global = true)]
    pub(crate) user: Option<String>,
    #[arg(long, global = true)]
    pub(crate) password: Option<String>,
    #[arg(long, global = true)]
    pub(crate) trust_server_certificate: bool,
    /// Command timeout in seconds, 0 for none
    #[arg(long, global = true)]
    pub(crate) timeout: Option<u32>,
    /// Append log lines to this file as well
    #[arg(long, global = true)]
    pub(crate) log_file: Option<PathBuf>,
    #[arg(long, short, global = true)]
    pub(crate) verbose: bool,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub(crate) enum Command {
    /// Open and close one connection
    TestConnection {
        #[arg(long)]
        with_database: bool,
    },
    /// Run one statement that returns no rows
    Exec {
        sql: String,
        #[arg(long)]
        log_start: bool,
        #[arg(long)]
        log_finish: bool,
    },
    Backup {
        #[arg(long)]
        database: String,
        #[arg(long)]
        file: String,
        /// Backup set name, `<database>-<type>` when omitted
        #[arg(long)]
        name: Option<String>,
        #[arg(long = "type", value_enum, default_value = "full")]
        backup_type: BackupType,
        #[arg(long)]
        compression: bool,
    },
    /// Verify the newest backup set of a database
    Verify {
        #[arg(long)]
        database: String,
        #[arg(long)]
        file: String,
    },
    /// List the logical files inside a backup
    RestoreFiles {
        #[arg(long)]
        file: String,
    },
    /// Restore over a database, relocating its data and log files
    Restore {
        #[arg(long)]
        database: String,
        #[arg(long)]
        file: String,
        #[arg(long)]
        data_folder: String,
        #[arg(long)]
        log_folder: String,
        #[arg(long, default_value = "\\")]
        separator: String,
    },
    Check {
        #[arg(long)]
        database: String,
    },
    Recompile {
        #[arg(long)]
        database: String,
    },
    UpdateStatistics {
        #[arg(long)]
        database: String,
    },
    ServerInfo,
    Databases,
    Exists {
        #[arg(long)]
        database: String,
    },
    IsLocal,
    Compression,
    SetDefaultFolders {
        #[arg(long)]
        backup: String,
        #[arg(long)]
        data: String,
        #[arg(long)]
        log: String,
    },
    RecoveryModel {
        #[arg(long)]
        database: String,
        #[arg(long, value_enum)]
        model: DatabaseRecoveryModel,
    },
    HostPlatform,
    ServerName,
}

impl Args {
    /// Settings from `--config`, overridden by the connection flags.
    pub(crate) fn settings(&self) -> Result<DbConnectionSettings, DbToolsError> {
        let mut settings = match &self.config {
            Some(path) => DbConnectionSettings::from_json_file(path)?,
            None => DbConnectionSettings::default(),
        };
        if let Some(provider) = self.provider {
            settings.provider = provider;
        }
        if let Some(server) = &self.server {
            settings.server_address.clone_from(server);
        }
        if self.connect_db.is_some() {
            settings.database_name.clone_from(&self.connect_db);
        }
        if self.integrated {
            settings.integrated_security = true;
        }
        if self.user.is_some() {
            settings.user.clone_from(&self.user);
        }
        if self.password.is_some() {
            settings.password.clone_from(&self.password);
        }
        if self.trust_server_certificate {
            settings.trust_server_certificate = true;
        }
        if let Some(timeout) = self.timeout {
            settings.command_timeout = timeout;
        }
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_the_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prod.json");
        std::fs::write(
            &path,
            r#"{ "provider": "SqlServer", "server_address": "db01", "user": "sa", "password": "pw", "command_timeout": 30 }"#,
        )
        .unwrap();

        let args = Args::try_parse_from([
            "dbtools",
            "--config",
            path.to_str().unwrap(),
            "--server",
            "db02",
            "backup",
            "--database",
            "Sales",
            "--file",
            "/bak/Sales.bak",
            "--type",
            "differential",
        ])
        .unwrap();
        let settings = args.settings().unwrap();
        assert_eq!(settings.server_address, "db02");
        assert_eq!(settings.user.as_deref(), Some("sa"));
        assert_eq!(settings.command_timeout, 30);
        assert!(matches!(
            args.command,
            Command::Backup { backup_type: BackupType::Differential, .. }
        ));
    }

    #[test]
    fn sqlite_needs_no_file() {
        let args = Args::try_parse_from([
            "dbtools",
            "--provider",
            "sqlite",
            "--connect-db",
            "app.db",
            "check",
            "--database",
            "app",
        ])
        .unwrap();
        let settings = args.settings().unwrap();
        assert_eq!(settings.provider, DatabaseProvider::SqLite);
        assert_eq!(settings.database_name.as_deref(), Some("app.db"));
    }
}
