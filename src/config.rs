use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::auth::DbAuthSettings;
use crate::error::DbToolsError;
use crate::errors::DbResult;
use crate::factory::{DbClientOptions, DbClientOptionsBuilder};
use crate::types::DatabaseProvider;

/// Connection settings as stored in a JSON file.
///
/// ```rust
/// # use db_tools::config::DbConnectionSettings;
/// # use db_tools::types::DatabaseProvider;
/// let settings: DbConnectionSettings = serde_json::from_str(
///     r#"{ "provider": "SqlServer", "server_address": "db01", "user": "sa", "password": "pw" }"#,
/// )
/// .unwrap();
/// assert_eq!(settings.provider, DatabaseProvider::SqlServer);
/// assert!(!settings.integrated_security);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbConnectionSettings {
    pub provider: DatabaseProvider,
    pub server_address: String,
    pub database_name: Option<String>,
    pub integrated_security: bool,
    pub user: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub trust_server_certificate: bool,
    pub application_name: Option<String>,
    /// Seconds, `0` for no limit.
    pub command_timeout: u32,
}

impl Default for DbConnectionSettings {
    fn default() -> Self {
        Self {
            provider: DatabaseProvider::None,
            server_address: String::new(),
            database_name: None,
            integrated_security: false,
            user: None,
            password: None,
            trust_server_certificate: false,
            application_name: Some(env!("CARGO_PKG_NAME").to_string()),
            command_timeout: 0,
        }
    }
}

impl DbConnectionSettings {
    /// Read settings from a JSON file.
    ///
    /// # Errors
    /// Returns [`DbToolsError::ConfigError`] if the file cannot be read or
    /// parsed.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, DbToolsError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| DbToolsError::ConfigError(format!("{}: {e}", path.display())))?;
        Self::from_json(&text)
    }

    /// # Errors
    /// Returns [`DbToolsError::ConfigError`] for malformed JSON.
    pub fn from_json(text: &str) -> Result<Self, DbToolsError> {
        serde_json::from_str(text).map_err(|e| DbToolsError::ConfigError(e.to_string()))
    }

    /// Resolve the authentication settings.
    ///
    /// # Errors
    /// See [`DbAuthSettings::create`].
    pub fn auth(&self, use_console: bool) -> DbResult<DbAuthSettings> {
        DbAuthSettings::create(
            self.integrated_security,
            self.user.as_deref(),
            self.password.as_deref(),
            use_console,
        )
    }

    /// Client options builder seeded from these settings.
    ///
    /// # Errors
    /// See [`DbAuthSettings::create`].
    pub fn client_options(&self, use_console: bool) -> DbResult<DbClientOptionsBuilder> {
        let auth = self.auth(use_console)?;
        Ok(DbClientOptions::builder(self.provider, self.server_address.clone(), auth)
            .database_name(self.database_name.clone())
            .application_name(self.application_name.clone())
            .trust_server_certificate(self.trust_server_certificate)
            .command_timeout(self.command_timeout)
            .use_console(use_console))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_is_read_but_never_written() {
        let settings = DbConnectionSettings::from_json(
            r#"{ "provider": "SqLite", "database_name": "app.db", "password": "pw" }"#,
        )
        .unwrap();
        assert_eq!(settings.password.as_deref(), Some("pw"));
        assert!(!serde_json::to_string(&settings).unwrap().contains("pw"));
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        assert!(matches!(
            DbConnectionSettings::from_json("{ provider"),
            Err(DbToolsError::ConfigError(_))
        ));
    }

    #[test]
    fn options_follow_settings() {
        let settings = DbConnectionSettings {
            provider: DatabaseProvider::SqlServer,
            server_address: "db01".into(),
            integrated_security: true,
            command_timeout: 30,
            ..DbConnectionSettings::default()
        };
        let options = settings.client_options(false).unwrap().finish();
        assert!(options.auth.is_integrated());
        assert_eq!(options.command_timeout, 30);
        assert_eq!(options.application_name.as_deref(), Some("db-tools"));
    }
}
