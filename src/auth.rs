use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::errors::{DbError, DbResult, fail};

/// How a client authenticates against a server.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DbAuthSettings {
    /// Operating system (integrated) security.
    Integrated,
    /// Server login.
    Sql { user: String, password: String },
}

impl DbAuthSettings {
    /// Resolve raw inputs into settings.
    ///
    /// With integrated security on, supplied credentials are ignored with a
    /// warning. With it off, both credentials must be non-blank.
    ///
    /// # Errors
    /// `IntegratedSecurityIsOffAndCredentialsMissing` when integrated
    /// security is off and a credential is blank.
    pub fn create(
        integrated_security: bool,
        user: Option<&str>,
        password: Option<&str>,
        use_console: bool,
    ) -> DbResult<Self> {
        let user = user.filter(|u| !u.trim().is_empty());
        let password = password.filter(|p| !p.trim().is_empty());
        match (integrated_security, user, password) {
            (true, user, password) => {
                if user.is_some() || password.is_some() {
                    const IGNORED: &str = "windowsNtIntegratedSecurity is on and serverUser is specified or serverPass is specified. both will be ignored.";
                    warn!("{IGNORED}");
                    if use_console {
                        eprintln!("{IGNORED}");
                    }
                }
                Ok(DbAuthSettings::Integrated)
            }
            (false, Some(user), Some(password)) => Ok(DbAuthSettings::Sql {
                user: user.to_string(),
                password: password.to_string(),
            }),
            (false, _, _) => {
                let err = DbError::integrated_security_is_off_and_credentials_missing();
                error!(code = err.code.as_str(), "{}", err.message);
                if use_console {
                    eprintln!("{}", err.message);
                }
                fail(err)
            }
        }
    }

    #[must_use]
    pub fn is_integrated(&self) -> bool {
        matches!(self, DbAuthSettings::Integrated)
    }
}

impl fmt::Debug for DbAuthSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbAuthSettings::Integrated => f.write_str("Integrated"),
            DbAuthSettings::Sql { user, .. } => f
                .debug_struct("Sql")
                .field("user", user)
                .field("password", &"***")
                .finish(),
        }
    }
}
