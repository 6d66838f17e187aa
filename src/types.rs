use chrono::NaiveDateTime;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Values read from a result row or bound as a command parameter.
///
/// The same enum is used by every engine so the manager and the administrative
/// clients never branch on driver types:
/// ```rust
/// use db_tools::prelude::*;
///
/// let values = vec![
///     RowValues::Int(1),
///     RowValues::Text("master".into()),
///     RowValues::Bool(true),
/// ];
/// # let _ = values;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum RowValues {
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Boolean value
    Bool(bool),
    /// Timestamp value
    Timestamp(NaiveDateTime),
    /// SQL NULL
    Null,
    /// JSON value
    JSON(JsonValue),
    /// Binary data
    Blob(Vec<u8>),
}

impl RowValues {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<&i64> {
        if let RowValues::Int(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let RowValues::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            RowValues::Bool(value) => Some(*value),
            RowValues::Int(1) => Some(true),
            RowValues::Int(0) => Some(false),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        if let RowValues::Timestamp(value) = self {
            return Some(*value);
        } else if let Some(s) = self.as_text() {
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
                return Some(dt);
            }
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
                return Some(dt);
            }
        }
        None
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            RowValues::Float(value) => Some(*value),
            #[allow(clippy::cast_precision_loss)]
            RowValues::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        if let RowValues::Blob(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }
}

impl std::fmt::Display for RowValues {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RowValues::Int(i) => write!(f, "{i}"),
            RowValues::Float(v) => write!(f, "{v}"),
            RowValues::Text(s) => f.write_str(s),
            RowValues::Bool(b) => write!(f, "{b}"),
            RowValues::Timestamp(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S%.f")),
            RowValues::Null => Ok(()),
            RowValues::JSON(v) => write!(f, "{v}"),
            RowValues::Blob(bytes) => write!(f, "<{} bytes>", bytes.len()),
        }
    }
}

/// Database engines the toolkit can target.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum, Serialize, Deserialize,
)]
pub enum DatabaseProvider {
    /// No provider selected
    #[default]
    None,
    /// SQL Server class engine
    SqlServer,
    /// `SQLite` embedded file engine
    #[value(name = "sqlite")]
    SqLite,
    /// Legacy desktop engine reached through OLE DB (MS Access)
    #[value(name = "oledb")]
    OleDb,
    /// Remote agent (not implemented)
    WebAgent,
}

impl DatabaseProvider {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            DatabaseProvider::None => "None",
            DatabaseProvider::SqlServer => "SqlServer",
            DatabaseProvider::SqLite => "SqLite",
            DatabaseProvider::OleDb => "OleDb",
            DatabaseProvider::WebAgent => "WebAgent",
        }
    }
}

/// State of a native connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Closed,
    Open,
    /// The connection failed mid-operation and must be closed before reuse.
    Broken,
}

/// How command text is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommandType {
    /// Plain SQL batch
    #[default]
    Text,
    /// Command text is the name of a stored procedure
    StoredProcedure,
    /// Command text is a table name; all rows are returned
    TableDirect,
}

/// Direction of a command parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParameterDirection {
    #[default]
    Input,
    Output,
    InputOutput,
    ReturnValue,
}

impl ParameterDirection {
    /// Whether a value flows from the caller to the server.
    #[must_use]
    pub fn accepts_input(self) -> bool {
        matches!(self, ParameterDirection::Input | ParameterDirection::InputOutput)
    }

    /// Whether the server writes a value back after execution.
    #[must_use]
    pub fn returns_value(self) -> bool {
        !matches!(self, ParameterDirection::Input)
    }
}

/// Which version of a source-column value a parameter binds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceVersion {
    Original,
    #[default]
    Current,
    Proposed,
    Default,
}

/// Kind of backup to take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
pub enum BackupType {
    #[default]
    Full,
    Differential,
    TransactionLog,
}

/// Transaction-log retention setting of a database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum DatabaseRecoveryModel {
    Full,
    BulkLogged,
    Simple,
}

impl DatabaseRecoveryModel {
    /// Decode the `sys.databases.recovery_model` code.
    #[must_use]
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(DatabaseRecoveryModel::Full),
            2 => Some(DatabaseRecoveryModel::BulkLogged),
            3 => Some(DatabaseRecoveryModel::Simple),
            _ => None,
        }
    }

    /// Keyword used by `ALTER DATABASE ... SET RECOVERY`.
    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            DatabaseRecoveryModel::Full => "FULL",
            DatabaseRecoveryModel::BulkLogged => "BULK_LOGGED",
            DatabaseRecoveryModel::Simple => "SIMPLE",
        }
    }
}
