use serde::{Deserialize, Serialize};

use crate::types::DatabaseRecoveryModel;

/// One logical member of a backup file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreFileModel {
    pub logical_name: String,
    /// `D` for data, `L` for log.
    pub file_type: String,
}

impl RestoreFileModel {
    #[must_use]
    pub fn new(logical_name: impl Into<String>, file_type: impl Into<String>) -> Self {
        Self {
            logical_name: logical_name.into(),
            file_type: file_type.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseInfo {
    pub name: String,
    pub recovery_model: DatabaseRecoveryModel,
    pub is_system_database: bool,
}

/// What the server reports about itself and its default folders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbServerInfo {
    pub server_product_version: String,
    pub server_instance_name: String,
    pub backup_directory: Option<String>,
    pub default_data_directory: Option<String>,
    pub default_log_directory: Option<String>,
    pub allows_compression: bool,
    pub server_name: String,
}
