use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Container used when an attachment reference leaves its container blank.
    ///
    /// Default: `email-attachments`
    #[serde(default = "defaults::attachment_container")]
    pub attachment_container: String,

    /// Container receiving failure archives.
    ///
    /// Default: `email-logs`
    #[serde(default = "defaults::logs_container")]
    pub logs_container: String,

    /// Root directory of the filesystem object store.
    ///
    /// Default: `/var/lib/relay/blobs`
    #[serde(default = "defaults::root")]
    pub root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            attachment_container: defaults::attachment_container(),
            logs_container: defaults::logs_container(),
            root: defaults::root(),
        }
    }
}

impl StorageConfig {
    /// Validate the storage section.
    ///
    /// # Errors
    ///
    /// Returns an error when a container name is blank.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::check_not_blank("storage.attachment_container", &self.attachment_container)?;
        ConfigError::check_not_blank("storage.logs_container", &self.logs_container)
    }
}

mod defaults {
    use std::path::PathBuf;

    pub fn attachment_container() -> String {
        "email-attachments".to_string()
    }

    pub fn logs_container() -> String {
        "email-logs".to_string()
    }

    pub fn root() -> PathBuf {
        PathBuf::from("/var/lib/relay/blobs")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StorageConfig::default();
        assert_eq!(config.attachment_container, "email-attachments");
        assert_eq!(config.logs_container, "email-logs");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_blank_container_rejected() {
        let config = StorageConfig {
            logs_container: "  ".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingField("storage.logs_container"))
        ));
    }
}
