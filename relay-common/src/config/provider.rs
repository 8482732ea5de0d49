use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Transactional-email provider settings and sender defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// URL the HTTP transport posts messages to.
    #[serde(default = "defaults::endpoint")]
    pub endpoint: String,

    /// Sent in the `api-key` header when present.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Sender used when a message has no override. Required.
    #[serde(default)]
    pub default_sender_address: String,

    /// Reply-to used when a message carries none.
    #[serde(default)]
    pub default_reply_to_address: Option<String>,

    /// Per-request timeout for the HTTP transport.
    ///
    /// Default: 30 seconds
    #[serde(default = "defaults::request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: defaults::endpoint(),
            api_key: None,
            default_sender_address: String::new(),
            default_reply_to_address: None,
            request_timeout_secs: defaults::request_timeout_secs(),
        }
    }
}

impl ProviderConfig {
    /// Validate the provider section.
    ///
    /// # Errors
    ///
    /// Returns an error when the default sender is missing, or either default
    /// address does not parse.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::check_not_blank("provider.endpoint", &self.endpoint)?;
        ConfigError::check_not_blank(
            "provider.default_sender_address",
            &self.default_sender_address,
        )?;
        ConfigError::check_address(
            "provider.default_sender_address",
            &self.default_sender_address,
        )?;

        if let Some(reply_to) = crate::message::non_blank(self.default_reply_to_address.as_deref())
        {
            ConfigError::check_address("provider.default_reply_to_address", reply_to)?;
        }

        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "provider.request_timeout_secs",
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(())
    }

    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

mod defaults {
    pub fn endpoint() -> String {
        "http://localhost:8025/emails:send".to_string()
    }

    pub const fn request_timeout_secs() -> u64 {
        30
    }
}
