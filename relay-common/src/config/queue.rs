use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Bounds for the resubmission visibility delay, in seconds.
pub const MIN_VISIBILITY_TIMEOUT_SECS: u64 = 30;
pub const MAX_VISIBILITY_TIMEOUT_SECS: u64 = 3600;

/// Bounds for the poison threshold.
pub const MIN_DEQUEUE_COUNT: u32 = 1;
pub const MAX_DEQUEUE_COUNT: u32 = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Queue drained by the dispatch worker.
    ///
    /// Default: `email-outbox`
    #[serde(default = "defaults::outbox_queue_name")]
    pub outbox_queue_name: String,

    /// Queue receiving failure envelopes.
    ///
    /// Default: `email-failed`
    #[serde(default = "defaults::failed_queue_name")]
    pub failed_queue_name: String,

    /// Dequeue count at which a non-fatal failure is routed to the failed queue.
    ///
    /// Default: 5 (accepted range 1-20)
    #[serde(default = "defaults::max_dequeue_count")]
    pub max_dequeue_count: u32,

    /// Visibility delay applied to auto-retried messages.
    ///
    /// Default: 300 seconds (accepted range 30-3600)
    #[serde(default = "defaults::visibility_timeout_secs")]
    pub visibility_timeout_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            outbox_queue_name: defaults::outbox_queue_name(),
            failed_queue_name: defaults::failed_queue_name(),
            max_dequeue_count: defaults::max_dequeue_count(),
            visibility_timeout_secs: defaults::visibility_timeout_secs(),
        }
    }
}

impl QueueConfig {
    /// Validate the queue section.
    ///
    /// # Errors
    ///
    /// Returns an error for blank queue names or out-of-range counters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::check_not_blank("queues.outbox_queue_name", &self.outbox_queue_name)?;
        ConfigError::check_not_blank("queues.failed_queue_name", &self.failed_queue_name)?;

        if self.outbox_queue_name == self.failed_queue_name {
            return Err(ConfigError::Invalid {
                field: "queues.failed_queue_name",
                reason: "must differ from the outbox queue".to_string(),
            });
        }

        ConfigError::check_range(
            "queues.max_dequeue_count",
            u64::from(self.max_dequeue_count),
            u64::from(MIN_DEQUEUE_COUNT),
            u64::from(MAX_DEQUEUE_COUNT),
        )?;
        ConfigError::check_range(
            "queues.visibility_timeout_secs",
            self.visibility_timeout_secs,
            MIN_VISIBILITY_TIMEOUT_SECS,
            MAX_VISIBILITY_TIMEOUT_SECS,
        )
    }

    /// Delay before an auto-retried message becomes visible, clamped to
    /// 30-3600 seconds regardless of what was configured.
    #[must_use]
    pub fn resubmission_delay(&self) -> Duration {
        Duration::from_secs(
            self.visibility_timeout_secs
                .clamp(MIN_VISIBILITY_TIMEOUT_SECS, MAX_VISIBILITY_TIMEOUT_SECS),
        )
    }
}

mod defaults {
    pub fn outbox_queue_name() -> String {
        "email-outbox".to_string()
    }

    pub fn failed_queue_name() -> String {
        "email-failed".to_string()
    }

    pub const fn max_dequeue_count() -> u32 {
        5
    }

    pub const fn visibility_timeout_secs() -> u64 {
        300
    }
}
