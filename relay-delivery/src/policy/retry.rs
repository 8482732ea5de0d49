//! In-dispatch retry of transient provider failures.
//!
//! This layer lives entirely inside one invocation. Redelivery across
//! invocations is [`super::PoisonPolicy`]'s concern.

use std::{future::Future, time::Duration};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::DispatchError;

/// Exponential backoff for transient send failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransientRetryPolicy {
    /// Retries after the first attempt.
    ///
    /// Default: 3
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,

    /// The delay before retry `n` is `base * 2^n` seconds.
    ///
    /// Default: 1 second (2s, 4s, 8s)
    #[serde(default = "defaults::base_delay_secs")]
    pub base_delay_secs: u64,

    /// Cap applied to every computed delay.
    ///
    /// Default: 60 seconds
    #[serde(default = "defaults::max_delay_secs")]
    pub max_delay_secs: u64,
}

impl Default for TransientRetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: defaults::max_retries(),
            base_delay_secs: defaults::base_delay_secs(),
            max_delay_secs: defaults::max_delay_secs(),
        }
    }
}

impl TransientRetryPolicy {
    /// Delay before the `retry`-th retry (1-based).
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        let secs = 2u64
            .checked_pow(retry)
            .map_or(u64::MAX, |factor| self.base_delay_secs.saturating_mul(factor));
        Duration::from_secs(secs.min(self.max_delay_secs))
    }

    /// Run `operation` until it succeeds, fails non-transiently, or the
    /// retries are used up. `operation` receives the 1-based attempt number.
    ///
    /// # Errors
    ///
    /// Returns the last error from `operation`, or
    /// [`DispatchError::Cancelled`] if `cancel` fires while an attempt or a
    /// backoff sleep is in flight.
    pub async fn execute<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> Result<T, DispatchError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, DispatchError>>,
    {
        let mut attempt = 1;

        loop {
            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(DispatchError::Cancelled),
                result = operation(attempt) => result,
            };

            let error = match result {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            if !error.is_transient() || attempt > self.max_retries {
                return Err(error);
            }

            let delay = self.delay_for(attempt);
            tracing::warn!(
                attempt,
                max_retries = self.max_retries,
                delay_secs = delay.as_secs(),
                error = %error,
                "Transient send failure, retrying"
            );

            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(DispatchError::Cancelled),
                () = tokio::time::sleep(delay) => {}
            }

            attempt += 1;
        }
    }
}

mod defaults {
    pub const fn max_retries() -> u32 {
        3
    }

    pub const fn base_delay_secs() -> u64 {
        1
    }

    pub const fn max_delay_secs() -> u64 {
        60
    }
}
