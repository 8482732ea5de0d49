//! Metrics configuration

use std::time::Duration;

use serde::Deserialize;

use crate::MetricsError;

/// The `metrics` section of the relay configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MetricsConfig {
    /// Export to OpenTelemetry. When false, recording only emits tracing events.
    ///
    /// Default: false
    #[serde(default)]
    pub enabled: bool,

    /// OTLP/HTTP metrics endpoint, e.g. `http://otel-collector:4318/v1/metrics`
    #[serde(default = "defaults::endpoint")]
    pub endpoint: String,

    /// How often the periodic reader pushes to the collector.
    ///
    /// Default: 60 seconds
    #[serde(default = "defaults::export_interval_secs")]
    pub export_interval_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: defaults::endpoint(),
            export_interval_secs: defaults::export_interval_secs(),
        }
    }
}

impl MetricsConfig {
    #[must_use]
    pub const fn export_interval(&self) -> Duration {
        Duration::from_secs(self.export_interval_secs)
    }

    /// Only checked when metrics are enabled.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::InvalidConfig`] for a non-HTTP endpoint or a
    /// zero export interval.
    pub fn validate(&self) -> Result<(), MetricsError> {
        if !self.enabled {
            return Ok(());
        }

        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(MetricsError::InvalidConfig(format!(
                "endpoint must be an http(s) URL, got {:?}",
                self.endpoint
            )));
        }

        if self.export_interval_secs == 0 {
            return Err(MetricsError::InvalidConfig(
                "export_interval_secs must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

mod defaults {
    pub fn endpoint() -> String {
        "http://localhost:4318/v1/metrics".to_string()
    }

    pub const fn export_interval_secs() -> u64 {
        60
    }
}
