use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetricsError {
    /// [`crate::init_metrics`] was called twice with metrics enabled
    #[error("Metrics already initialised")]
    AlreadyInitialized,

    #[error("Invalid metrics configuration: {0}")]
    InvalidConfig(String),

    /// Exporter or instrument setup failed inside the SDK
    #[error("OpenTelemetry error: {0}")]
    OpenTelemetry(String),
}
