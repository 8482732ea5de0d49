//! OpenTelemetry metrics for the email relay
//!
//! Metrics are pushed over OTLP/HTTP to an OpenTelemetry Collector.
//!
//! - **Dispatch metrics** (`relay.dispatch.*`): sends by outcome, latency,
//!   recipients per message, failures by error type, attachment load failures
//! - **Failure metrics** (`relay.failures.*`): messages routed to the failed
//!   queue, archived, resubmitted, or left for manual intervention
//!
//! # Usage
//!
//! ```rust,no_run
//! use relay_metrics::{init_metrics, MetricsConfig};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = MetricsConfig {
//!     enabled: true,
//!     endpoint: "http://localhost:4318/v1/metrics".to_string(),
//!     ..Default::default()
//! };
//!
//! init_metrics(&config)?;
//! # Ok(())
//! # }
//! ```

mod config;
mod dispatch;
mod error;
mod exporter;
mod failures;

pub use config::MetricsConfig;
pub use dispatch::DispatchMetrics;
pub use error::MetricsError;
pub use failures::FailureMetrics;
use once_cell::sync::OnceCell;

/// Global metrics instance
static METRICS_INSTANCE: OnceCell<Metrics> = OnceCell::new();

/// Root metrics container
#[derive(Debug)]
pub struct Metrics {
    pub dispatch: DispatchMetrics,
    pub failures: FailureMetrics,
}

/// Initialize the metrics system
///
/// Must be called once at startup before any metrics are recorded. If
/// metrics are disabled in the config, this is a no-op and [`metrics`]
/// keeps returning `None`.
///
/// # Errors
///
/// Returns an error if the exporter cannot be built or if called more than once.
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    if !config.enabled {
        tracing::info!("Metrics collection is disabled");
        return Ok(());
    }

    tracing::info!(
        endpoint = %config.endpoint,
        "Initializing OpenTelemetry metrics with OTLP exporter"
    );

    config.validate()?;

    let provider = exporter::meter_provider(config)?;
    opentelemetry::global::set_meter_provider(provider);

    let metrics = Metrics {
        dispatch: DispatchMetrics::new()?,
        failures: FailureMetrics::new()?,
    };

    METRICS_INSTANCE
        .set(metrics)
        .map_err(|_| MetricsError::AlreadyInitialized)?;

    tracing::info!("Metrics collection initialized successfully");

    Ok(())
}

/// The global metrics instance, if [`init_metrics`] enabled it.
#[must_use]
pub fn metrics() -> Option<&'static Metrics> {
    METRICS_INSTANCE.get()
}

/// Check if metrics are enabled
#[must_use]
pub fn is_enabled() -> bool {
    METRICS_INSTANCE.get().is_some()
}
