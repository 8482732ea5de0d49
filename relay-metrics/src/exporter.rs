//! OTLP metrics exporter

use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};

use crate::{MetricsConfig, MetricsError};

/// Meter provider pushing to the configured collector on every export interval.
pub fn meter_provider(config: &MetricsConfig) -> Result<SdkMeterProvider, MetricsError> {
    let exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_http()
        .with_endpoint(config.endpoint.as_str())
        .build()
        .map_err(|e| MetricsError::OpenTelemetry(e.to_string()))?;

    let reader = PeriodicReader::builder(exporter)
        .with_interval(config.export_interval())
        .build();

    Ok(SdkMeterProvider::builder().with_reader(reader).build())
}
