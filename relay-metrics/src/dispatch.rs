//! Dispatch metrics
//!
//! Tracks sends to the email provider:
//! - Sends by outcome (success/failure)
//! - Dispatch latency and recipients per message
//! - Failures by error type and fatal classification
//! - Attachment load failures by container

use std::sync::atomic::{AtomicU64, Ordering};

use opentelemetry::{
    KeyValue,
    metrics::{Counter, Histogram, Meter},
};

use crate::MetricsError;

/// Dispatch metrics collector
#[derive(Debug)]
pub struct DispatchMetrics {
    /// Total number of dispatches by outcome
    sends_total: Counter<u64>,

    /// Distribution of successful dispatch durations
    duration_seconds: Histogram<f64>,

    /// Distribution of recipients per delivered message
    recipients: Histogram<u64>,

    /// Total number of failed dispatches by error type
    failures_total: Counter<u64>,

    /// Total number of attachment blobs that could not be read
    attachment_failures_total: Counter<u64>,

    // Local mirrors for assertions and health output
    succeeded: AtomicU64,
    failed: AtomicU64,
}

impl DispatchMetrics {
    /// Create a new dispatch metrics collector
    ///
    /// # Errors
    ///
    /// Returns an error if metric instruments cannot be created.
    pub fn new() -> Result<Self, MetricsError> {
        let meter = meter();

        let sends_total = meter
            .u64_counter("relay.dispatch.sends.total")
            .with_description("Total number of dispatches by outcome")
            .build();

        let duration_seconds = meter
            .f64_histogram("relay.dispatch.duration.seconds")
            .with_description("Distribution of successful dispatch durations")
            .build();

        let recipients = meter
            .u64_histogram("relay.dispatch.recipients")
            .with_description("Distribution of recipients per delivered message")
            .build();

        let failures_total = meter
            .u64_counter("relay.dispatch.failures.total")
            .with_description("Total number of failed dispatches by error type")
            .build();

        let attachment_failures_total = meter
            .u64_counter("relay.dispatch.attachment_failures.total")
            .with_description("Total number of attachment blobs that could not be read")
            .build();

        Ok(Self {
            sends_total,
            duration_seconds,
            recipients,
            failures_total,
            attachment_failures_total,
            succeeded: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        })
    }

    /// Record a message accepted by the provider
    pub fn record_success(&self, duration_secs: f64, recipient_count: u64) {
        self.sends_total
            .add(1, &[KeyValue::new("outcome", "success")]);
        self.duration_seconds.record(duration_secs, &[]);
        self.recipients.record(recipient_count, &[]);
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a dispatch that ended in an error
    pub fn record_failure(&self, error_type: &'static str, is_fatal: bool) {
        self.sends_total
            .add(1, &[KeyValue::new("outcome", "failure")]);
        self.failures_total.add(
            1,
            &[
                KeyValue::new("error_type", error_type),
                KeyValue::new("fatal", is_fatal),
            ],
        );
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an attachment blob that could not be read
    pub fn record_attachment_failure(&self, container: &str) {
        self.attachment_failures_total
            .add(1, &[KeyValue::new("container", container.to_string())]);
    }

    /// Number of successful dispatches recorded
    #[must_use]
    pub fn succeeded_count(&self) -> u64 {
        self.succeeded.load(Ordering::Relaxed)
    }

    /// Number of failed dispatches recorded
    #[must_use]
    pub fn failed_count(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

fn meter() -> Meter {
    opentelemetry::global::meter("relay.dispatch")
}
