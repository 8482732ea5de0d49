//! Dispatch and failure-routing telemetry.
//!
//! Every event is logged through `tracing`; OpenTelemetry instruments are
//! updated as well when `relay_metrics` has been initialised.

use std::time::Duration;

use relay_common::EmailMessage;
use relay_store::StoreError;

use crate::{error::DispatchError, transport::SendReceipt};

/// Sink for dispatch outcomes.
///
/// The failure-routing hooks default to doing nothing so test doubles only
/// need to implement what they inspect.
pub trait MetricsRecorder: Send + Sync {
    fn dispatch_succeeded(
        &self,
        message: &EmailMessage,
        receipt: &SendReceipt,
        elapsed: Duration,
        recipient_count: usize,
    );

    fn dispatch_failed(&self, message: &EmailMessage, error: &DispatchError, attempt_count: u32);

    fn attachment_load_failed(&self, container: &str, blob: &str, error: &StoreError);

    fn routed_to_failed_queue(&self, _message: &EmailMessage, _is_fatal: bool) {}

    fn failure_archived(&self, _message: &EmailMessage, _path: &str) {}

    fn failure_resubmitted(&self, _message: &EmailMessage, _delay: Duration) {}

    fn manual_intervention_required(&self, _message: &EmailMessage) {}
}

/// Default recorder: structured logs plus the global OpenTelemetry instruments.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmailMetricsRecorder;

impl MetricsRecorder for EmailMetricsRecorder {
    fn dispatch_succeeded(
        &self,
        message: &EmailMessage,
        receipt: &SendReceipt,
        elapsed: Duration,
        recipient_count: usize,
    ) {
        tracing::info!(
            message_id = %message.message_id,
            operation_id = %receipt.id,
            recipients = recipient_count,
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            correlation_id = message.metadata.correlation_id.as_deref().unwrap_or_default(),
            "Recorded dispatch success"
        );

        if let Some(metrics) = relay_metrics::metrics() {
            metrics
                .dispatch
                .record_success(elapsed.as_secs_f64(), recipient_count as u64);
        }
    }

    fn dispatch_failed(&self, message: &EmailMessage, error: &DispatchError, attempt_count: u32) {
        tracing::error!(
            message_id = %message.message_id,
            attempt = attempt_count,
            error_type = error.error_type(),
            is_fatal = error.is_fatal(),
            subject = %message.subject,
            error = %error,
            "Recorded dispatch failure"
        );

        if let Some(metrics) = relay_metrics::metrics() {
            metrics
                .dispatch
                .record_failure(error.error_type(), error.is_fatal());
        }
    }

    fn attachment_load_failed(&self, container: &str, blob: &str, error: &StoreError) {
        tracing::error!(container, blob, error = %error, "Recorded attachment load failure");

        if let Some(metrics) = relay_metrics::metrics() {
            metrics.dispatch.record_attachment_failure(container);
        }
    }

    fn routed_to_failed_queue(&self, message: &EmailMessage, is_fatal: bool) {
        if let Some(metrics) = relay_metrics::metrics() {
            metrics.failures.record_routed(is_fatal);
        }
        tracing::debug!(message_id = %message.message_id, is_fatal, "Recorded failed-queue routing");
    }

    fn failure_archived(&self, message: &EmailMessage, path: &str) {
        if let Some(metrics) = relay_metrics::metrics() {
            metrics.failures.record_archived();
        }
        tracing::debug!(message_id = %message.message_id, path, "Recorded failure archive");
    }

    fn failure_resubmitted(&self, message: &EmailMessage, delay: Duration) {
        if let Some(metrics) = relay_metrics::metrics() {
            metrics.failures.record_resubmitted();
        }
        tracing::debug!(
            message_id = %message.message_id,
            delay_secs = delay.as_secs(),
            "Recorded resubmission"
        );
    }

    fn manual_intervention_required(&self, message: &EmailMessage) {
        if let Some(metrics) = relay_metrics::metrics() {
            metrics.failures.record_manual_intervention();
        }
        tracing::debug!(message_id = %message.message_id, "Recorded manual intervention");
    }
}
