//! Failure handling metrics

use std::sync::atomic::{AtomicU64, Ordering};

use opentelemetry::{
    KeyValue,
    metrics::{Counter, Meter},
};

use crate::MetricsError;

/// Failure routing and archival metrics collector
#[derive(Debug)]
pub struct FailureMetrics {
    /// Messages published to the failed queue, by fatal classification
    routed_total: Counter<u64>,

    /// Failure envelopes written to the archive
    archived_total: Counter<u64>,

    /// Original messages resubmitted to the outbox
    resubmitted_total: Counter<u64>,

    /// Failures left for manual intervention
    manual_total: Counter<u64>,

    routed: AtomicU64,
    archived: AtomicU64,
}

impl FailureMetrics {
    /// Create a new failure metrics collector
    ///
    /// # Errors
    ///
    /// Returns an error if metric instruments cannot be created.
    pub fn new() -> Result<Self, MetricsError> {
        let meter = meter();

        Ok(Self {
            routed_total: meter
                .u64_counter("relay.failures.routed.total")
                .with_description("Messages published to the failed queue")
                .build(),
            archived_total: meter
                .u64_counter("relay.failures.archived.total")
                .with_description("Failure envelopes written to the archive")
                .build(),
            resubmitted_total: meter
                .u64_counter("relay.failures.resubmitted.total")
                .with_description("Original messages resubmitted to the outbox")
                .build(),
            manual_total: meter
                .u64_counter("relay.failures.manual.total")
                .with_description("Failures left for manual intervention")
                .build(),
            routed: AtomicU64::new(0),
            archived: AtomicU64::new(0),
        })
    }

    pub fn record_routed(&self, is_fatal: bool) {
        self.routed_total
            .add(1, &[KeyValue::new("fatal", is_fatal)]);
        self.routed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_archived(&self) {
        self.archived_total.add(1, &[]);
        self.archived.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_resubmitted(&self) {
        self.resubmitted_total.add(1, &[]);
    }

    pub fn record_manual_intervention(&self) {
        self.manual_total.add(1, &[]);
    }

    #[must_use]
    pub fn routed_count(&self) -> u64 {
        self.routed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn archived_count(&self) -> u64 {
        self.archived.load(Ordering::Relaxed)
    }
}

fn meter() -> Meter {
    opentelemetry::global::meter("relay.failures")
}
