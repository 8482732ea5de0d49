//! Integration tests for metrics collection
//!
//! Instruments are created against the no-op global meter provider, so these
//! tests verify the local counters and that recording never panics.

#![allow(clippy::expect_used)]

use std::sync::Arc;

use relay_metrics::{DispatchMetrics, FailureMetrics, MetricsConfig};

#[test]
fn test_dispatch_outcome_counters() {
    let metrics = DispatchMetrics::new().expect("Failed to create dispatch metrics");

    for _ in 0..4 {
        metrics.record_success(0.25, 3);
    }
    metrics.record_failure("Provider", false);
    metrics.record_failure("Validation", true);

    assert_eq!(metrics.succeeded_count(), 4);
    assert_eq!(metrics.failed_count(), 2);
}

#[test]
fn test_attachment_failures_do_not_count_as_dispatches() {
    let metrics = DispatchMetrics::new().expect("Failed to create dispatch metrics");

    metrics.record_attachment_failure("email-attachments");

    assert_eq!(metrics.succeeded_count(), 0);
    assert_eq!(metrics.failed_count(), 0);
}

#[test]
fn test_concurrent_recording() {
    let metrics = Arc::new(DispatchMetrics::new().expect("Failed to create dispatch metrics"));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let metrics = Arc::clone(&metrics);
            std::thread::spawn(move || {
                for _ in 0..100 {
                    metrics.record_success(0.01, 1);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    assert_eq!(metrics.succeeded_count(), 800);
}

#[test]
fn test_failure_metrics() {
    let metrics = FailureMetrics::new().expect("Failed to create failure metrics");

    metrics.record_routed(true);
    metrics.record_routed(false);
    metrics.record_archived();
    metrics.record_resubmitted();
    metrics.record_manual_intervention();

    assert_eq!(metrics.routed_count(), 2);
    assert_eq!(metrics.archived_count(), 1);
}

#[test]
fn test_config_defaults() {
    let config: MetricsConfig = ron::from_str("()").expect("Failed to parse config");
    assert_eq!(config, MetricsConfig::default());
    assert!(!config.enabled);

    let config: MetricsConfig =
        ron::from_str(r#"(enabled: true, endpoint: "http://collector:4318/v1/metrics")"#)
            .expect("Failed to parse config");
    assert!(config.enabled);
    assert_eq!(config.endpoint, "http://collector:4318/v1/metrics");
}

#[test]
fn test_disabled_config_is_a_no_op() {
    relay_metrics::init_metrics(&MetricsConfig::default()).expect("Disabled init failed");
    assert!(!relay_metrics::is_enabled());
    assert!(relay_metrics::metrics().is_none());
}
