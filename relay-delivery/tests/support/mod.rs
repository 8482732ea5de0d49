//! Test support for the delivery crate
//!
//! Recording doubles for the dispatcher's seams and a mock HTTP provider.

pub mod doubles;
pub mod mock_provider;

pub use doubles::{
    ATTACHMENT_CONTAINER, DEFAULT_SENDER, MetricEvent, RecordingMetrics, RecordingTransport,
    UnavailableQueue, attachment_store, dispatcher, dispatcher_with_defaults, receipt,
};
