//! Outbox dispatch and failed-queue handling for the email relay
//!
//! This crate provides functionality to:
//! - Validate outbox messages and load their attachments
//! - Send them through an HTTP email provider with transient retries
//! - Route poisoned or fatally invalid messages to the failed queue
//! - Archive failures and resubmit the ones flagged for auto-retry

mod archive;
mod attachments;
mod content;
mod dispatcher;
mod error;
mod metrics;
mod monitor;
mod orchestrator;
pub mod policy;
mod publish;
pub mod transport;
mod validate;
mod worker;

pub use archive::FailureArchiveWriter;
pub use attachments::{AttachmentLoader, DEFAULT_CONTENT_TYPE};
pub use content::{ContentResolver, LiteralContentResolver, RenderedContent};
pub use dispatcher::{EmailDispatcher, SenderDefaults};
pub use error::{
    ArchiveError, ConfigurationError, DispatchError, HandlerError, ProviderError, PublishError,
    ValidationError, Violation, error_chain,
};
pub use metrics::{EmailMetricsRecorder, MetricsRecorder};
pub use monitor::{FailureMonitor, MonitorOutcome};
pub use orchestrator::{DispatchOrchestrator, Invocation, Outcome};
pub use policy::{PoisonDecision, PoisonPolicy, TransientRetryPolicy};
pub use publish::{FailurePublisher, OutboxPublisher};
pub use transport::{
    EmailTransport, HttpEmailTransport, OutboundAddress, OutboundAttachment, OutboundEmail,
    OutboundRecipients, SendReceipt,
};
pub use validate::validate;
pub use worker::{MessageHandler, QueueWorker, WorkerConfig};
