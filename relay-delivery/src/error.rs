//! Typed error handling for dispatch and failure routing.
//!
//! [`DispatchError`] is the closed taxonomy every dispatch failure is mapped
//! into. Its classification decides what happens next:
//! - Fatal (validation, configuration) - routed to the failed queue at once
//! - Transient provider errors - retried inside the dispatch, then redelivered
//! - Everything else - redelivered until the poison threshold is reached

use std::fmt;

use relay_common::message::MAX_SUBJECT_LENGTH;
use relay_store::{QueueError, StoreError};
use thiserror::Error;

/// A single structural problem found by the validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    MissingMessageId,
    MissingSubject,
    SubjectTooLong { length: usize },
    NoRecipients,
    /// `field` is the 1-based entry label, e.g. `Recipients[2]`.
    NullEntry { field: String },
    MissingAddress { field: String },
    InvalidAddress { field: String, address: String },
    MissingBlobName { field: String },
    NegativeContentLength { field: String, length: i64 },
    MissingContent,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingMessageId => f.write_str("MessageId is required"),
            Self::MissingSubject => f.write_str("Subject is required"),
            Self::SubjectTooLong { length } => write!(
                f,
                "Subject must be at most {MAX_SUBJECT_LENGTH} characters (got {length})"
            ),
            Self::NoRecipients => f.write_str("At least one recipient is required"),
            Self::NullEntry { field } => write!(f, "{field} cannot be null"),
            Self::MissingAddress { field } => write!(f, "{field}: Address is required"),
            Self::InvalidAddress { field, address } => {
                write!(f, "{field}: '{address}' is not a valid email address")
            }
            Self::MissingBlobName { field } => write!(f, "{field}: BlobName is required"),
            Self::NegativeContentLength { field, length } => {
                write!(f, "{field}: ContentLength must be non-negative (got {length})")
            }
            Self::MissingContent => {
                f.write_str("Email content must include plain text, HTML, or a template id")
            }
        }
    }
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Every violation found in one message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", join_violations(.violations))]
pub struct ValidationError {
    pub violations: Vec<Violation>,
}

impl ValidationError {
    /// Returns `true` if the message carried no plain text, HTML or template id.
    #[must_use]
    pub fn is_missing_content(&self) -> bool {
        self.violations.contains(&Violation::MissingContent)
    }
}

/// Sender or recipient configuration that makes a message undeliverable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("Email sender address is not configured")]
    MissingSender,

    #[error("At least one 'To' recipient is required")]
    NoToRecipients,
}

/// A failed call to the email provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    /// HTTP-style status, absent when the request never produced a response.
    pub status: Option<u16>,
    pub message: String,
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "Provider returned status {status}: {}", self.message),
            None => write!(f, "Request failed: {}", self.message),
        }
    }
}

impl std::error::Error for ProviderError {}

impl ProviderError {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Server errors and throttling are worth retrying; nothing else is.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self.status, Some(status) if status >= 500 || status == 429)
    }
}

/// Top-level dispatch error type.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The message failed structural validation.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// No usable sender or To recipient.
    #[error("Invalid dispatch configuration: {0}")]
    Configuration(#[from] ConfigurationError),

    /// The provider rejected the message or could not be reached.
    #[error("Email provider error: {0}")]
    Provider(#[from] ProviderError),

    /// An attachment blob could not be read.
    #[error("Failed to load attachment {container}/{blob}")]
    Attachment {
        container: String,
        blob: String,
        #[source]
        source: StoreError,
    },

    /// The invocation was cancelled.
    #[error("Dispatch cancelled")]
    Cancelled,
}

impl DispatchError {
    /// Returns `true` if redelivery can never succeed.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Configuration(_))
    }

    /// Returns `true` if the in-dispatch retry policy should try again.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Provider(e) if e.is_transient())
    }

    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Classification written to `errorType` on the failure envelope.
    #[must_use]
    pub const fn error_type(&self) -> &'static str {
        match self {
            Self::Validation(_) => "Validation",
            Self::Configuration(_) => "Configuration",
            Self::Provider(_) => "Provider",
            Self::Attachment { .. } => "Attachment",
            Self::Cancelled => "Cancelled",
        }
    }
}

/// Failure to put a message on a queue.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Failed to serialize message: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to enqueue message: {0}")]
    Queue(#[from] QueueError),

    #[error("Publish cancelled")]
    Cancelled,
}

impl PublishError {
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Failure to write a failure archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Failed to serialize failure record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to write failure record: {0}")]
    Store(#[from] StoreError),

    #[error("Archive cancelled")]
    Cancelled,
}

impl ArchiveError {
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Errors that end a queue-triggered invocation without completing the message.
///
/// The queue worker abandons the delivery for every variant, so the transport
/// makes it visible again and eventually dead-letters it.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The message body was not valid JSON for the expected payload.
    #[error("Failed to decode queue message: {0}")]
    Decode(#[source] serde_json::Error),

    /// A non-fatal dispatch failure below the poison threshold.
    #[error("Dispatch failed, message will be redelivered: {0}")]
    Redeliver(#[source] DispatchError),

    /// Publishing the failure envelope failed.
    #[error("Failed to route message to the failed queue: {0}")]
    RouteFailure(#[source] PublishError),

    #[error("Failed to archive failed message: {0}")]
    Archive(#[from] ArchiveError),

    /// Auto-retry resubmission to the outbox failed after archival.
    #[error("Failed to resubmit message to the outbox: {0}")]
    Resubmit(#[source] PublishError),

    /// The worker is shutting down. Never counted against the poison threshold.
    #[error("Invocation cancelled")]
    Cancelled,
}

impl HandlerError {
    /// Returns `true` if the invocation stopped because of shutdown rather
    /// than a failure.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::Redeliver(e) => e.is_cancelled(),
            Self::RouteFailure(e) | Self::Resubmit(e) => e.is_cancelled(),
            Self::Archive(e) => e.is_cancelled(),
            Self::Decode(_) => false,
        }
    }
}

/// Render an error and its source chain, one cause per line.
#[must_use]
pub fn error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut rendered = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        rendered.push_str("\n  caused by: ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}
