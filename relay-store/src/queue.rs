use std::{fmt, time::Duration};

use async_trait::async_trait;

use crate::QueueError;

/// Name of the dead-letter queue paired with `queue`.
#[must_use]
pub fn poison_queue_name(queue: &str) -> String {
    format!("{queue}-poison")
}

/// Handle identifying one delivery of a message.
///
/// A fresh receipt is issued on every dequeue, so a stale receipt cannot
/// complete a message that has since been redelivered.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Receipt(String);

impl Receipt {
    /// Generate a new unique receipt
    #[must_use]
    pub fn generate() -> Self {
        Self(ulid::Ulid::new().to_string())
    }

    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Receipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A message handed out by [`QueueTransport::receive`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    pub receipt: Receipt,
    pub body: String,
    /// Number of times the message has been dequeued, including this one.
    /// `None` when the transport does not track it.
    pub dequeue_count: Option<u32>,
}

/// An at-least-once message queue.
///
/// Received messages stay invisible for the visibility timeout; unless they
/// are completed in that window they are delivered again.
#[async_trait]
pub trait QueueTransport: Send + Sync {
    /// Create `queue` unless it already exists.
    async fn create_queue_if_not_exists(&self, queue: &str) -> Result<(), QueueError>;

    /// Enqueue `body`, hidden from consumers for `visibility_delay` when given.
    async fn send(
        &self,
        queue: &str,
        body: String,
        visibility_delay: Option<Duration>,
    ) -> Result<(), QueueError>;

    /// Take the next visible message, if any.
    async fn receive(
        &self,
        queue: &str,
        visibility_timeout: Duration,
    ) -> Result<Option<ReceivedMessage>, QueueError>;

    /// Remove a received message permanently.
    async fn complete(&self, queue: &str, receipt: &Receipt) -> Result<(), QueueError>;

    /// Release a received message so it becomes visible again immediately.
    async fn abandon(&self, queue: &str, receipt: &Receipt) -> Result<(), QueueError>;
}
