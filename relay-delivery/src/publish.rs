//! Queue publishers for failure envelopes and resubmitted messages.
//!
//! Neither retries: a failed enqueue surfaces as [`PublishError`] and the
//! queue worker leaves the triggering delivery for redelivery.

use std::{sync::Arc, time::Duration};

use relay_common::{EmailMessage, FailedEmailMessage};
use relay_store::QueueTransport;
use tokio_util::sync::CancellationToken;

use crate::error::PublishError;

async fn publish(
    queue: &dyn QueueTransport,
    name: &str,
    body: String,
    visibility_delay: Option<Duration>,
    cancel: &CancellationToken,
) -> Result<(), PublishError> {
    let enqueue = async {
        queue.create_queue_if_not_exists(name).await?;
        queue.send(name, body, visibility_delay).await
    };

    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(PublishError::Cancelled),
        sent = enqueue => sent.map_err(PublishError::from),
    }
}

/// Publishes [`FailedEmailMessage`]s to the failed queue.
#[derive(Clone)]
pub struct FailurePublisher {
    queue: Arc<dyn QueueTransport>,
    queue_name: String,
}

impl FailurePublisher {
    pub fn new(queue: Arc<dyn QueueTransport>, queue_name: impl Into<String>) -> Self {
        Self {
            queue,
            queue_name: queue_name.into(),
        }
    }

    /// # Errors
    ///
    /// Returns an error if the envelope cannot be serialized or enqueued, or
    /// [`PublishError::Cancelled`] if `cancel` fires first.
    pub async fn publish(
        &self,
        message: &FailedEmailMessage,
        cancel: &CancellationToken,
    ) -> Result<(), PublishError> {
        let body = serde_json::to_string(message)?;

        tracing::error!(
            message_id = %message.original_message.message_id,
            queue = %self.queue_name,
            "Enqueuing failed email {} onto queue {}",
            message.original_message.message_id,
            self.queue_name
        );

        publish(self.queue.as_ref(), &self.queue_name, body, None, cancel).await
    }
}

/// Publishes [`EmailMessage`]s back onto the outbox queue.
#[derive(Clone)]
pub struct OutboxPublisher {
    queue: Arc<dyn QueueTransport>,
    queue_name: String,
}

impl OutboxPublisher {
    pub fn new(queue: Arc<dyn QueueTransport>, queue_name: impl Into<String>) -> Self {
        Self {
            queue,
            queue_name: queue_name.into(),
        }
    }

    /// Enqueue `message`, invisible to consumers for `visibility_delay` if given.
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be serialized or enqueued, or
    /// [`PublishError::Cancelled`] if `cancel` fires first.
    pub async fn publish(
        &self,
        message: &EmailMessage,
        visibility_delay: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<(), PublishError> {
        let body = serde_json::to_string(message)?;

        tracing::info!(
            message_id = %message.message_id,
            queue = %self.queue_name,
            delay_secs = visibility_delay.map(|d| d.as_secs()),
            "Resubmitting email {} to queue {}",
            message.message_id,
            self.queue_name
        );

        publish(
            self.queue.as_ref(),
            &self.queue_name,
            body,
            visibility_delay,
            cancel,
        )
        .await
    }
}
