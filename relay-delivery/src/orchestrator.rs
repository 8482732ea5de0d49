//! Outbox invocation handling: dispatch, then decide between completion,
//! redelivery and failed-queue routing.

use std::sync::Arc;

use chrono::Utc;
use relay_common::{
    EmailMessage, FailedEmailMessage,
    message::diagnostics,
};
use tokio_util::sync::CancellationToken;

use crate::{
    dispatcher::EmailDispatcher,
    error::{DispatchError, HandlerError, error_chain},
    metrics::MetricsRecorder,
    policy::{PoisonDecision, PoisonPolicy},
    publish::FailurePublisher,
    transport::SendReceipt,
};

/// Per-invocation context supplied by the queue worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub invocation_id: String,
    /// Deliveries so far including this one; `None` when the transport does not say.
    pub dequeue_count: Option<u32>,
}

impl Invocation {
    pub fn new(dequeue_count: Option<u32>) -> Self {
        Self {
            invocation_id: ulid::Ulid::new().to_string(),
            dequeue_count,
        }
    }

    #[must_use]
    pub fn dequeue_count(&self) -> u32 {
        self.dequeue_count.unwrap_or(1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Delivered(SendReceipt),
    RoutedToFailedQueue,
}

/// Drives one outbox message through the dispatcher.
pub struct DispatchOrchestrator {
    dispatcher: Arc<EmailDispatcher>,
    publisher: FailurePublisher,
    metrics: Arc<dyn MetricsRecorder>,
    poison: PoisonPolicy,
    host_instance_id: String,
}

impl DispatchOrchestrator {
    pub fn new(
        dispatcher: Arc<EmailDispatcher>,
        publisher: FailurePublisher,
        metrics: Arc<dyn MetricsRecorder>,
        poison: PoisonPolicy,
        host_instance_id: impl Into<String>,
    ) -> Self {
        Self {
            dispatcher,
            publisher,
            metrics,
            poison,
            host_instance_id: host_instance_id.into(),
        }
    }

    /// Handle one delivery of `message`.
    ///
    /// # Errors
    ///
    /// [`HandlerError::Redeliver`] when the message should stay on the queue,
    /// [`HandlerError::Cancelled`] when `cancel` fired before the message was
    /// settled, [`HandlerError::RouteFailure`] when the failure envelope could
    /// not be published.
    pub async fn process(
        &self,
        message: &EmailMessage,
        invocation: &Invocation,
        cancel: &CancellationToken,
    ) -> Result<Outcome, HandlerError> {
        let dequeue_count = invocation.dequeue_count();
        let message = message.with_attempt_count(dequeue_count);

        let error = match self.dispatcher.dispatch(&message, cancel).await {
            Ok(receipt) => return Ok(Outcome::Delivered(receipt)),
            Err(error) => error,
        };

        if error.is_cancelled() {
            tracing::info!(
                message_id = %message.message_id,
                attempt = dequeue_count,
                "Dispatch of message {} cancelled, leaving it for redelivery",
                message.message_id
            );
            return Err(HandlerError::Cancelled);
        }

        let is_fatal = error.is_fatal();
        tracing::error!(
            message_id = %message.message_id,
            attempt = dequeue_count,
            is_fatal,
            error_type = error.error_type(),
            error = %error,
            "Email dispatch failed for message {}",
            message.message_id
        );

        match self.poison.decide(&error, dequeue_count) {
            PoisonDecision::Redeliver => Err(HandlerError::Redeliver(error)),
            PoisonDecision::RouteToFailedQueue => {
                let failed = self.failure_envelope(message, &error, invocation);
                self.publisher
                    .publish(&failed, cancel)
                    .await
                    .map_err(HandlerError::RouteFailure)?;
                self.metrics
                    .routed_to_failed_queue(&failed.original_message, is_fatal);
                Ok(Outcome::RoutedToFailedQueue)
            }
        }
    }

    fn failure_envelope(
        &self,
        message: EmailMessage,
        error: &DispatchError,
        invocation: &Invocation,
    ) -> FailedEmailMessage {
        let dequeue_count = invocation.dequeue_count();

        let mut failed = FailedEmailMessage::new(message);
        failed.error_message = Some(error.to_string());
        failed.error_type = Some(error.error_type().to_string());
        failed.stack_trace = Some(error_chain(error));
        failed.failed_at_utc = Utc::now();
        failed.dequeue_count = dequeue_count;

        failed
            .diagnostics
            .insert(diagnostics::INVOCATION_ID, invocation.invocation_id.clone());
        failed
            .diagnostics
            .insert(diagnostics::HOST_INSTANCE_ID, self.host_instance_id.clone());
        failed
            .diagnostics
            .insert(diagnostics::DEQUEUE_COUNT, dequeue_count.to_string());
        failed
            .diagnostics
            .insert(diagnostics::IS_FATAL, error.is_fatal().to_string());

        failed
    }
}
