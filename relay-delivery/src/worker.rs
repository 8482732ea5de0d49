//! Queue-triggered invocation loop.
//!
//! A [`QueueWorker`] polls one queue, decodes each message and hands it to
//! a [`MessageHandler`] in its own task. A handler `Ok` completes the
//! message; any error abandons it so the transport delivers it again.

use std::{fmt::Debug, sync::Arc, time::Duration};

use async_trait::async_trait;
use relay_common::{EmailMessage, FailedEmailMessage, internal};
use relay_store::{QueueError, QueueTransport, ReceivedMessage, poison_queue_name};
use serde::{Deserialize, de::DeserializeOwned};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::{
    error::{HandlerError, error_chain},
    monitor::{FailureMonitor, MonitorOutcome},
    orchestrator::{DispatchOrchestrator, Invocation, Outcome},
};

/// Handles one decoded queue message per invocation.
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    type Message: DeserializeOwned + Send + Sync;
    type Outcome: Debug + Send;

    /// Short name used in logs.
    fn name(&self) -> &'static str;

    async fn handle(
        &self,
        message: &Self::Message,
        invocation: &Invocation,
        cancel: &CancellationToken,
    ) -> Result<Self::Outcome, HandlerError>;
}

#[async_trait]
impl MessageHandler for DispatchOrchestrator {
    type Message = EmailMessage;
    type Outcome = Outcome;

    fn name(&self) -> &'static str {
        "dispatch"
    }

    async fn handle(
        &self,
        message: &EmailMessage,
        invocation: &Invocation,
        cancel: &CancellationToken,
    ) -> Result<Outcome, HandlerError> {
        self.process(message, invocation, cancel).await
    }
}

#[async_trait]
impl MessageHandler for FailureMonitor {
    type Message = FailedEmailMessage;
    type Outcome = MonitorOutcome;

    fn name(&self) -> &'static str {
        "failure-monitor"
    }

    async fn handle(
        &self,
        message: &FailedEmailMessage,
        invocation: &Invocation,
        cancel: &CancellationToken,
    ) -> Result<MonitorOutcome, HandlerError> {
        self.process(message, invocation, cancel).await
    }
}

/// Polling and concurrency settings shared by both workers.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorkerConfig {
    /// Sleep between polls when the queue is empty (in milliseconds)
    #[serde(default = "defaults::poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Maximum invocations in flight per worker
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// How long a received message stays hidden from other consumers (in seconds)
    #[serde(default = "defaults::visibility_timeout_secs")]
    pub visibility_timeout_secs: u64,

    /// Dequeue count at which an undecodable payload is moved to `{queue}-poison`
    #[serde(default = "defaults::dead_letter_after")]
    pub dead_letter_after: u32,

    /// How long shutdown waits for in-flight invocations (in seconds)
    #[serde(default = "defaults::shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: defaults::poll_interval_ms(),
            max_concurrent: defaults::max_concurrent(),
            visibility_timeout_secs: defaults::visibility_timeout_secs(),
            dead_letter_after: defaults::dead_letter_after(),
            shutdown_timeout_secs: defaults::shutdown_timeout_secs(),
        }
    }
}

impl WorkerConfig {
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    #[must_use]
    pub const fn visibility_timeout(&self) -> Duration {
        Duration::from_secs(self.visibility_timeout_secs)
    }
}

mod defaults {
    pub const fn poll_interval_ms() -> u64 {
        1000
    }

    pub const fn max_concurrent() -> usize {
        16
    }

    pub const fn visibility_timeout_secs() -> u64 {
        300
    }

    pub const fn dead_letter_after() -> u32 {
        5
    }

    pub const fn shutdown_timeout_secs() -> u64 {
        30
    }
}

pub struct QueueWorker<H: MessageHandler> {
    queue: Arc<dyn QueueTransport>,
    queue_name: String,
    handler: Arc<H>,
    config: WorkerConfig,
}

impl<H: MessageHandler> QueueWorker<H> {
    pub fn new(
        queue: Arc<dyn QueueTransport>,
        queue_name: impl Into<String>,
        handler: Arc<H>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            queue,
            queue_name: queue_name.into(),
            handler,
            config,
        }
    }

    /// Receive and handle a single message inline.
    ///
    /// Returns `false` when the queue had nothing visible.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport fails to receive.
    pub async fn process_next(&self, cancel: &CancellationToken) -> Result<bool, QueueError> {
        let Some(received) = self
            .queue
            .receive(&self.queue_name, self.config.visibility_timeout())
            .await?
        else {
            return Ok(false);
        };

        self.invocation().run(received, cancel.clone()).await;
        Ok(true)
    }

    /// Poll until `shutdown` is cancelled.
    ///
    /// In-flight invocations share the token, so they abort promptly and
    /// their messages are abandoned for redelivery. Shutdown then waits up
    /// to `shutdown_timeout_secs` for them to finish.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be created.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<(), QueueError> {
        let max_concurrent = self.config.max_concurrent.max(1);

        self.queue
            .create_queue_if_not_exists(&self.queue_name)
            .await?;

        internal!(
            level = INFO,
            "{} worker polling {} with up to {max_concurrent} concurrent invocations",
            self.handler.name(),
            self.queue_name
        );

        let mut in_flight = JoinSet::new();

        loop {
            while let Some(joined) = in_flight.try_join_next() {
                self.log_join(joined);
            }

            if in_flight.len() >= max_concurrent {
                tokio::select! {
                    biased;
                    () = shutdown.cancelled() => break,
                    joined = in_flight.join_next() => {
                        if let Some(joined) = joined {
                            self.log_join(joined);
                        }
                    }
                }
                continue;
            }

            let received = tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                received = self.queue.receive(&self.queue_name, self.config.visibility_timeout()) => received,
            };

            match received {
                Ok(Some(received)) => {
                    in_flight.spawn(self.invocation().run(received, shutdown.clone()));
                    continue;
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(queue = %self.queue_name, error = %e, "Failed to receive from queue");
                }
            }

            tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                () = tokio::time::sleep(self.config.poll_interval()) => {}
            }
        }

        internal!(
            level = INFO,
            "{} worker stopping, waiting for {} in-flight invocations",
            self.handler.name(),
            in_flight.len()
        );

        let drain = async {
            while let Some(joined) = in_flight.join_next().await {
                self.log_join(joined);
            }
        };

        let drained =
            tokio::time::timeout(Duration::from_secs(self.config.shutdown_timeout_secs), drain)
                .await;

        if drained.is_err() {
            tracing::warn!(
                worker = self.handler.name(),
                "Shutdown timeout exceeded, remaining invocations will be redelivered"
            );
            in_flight.abort_all();
        }

        internal!(level = INFO, "{} worker stopped", self.handler.name());
        Ok(())
    }

    fn invocation(&self) -> InvocationTask<H> {
        InvocationTask {
            queue: Arc::clone(&self.queue),
            queue_name: self.queue_name.clone(),
            handler: Arc::clone(&self.handler),
            dead_letter_after: self.config.dead_letter_after,
        }
    }

    fn log_join(&self, joined: Result<(), tokio::task::JoinError>) {
        if let Err(e) = joined {
            tracing::error!(worker = self.handler.name(), error = %e, "Invocation task failed");
        }
    }
}

/// Everything one spawned invocation needs, detached from the worker's lifetime.
struct InvocationTask<H> {
    queue: Arc<dyn QueueTransport>,
    queue_name: String,
    handler: Arc<H>,
    dead_letter_after: u32,
}

impl<H: MessageHandler> InvocationTask<H> {
    async fn run(self, received: ReceivedMessage, cancel: CancellationToken) {
        let invocation = Invocation::new(received.dequeue_count);

        let message = match serde_json::from_str::<H::Message>(&received.body) {
            Ok(message) => message,
            Err(e) => {
                self.undecodable(&received, &invocation, HandlerError::Decode(e))
                    .await;
                return;
            }
        };

        match self.handler.handle(&message, &invocation, &cancel).await {
            Ok(outcome) => {
                tracing::debug!(
                    worker = self.handler.name(),
                    invocation_id = %invocation.invocation_id,
                    ?outcome,
                    "Invocation completed"
                );
                self.settle(&received, true).await;
            }
            Err(error) if error.is_cancelled() => {
                tracing::debug!(
                    worker = self.handler.name(),
                    invocation_id = %invocation.invocation_id,
                    "Invocation cancelled, message will be redelivered"
                );
                self.settle(&received, false).await;
            }
            Err(error) => {
                tracing::warn!(
                    worker = self.handler.name(),
                    invocation_id = %invocation.invocation_id,
                    dequeue_count = invocation.dequeue_count(),
                    error = %error_chain(&error),
                    "Invocation failed, message will be redelivered"
                );
                self.settle(&received, false).await;
            }
        }
    }

    async fn undecodable(
        &self,
        received: &ReceivedMessage,
        invocation: &Invocation,
        error: HandlerError,
    ) {
        let dequeue_count = invocation.dequeue_count();

        if dequeue_count < self.dead_letter_after {
            tracing::warn!(
                queue = %self.queue_name,
                dequeue_count,
                error = %error_chain(&error),
                "Undecodable message, will be redelivered"
            );
            self.settle(received, false).await;
            return;
        }

        let poison = poison_queue_name(&self.queue_name);
        tracing::error!(
            queue = %self.queue_name,
            poison_queue = %poison,
            dequeue_count,
            error = %error_chain(&error),
            "Undecodable message moved to poison queue"
        );

        let moved = async {
            self.queue.create_queue_if_not_exists(&poison).await?;
            self.queue.send(&poison, received.body.clone(), None).await
        };

        match moved.await {
            Ok(()) => self.settle(received, true).await,
            Err(e) => {
                tracing::error!(queue = %poison, error = %e, "Failed to move message to poison queue");
                self.settle(received, false).await;
            }
        }
    }

    async fn settle(&self, received: &ReceivedMessage, complete: bool) {
        let result = if complete {
            self.queue
                .complete(&self.queue_name, &received.receipt)
                .await
        } else {
            self.queue.abandon(&self.queue_name, &received.receipt).await
        };

        if let Err(e) = result {
            tracing::error!(
                queue = %self.queue_name,
                receipt = %received.receipt,
                complete,
                error = %e,
                "Failed to settle message"
            );
        }
    }
}
