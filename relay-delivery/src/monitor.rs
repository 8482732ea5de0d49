use std::{sync::Arc, time::Duration};

use relay_common::FailedEmailMessage;
use tokio_util::sync::CancellationToken;

use crate::{
    archive::FailureArchiveWriter,
    error::HandlerError,
    metrics::MetricsRecorder,
    orchestrator::Invocation,
    publish::OutboxPublisher,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorOutcome {
    /// Archived and put back on the outbox after `delay`.
    Resubmitted { archive: String, delay: Duration },
    /// Archived only.
    ManualInterventionRequired { archive: String },
}

/// Consumes the failed queue: archive every envelope, then resubmit the
/// ones flagged for auto-retry.
pub struct FailureMonitor {
    archive: FailureArchiveWriter,
    outbox: OutboxPublisher,
    metrics: Arc<dyn MetricsRecorder>,
    resubmission_delay: Duration,
}

impl FailureMonitor {
    /// `resubmission_delay` is normally [`relay_common::config::QueueConfig::resubmission_delay`].
    pub fn new(
        archive: FailureArchiveWriter,
        outbox: OutboxPublisher,
        metrics: Arc<dyn MetricsRecorder>,
        resubmission_delay: Duration,
    ) -> Self {
        Self {
            archive,
            outbox,
            metrics,
            resubmission_delay,
        }
    }

    /// # Errors
    ///
    /// [`HandlerError::Archive`] if archival fails, in which case nothing is
    /// resubmitted; [`HandlerError::Resubmit`] if the outbox enqueue fails;
    /// [`HandlerError::Cancelled`] if `cancel` fires before archival completes.
    pub async fn process(
        &self,
        failed: &FailedEmailMessage,
        invocation: &Invocation,
        cancel: &CancellationToken,
    ) -> Result<MonitorOutcome, HandlerError> {
        let message_id = &failed.original_message.message_id;

        tracing::warn!(
            message_id = %message_id,
            dequeue_count = invocation.dequeue_count(),
            "Processing failed email {message_id} from failed queue"
        );

        let archive = match self.archive.write(failed, cancel).await {
            Ok(archive) => archive,
            Err(e) if e.is_cancelled() => return Err(HandlerError::Cancelled),
            Err(e) => return Err(e.into()),
        };
        self.metrics
            .failure_archived(&failed.original_message, &archive);

        if !failed.wants_auto_retry() {
            tracing::info!(
                message_id = %message_id,
                archive = %archive,
                "Failed email {message_id} archived. Manual intervention required."
            );
            self.metrics
                .manual_intervention_required(&failed.original_message);
            return Ok(MonitorOutcome::ManualInterventionRequired { archive });
        }

        let message = failed.original_message.with_attempt_count(0);
        let delay = self.resubmission_delay;

        self.outbox
            .publish(&message, Some(delay), cancel)
            .await
            .map_err(HandlerError::Resubmit)?;

        tracing::warn!(
            message_id = %message_id,
            delay_secs = delay.as_secs(),
            "Automatically resubmitted failed email {message_id} to outbox queue after archival"
        );
        self.metrics.failure_resubmitted(&message, delay);

        Ok(MonitorOutcome::Resubmitted { archive, delay })
    }
}
