use std::sync::Arc;

use relay_common::{
    ConfigError,
    config::{ProviderConfig, QueueConfig, StorageConfig},
    internal, logging,
};
use relay_delivery::{
    AttachmentLoader, DispatchOrchestrator, EmailDispatcher, EmailMetricsRecorder,
    FailureArchiveWriter, FailureMonitor, FailurePublisher, HttpEmailTransport, MetricsRecorder,
    OutboxPublisher, PoisonPolicy, QueueWorker, SenderDefaults, TransientRetryPolicy,
    WorkerConfig,
};
use relay_metrics::MetricsConfig;
use relay_store::{FileObjectStore, MemoryQueue, ObjectStore, QueueTransport};
use serde::Deserialize;
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;

/// Top-level relay configuration, read from `relay.config.ron`.
#[derive(Debug, Default, Deserialize)]
pub struct Relay {
    #[serde(alias = "queue", default)]
    pub queues: QueueConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub retry: TransientRetryPolicy,
}

async fn listen_for_shutdown(shutdown: CancellationToken) -> std::io::Result<()> {
    let mut terminate = signal(SignalKind::terminate())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            internal!(level = INFO, "CTRL+C entered, shutting down");
        }
        _ = terminate.recv() => {
            internal!(level = INFO, "Terminate signal received, shutting down");
        }
        () = shutdown.cancelled() => return Ok(()),
    }

    shutdown.cancel();
    Ok(())
}

impl Relay {
    /// Check every section before anything is started.
    ///
    /// # Errors
    ///
    /// Returns the first section error found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.queues.validate()?;
        self.storage.validate()?;
        self.provider.validate()
    }

    /// Run the relay with the in-memory queue and the filesystem object store
    /// until CTRL+C or SIGTERM.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, metrics or the
    /// object store fail to initialise, or a worker cannot start.
    pub async fn run(self) -> anyhow::Result<()> {
        logging::init();
        self.validate()?;
        relay_metrics::init_metrics(&self.metrics)?;

        let store = FileObjectStore::builder()
            .path(self.storage.root.clone())
            .build()?;
        store.init().await?;

        let queue = Arc::new(MemoryQueue::new(self.queues.max_dequeue_count));

        let shutdown = CancellationToken::new();
        let signals = tokio::spawn(listen_for_shutdown(shutdown.clone()));

        let ret = self.serve(queue, Arc::new(store), shutdown.clone()).await;

        shutdown.cancel();
        signals.await??;

        internal!(level = INFO, "Shutting down...");

        ret
    }

    /// Wire the dispatch and failure-monitor workers onto `queue` and
    /// `store`, and run both until `shutdown` is cancelled.
    ///
    /// # Errors
    ///
    /// Returns an error if a queue or container cannot be created, the HTTP
    /// client cannot be built, or a worker stops with an error.
    pub async fn serve(
        self,
        queue: Arc<dyn QueueTransport>,
        store: Arc<dyn ObjectStore>,
        shutdown: CancellationToken,
    ) -> anyhow::Result<()> {
        let Self {
            queues,
            storage,
            provider,
            worker,
            retry,
            ..
        } = self;

        for name in [&queues.outbox_queue_name, &queues.failed_queue_name] {
            queue.create_queue_if_not_exists(name).await?;
        }

        for container in [&storage.attachment_container, &storage.logs_container] {
            store.create_container_if_not_exists(container).await?;
        }

        let metrics: Arc<dyn MetricsRecorder> = Arc::new(EmailMetricsRecorder);
        let host_instance_id = ulid::Ulid::new().to_string();

        let dispatcher = EmailDispatcher::new(
            Arc::new(HttpEmailTransport::new(&provider)?),
            AttachmentLoader::new(
                store.clone(),
                storage.attachment_container.clone(),
                metrics.clone(),
            ),
            metrics.clone(),
            SenderDefaults::from(&provider),
        )
        .with_retry_policy(retry);

        let orchestrator = DispatchOrchestrator::new(
            Arc::new(dispatcher),
            FailurePublisher::new(queue.clone(), queues.failed_queue_name.clone()),
            metrics.clone(),
            PoisonPolicy::new(queues.max_dequeue_count),
            host_instance_id.clone(),
        );

        let monitor = FailureMonitor::new(
            FailureArchiveWriter::new(store, storage.logs_container.clone()),
            OutboxPublisher::new(queue.clone(), queues.outbox_queue_name.clone()),
            metrics,
            queues.resubmission_delay(),
        );

        let dispatch_worker = QueueWorker::new(
            queue.clone(),
            queues.outbox_queue_name.clone(),
            Arc::new(orchestrator),
            worker.clone(),
        );
        let monitor_worker = QueueWorker::new(
            queue,
            queues.failed_queue_name.clone(),
            Arc::new(monitor),
            worker,
        );

        internal!(
            level = INFO,
            host_instance_id = %host_instance_id,
            "Relay running: {} -> {}",
            queues.outbox_queue_name,
            queues.failed_queue_name
        );

        tokio::try_join!(
            dispatch_worker.run(shutdown.clone()),
            monitor_worker.run(shutdown),
        )?;

        Ok(())
    }
}
