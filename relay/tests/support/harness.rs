//! Runs a fully wired relay against in-memory queue and store backends

use std::{sync::Arc, time::Duration};

use relay::controller::Relay;
use relay_common::{EmailMessage, config::ProviderConfig};
use relay_delivery::{TransientRetryPolicy, WorkerConfig};
use relay_store::{MemoryObjectStore, MemoryQueue, QueueTransport};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub const OUTBOX: &str = "email-outbox";
pub const FAILED: &str = "email-failed";
pub const LOGS: &str = "email-logs";

pub struct RelayHarness {
    pub queue: Arc<MemoryQueue>,
    pub store: Arc<MemoryObjectStore>,
    shutdown: CancellationToken,
    handle: JoinHandle<anyhow::Result<()>>,
}

pub struct RelayHarnessBuilder {
    relay: Relay,
}

impl RelayHarness {
    pub fn builder(endpoint: String) -> RelayHarnessBuilder {
        RelayHarnessBuilder {
            relay: Relay {
                provider: ProviderConfig {
                    endpoint,
                    default_sender_address: "noreply@example.com".to_string(),
                    ..Default::default()
                },
                worker: WorkerConfig {
                    poll_interval_ms: 10,
                    ..Default::default()
                },
                ..Default::default()
            },
        }
    }

    pub async fn enqueue(&self, message: &EmailMessage) -> anyhow::Result<()> {
        let body = serde_json::to_string(message)?;
        self.queue.send(OUTBOX, body, None).await?;
        Ok(())
    }

    /// Poll `check` until it holds, or fail after `timeout`
    pub async fn wait_until(
        &self,
        timeout: Duration,
        check: impl Fn(&Self) -> bool,
    ) -> anyhow::Result<()> {
        tokio::time::timeout(timeout, async {
            while !check(self) {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .map_err(|_| anyhow::anyhow!("condition not met within {timeout:?}"))
    }

    pub async fn shutdown(self) -> anyhow::Result<()> {
        self.shutdown.cancel();
        self.handle.await?
    }
}

impl RelayHarnessBuilder {
    pub fn with_max_dequeue_count(mut self, count: u32) -> Self {
        self.relay.queues.max_dequeue_count = count;
        self
    }

    pub fn with_retry_policy(mut self, retry: TransientRetryPolicy) -> Self {
        self.relay.retry = retry;
        self
    }

    pub async fn build(self) -> anyhow::Result<RelayHarness> {
        self.relay.validate()?;

        let queue = Arc::new(MemoryQueue::new(self.relay.queues.max_dequeue_count));
        let store = Arc::new(MemoryObjectStore::new());
        let shutdown = CancellationToken::new();

        let handle = tokio::spawn(self.relay.serve(
            queue.clone(),
            store.clone(),
            shutdown.clone(),
        ));

        tokio::time::timeout(Duration::from_secs(5), async {
            while !store.contains_container(LOGS) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await?;

        Ok(RelayHarness {
            queue,
            store,
            shutdown,
            handle,
        })
    }
}
