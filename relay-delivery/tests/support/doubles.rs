//! Recording test doubles for the transport, metrics and queue seams
#![allow(dead_code)] // Test utility module - not all helpers used in every test

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use relay_common::EmailMessage;
use relay_delivery::{
    AttachmentLoader, DispatchError, EmailDispatcher, EmailTransport, MetricsRecorder,
    OutboundEmail, ProviderError, SendReceipt, SenderDefaults,
};
use relay_store::{
    MemoryObjectStore, ObjectStore, QueueError, QueueTransport, ReceivedMessage, Receipt,
    StoreError,
};
use tokio::time::Instant;

pub const ATTACHMENT_CONTAINER: &str = "email-attachments";
pub const DEFAULT_SENDER: &str = "noreply@example.com";

/// Email transport that replays scripted responses and records every call
pub struct RecordingTransport {
    script: Mutex<VecDeque<Result<SendReceipt, ProviderError>>>,
    fallback: Result<SendReceipt, ProviderError>,
    calls: Mutex<Vec<(Instant, OutboundEmail)>>,
}

impl RecordingTransport {
    /// Accept every message
    pub fn succeeding() -> Self {
        Self::scripted(Vec::new(), Ok(receipt("op-1")))
    }

    /// Fail every call with `status`
    pub fn failing(status: u16) -> Self {
        Self::scripted(
            Vec::new(),
            Err(ProviderError::new(Some(status), "scripted failure")),
        )
    }

    /// Replay `script` in order, then answer with `fallback`
    pub fn scripted(
        script: Vec<Result<SendReceipt, ProviderError>>,
        fallback: Result<SendReceipt, ProviderError>,
    ) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn sent(&self) -> Vec<OutboundEmail> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, email)| email.clone())
            .collect()
    }

    /// Gaps between consecutive calls
    pub fn intervals(&self) -> Vec<Duration> {
        let calls = self.calls.lock().unwrap();
        calls
            .windows(2)
            .map(|pair| pair[1].0.duration_since(pair[0].0))
            .collect()
    }
}

#[async_trait]
impl EmailTransport for RecordingTransport {
    async fn send(&self, email: &OutboundEmail) -> Result<SendReceipt, ProviderError> {
        self.calls
            .lock()
            .unwrap()
            .push((Instant::now(), email.clone()));

        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

pub fn receipt(id: &str) -> SendReceipt {
    SendReceipt { id: id.to_string() }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MetricEvent {
    Succeeded {
        message_id: String,
        recipients: usize,
    },
    Failed {
        message_id: String,
        error_type: &'static str,
        attempt: u32,
    },
    AttachmentFailed {
        container: String,
        blob: String,
    },
    Routed {
        message_id: String,
        is_fatal: bool,
    },
    Archived {
        message_id: String,
        path: String,
    },
    Resubmitted {
        message_id: String,
        delay: Duration,
    },
    ManualIntervention {
        message_id: String,
    },
}

/// Metrics recorder that keeps every event for assertions
#[derive(Default)]
pub struct RecordingMetrics {
    events: Mutex<Vec<MetricEvent>>,
}

impl RecordingMetrics {
    pub fn events(&self) -> Vec<MetricEvent> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: MetricEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl MetricsRecorder for RecordingMetrics {
    fn dispatch_succeeded(
        &self,
        message: &EmailMessage,
        _receipt: &SendReceipt,
        _elapsed: Duration,
        recipient_count: usize,
    ) {
        self.push(MetricEvent::Succeeded {
            message_id: message.message_id.clone(),
            recipients: recipient_count,
        });
    }

    fn dispatch_failed(&self, message: &EmailMessage, error: &DispatchError, attempt_count: u32) {
        self.push(MetricEvent::Failed {
            message_id: message.message_id.clone(),
            error_type: error.error_type(),
            attempt: attempt_count,
        });
    }

    fn attachment_load_failed(&self, container: &str, blob: &str, _error: &StoreError) {
        self.push(MetricEvent::AttachmentFailed {
            container: container.to_string(),
            blob: blob.to_string(),
        });
    }

    fn routed_to_failed_queue(&self, message: &EmailMessage, is_fatal: bool) {
        self.push(MetricEvent::Routed {
            message_id: message.message_id.clone(),
            is_fatal,
        });
    }

    fn failure_archived(&self, message: &EmailMessage, path: &str) {
        self.push(MetricEvent::Archived {
            message_id: message.message_id.clone(),
            path: path.to_string(),
        });
    }

    fn failure_resubmitted(&self, message: &EmailMessage, delay: Duration) {
        self.push(MetricEvent::Resubmitted {
            message_id: message.message_id.clone(),
            delay,
        });
    }

    fn manual_intervention_required(&self, message: &EmailMessage) {
        self.push(MetricEvent::ManualIntervention {
            message_id: message.message_id.clone(),
        });
    }
}

/// Queue transport whose sends always fail
#[derive(Default)]
pub struct UnavailableQueue {
    sends: Mutex<usize>,
}

impl UnavailableQueue {
    pub fn send_attempts(&self) -> usize {
        *self.sends.lock().unwrap()
    }
}

#[async_trait]
impl QueueTransport for UnavailableQueue {
    async fn create_queue_if_not_exists(&self, _queue: &str) -> Result<(), QueueError> {
        Ok(())
    }

    async fn send(
        &self,
        _queue: &str,
        _body: String,
        _visibility_delay: Option<Duration>,
    ) -> Result<(), QueueError> {
        *self.sends.lock().unwrap() += 1;
        Err(QueueError::Internal("queue service unavailable".to_string()))
    }

    async fn receive(
        &self,
        _queue: &str,
        _visibility_timeout: Duration,
    ) -> Result<Option<ReceivedMessage>, QueueError> {
        Ok(None)
    }

    async fn complete(&self, queue: &str, receipt: &Receipt) -> Result<(), QueueError> {
        Err(QueueError::ReceiptNotFound {
            queue: queue.to_string(),
            receipt: receipt.to_string(),
        })
    }

    async fn abandon(&self, queue: &str, receipt: &Receipt) -> Result<(), QueueError> {
        Err(QueueError::ReceiptNotFound {
            queue: queue.to_string(),
            receipt: receipt.to_string(),
        })
    }
}

/// Object store with the attachment container already created
pub async fn attachment_store() -> Arc<MemoryObjectStore> {
    let store = Arc::new(MemoryObjectStore::new());
    store
        .create_container_if_not_exists(ATTACHMENT_CONTAINER)
        .await
        .unwrap();
    store
}

/// Dispatcher wired to the given doubles with the default sender configured
pub fn dispatcher(
    transport: Arc<RecordingTransport>,
    store: Arc<MemoryObjectStore>,
    metrics: Arc<RecordingMetrics>,
) -> EmailDispatcher {
    dispatcher_with_defaults(
        transport,
        store,
        metrics,
        SenderDefaults {
            sender_address: Some(DEFAULT_SENDER.to_string()),
            reply_to_address: None,
        },
    )
}

pub fn dispatcher_with_defaults(
    transport: Arc<RecordingTransport>,
    store: Arc<MemoryObjectStore>,
    metrics: Arc<RecordingMetrics>,
    defaults: SenderDefaults,
) -> EmailDispatcher {
    let loader = AttachmentLoader::new(store, ATTACHMENT_CONTAINER, metrics.clone());
    EmailDispatcher::new(transport, loader, metrics, defaults)
}
