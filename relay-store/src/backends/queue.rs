use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use tokio::{sync::Notify, time::Instant};

use crate::{QueueError, QueueTransport, ReceivedMessage, Receipt, poison_queue_name};

#[derive(Debug)]
struct StoredMessage {
    body: String,
    visible_at: Instant,
    dequeue_count: u32,
    receipt: Option<Receipt>,
}

/// In-memory queue transport
///
/// Implements the delivery semantics the workers rely on:
/// - messages become visible once their delay expires, in FIFO order
/// - each receive increments the dequeue count, issues a fresh receipt and
///   hides the message for the visibility timeout
/// - a message already dequeued `max_dequeue_count` times is moved to the
///   `{queue}-poison` queue instead of being handed out again
///
/// Time is measured with `tokio::time::Instant`, so paused-clock tests can
/// advance through visibility windows.
#[derive(Debug, Clone)]
pub struct MemoryQueue {
    queues: Arc<Mutex<HashMap<String, VecDeque<StoredMessage>>>>,
    max_dequeue_count: u32,
    notify: Arc<Notify>,
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new(5)
    }
}

impl MemoryQueue {
    /// Create a queue transport that dead-letters after `max_dequeue_count` deliveries.
    #[must_use]
    pub fn new(max_dequeue_count: u32) -> Self {
        Self {
            queues: Arc::new(Mutex::new(HashMap::new())),
            max_dequeue_count: max_dequeue_count.max(1),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Number of messages in `queue`, visible or not.
    ///
    /// Recovers gracefully if the lock is poisoned by accessing the underlying data.
    #[must_use]
    pub fn len(&self, queue: &str) -> usize {
        self.queues
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(queue)
            .map_or(0, VecDeque::len)
    }

    #[must_use]
    pub fn is_empty(&self, queue: &str) -> bool {
        self.len(queue) == 0
    }

    /// Bodies of every message in `queue`, oldest first (for test assertions)
    #[must_use]
    pub fn bodies(&self, queue: &str) -> Vec<String> {
        self.queues
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(queue)
            .map(|messages| messages.iter().map(|m| m.body.clone()).collect())
            .unwrap_or_default()
    }

    /// Time until the oldest message in `queue` becomes visible.
    #[must_use]
    pub fn next_visible_in(&self, queue: &str) -> Option<Duration> {
        let now = Instant::now();
        self.queues
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(queue)?
            .iter()
            .map(|m| m.visible_at.saturating_duration_since(now))
            .min()
    }

    /// Wait until `queue` holds at least `expected` messages, with timeout
    ///
    /// # Errors
    /// Returns an error if the timeout is reached before the expected count
    pub async fn wait_for_count(
        &self,
        queue: &str,
        expected: usize,
        timeout: Duration,
    ) -> Result<(), QueueError> {
        tokio::time::timeout(timeout, async {
            loop {
                let notified = self.notify.notified();
                if self.len(queue) >= expected {
                    return;
                }
                notified.await;
            }
        })
        .await
        .map_err(|e| QueueError::Internal(format!("Timeout waiting for messages: {e}")))
    }

    fn with_queue<T>(
        &self,
        queue: &str,
        f: impl FnOnce(&mut HashMap<String, VecDeque<StoredMessage>>, &mut VecDeque<StoredMessage>) -> T,
    ) -> Result<T, QueueError> {
        let mut queues = self.queues.lock()?;
        let mut messages = queues
            .remove(queue)
            .ok_or_else(|| QueueError::QueueNotFound(queue.to_string()))?;
        let result = f(&mut queues, &mut messages);
        queues.insert(queue.to_string(), messages);
        Ok(result)
    }
}

#[async_trait]
impl QueueTransport for MemoryQueue {
    async fn create_queue_if_not_exists(&self, queue: &str) -> Result<(), QueueError> {
        self.queues.lock()?.entry(queue.to_string()).or_default();
        Ok(())
    }

    async fn send(
        &self,
        queue: &str,
        body: String,
        visibility_delay: Option<Duration>,
    ) -> Result<(), QueueError> {
        let visible_at = Instant::now() + visibility_delay.unwrap_or_default();
        self.with_queue(queue, |_, messages| {
            messages.push_back(StoredMessage {
                body,
                visible_at,
                dequeue_count: 0,
                receipt: None,
            });
        })?;
        self.notify.notify_waiters();
        Ok(())
    }

    async fn receive(
        &self,
        queue: &str,
        visibility_timeout: Duration,
    ) -> Result<Option<ReceivedMessage>, QueueError> {
        let max_dequeue_count = self.max_dequeue_count;
        let (received, poisoned) = self.with_queue(queue, |queues, messages| {
            let now = Instant::now();
            let mut poisoned = Vec::new();

            loop {
                let Some(index) = messages.iter().position(|m| m.visible_at <= now) else {
                    break (None, poisoned);
                };

                if messages[index].dequeue_count >= max_dequeue_count {
                    if let Some(message) = messages.remove(index) {
                        poisoned.push(message.body.clone());
                        queues
                            .entry(poison_queue_name(queue))
                            .or_default()
                            .push_back(StoredMessage {
                                visible_at: now,
                                receipt: None,
                                ..message
                            });
                    }
                    continue;
                }

                let message = &mut messages[index];
                let receipt = Receipt::generate();
                message.dequeue_count += 1;
                message.visible_at = now + visibility_timeout;
                message.receipt = Some(receipt.clone());

                break (
                    Some(ReceivedMessage {
                        receipt,
                        body: message.body.clone(),
                        dequeue_count: Some(message.dequeue_count),
                    }),
                    poisoned,
                );
            }
        })?;

        for body in &poisoned {
            tracing::warn!(
                queue,
                poison_queue = %poison_queue_name(queue),
                max_dequeue_count,
                size = body.len(),
                "Moved message to poison queue"
            );
        }
        if !poisoned.is_empty() {
            self.notify.notify_waiters();
        }

        Ok(received)
    }

    async fn complete(&self, queue: &str, receipt: &Receipt) -> Result<(), QueueError> {
        self.with_queue(queue, |_, messages| {
            messages
                .iter()
                .position(|m| m.receipt.as_ref() == Some(receipt))
                .and_then(|index| messages.remove(index))
        })?
        .map(|_| ())
        .ok_or_else(|| QueueError::ReceiptNotFound {
            queue: queue.to_string(),
            receipt: receipt.to_string(),
        })
    }

    async fn abandon(&self, queue: &str, receipt: &Receipt) -> Result<(), QueueError> {
        let found = self.with_queue(queue, |_, messages| {
            messages
                .iter_mut()
                .find(|m| m.receipt.as_ref() == Some(receipt))
                .map(|message| {
                    message.receipt = None;
                    message.visible_at = Instant::now();
                })
                .is_some()
        })?;

        if found {
            self.notify.notify_waiters();
            Ok(())
        } else {
            Err(QueueError::ReceiptNotFound {
                queue: queue.to_string(),
                receipt: receipt.to_string(),
            })
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const QUEUE: &str = "email-outbox";
    const TIMEOUT: Duration = Duration::from_secs(60);

    async fn queue_with(bodies: &[&str]) -> MemoryQueue {
        let queue = MemoryQueue::new(3);
        queue.create_queue_if_not_exists(QUEUE).await.unwrap();
        for body in bodies {
            queue.send(QUEUE, (*body).to_string(), None).await.unwrap();
        }
        queue
    }

    #[tokio::test]
    async fn test_send_requires_queue() {
        let queue = MemoryQueue::default();
        let result = queue.send("missing", "x".to_string(), None).await;
        assert!(matches!(result, Err(QueueError::QueueNotFound(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_receive_hides_message_until_timeout() {
        let queue = queue_with(&["a"]).await;

        let first = queue.receive(QUEUE, TIMEOUT).await.unwrap().unwrap();
        assert_eq!(first.body, "a");
        assert_eq!(first.dequeue_count, Some(1));
        assert!(queue.receive(QUEUE, TIMEOUT).await.unwrap().is_none());

        tokio::time::advance(TIMEOUT).await;

        let second = queue.receive(QUEUE, TIMEOUT).await.unwrap().unwrap();
        assert_eq!(second.dequeue_count, Some(2));
        assert_ne!(first.receipt, second.receipt);
    }

    #[tokio::test(start_paused = true)]
    async fn test_visibility_delay() {
        let queue = queue_with(&[]).await;
        queue
            .send(QUEUE, "later".to_string(), Some(Duration::from_secs(30)))
            .await
            .unwrap();

        assert!(queue.receive(QUEUE, TIMEOUT).await.unwrap().is_none());
        assert_eq!(queue.next_visible_in(QUEUE), Some(Duration::from_secs(30)));

        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(queue.receive(QUEUE, TIMEOUT).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_complete_removes_message() {
        let queue = queue_with(&["a", "b"]).await;

        let message = queue.receive(QUEUE, TIMEOUT).await.unwrap().unwrap();
        queue.complete(QUEUE, &message.receipt).await.unwrap();

        assert_eq!(queue.bodies(QUEUE), vec!["b".to_string()]);
        assert!(matches!(
            queue.complete(QUEUE, &message.receipt).await,
            Err(QueueError::ReceiptNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_abandon_makes_message_visible() {
        let queue = queue_with(&["a"]).await;

        let message = queue.receive(QUEUE, TIMEOUT).await.unwrap().unwrap();
        queue.abandon(QUEUE, &message.receipt).await.unwrap();

        let again = queue.receive(QUEUE, TIMEOUT).await.unwrap().unwrap();
        assert_eq!(again.body, "a");
        assert_eq!(again.dequeue_count, Some(2));
    }

    #[tokio::test]
    async fn test_exhausted_message_moves_to_poison_queue() {
        let queue = queue_with(&["a"]).await;

        for _ in 0..3 {
            let message = queue.receive(QUEUE, TIMEOUT).await.unwrap().unwrap();
            queue.abandon(QUEUE, &message.receipt).await.unwrap();
        }

        assert!(queue.receive(QUEUE, TIMEOUT).await.unwrap().is_none());
        assert!(queue.is_empty(QUEUE));
        assert_eq!(queue.bodies("email-outbox-poison"), vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_wait_for_count() {
        let queue = queue_with(&[]).await;
        let sender = queue.clone();

        let waiter = tokio::spawn(async move {
            queue
                .wait_for_count(QUEUE, 1, Duration::from_secs(5))
                .await
        });
        tokio::task::yield_now().await;
        sender.send(QUEUE, "a".to_string(), None).await.unwrap();

        assert!(waiter.await.unwrap().is_ok());
    }
}
