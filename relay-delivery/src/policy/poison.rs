use crate::error::DispatchError;

/// What the orchestrator does with a failed dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoisonDecision {
    /// Leave the message on the queue for another delivery.
    Redeliver,
    /// Publish a failure envelope and complete the delivery.
    RouteToFailedQueue,
}

/// Cross-invocation accounting: how many deliveries a message gets before it
/// is routed to the failed queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoisonPolicy {
    pub max_dequeue_count: u32,
}

impl PoisonPolicy {
    #[must_use]
    pub const fn new(max_dequeue_count: u32) -> Self {
        Self { max_dequeue_count }
    }

    /// Fatal errors are routed at once; anything else only once the
    /// threshold is reached. A cancelled dispatch is never routed.
    #[must_use]
    pub const fn decide(&self, error: &DispatchError, dequeue_count: u32) -> PoisonDecision {
        if error.is_cancelled() {
            PoisonDecision::Redeliver
        } else if error.is_fatal() || dequeue_count >= self.max_dequeue_count {
            PoisonDecision::RouteToFailedQueue
        } else {
            PoisonDecision::Redeliver
        }
    }
}

impl Default for PoisonPolicy {
    fn default() -> Self {
        Self::new(5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConfigurationError, ProviderError};

    #[test]
    fn test_non_fatal_below_threshold_is_redelivered() {
        let policy = PoisonPolicy::default();
        let error = DispatchError::from(ProviderError::new(Some(503), "busy"));

        assert_eq!(policy.decide(&error, 1), PoisonDecision::Redeliver);
        assert_eq!(policy.decide(&error, 4), PoisonDecision::Redeliver);
        assert_eq!(policy.decide(&error, 5), PoisonDecision::RouteToFailedQueue);
        assert_eq!(policy.decide(&error, 9), PoisonDecision::RouteToFailedQueue);
    }

    #[test]
    fn test_fatal_is_routed_immediately() {
        let policy = PoisonPolicy::new(20);
        let error = DispatchError::from(ConfigurationError::MissingSender);

        assert_eq!(policy.decide(&error, 1), PoisonDecision::RouteToFailedQueue);
    }

    #[test]
    fn test_cancellation_below_threshold_is_redelivered() {
        let policy = PoisonPolicy::default();
        assert_eq!(
            policy.decide(&DispatchError::Cancelled, 2),
            PoisonDecision::Redeliver
        );
    }

    #[test]
    fn test_cancellation_at_threshold_is_redelivered() {
        let policy = PoisonPolicy::default();
        assert_eq!(
            policy.decide(&DispatchError::Cancelled, 5),
            PoisonDecision::Redeliver
        );
        assert_eq!(
            policy.decide(&DispatchError::Cancelled, 50),
            PoisonDecision::Redeliver
        );
    }
}
