//! Retry policies.
//!
//! Two independent layers:
//! - [`TransientRetryPolicy`]: backoff between send attempts within one invocation
//! - [`PoisonPolicy`]: whether a failed delivery is redelivered or routed to the failed queue

pub mod poison;
pub mod retry;

pub use poison::{PoisonDecision, PoisonPolicy};
pub use retry::TransientRetryPolicy;
