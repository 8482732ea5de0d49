//! Seams to the external systems the relay depends on.
//!
//! - [`QueueTransport`]: an at-least-once queue with visibility timeouts and
//!   per-message dequeue counts
//! - [`ObjectStore`]: a container/name addressed blob store
//!
//! The in-memory backends implement the same semantics as the managed
//! services closely enough to drive the workers end to end. The file backend
//! is a durable [`ObjectStore`] rooted at a local directory.

pub mod backends;
pub mod blob;
pub mod error;
pub mod queue;

pub use backends::{FileObjectStore, FileObjectStoreBuilder, MemoryObjectStore, MemoryQueue};
pub use blob::{Blob, ObjectStore};
pub use error::{QueueError, StoreError};
pub use queue::{QueueTransport, ReceivedMessage, Receipt, poison_queue_name};
