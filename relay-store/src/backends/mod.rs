//! Backend implementations for the store seams
//!
//! - `memory`: in-memory object store for tests and embedded runs
//! - `queue`: in-memory queue with visibility, dequeue counts and poison routing
//! - `file`: file-based object store for production use

pub mod file;
pub mod memory;
pub mod queue;

pub use file::{FileObjectStore, FileObjectStoreBuilder};
pub use memory::MemoryObjectStore;
pub use queue::MemoryQueue;
