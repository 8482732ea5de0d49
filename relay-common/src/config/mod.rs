//! Configuration sections shared by the relay crates.
//!
//! - [`queue`]: queue names, poison threshold and resubmission delay
//! - [`storage`]: object store containers and filesystem root
//! - [`provider`]: transactional-email endpoint and sender defaults
//!
//! Every field has a serde default so partial documents deserialize, and
//! each section exposes `validate()` for the ranges and address formats that
//! serde cannot express.

pub mod provider;
pub mod queue;
pub mod storage;

pub use provider::ProviderConfig;
pub use queue::QueueConfig;
pub use storage::StorageConfig;
