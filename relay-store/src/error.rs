//! Error types for the relay-store crate.

use std::io;

use thiserror::Error;

/// Errors raised by [`ObjectStore`](crate::ObjectStore) implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The container has not been created.
    #[error("Container not found: {0}")]
    ContainerNotFound(String),

    /// No blob exists under the given name.
    #[error("Blob not found: {container}/{name}")]
    NotFound { container: String, name: String },

    /// A container or blob name that cannot be mapped safely onto storage.
    #[error("Invalid blob name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },

    /// The store root failed validation.
    #[error("Invalid store path: {0}")]
    InvalidPath(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Blob properties could not be encoded or decoded.
    #[error("Corrupted blob properties: {0}")]
    Properties(String),

    /// Internal error (lock poisoning, etc.).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Returns `true` when the blob or its container does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::ContainerNotFound(_))
    }
}

/// Errors raised by [`QueueTransport`](crate::QueueTransport) implementations.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The queue has not been created.
    #[error("Queue not found: {0}")]
    QueueNotFound(String),

    /// The receipt is unknown, or the message became visible again and was
    /// handed to another consumer.
    #[error("Receipt {receipt} is not valid for queue {queue}")]
    ReceiptNotFound { queue: String, receipt: String },

    /// Internal error (lock poisoning, etc.).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl<T> From<std::sync::PoisonError<T>> for StoreError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        Self::Internal(format!("Lock poisoned: {e}"))
    }
}

impl<T> From<std::sync::PoisonError<T>> for QueueError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        Self::Internal(format!("Lock poisoned: {e}"))
    }
}
