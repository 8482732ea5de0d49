use async_trait::async_trait;

use crate::StoreError;

/// Bytes and properties of a stored blob.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Blob {
    pub content: Vec<u8>,
    /// Content type recorded when the blob was written, if any.
    pub content_type: Option<String>,
}

/// Container/name addressed blob storage.
///
/// Names may contain `/` to form virtual directories
/// (`failures/2024/05/01/abc.json`).
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Create `container` unless it already exists.
    async fn create_container_if_not_exists(&self, container: &str) -> Result<(), StoreError>;

    /// Read a blob.
    async fn get(&self, container: &str, name: &str) -> Result<Blob, StoreError>;

    /// Write a blob, replacing any existing one. The container must exist.
    async fn put(
        &self,
        container: &str,
        name: &str,
        content: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<(), StoreError>;
}
