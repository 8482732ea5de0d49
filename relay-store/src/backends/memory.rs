use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use async_trait::async_trait;

use crate::{Blob, ObjectStore, StoreError};

type Containers = HashMap<String, HashMap<String, Blob>>;

/// In-memory object store
///
/// Blobs live in a map of containers protected by an `RwLock`. Writing to a
/// container that was never created fails, matching the managed service.
#[derive(Debug, Clone, Default)]
pub struct MemoryObjectStore {
    containers: Arc<RwLock<Containers>>,
}

impl MemoryObjectStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of the blobs in `container`, sorted.
    ///
    /// Recovers gracefully if the lock is poisoned by accessing the underlying data.
    #[must_use]
    pub fn names(&self, container: &str) -> Vec<String> {
        let containers = self
            .containers
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut names: Vec<_> = containers
            .get(container)
            .map(|blobs| blobs.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    #[must_use]
    pub fn contains_container(&self, container: &str) -> bool {
        self.containers
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .contains_key(container)
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn create_container_if_not_exists(&self, container: &str) -> Result<(), StoreError> {
        self.containers
            .write()?
            .entry(container.to_string())
            .or_default();
        Ok(())
    }

    async fn get(&self, container: &str, name: &str) -> Result<Blob, StoreError> {
        self.containers
            .read()?
            .get(container)
            .ok_or_else(|| StoreError::ContainerNotFound(container.to_string()))?
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                container: container.to_string(),
                name: name.to_string(),
            })
    }

    async fn put(
        &self,
        container: &str,
        name: &str,
        content: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<(), StoreError> {
        self.containers
            .write()?
            .get_mut(container)
            .ok_or_else(|| StoreError::ContainerNotFound(container.to_string()))?
            .insert(
                name.to_string(),
                Blob {
                    content,
                    content_type: content_type.map(ToString::to_string),
                },
            );
        Ok(())
    }
}
