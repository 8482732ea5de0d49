use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use relay_common::internal;
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::{Blob, ObjectStore, StoreError};

/// Properties persisted next to each blob.
#[derive(Debug, Default, Serialize, Deserialize)]
struct BlobProperties {
    content_type: Option<String>,
}

const PROPERTIES_SUFFIX: &str = ".props";
const TEMP_PREFIX: &str = ".tmp_";

/// File-backed object store
///
/// Containers are directories under the root; blob names map onto relative
/// paths inside them, so `failures/2024/05/01/abc.json` becomes nested
/// directories. Each blob has a sidecar `{name}.props` file holding its
/// properties, encoded with bincode.
///
/// # Security
/// - The root must be absolute, free of `..` and outside system directories
/// - Container and blob names are validated component by component, so a
///   name can never resolve outside its container
///
/// # Atomicity
/// Writes go to a `.tmp_` file that is then renamed into place, so readers
/// never observe a partial blob.
#[derive(Debug, Clone)]
pub struct FileObjectStore {
    root: PathBuf,
}

/// Builder for [`FileObjectStore`]
#[derive(Debug, Default)]
pub struct FileObjectStoreBuilder {
    root: Option<PathBuf>,
}

impl FileObjectStoreBuilder {
    #[must_use]
    pub fn path(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Validate the root and build the store.
    ///
    /// # Errors
    /// Returns an error if no path was given or the path is unsafe.
    pub fn build(self) -> Result<FileObjectStore, StoreError> {
        let root = self
            .root
            .ok_or_else(|| StoreError::InvalidPath("no path configured".to_string()))?;
        FileObjectStore::validate_root(&root)?;
        Ok(FileObjectStore { root })
    }
}

impl FileObjectStore {
    #[must_use]
    pub fn builder() -> FileObjectStoreBuilder {
        FileObjectStoreBuilder::default()
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn validate_root(path: &Path) -> Result<(), StoreError> {
        if path.components().any(|c| c == Component::ParentDir) {
            return Err(StoreError::InvalidPath(format!(
                "store path cannot contain '..' components: {}",
                path.display()
            )));
        }

        if !path.is_absolute() {
            return Err(StoreError::InvalidPath(format!(
                "store path must be absolute: {}",
                path.display()
            )));
        }

        let sensitive_prefixes = [
            "/etc", "/bin", "/sbin", "/usr/bin", "/usr/sbin", "/boot", "/sys", "/proc", "/dev",
        ];

        if let Some(prefix) = sensitive_prefixes.iter().find(|p| path.starts_with(p)) {
            return Err(StoreError::InvalidPath(format!(
                "store path cannot be in system directory {prefix}: {}",
                path.display()
            )));
        }

        Ok(())
    }

    /// Create the root directory if it does not exist.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created, or the path
    /// exists and is not a directory.
    pub async fn init(&self) -> Result<(), StoreError> {
        internal!("Initialising object store at {}", self.root.display());

        if !fs::try_exists(&self.root).await? {
            internal!("{} does not exist, creating...", self.root.display());
            fs::create_dir_all(&self.root).await?;
        } else if !fs::metadata(&self.root).await?.is_dir() {
            return Err(StoreError::InvalidPath(format!(
                "expected {} to be a directory",
                self.root.display()
            )));
        }

        Ok(())
    }

    fn check_name(name: &str, allow_nested: bool) -> Result<(), StoreError> {
        let invalid = |reason| StoreError::InvalidName {
            name: name.to_string(),
            reason,
        };

        if name.trim().is_empty() {
            return Err(invalid("name is empty"));
        }
        if name.contains('\\') || name.contains('\0') {
            return Err(invalid("name contains a forbidden character"));
        }
        if !allow_nested && name.contains('/') {
            return Err(invalid("container names cannot contain '/'"));
        }
        if name.starts_with('/') {
            return Err(invalid("name cannot be absolute"));
        }

        for segment in name.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." {
                return Err(invalid("name contains an empty, '.' or '..' segment"));
            }
            if segment.starts_with(TEMP_PREFIX) || segment.ends_with(PROPERTIES_SUFFIX) {
                return Err(invalid("name collides with store bookkeeping files"));
            }
        }

        Ok(())
    }

    fn container_path(&self, container: &str) -> Result<PathBuf, StoreError> {
        Self::check_name(container, false)?;
        Ok(self.root.join(container))
    }

    fn blob_path(&self, container: &str, name: &str) -> Result<PathBuf, StoreError> {
        let container_path = self.container_path(container)?;
        Self::check_name(name, true)?;
        Ok(container_path.join(name))
    }

    fn sibling(path: &Path, prefix: &str, suffix: &str) -> PathBuf {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        path.with_file_name(format!("{prefix}{file_name}{suffix}"))
    }

    async fn write_atomic(path: &Path, content: &[u8]) -> Result<(), StoreError> {
        let temp = Self::sibling(path, TEMP_PREFIX, "");
        fs::write(&temp, content).await?;
        fs::rename(&temp, path).await?;
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for FileObjectStore {
    async fn create_container_if_not_exists(&self, container: &str) -> Result<(), StoreError> {
        let path = self.container_path(container)?;
        fs::create_dir_all(&path).await?;
        Ok(())
    }

    async fn get(&self, container: &str, name: &str) -> Result<Blob, StoreError> {
        let path = self.blob_path(container, name)?;

        let content = match fs::read(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound {
                    container: container.to_string(),
                    name: name.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let properties = match fs::read(Self::sibling(&path, "", PROPERTIES_SUFFIX)).await {
            Ok(bytes) => {
                bincode::serde::decode_from_slice::<BlobProperties, _>(
                    &bytes,
                    bincode::config::standard(),
                )
                .map_err(|e| StoreError::Properties(e.to_string()))?
                .0
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BlobProperties::default(),
            Err(e) => return Err(e.into()),
        };

        Ok(Blob {
            content,
            content_type: properties.content_type,
        })
    }

    async fn put(
        &self,
        container: &str,
        name: &str,
        content: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<(), StoreError> {
        let container_path = self.container_path(container)?;
        if !fs::try_exists(&container_path).await? {
            return Err(StoreError::ContainerNotFound(container.to_string()));
        }

        let path = self.blob_path(container, name)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let properties = BlobProperties {
            content_type: content_type.map(ToString::to_string),
        };
        let encoded = bincode::serde::encode_to_vec(&properties, bincode::config::standard())
            .map_err(|e| StoreError::Properties(e.to_string()))?;

        Self::write_atomic(&Self::sibling(&path, "", PROPERTIES_SUFFIX), &encoded).await?;
        Self::write_atomic(&path, &content).await?;

        tracing::debug!(
            container,
            name,
            size = content.len(),
            "Stored blob at {}",
            path.display()
        );

        Ok(())
    }
}
