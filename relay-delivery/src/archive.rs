use std::sync::Arc;

use relay_common::FailedEmailMessage;
use relay_store::ObjectStore;
use tokio_util::sync::CancellationToken;

use crate::error::ArchiveError;

const ARCHIVE_CONTENT_TYPE: &str = "application/json";

/// Writes failure envelopes to the logs container as indented JSON.
#[derive(Clone)]
pub struct FailureArchiveWriter {
    store: Arc<dyn ObjectStore>,
    container: String,
}

impl FailureArchiveWriter {
    pub fn new(store: Arc<dyn ObjectStore>, container: impl Into<String>) -> Self {
        Self {
            store,
            container: container.into(),
        }
    }

    /// Blob name for `message`: `failures/yyyy/MM/dd/{messageId}-{ulid}.json`,
    /// dated by the UTC failure time.
    #[must_use]
    pub fn blob_name(message: &FailedEmailMessage) -> String {
        format!(
            "failures/{}/{}-{}.json",
            message.failed_at_utc.format("%Y/%m/%d"),
            message.original_message.message_id,
            ulid::Ulid::new()
        )
    }

    /// Archive `message`, returning the blob name it was written to.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails or the store rejects the write,
    /// or [`ArchiveError::Cancelled`] if `cancel` fires first.
    pub async fn write(
        &self,
        message: &FailedEmailMessage,
        cancel: &CancellationToken,
    ) -> Result<String, ArchiveError> {
        let name = Self::blob_name(message);
        let payload = serde_json::to_vec_pretty(message)?;

        let stored = async {
            self.store
                .create_container_if_not_exists(&self.container)
                .await?;
            self.store
                .put(&self.container, &name, payload, Some(ARCHIVE_CONTENT_TYPE))
                .await
        };

        tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(ArchiveError::Cancelled),
            stored = stored => stored?,
        }

        tracing::info!(
            message_id = %message.original_message.message_id,
            container = %self.container,
            blob = %name,
            "Archived failed email {} to blob {name}",
            message.original_message.message_id
        );

        Ok(name)
    }
}
