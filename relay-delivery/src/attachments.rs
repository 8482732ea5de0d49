use std::sync::Arc;

use relay_common::{EmailAttachmentReference, message::non_blank};
use relay_store::ObjectStore;

use crate::{error::DispatchError, metrics::MetricsRecorder, transport::OutboundAttachment};

pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Resolves attachment references into bytes from the object store.
pub struct AttachmentLoader {
    store: Arc<dyn ObjectStore>,
    default_container: String,
    metrics: Arc<dyn MetricsRecorder>,
}

impl AttachmentLoader {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        default_container: impl Into<String>,
        metrics: Arc<dyn MetricsRecorder>,
    ) -> Self {
        Self {
            store,
            default_container: default_container.into(),
            metrics,
        }
    }

    /// Load every referenced blob, in order.
    ///
    /// # Errors
    ///
    /// The first store failure is recorded and returned as
    /// [`DispatchError::Attachment`]; nothing is retried here.
    pub async fn load(
        &self,
        references: &[EmailAttachmentReference],
    ) -> Result<Vec<OutboundAttachment>, DispatchError> {
        let mut attachments = Vec::with_capacity(references.len());

        for reference in references {
            let container = non_blank(Some(&reference.blob_container_name))
                .unwrap_or(&self.default_container);

            tracing::debug!(container, blob = %reference.blob_name, "Fetching attachment");

            let blob = match self.store.get(container, &reference.blob_name).await {
                Ok(blob) => blob,
                Err(source) => {
                    self.metrics
                        .attachment_load_failed(container, &reference.blob_name, &source);
                    return Err(DispatchError::Attachment {
                        container: container.to_string(),
                        blob: reference.blob_name.clone(),
                        source,
                    });
                }
            };

            let content_type = non_blank(reference.content_type.as_deref())
                .or_else(|| non_blank(blob.content_type.as_deref()))
                .unwrap_or(DEFAULT_CONTENT_TYPE)
                .to_string();

            attachments.push(OutboundAttachment {
                name: file_name(reference),
                content_type,
                content: blob.content,
            });
        }

        Ok(attachments)
    }
}

/// Explicit file name, else the last path segment of the blob, else the blob name itself.
fn file_name(reference: &EmailAttachmentReference) -> String {
    if let Some(name) = non_blank(reference.file_name.as_deref()) {
        return name.to_string();
    }

    let basename = reference
        .blob_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    if basename.trim().is_empty() {
        reference.blob_name.clone()
    } else {
        basename.to_string()
    }
}
