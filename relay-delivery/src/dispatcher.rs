use std::sync::Arc;

use relay_common::{EmailMessage, config::ProviderConfig, message::non_blank};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::{
    attachments::AttachmentLoader,
    content::{ContentResolver, LiteralContentResolver},
    error::{ConfigurationError, DispatchError},
    metrics::MetricsRecorder,
    policy::TransientRetryPolicy,
    transport::{EmailTransport, OutboundAddress, OutboundEmail, OutboundRecipients, SendReceipt},
    validate::validate,
};

/// Sender defaults applied to messages that do not set their own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SenderDefaults {
    pub sender_address: Option<String>,
    pub reply_to_address: Option<String>,
}

impl From<&ProviderConfig> for SenderDefaults {
    fn from(config: &ProviderConfig) -> Self {
        Self {
            sender_address: non_blank(Some(&config.default_sender_address)).map(str::to_string),
            reply_to_address: non_blank(config.default_reply_to_address.as_deref())
                .map(str::to_string),
        }
    }
}

/// Validates, enriches and sends one message.
pub struct EmailDispatcher {
    transport: Arc<dyn EmailTransport>,
    attachments: AttachmentLoader,
    content: Arc<dyn ContentResolver>,
    metrics: Arc<dyn MetricsRecorder>,
    retry: TransientRetryPolicy,
    defaults: SenderDefaults,
}

impl EmailDispatcher {
    pub fn new(
        transport: Arc<dyn EmailTransport>,
        attachments: AttachmentLoader,
        metrics: Arc<dyn MetricsRecorder>,
        defaults: SenderDefaults,
    ) -> Self {
        Self {
            transport,
            attachments,
            content: Arc::new(LiteralContentResolver),
            metrics,
            retry: TransientRetryPolicy::default(),
            defaults,
        }
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: TransientRetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_content_resolver(mut self, content: Arc<dyn ContentResolver>) -> Self {
        self.content = content;
        self
    }

    /// Send `message` through the provider.
    ///
    /// Validation and attachment loading happen before any send attempt and
    /// are never retried. Only the send itself goes through the transient
    /// retry policy, and only its failures are recorded as dispatch failures.
    ///
    /// # Errors
    ///
    /// Any [`DispatchError`]; see its variants for the classification.
    pub async fn dispatch(
        &self,
        message: &EmailMessage,
        cancel: &CancellationToken,
    ) -> Result<SendReceipt, DispatchError> {
        validate(message)?;

        let attachments = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(DispatchError::Cancelled),
            loaded = self.attachments.load(&message.attachments) => loaded?,
        };

        let sender = non_blank(message.sender_override.as_deref())
            .map(str::to_string)
            .or_else(|| self.defaults.sender_address.clone())
            .ok_or(ConfigurationError::MissingSender)?;

        let recipients = OutboundRecipients::partition(message.recipients.iter().flatten());
        if recipients.to.is_empty() {
            return Err(ConfigurationError::NoToRecipients.into());
        }

        let reply_to = if message.reply_to.is_empty() {
            self.defaults
                .reply_to_address
                .iter()
                .map(OutboundAddress::new)
                .collect()
        } else {
            message
                .reply_to
                .iter()
                .flatten()
                .map(OutboundAddress::from)
                .collect()
        };

        let content = self.content.resolve(message);
        let recipient_count = recipients.len();

        let email = OutboundEmail {
            message_id: message.message_id.clone(),
            sender,
            recipients,
            reply_to,
            subject: content.subject,
            plain_text: content.plain_text,
            html: content.html,
            attachments,
        };

        let started = Instant::now();
        let transport = &self.transport;
        let outbound = &email;

        let result = self
            .retry
            .execute(cancel, move |attempt| async move {
                tracing::debug!(message_id = %outbound.message_id, attempt, "Sending email");
                transport.send(outbound).await.map_err(DispatchError::from)
            })
            .await;

        match result {
            Ok(receipt) => {
                let elapsed = started.elapsed();
                tracing::info!(
                    message_id = %message.message_id,
                    recipients = recipient_count,
                    elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                    operation_id = %receipt.id,
                    "Email {} delivered successfully to {recipient_count} recipients",
                    message.message_id
                );
                self.metrics
                    .dispatch_succeeded(message, &receipt, elapsed, recipient_count);
                Ok(receipt)
            }
            Err(error) => {
                self.metrics
                    .dispatch_failed(message, &error, message.metadata.attempt_count);
                Err(error)
            }
        }
    }
}
