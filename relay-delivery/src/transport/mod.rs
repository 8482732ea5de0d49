//! Outbound email transmission.
//!
//! The dispatcher only ever sees [`EmailTransport::send`]; provider specifics
//! (HTTP, credentials, payload shape) live behind it.

mod http;

use async_trait::async_trait;
pub use http::HttpEmailTransport;
use relay_common::{EmailRecipient, RecipientType};

use crate::error::ProviderError;

/// An address with an optional display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundAddress {
    pub address: String,
    pub display_name: Option<String>,
}

impl From<&EmailRecipient> for OutboundAddress {
    fn from(recipient: &EmailRecipient) -> Self {
        Self {
            address: recipient.address.trim().to_string(),
            display_name: recipient.display_name.clone(),
        }
    }
}

impl OutboundAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            display_name: None,
        }
    }
}

/// Attachment bytes ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundAttachment {
    pub name: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

/// Recipients split by role.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutboundRecipients {
    pub to: Vec<OutboundAddress>,
    pub cc: Vec<OutboundAddress>,
    pub bcc: Vec<OutboundAddress>,
}

impl OutboundRecipients {
    /// Partition recipients by role, keeping their relative order.
    pub fn partition<'a>(recipients: impl IntoIterator<Item = &'a EmailRecipient>) -> Self {
        let mut partitioned = Self::default();
        for recipient in recipients {
            let address = OutboundAddress::from(recipient);
            match recipient.kind {
                RecipientType::To => partitioned.to.push(address),
                RecipientType::Cc => partitioned.cc.push(address),
                RecipientType::Bcc => partitioned.bcc.push(address),
            }
        }
        partitioned
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.to.len() + self.cc.len() + self.bcc.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The provider-facing message built by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEmail {
    /// Source message id, for logging and provider-side correlation.
    pub message_id: String,
    pub sender: String,
    pub recipients: OutboundRecipients,
    pub reply_to: Vec<OutboundAddress>,
    pub subject: String,
    pub plain_text: Option<String>,
    pub html: Option<String>,
    pub attachments: Vec<OutboundAttachment>,
}

/// Provider acknowledgement of an accepted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    /// Provider operation id.
    pub id: String,
}

#[async_trait]
pub trait EmailTransport: Send + Sync {
    /// Submit `email` to the provider.
    async fn send(&self, email: &OutboundEmail) -> Result<SendReceipt, ProviderError>;
}
