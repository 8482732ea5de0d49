use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use relay_common::config::ProviderConfig;
use reqwest::{Client, ClientBuilder};
use serde::{Deserialize, Serialize};

use super::{EmailTransport, OutboundAddress, OutboundEmail, SendReceipt};
use crate::error::ProviderError;

/// Header carrying the relay message id on every request.
pub const MESSAGE_ID_HEADER: &str = "x-relay-message-id";

/// Posts messages as JSON to a transactional-email REST endpoint.
///
/// A 2xx response with an `id` field is a success. Any other status becomes
/// a [`ProviderError`] carrying that status; a request that never produced a
/// response has no status and is therefore not treated as transient.
#[derive(Debug, Clone)]
pub struct HttpEmailTransport {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpEmailTransport {
    /// Build a transport from the provider section.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &ProviderConfig) -> Result<Self, reqwest::Error> {
        let client = ClientBuilder::new()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Address<'a> {
    address: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    display_name: Option<&'a str>,
}

impl<'a> From<&'a OutboundAddress> for Address<'a> {
    fn from(address: &'a OutboundAddress) -> Self {
        Self {
            address: &address.address,
            display_name: address.display_name.as_deref(),
        }
    }
}

#[derive(Serialize)]
struct Recipients<'a> {
    to: Vec<Address<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    cc: Vec<Address<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    bcc: Vec<Address<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Content<'a> {
    subject: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    plain_text: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    html: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Attachment<'a> {
    name: &'a str,
    content_type: &'a str,
    content_in_base64: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SendRequest<'a> {
    sender_address: &'a str,
    recipients: Recipients<'a>,
    content: Content<'a>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    reply_to: Vec<Address<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<Attachment<'a>>,
}

impl<'a> From<&'a OutboundEmail> for SendRequest<'a> {
    fn from(email: &'a OutboundEmail) -> Self {
        let addresses = |list: &'a [OutboundAddress]| list.iter().map(Address::from).collect();

        Self {
            sender_address: &email.sender,
            recipients: Recipients {
                to: addresses(&email.recipients.to),
                cc: addresses(&email.recipients.cc),
                bcc: addresses(&email.recipients.bcc),
            },
            content: Content {
                subject: &email.subject,
                plain_text: email.plain_text.as_deref(),
                html: email.html.as_deref(),
            },
            reply_to: addresses(&email.reply_to),
            attachments: email
                .attachments
                .iter()
                .map(|a| Attachment {
                    name: &a.name,
                    content_type: &a.content_type,
                    content_in_base64: STANDARD.encode(&a.content),
                })
                .collect(),
        }
    }
}

#[derive(Deserialize)]
struct SendResponse {
    id: String,
}

#[async_trait]
impl EmailTransport for HttpEmailTransport {
    async fn send(&self, email: &OutboundEmail) -> Result<SendReceipt, ProviderError> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .header(MESSAGE_ID_HEADER, &email.message_id)
            .json(&SendRequest::from(email));

        if let Some(api_key) = &self.api_key {
            request = request.header("api-key", api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::new(e.status().map(|s| s.as_u16()), e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = if body.trim().is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("unexpected status")
                    .to_string()
            } else {
                body
            };
            return Err(ProviderError::new(Some(status.as_u16()), message));
        }

        let body: SendResponse = response.json().await.map_err(|e| {
            ProviderError::new(
                None,
                format!("Provider accepted the message but returned an unreadable body: {e}"),
            )
        })?;

        tracing::debug!(
            message_id = %email.message_id,
            operation_id = %body.id,
            status = status.as_u16(),
            "Provider accepted message"
        );

        Ok(SendReceipt { id: body.id })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::transport::{OutboundAttachment, OutboundRecipients};

    #[test]
    fn test_request_shape() {
        let email = OutboundEmail {
            message_id: "msg-1".to_string(),
            sender: "noreply@example.com".to_string(),
            recipients: OutboundRecipients {
                to: vec![OutboundAddress {
                    address: "a@example.com".to_string(),
                    display_name: Some("A".to_string()),
                }],
                cc: Vec::new(),
                bcc: vec![OutboundAddress::new("b@example.com")],
            },
            reply_to: Vec::new(),
            subject: "Hello".to_string(),
            plain_text: Some("Hi".to_string()),
            html: None,
            attachments: vec![OutboundAttachment {
                name: "a.txt".to_string(),
                content_type: "text/plain".to_string(),
                content: b"hello".to_vec(),
            }],
        };

        let value = serde_json::to_value(SendRequest::from(&email)).unwrap();
        assert_eq!(
            value,
            json!({
                "senderAddress": "noreply@example.com",
                "recipients": {
                    "to": [{ "address": "a@example.com", "displayName": "A" }],
                    "bcc": [{ "address": "b@example.com" }]
                },
                "content": { "subject": "Hello", "plainText": "Hi" },
                "attachments": [{
                    "name": "a.txt",
                    "contentType": "text/plain",
                    "contentInBase64": "aGVsbG8="
                }]
            })
        );
    }
}
