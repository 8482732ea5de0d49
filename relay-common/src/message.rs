//! Queue payloads.
//!
//! Both queues carry JSON with camelCase property names. Optional fields that
//! are `None` are omitted on write, and a `null` where a list or object is
//! expected decodes as empty.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::CaseInsensitiveMap;

/// Keys written into [`FailedEmailMessage::diagnostics`].
pub mod diagnostics {
    pub const INVOCATION_ID: &str = "InvocationId";
    pub const HOST_INSTANCE_ID: &str = "HostInstanceId";
    pub const DEQUEUE_COUNT: &str = "DequeueCount";
    pub const IS_FATAL: &str = "IsFatal";
    pub const AUTO_RETRY: &str = "AutoRetry";
}

/// Maximum subject length accepted by validation.
pub const MAX_SUBJECT_LENGTH: usize = 2048;

/// Returns the trimmed-non-empty contents of `value`, or `None` when blank.
#[must_use]
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn generate_message_id() -> String {
    ulid::Ulid::new().to_string()
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A `null` list decodes as empty and `null` entries are dropped.
///
/// Only attachments are read this way. Recipient lists keep their `null`
/// entries so validation can name them.
fn nullable_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<Option<T>>>::deserialize(deserializer)?
        .unwrap_or_default()
        .into_iter()
        .flatten()
        .collect())
}

/// Canonical payload carried on the outbox queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailMessage {
    #[serde(default = "generate_message_id")]
    pub message_id: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub subject: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub content: EmailContent,

    /// `None` marks a `null` entry on the wire.
    #[serde(default, deserialize_with = "null_as_default")]
    pub recipients: Vec<Option<EmailRecipient>>,

    /// Sender to use instead of the configured default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_override: Option<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub reply_to: Vec<Option<EmailRecipient>>,

    /// References to attachment blobs in the object store.
    #[serde(default, deserialize_with = "nullable_list")]
    pub attachments: Vec<EmailAttachmentReference>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub metadata: EmailDispatchMetadata,
}

impl Default for EmailMessage {
    fn default() -> Self {
        Self {
            message_id: generate_message_id(),
            subject: String::new(),
            content: EmailContent::default(),
            recipients: Vec::new(),
            sender_override: None,
            reply_to: Vec::new(),
            attachments: Vec::new(),
            metadata: EmailDispatchMetadata::default(),
        }
    }
}

impl EmailMessage {
    /// A copy of this message whose metadata carries `attempt_count`.
    ///
    /// Handlers never mutate the decoded message in place; each invocation
    /// works on its own value.
    #[must_use]
    pub fn with_attempt_count(&self, attempt_count: u32) -> Self {
        Self {
            metadata: EmailDispatchMetadata {
                attempt_count,
                ..self.metadata.clone()
            },
            ..self.clone()
        }
    }
}

/// Textual or templated content of a message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plain_text_body: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_body: Option<String>,

    /// Template identifier. Accepted but not expanded by the default content resolver.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub template_parameters: CaseInsensitiveMap,

    #[serde(default)]
    pub prefer_html: bool,
}

impl EmailContent {
    /// Whether any of plain text, HTML or a template id is present.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        non_blank(self.plain_text_body.as_deref()).is_some()
            || non_blank(self.html_body.as_deref()).is_some()
            || non_blank(self.template_id.as_deref()).is_some()
    }
}

/// Role of a recipient on a message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum RecipientType {
    #[default]
    To,
    Cc,
    Bcc,
}

impl RecipientType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::To => "To",
            Self::Cc => "Cc",
            Self::Bcc => "Bcc",
        }
    }
}

impl Serialize for RecipientType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Accepts the role name in any case, or its ordinal (`0`, `1`, `2`).
impl<'de> Deserialize<'de> for RecipientType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Ordinal(u64),
            Name(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Ordinal(0) => Ok(Self::To),
            Repr::Ordinal(1) => Ok(Self::Cc),
            Repr::Ordinal(2) => Ok(Self::Bcc),
            Repr::Ordinal(other) => Err(serde::de::Error::custom(format!(
                "unknown recipient type ordinal {other}"
            ))),
            Repr::Name(name) => match name.to_ascii_lowercase().as_str() {
                "to" => Ok(Self::To),
                "cc" => Ok(Self::Cc),
                "bcc" => Ok(Self::Bcc),
                _ => Err(serde::de::Error::custom(format!(
                    "unknown recipient type '{name}'"
                ))),
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailRecipient {
    #[serde(default, deserialize_with = "null_as_default")]
    pub address: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default, rename = "type")]
    pub kind: RecipientType,
}

impl EmailRecipient {
    pub fn new(address: impl Into<String>, kind: RecipientType) -> Self {
        Self {
            address: address.into(),
            display_name: None,
            kind,
        }
    }

    pub fn to(address: impl Into<String>) -> Self {
        Self::new(address, RecipientType::To)
    }
}

/// Points at a blob holding attachment bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailAttachmentReference {
    /// Falls back to the configured attachment container when blank.
    #[serde(default, deserialize_with = "null_as_default")]
    pub blob_container_name: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub blob_name: String,

    /// Falls back to the basename of `blob_name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,

    /// Falls back to the content type reported by the store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    /// Pre-computed length in bytes, a hint only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_length: Option<i64>,
}

impl EmailAttachmentReference {
    pub fn new(blob_name: impl Into<String>) -> Self {
        Self {
            blob_name: blob_name.into(),
            ..Default::default()
        }
    }
}

/// Operational metadata supporting retries, observability and idempotency.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailDispatchMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,

    /// Producer-assigned id used for idempotent retries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub producer_message_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enqueued_at_utc: Option<DateTime<Utc>>,

    /// Set to the dequeue count on every delivery, reset to 0 on auto-retry.
    #[serde(default)]
    pub attempt_count: u32,

    #[serde(default, deserialize_with = "null_as_default")]
    pub properties: CaseInsensitiveMap,
}

/// A terminally failed send, as carried on the failed queue and archived.
///
/// `auto_retry` is held as a typed flag. On the wire it lives in the
/// diagnostics map under `AutoRetry`; a value that does not parse as a
/// boolean is kept verbatim in `diagnostics` and leaves `auto_retry` unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "FailedEmailMessageRepr", into = "FailedEmailMessageRepr")]
pub struct FailedEmailMessage {
    pub original_message: EmailMessage,
    pub error_message: Option<String>,
    pub error_type: Option<String>,
    pub stack_trace: Option<String>,
    pub failed_at_utc: DateTime<Utc>,
    pub dequeue_count: u32,
    pub diagnostics: CaseInsensitiveMap,
    pub auto_retry: Option<bool>,
}

impl FailedEmailMessage {
    pub fn new(original_message: EmailMessage) -> Self {
        Self {
            original_message,
            error_message: None,
            error_type: None,
            stack_trace: None,
            failed_at_utc: Utc::now(),
            dequeue_count: 0,
            diagnostics: CaseInsensitiveMap::new(),
            auto_retry: None,
        }
    }

    /// Whether the monitor should resubmit the original message after archival.
    #[must_use]
    pub fn wants_auto_retry(&self) -> bool {
        self.auto_retry == Some(true)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FailedEmailMessageRepr {
    #[serde(default, deserialize_with = "null_as_default")]
    original_message: EmailMessage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    stack_trace: Option<String>,
    #[serde(default = "Utc::now")]
    failed_at_utc: DateTime<Utc>,
    #[serde(default)]
    dequeue_count: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    diagnostics: CaseInsensitiveMap,
}

/// Boolean parsing for diagnostics values: `true`/`false`, any case, surrounding whitespace allowed.
fn parse_flag(value: &str) -> Option<bool> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("true") {
        Some(true)
    } else if value.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

impl From<FailedEmailMessageRepr> for FailedEmailMessage {
    fn from(repr: FailedEmailMessageRepr) -> Self {
        let mut diagnostics = repr.diagnostics;
        let auto_retry = diagnostics
            .get(diagnostics::AUTO_RETRY)
            .and_then(parse_flag);
        if auto_retry.is_some() {
            diagnostics.remove(diagnostics::AUTO_RETRY);
        }

        Self {
            original_message: repr.original_message,
            error_message: repr.error_message,
            error_type: repr.error_type,
            stack_trace: repr.stack_trace,
            failed_at_utc: repr.failed_at_utc,
            dequeue_count: repr.dequeue_count,
            diagnostics,
            auto_retry,
        }
    }
}

impl From<FailedEmailMessage> for FailedEmailMessageRepr {
    fn from(message: FailedEmailMessage) -> Self {
        let mut diagnostics = message.diagnostics;
        if let Some(flag) = message.auto_retry {
            diagnostics.insert(diagnostics::AUTO_RETRY, flag.to_string());
        }

        Self {
            original_message: message.original_message,
            error_message: message.error_message,
            error_type: message.error_type,
            stack_trace: message.stack_trace,
            failed_at_utc: message.failed_at_utc,
            dequeue_count: message.dequeue_count,
            diagnostics,
        }
    }
}
