use relay_common::{EmailMessage, message::non_blank};

/// Subject and bodies ready to hand to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedContent {
    pub subject: String,
    pub plain_text: Option<String>,
    pub html: Option<String>,
}

/// Turns a message's content into what is actually sent.
///
/// Template expansion would live behind this trait; the only implementation
/// shipped uses the literal bodies.
pub trait ContentResolver: Send + Sync {
    fn resolve(&self, message: &EmailMessage) -> RenderedContent;
}

/// Sends the literal plain-text and HTML bodies, ignoring any template id.
#[derive(Debug, Default, Clone, Copy)]
pub struct LiteralContentResolver;

impl ContentResolver for LiteralContentResolver {
    fn resolve(&self, message: &EmailMessage) -> RenderedContent {
        if let Some(template_id) = non_blank(message.content.template_id.as_deref()) {
            tracing::warn!(
                message_id = %message.message_id,
                template_id,
                "Template {template_id} specified on message {}, but template rendering is not supported. Falling back to literal content",
                message.message_id
            );
        }

        RenderedContent {
            subject: message.subject.clone(),
            plain_text: non_blank(message.content.plain_text_body.as_deref()).map(str::to_string),
            html: non_blank(message.content.html_body.as_deref()).map(str::to_string),
        }
    }
}
