//! Structural validation of outbox messages.
//!
//! Runs before any external call. Every problem is collected so a producer
//! sees the whole list at once.

use relay_common::{
    EmailAttachmentReference, EmailMessage, EmailRecipient,
    address::is_valid_address,
    message::MAX_SUBJECT_LENGTH,
};

use crate::error::{ValidationError, Violation};

/// Validate `message`, returning every violation found.
///
/// # Errors
///
/// Returns a [`ValidationError`] listing each violated rule.
pub fn validate(message: &EmailMessage) -> Result<(), ValidationError> {
    let mut violations = Vec::new();

    if message.message_id.trim().is_empty() {
        violations.push(Violation::MissingMessageId);
    }

    if message.subject.trim().is_empty() {
        violations.push(Violation::MissingSubject);
    } else {
        let length = message.subject.chars().count();
        if length > MAX_SUBJECT_LENGTH {
            violations.push(Violation::SubjectTooLong { length });
        }
    }

    if message.recipients.is_empty() {
        violations.push(Violation::NoRecipients);
    }

    check_recipients("Recipients", &message.recipients, &mut violations);
    check_recipients("ReplyTo", &message.reply_to, &mut violations);

    for (index, attachment) in message.attachments.iter().enumerate() {
        check_attachment(&format!("Attachments[{}]", index + 1), attachment, &mut violations);
    }

    if !message.content.is_complete() {
        violations.push(Violation::MissingContent);
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(ValidationError { violations })
    }
}

fn check_recipients(
    label: &str,
    recipients: &[Option<EmailRecipient>],
    violations: &mut Vec<Violation>,
) {
    for (index, recipient) in recipients.iter().enumerate() {
        let field = format!("{label}[{}]", index + 1);
        let Some(recipient) = recipient else {
            violations.push(Violation::NullEntry { field });
            continue;
        };
        let address = recipient.address.trim();

        if address.is_empty() {
            violations.push(Violation::MissingAddress { field });
        } else if !is_valid_address(address) {
            violations.push(Violation::InvalidAddress {
                field,
                address: recipient.address.clone(),
            });
        }
    }
}

fn check_attachment(
    field: &str,
    attachment: &EmailAttachmentReference,
    violations: &mut Vec<Violation>,
) {
    if attachment.blob_name.trim().is_empty() {
        violations.push(Violation::MissingBlobName {
            field: field.to_string(),
        });
    }

    if let Some(length) = attachment.content_length
        && length < 0
    {
        violations.push(Violation::NegativeContentLength {
            field: field.to_string(),
            length,
        });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use relay_common::{EmailContent, RecipientType};

    use super::*;

    fn valid_message() -> EmailMessage {
        EmailMessage {
            message_id: "msg-1".to_string(),
            subject: "Quarterly report".to_string(),
            content: EmailContent {
                plain_text_body: Some("See attached".to_string()),
                ..Default::default()
            },
            recipients: vec![Some(EmailRecipient::to("finance@example.com"))],
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_message_passes() {
        assert!(validate(&valid_message()).is_ok());
    }

    #[test]
    fn test_html_only_and_template_only_content_pass() {
        let mut html = valid_message();
        html.content = EmailContent {
            html_body: Some("<p>Hi</p>".to_string()),
            ..Default::default()
        };
        assert!(validate(&html).is_ok());

        let mut template = valid_message();
        template.content = EmailContent {
            template_id: Some("welcome".to_string()),
            ..Default::default()
        };
        assert!(validate(&template).is_ok());
    }

    #[test]
    fn test_missing_content_is_flagged() {
        let mut message = valid_message();
        message.content = EmailContent {
            plain_text_body: Some("   ".to_string()),
            html_body: None,
            template_id: Some(String::new()),
            ..Default::default()
        };

        let error = validate(&message).unwrap_err();
        assert!(error.is_missing_content());
        assert_eq!(error.violations, vec![Violation::MissingContent]);
    }

    #[test]
    fn test_all_violations_are_collected() {
        let message = EmailMessage {
            message_id: " ".to_string(),
            subject: String::new(),
            recipients: vec![
                Some(EmailRecipient::to("ok@example.com")),
                Some(EmailRecipient::new("", RecipientType::Cc)),
                Some(EmailRecipient::new("not an address", RecipientType::Bcc)),
            ],
            reply_to: vec![Some(EmailRecipient::to("broken@"))],
            attachments: vec![EmailAttachmentReference {
                blob_name: " ".to_string(),
                content_length: Some(-1),
                ..Default::default()
            }],
            ..Default::default()
        };

        let error = validate(&message).unwrap_err();
        assert_eq!(
            error.violations,
            vec![
                Violation::MissingMessageId,
                Violation::MissingSubject,
                Violation::MissingAddress {
                    field: "Recipients[2]".to_string()
                },
                Violation::InvalidAddress {
                    field: "Recipients[3]".to_string(),
                    address: "not an address".to_string()
                },
                Violation::InvalidAddress {
                    field: "ReplyTo[1]".to_string(),
                    address: "broken@".to_string()
                },
                Violation::MissingBlobName {
                    field: "Attachments[1]".to_string()
                },
                Violation::NegativeContentLength {
                    field: "Attachments[1]".to_string(),
                    length: -1
                },
                Violation::MissingContent,
            ]
        );
        assert!(error.to_string().starts_with("MessageId is required; Subject is required; "));
    }

    #[test]
    fn test_subject_length_limit() {
        let mut message = valid_message();
        message.subject = "x".repeat(MAX_SUBJECT_LENGTH);
        assert!(validate(&message).is_ok());

        message.subject.push('x');
        let error = validate(&message).unwrap_err();
        assert_eq!(
            error.violations,
            vec![Violation::SubjectTooLong {
                length: MAX_SUBJECT_LENGTH + 1
            }]
        );
    }

    #[test]
    fn test_no_recipients() {
        let mut message = valid_message();
        message.recipients.clear();

        let error = validate(&message).unwrap_err();
        assert_eq!(error.violations, vec![Violation::NoRecipients]);
    }

    #[test]
    fn test_cc_only_message_passes_validation() {
        let mut message = valid_message();
        message.recipients = vec![Some(EmailRecipient::new("cc@example.com", RecipientType::Cc))];
        assert!(validate(&message).is_ok());
    }

    #[test]
    fn test_null_recipient_entries_are_rejected() {
        let message: EmailMessage = serde_json::from_str(
            r#"{
                "messageId": "msg-1",
                "subject": "Quarterly report",
                "content": { "plainTextBody": "See attached" },
                "recipients": [null, { "address": "a@example.com" }],
                "replyTo": [null]
            }"#,
        )
        .unwrap();

        let error = validate(&message).unwrap_err();
        assert_eq!(
            error.violations,
            vec![
                Violation::NullEntry {
                    field: "Recipients[1]".to_string()
                },
                Violation::NullEntry {
                    field: "ReplyTo[1]".to_string()
                },
            ]
        );
        assert_eq!(
            error.to_string(),
            "Recipients[1] cannot be null; ReplyTo[1] cannot be null"
        );
    }

    #[test]
    fn test_only_null_recipients_is_not_reported_as_empty() {
        let mut message = valid_message();
        message.recipients = vec![None];

        let error = validate(&message).unwrap_err();
        assert_eq!(
            error.violations,
            vec![Violation::NullEntry {
                field: "Recipients[1]".to_string()
            }]
        );
    }
}
