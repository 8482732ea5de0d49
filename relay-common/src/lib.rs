//! Shared building blocks for the email relay.
//!
//! - [`message`]: the queue payloads (`EmailMessage`, `FailedEmailMessage`)
//! - [`address`]: addr-spec parsing used by validation and configuration
//! - [`config`]: queue, storage and provider configuration sections
//! - [`logging`]: subscriber setup and the `internal!` lifecycle macro

pub mod address;
pub mod config;
pub mod error;
pub mod logging;
pub mod map;
pub mod message;

pub use tracing;

pub use error::ConfigError;
pub use map::CaseInsensitiveMap;
pub use message::{
    EmailAttachmentReference, EmailContent, EmailDispatchMetadata, EmailMessage, EmailRecipient,
    FailedEmailMessage, RecipientType,
};
