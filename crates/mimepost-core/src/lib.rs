//! # mimepost-core
//!
//! Sending side of `MimePost`.
//!
//! This crate provides:
//! - Sender configuration (JSON file plus environment override)
//! - The [`Transport`] contract and an SMTP implementation
//! - The [`Dispatcher`], which builds a message and delivers it with an
//!   optional BCC copy added to the envelope only
//!
//! ```no_run
//! use mimepost_core::{Dispatcher, OutgoingEmail, SenderConfig, SmtpTransport};
//!
//! # async fn run() -> mimepost_core::Result<()> {
//! let config = SenderConfig::new("noreply@example.com", "smtp.example.com")
//!     .with_credential("secret")
//!     .with_attachment_root("storage")
//!     .with_bcc("audit@example.com");
//! let dispatcher = Dispatcher::new(config, SmtpTransport::new())?;
//!
//! let email = OutgoingEmail::new("Monthly report")
//!     .to("alice@example.com")
//!     .text_body("See attached.")
//!     .attach("storage/report.pdf");
//! dispatcher.send(&email).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod config;
mod error;
pub mod service;

pub use config::{
    CREDENTIAL_ENV, Security, SenderConfig, ValidationError, ValidationResult,
    default_config_path, load_config, load_default_config, validate_config,
};
pub use error::{Error, ErrorKind, Result};
pub use mimepost_mime::{AttachmentSource, BuiltMessage, FileSystem, OutgoingEmail};
pub use service::{
    Credentials, Dispatcher, Endpoint, Envelope, SmtpTransport, Transport, TransportError,
};
