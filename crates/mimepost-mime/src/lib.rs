//! # mimepost-mime
//!
//! MIME message construction for outgoing email.
//!
//! ## Features
//!
//! - **Message building**: `multipart/mixed` messages with plain, HTML or
//!   alternative bodies and an optional attachment
//! - **Encoding/Decoding**: Base64, Quoted-Printable, RFC 2047 header encoding
//! - **Content types**: Extension lookup with an explicit octet-stream default
//! - **Parsing**: Enough of a parser to inspect what the builder produced
//!
//! ## Quick Start
//!
//! ```ignore
//! use mimepost_mime::{MessageBuilder, OutgoingEmail, Sender};
//!
//! let sender = Sender {
//!     address: "noreply@example.com".into(),
//!     display_name: "Example".into(),
//!     reply_to: Some("support@example.com".into()),
//! };
//! let builder = MessageBuilder::new(sender, "storage");
//!
//! let email = OutgoingEmail::new("Quarterly report")
//!     .to("alice@example.com")
//!     .text_body("Plain text version")
//!     .html_body("<p>HTML version</p>")
//!     .attach("storage/reports/q3.pdf");
//!
//! let message = builder.build(&email)?;
//! transport.send(message.as_bytes());
//! ```
//!
//! ### Inspecting a built message
//!
//! ```ignore
//! use mimepost_mime::Message;
//!
//! let parsed = Message::parse(message.as_bytes())?;
//! println!("Subject: {:?}", parsed.decoded_subject()?);
//! println!("Body: {}", parsed.text_part()?);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod boundary;
mod builder;
mod content_type;
mod error;
mod header;
mod message;

pub mod encoding;

pub use boundary::Boundary;
pub use builder::{AttachmentSource, BuiltMessage, FileSystem, MessageBuilder, OutgoingEmail, Sender};
pub use content_type::{ContentType, OCTET_STREAM};
pub use error::{Error, Result};
pub use header::Headers;
pub use message::{Message, Part, TransferEncoding};
