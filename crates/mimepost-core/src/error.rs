//! Error types for the core library.

use thiserror::Error;

use crate::service::TransportError;

/// Errors that can occur while dispatching mail.
#[derive(Debug, Error)]
pub enum Error {
    /// The message could not be built.
    #[error("Message build error: {0}")]
    Build(#[from] mimepost_mime::Error),

    /// The transport failed to deliver the message.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Broad classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Attachment path is outside the attachment root.
    InvalidAttachmentPath,
    /// Neither body was supplied.
    EmptyBody,
    /// Attachment file could not be read.
    AttachmentRead,
    /// Message assembly failed.
    MimeBuild,
    /// Delivery failed.
    Transport,
    /// Configuration is missing or invalid.
    Config,
}

impl Error {
    /// Classifies the error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Build(mimepost_mime::Error::InvalidAttachmentPath { .. }) => {
                ErrorKind::InvalidAttachmentPath
            }
            Self::Build(mimepost_mime::Error::EmptyBody) => ErrorKind::EmptyBody,
            Self::Build(mimepost_mime::Error::AttachmentRead { .. }) => ErrorKind::AttachmentRead,
            Self::Build(_) => ErrorKind::MimeBuild,
            Self::Transport(_) => ErrorKind::Transport,
            Self::Serde(_) | Self::Config(_) => ErrorKind::Config,
        }
    }

    /// Returns true if sending the same message again may succeed.
    ///
    /// Only connection failures and transient (4xx) server replies qualify;
    /// caller input errors never do.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(err) => err.is_retryable(),
            _ => false,
        }
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
