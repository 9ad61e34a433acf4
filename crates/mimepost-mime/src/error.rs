//! Error types for MIME operations.

use std::io;
use std::string::FromUtf8Error;

/// Result type alias for MIME operations.
pub type Result<T> = std::result::Result<T, Error>;

/// MIME error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Attachment path is outside the configured attachment root.
    #[error("Invalid attachment path {path:?}: must start with {prefix:?}")]
    InvalidAttachmentPath {
        /// Path as supplied by the caller.
        path: String,
        /// Required prefix (`<root>/`).
        prefix: String,
    },

    /// Neither a plain-text nor an HTML body was supplied.
    #[error("Neither a plain-text nor an HTML body was provided")]
    EmptyBody,

    /// Attachment file could not be read.
    #[error("Failed to read attachment {path:?}: {source}")]
    AttachmentRead {
        /// Path of the attachment.
        path: String,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },

    /// Multipart assembly failed.
    #[error("Failed to assemble MIME message: {0}")]
    Build(String),

    /// Invalid MIME header.
    #[error("Invalid MIME header: {0}")]
    InvalidHeader(String),

    /// Invalid content type.
    #[error("Invalid content type: {0}")]
    InvalidContentType(String),

    /// Invalid encoding.
    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),

    /// Base64 decode error.
    #[error("Base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    /// UTF-8 decode error.
    #[error("UTF-8 decode error: {0}")]
    Utf8Decode(#[from] FromUtf8Error),

    /// Missing boundary in multipart message.
    #[error("Missing boundary in multipart message")]
    MissingBoundary,

    /// Invalid multipart structure.
    #[error("Invalid multipart structure: {0}")]
    InvalidMultipart(String),
}

impl From<std::fmt::Error> for Error {
    fn from(err: std::fmt::Error) -> Self {
        Self::Build(err.to_string())
    }
}
