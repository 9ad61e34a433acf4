//! Message dispatch.
//!
//! A [`Dispatcher`] owns one sender configuration. Each call to
//! [`Dispatcher::send`] builds a fresh message and hands it to the transport
//! with an envelope of every `To:` recipient plus the configured BCC copy.
//! The BCC address never appears in the message headers.

use mimepost_mime::{AttachmentSource, FileSystem, MessageBuilder, OutgoingEmail};
use tracing::{error, info, instrument};

use super::transport::{Credentials, Endpoint, Envelope, Transport};
use crate::config::{SenderConfig, validate_config};
use crate::error::{Error, Result};

/// Builds and delivers messages for one sender.
///
/// The dispatcher is immutable after construction, so `&self` sends may run
/// concurrently.
#[derive(Debug)]
pub struct Dispatcher<T, S = FileSystem> {
    config: SenderConfig,
    builder: MessageBuilder<S>,
    endpoint: Endpoint,
    credentials: Credentials,
    transport: T,
}

impl<T: Transport> Dispatcher<T> {
    /// Creates a dispatcher that reads attachments from the filesystem.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration fails validation.
    pub fn new(config: SenderConfig, transport: T) -> Result<Self> {
        if let Err(errors) = validate_config(&config) {
            let messages: Vec<String> = errors
                .iter()
                .map(|e| format!("{}: {e}", e.field()))
                .collect();
            return Err(Error::Config(messages.join("; ")));
        }

        let builder = MessageBuilder::new(config.sender(), config.attachment_root.clone());
        let endpoint = Endpoint {
            host: config.host.clone(),
            port: config.port,
            security: config.security,
        };
        let credentials = Credentials {
            username: config.address.clone(),
            secret: config.credential.clone(),
        };

        Ok(Self {
            config,
            builder,
            endpoint,
            credentials,
            transport,
        })
    }
}

impl<T: Transport, S: AttachmentSource> Dispatcher<T, S> {
    /// Replaces the attachment source.
    #[must_use]
    pub fn with_attachment_source<U: AttachmentSource>(self, source: U) -> Dispatcher<T, U> {
        Dispatcher {
            config: self.config,
            builder: self.builder.with_source(source),
            endpoint: self.endpoint,
            credentials: self.credentials,
            transport: self.transport,
        }
    }

    /// Returns the sender configuration.
    #[must_use]
    pub const fn config(&self) -> &SenderConfig {
        &self.config
    }

    /// Returns the transport.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns the delivery envelope for `email`.
    ///
    /// Recipients are the `To:` list followed by the BCC copy, if configured.
    #[must_use]
    pub fn envelope(&self, email: &OutgoingEmail) -> Envelope {
        let mut recipients = email.to.clone();
        if let Some(bcc) = self.config.bcc() {
            recipients.push(bcc.to_string());
        }

        Envelope {
            from: self.config.address.clone(),
            recipients,
        }
    }

    /// Builds `email` and delivers it.
    ///
    /// Nothing is sent if the message cannot be built.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Build`] if the message cannot be built and
    /// [`Error::Transport`] if delivery fails.
    #[instrument(skip_all, fields(recipients = email.to.len()))]
    pub async fn send(&self, email: &OutgoingEmail) -> Result<()> {
        let message = self.builder.build(email).map_err(|e| {
            error!(error = %e, "Error creating message");
            Error::from(e)
        })?;

        let envelope = self.envelope(email);
        self.transport
            .send(
                &self.endpoint,
                &self.credentials,
                &envelope,
                message.as_bytes(),
            )
            .await
            .map_err(|e| {
                error!(error = %e, retryable = e.is_retryable(), "Error sending message");
                Error::from(e)
            })?;

        info!(
            envelope_recipients = envelope.recipients.len(),
            bytes = message.len(),
            "Message sent"
        );
        Ok(())
    }
}
