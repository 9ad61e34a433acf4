//! Transport contract and the SMTP implementation.
//!
//! A transport receives a fully built message and delivers it to the
//! envelope recipients. It owns connection setup, authentication and
//! timeouts; the dispatcher never retries.

use std::future::Future;
use std::time::Duration;

use lettre::transport::smtp::authentication::{Credentials as SmtpCredentials, Mechanism};
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use tracing::{debug, error};

use crate::config::Security;

/// Default time allowed for each SMTP command.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Errors that can occur during delivery.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// An envelope address could not be parsed.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Connecting, TLS or authentication failed.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The server replied with a transient (4xx) error.
    #[error("Transient SMTP error: {0}")]
    Transient(String),

    /// The server replied with a permanent (5xx) error.
    #[error("Permanent SMTP error: {0}")]
    Permanent(String),
}

impl TransportError {
    /// Returns true if the same delivery may succeed later.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Transient(_))
    }
}

/// SMTP server location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Connection security.
    pub security: Security,
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// SMTP AUTH PLAIN credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Username (the sender address).
    pub username: String,
    /// Secret.
    pub secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Delivery envelope: `MAIL FROM` plus one `RCPT TO` per recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Envelope sender.
    pub from: String,
    /// Envelope recipients, in order.
    pub recipients: Vec<String>,
}

impl Envelope {
    fn to_lettre(&self) -> Result<lettre::address::Envelope, TransportError> {
        let parse = |addr: &str| {
            addr.parse::<lettre::Address>()
                .map_err(|e| TransportError::InvalidAddress(format!("{addr}: {e}")))
        };

        let from = parse(&self.from)?;
        let recipients = self
            .recipients
            .iter()
            .map(|addr| parse(addr))
            .collect::<Result<Vec<_>, _>>()?;

        lettre::address::Envelope::new(Some(from), recipients)
            .map_err(|e| TransportError::InvalidAddress(e.to_string()))
    }
}

/// Delivers a raw message.
pub trait Transport: Send + Sync {
    /// Sends `message` to every envelope recipient.
    ///
    /// # Errors
    ///
    /// Returns an error if the message could not be handed to the server.
    fn send(
        &self,
        endpoint: &Endpoint,
        credentials: &Credentials,
        envelope: &Envelope,
        message: &[u8],
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// SMTP transport built on `lettre`.
///
/// Every send opens its own connection; nothing is pooled.
#[derive(Debug, Clone)]
pub struct SmtpTransport {
    timeout: Option<Duration>,
}

impl Default for SmtpTransport {
    fn default() -> Self {
        Self {
            timeout: Some(DEFAULT_TIMEOUT),
        }
    }
}

impl SmtpTransport {
    /// Creates a transport with the default command timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the per-command timeout (`None` waits forever).
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn connect(
        &self,
        endpoint: &Endpoint,
        credentials: &Credentials,
    ) -> Result<AsyncSmtpTransport<Tokio1Executor>, TransportError> {
        let builder = match endpoint.security {
            Security::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&endpoint.host)
                .map_err(|e| TransportError::Connection(format!("SMTP TLS relay error: {e}")))?,
            Security::StartTls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&endpoint.host).map_err(
                    |e| TransportError::Connection(format!("SMTP STARTTLS relay error: {e}")),
                )?
            }
            Security::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&endpoint.host),
        };

        let builder = builder.port(endpoint.port).timeout(self.timeout);

        // Open relays take no credentials
        let builder = if credentials.username.is_empty() {
            builder
        } else {
            builder
                .credentials(SmtpCredentials::new(
                    credentials.username.clone(),
                    credentials.secret.clone(),
                ))
                .authentication(vec![Mechanism::Plain])
        };

        Ok(builder.build())
    }
}

impl Transport for SmtpTransport {
    async fn send(
        &self,
        endpoint: &Endpoint,
        credentials: &Credentials,
        envelope: &Envelope,
        message: &[u8],
    ) -> Result<(), TransportError> {
        let lettre_envelope = envelope.to_lettre()?;
        let transport = self.connect(endpoint, credentials)?;

        debug!(
            %endpoint,
            security = endpoint.security.display_name(),
            recipients = envelope.recipients.len(),
            "sending via SMTP"
        );
        transport
            .send_raw(&lettre_envelope, message)
            .await
            .map_err(|e| {
                error!(error = %e, %endpoint, "SMTP send failed");
                map_smtp_error(&e)
            })?;

        Ok(())
    }
}

/// Map a lettre SMTP error to the appropriate `TransportError` variant.
fn map_smtp_error(error: &lettre::transport::smtp::Error) -> TransportError {
    let message = error.to_string();

    if error.is_transient() {
        TransportError::Transient(message)
    } else if error.is_permanent() {
        TransportError::Permanent(message)
    } else {
        TransportError::Connection(message)
    }
}
