//! Sender configuration types.

use mimepost_mime::Sender;
use serde::{Deserialize, Serialize};

/// Security/encryption mode for the SMTP connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Security {
    /// No encryption (not recommended).
    None,
    /// Implicit TLS (connect directly with TLS).
    Tls,
    /// STARTTLS upgrade after plaintext connect.
    #[default]
    StartTls,
}

impl Security {
    /// Get display name for the security mode.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::None => "None (insecure)",
            Self::Tls => "SSL/TLS",
            Self::StartTls => "STARTTLS",
        }
    }

    /// Get default port for the security mode.
    #[must_use]
    pub const fn default_port(&self) -> u16 {
        match self {
            Self::None => 25,
            Self::StartTls => 587,
            Self::Tls => 465,
        }
    }
}

/// Everything needed to build and deliver mail for one sender.
///
/// Constructed once and then only read; the dispatcher shares it across
/// concurrent sends.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SenderConfig {
    /// Sender address (`From:` and envelope sender, also the SMTP username).
    pub address: String,
    /// SMTP secret for `address`.
    pub credential: String,
    /// SMTP server hostname.
    pub host: String,
    /// SMTP server port.
    pub port: u16,
    /// Display name shown next to the sender address.
    pub display_name: String,
    /// `Reply-To:` address; empty to omit the header.
    pub reply_to: String,
    /// Directory every attachment path must start with (as `<root>/`).
    pub attachment_root: String,
    /// Address that silently receives a copy of every message.
    pub bcc_address: Option<String>,
    /// Connection security.
    pub security: Security,
}

impl SenderConfig {
    /// Creates a configuration for `address` on `host`, using STARTTLS on 587.
    #[must_use]
    pub fn new(address: impl Into<String>, host: impl Into<String>) -> Self {
        let security = Security::default();
        Self {
            address: address.into(),
            host: host.into(),
            port: security.default_port(),
            security,
            ..Self::default()
        }
    }

    /// Sets the SMTP credential.
    #[must_use]
    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = credential.into();
        self
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    /// Sets the `Reply-To:` address.
    #[must_use]
    pub fn with_reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.reply_to = reply_to.into();
        self
    }

    /// Sets the attachment root directory.
    #[must_use]
    pub fn with_attachment_root(mut self, root: impl Into<String>) -> Self {
        self.attachment_root = root.into();
        self
    }

    /// Sets the BCC copy address.
    #[must_use]
    pub fn with_bcc(mut self, bcc: impl Into<String>) -> Self {
        self.bcc_address = Some(bcc.into());
        self
    }

    /// Sets the security mode and its default port.
    #[must_use]
    pub const fn with_security(mut self, security: Security) -> Self {
        self.security = security;
        self.port = security.default_port();
        self
    }

    /// Sets the port.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Returns the BCC address if one is configured and non-empty.
    #[must_use]
    pub fn bcc(&self) -> Option<&str> {
        self.bcc_address.as_deref().filter(|bcc| !bcc.is_empty())
    }

    /// Returns the header identity used by the message builder.
    #[must_use]
    pub fn sender(&self) -> Sender {
        Sender {
            address: self.address.clone(),
            display_name: self.display_name.clone(),
            reply_to: Some(self.reply_to.clone()).filter(|reply_to| !reply_to.is_empty()),
        }
    }
}

impl std::fmt::Debug for SenderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SenderConfig")
            .field("address", &self.address)
            .field("credential", &"[REDACTED]")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("display_name", &self.display_name)
            .field("reply_to", &self.reply_to)
            .field("attachment_root", &self.attachment_root)
            .field("bcc_address", &self.bcc_address)
            .field("security", &self.security)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_new_uses_starttls_defaults() {
        let config = SenderConfig::new("noreply@example.com", "smtp.example.com");
        assert_eq!(config.security, Security::StartTls);
        assert_eq!(config.port, 587);
    }

    #[test]
    fn test_with_security_sets_port() {
        let config = SenderConfig::new("a@example.com", "smtp.example.com").with_security(Security::Tls);
        assert_eq!(config.port, 465);

        let config = config.with_port(2465);
        assert_eq!(config.port, 2465);
    }

    #[test]
    fn test_debug_redacts_credential() {
        let config = SenderConfig::new("a@example.com", "smtp.example.com").with_credential("hunter2");
        let debug = format!("{config:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_empty_bcc_is_ignored() {
        let config = SenderConfig::new("a@example.com", "smtp.example.com").with_bcc("");
        assert_eq!(config.bcc(), None);

        let config = config.with_bcc("audit@example.com");
        assert_eq!(config.bcc(), Some("audit@example.com"));
    }

    #[test]
    fn test_sender_identity() {
        let config = SenderConfig::new("a@example.com", "smtp.example.com").with_display_name("Alerts");
        let sender = config.sender();
        assert_eq!(sender.address, "a@example.com");
        assert_eq!(sender.display_name, "Alerts");
        assert_eq!(sender.reply_to, None);
    }

    #[test]
    fn test_deserialize_partial_document() {
        let config: SenderConfig = serde_json::from_str(
            r#"{"address": "a@example.com", "host": "smtp.example.com", "port": 25, "security": "none"}"#,
        )
        .unwrap();
        assert_eq!(config.security, Security::None);
        assert_eq!(config.port, 25);
        assert!(config.bcc_address.is_none());
    }
}
