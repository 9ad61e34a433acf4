//! Sender configuration validation.

use super::model::SenderConfig;

/// Validation error for sender configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Sender address is empty.
    EmptyAddress,
    /// Sender address format is invalid.
    InvalidAddress,
    /// SMTP host is empty.
    EmptyHost,
    /// SMTP port is invalid.
    InvalidPort,
    /// Reply-To address format is invalid.
    InvalidReplyTo,
    /// BCC address format is invalid.
    InvalidBcc,
}

impl ValidationError {
    /// Get human-readable error message.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::EmptyAddress => "Sender address is required",
            Self::InvalidAddress => "Invalid sender address format",
            Self::EmptyHost => "SMTP server is required",
            Self::InvalidPort => "SMTP port must be 1-65535",
            Self::InvalidReplyTo => "Invalid Reply-To address format",
            Self::InvalidBcc => "Invalid BCC address format",
        }
    }

    /// Get the field name this error relates to.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::EmptyAddress | Self::InvalidAddress => "address",
            Self::EmptyHost => "host",
            Self::InvalidPort => "port",
            Self::InvalidReplyTo => "reply_to",
            Self::InvalidBcc => "bcc_address",
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ValidationError {}

/// Result of validating a sender configuration.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// Validate a sender configuration.
///
/// Returns `Ok(())` if valid, or `Err(Vec<ValidationError>)` with all errors.
/// The credential is not checked; some relays accept unauthenticated mail.
///
/// # Errors
///
/// Returns a vector of `ValidationError` if any fields are invalid.
pub fn validate_config(config: &SenderConfig) -> ValidationResult {
    let mut errors = Vec::new();

    if config.address.trim().is_empty() {
        errors.push(ValidationError::EmptyAddress);
    } else if !is_valid_email(&config.address) {
        errors.push(ValidationError::InvalidAddress);
    }

    if config.host.trim().is_empty() {
        errors.push(ValidationError::EmptyHost);
    }
    if config.port == 0 {
        errors.push(ValidationError::InvalidPort);
    }

    if !config.reply_to.is_empty() && !is_valid_email(&config.reply_to) {
        errors.push(ValidationError::InvalidReplyTo);
    }
    if config.bcc().is_some_and(|bcc| !is_valid_email(bcc)) {
        errors.push(ValidationError::InvalidBcc);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Basic email validation.
pub(crate) fn is_valid_email(email: &str) -> bool {
    // Addresses end up in header lines
    if email.chars().any(char::is_control) {
        return false;
    }
    let email = email.trim();
    if email.contains(char::is_whitespace) {
        return false;
    }

    // Must contain exactly one @
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if domain.contains('@') || local.is_empty() {
        return false;
    }

    // Domain must contain at least one dot and no empty labels
    domain.contains('.') && domain.split('.').all(|label| !label.is_empty())
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_email() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("user.name@example.com"));
        assert!(is_valid_email("user@sub.example.com"));
    }

    #[test]
    fn test_invalid_email() {
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("user"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("user@"));
        assert!(!is_valid_email("user@example"));
        assert!(!is_valid_email("user@@example.com"));
        assert!(!is_valid_email("user@example..com"));
    }

    #[test]
    fn test_email_with_line_break_is_invalid() {
        assert!(!is_valid_email("support@x.com\r\nX-Evil: 1"));
        assert!(!is_valid_email("support@x.com\n"));
        assert!(!is_valid_email("sup port@x.com"));
        assert!(!is_valid_email("support@x.com\0"));
    }

    #[test]
    fn test_validate_rejects_injected_reply_to() {
        let config = SenderConfig::new("noreply@example.com", "smtp.example.com")
            .with_reply_to("support@x.com\r\nX-Evil: 1");
        assert_eq!(
            validate_config(&config).unwrap_err(),
            vec![ValidationError::InvalidReplyTo]
        );
    }

    #[test]
    fn test_validate_empty_config() {
        let errors = validate_config(&SenderConfig::default()).unwrap_err();
        assert!(errors.contains(&ValidationError::EmptyAddress));
        assert!(errors.contains(&ValidationError::EmptyHost));
        assert!(errors.contains(&ValidationError::InvalidPort));
    }

    #[test]
    fn test_validate_complete_config() {
        let config = SenderConfig::new("noreply@example.com", "smtp.example.com")
            .with_credential("secret")
            .with_reply_to("support@example.com")
            .with_bcc("audit@example.com");
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_optional_addresses() {
        let config = SenderConfig::new("noreply@example.com", "smtp.example.com")
            .with_reply_to("not-an-address")
            .with_bcc("also-not");
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::InvalidReplyTo, ValidationError::InvalidBcc]
        );
        assert_eq!(errors[1].field(), "bcc_address");
    }
}
