//! Multipart boundary tokens.

use rand::Rng;
use rand::distributions::Alphanumeric;
use std::fmt;

/// Fixed prefix; `=_` cannot occur in Base64 output.
const PREFIX: &str = "=_mp_";

/// Number of random characters after the prefix.
const TOKEN_LENGTH: usize = 32;

/// A multipart boundary delimiter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Boundary(String);

impl Boundary {
    /// Generates a fresh random boundary.
    #[must_use]
    pub fn generate() -> Self {
        let token: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(TOKEN_LENGTH)
            .map(char::from)
            .collect();
        Self(format!("{PREFIX}{token}"))
    }

    /// Generates a boundary that does not occur in any of `payloads`.
    #[must_use]
    pub fn generate_avoiding(payloads: &[&[u8]]) -> Self {
        loop {
            let boundary = Self::generate();
            if !payloads.iter().any(|payload| boundary.occurs_in(payload)) {
                return boundary;
            }
        }
    }

    /// Returns the boundary token.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the delimiter line that opens a part (`--boundary`).
    #[must_use]
    pub fn delimiter(&self) -> String {
        format!("--{}", self.0)
    }

    /// Returns the delimiter line that closes the multipart body (`--boundary--`).
    #[must_use]
    pub fn close_delimiter(&self) -> String {
        format!("--{}--", self.0)
    }

    fn occurs_in(&self, payload: &[u8]) -> bool {
        let needle = self.0.as_bytes();
        payload.windows(needle.len()).any(|window| window == needle)
    }
}

impl fmt::Display for Boundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generate_shape() {
        let boundary = Boundary::generate();
        let token = boundary.as_str();

        assert!(token.starts_with(PREFIX));
        assert_eq!(token.len(), PREFIX.len() + TOKEN_LENGTH);
        assert!(token[PREFIX.len()..].chars().all(|c| c.is_ascii_alphanumeric()));
        assert!(token.len() <= 70);
    }

    #[test]
    fn test_generate_is_unique() {
        let tokens: HashSet<Boundary> = (0..1000).map(|_| Boundary::generate()).collect();
        assert_eq!(tokens.len(), 1000);
    }

    #[test]
    fn test_generate_avoiding_payloads() {
        let first = Boundary::generate();
        let body = format!("text that quotes {first} verbatim");
        let second = Boundary::generate_avoiding(&[body.as_bytes()]);

        assert_ne!(first, second);
        assert!(!second.occurs_in(body.as_bytes()));
    }

    #[test]
    fn test_delimiters() {
        let boundary = Boundary("abc".to_string());
        assert_eq!(boundary.delimiter(), "--abc");
        assert_eq!(boundary.close_delimiter(), "--abc--");
    }
}
