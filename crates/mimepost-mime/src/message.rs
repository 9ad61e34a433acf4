//! MIME message structure and parsing.

use crate::content_type::ContentType;
use crate::encoding::{decode_base64, decode_quoted_printable};
use crate::error::{Error, Result};
use crate::header::Headers;
use std::fmt;

/// Transfer encoding types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    /// 7-bit ASCII.
    SevenBit,
    /// 8-bit binary.
    EightBit,
    /// Base64 encoding.
    Base64,
    /// Quoted-Printable encoding.
    QuotedPrintable,
    /// Binary (no encoding).
    Binary,
}

impl TransferEncoding {
    /// Parses transfer encoding from string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "8bit" => Self::EightBit,
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            "binary" => Self::Binary,
            _ => Self::SevenBit, // Default (includes "7bit")
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SevenBit => write!(f, "7bit"),
            Self::EightBit => write!(f, "8bit"),
            Self::Base64 => write!(f, "base64"),
            Self::QuotedPrintable => write!(f, "quoted-printable"),
            Self::Binary => write!(f, "binary"),
        }
    }
}

/// MIME message part.
#[derive(Debug, Clone)]
pub struct Part {
    /// Part headers.
    pub headers: Headers,
    /// Part body (raw bytes, still transfer-encoded).
    pub body: Vec<u8>,
}

impl Part {
    /// Creates a new part.
    #[must_use]
    pub const fn new(headers: Headers, body: Vec<u8>) -> Self {
        Self { headers, body }
    }

    /// Parses a part from its raw bytes (headers, blank line, body).
    ///
    /// # Errors
    ///
    /// Returns an error if the header block is malformed.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let (head, body) = split_head(raw);
        let headers = Headers::parse(&String::from_utf8(head.to_vec())?)?;
        Ok(Self::new(headers, body.to_vec()))
    }

    /// Gets the content type (`text/plain` when absent).
    ///
    /// # Errors
    ///
    /// Returns an error if content type header is invalid.
    pub fn content_type(&self) -> Result<ContentType> {
        self.headers
            .get("content-type")
            .map_or_else(|| Ok(ContentType::new("text", "plain")), ContentType::parse)
    }

    /// Gets the transfer encoding.
    #[must_use]
    pub fn transfer_encoding(&self) -> TransferEncoding {
        self.headers
            .get("content-transfer-encoding")
            .map_or(TransferEncoding::SevenBit, TransferEncoding::parse)
    }

    /// Returns true if the part carries `Content-Disposition: attachment`.
    #[must_use]
    pub fn is_attachment(&self) -> bool {
        self.headers
            .get("content-disposition")
            .is_some_and(|value| value.trim_start().to_lowercase().starts_with("attachment"))
    }

    /// Returns the `filename` parameter of the `Content-Disposition` header.
    #[must_use]
    pub fn filename(&self) -> Option<String> {
        let disposition = self.headers.get("content-disposition")?;
        disposition.split(';').skip(1).find_map(|param| {
            let (key, value) = param.trim().split_once('=')?;
            let key = key.trim();
            if key.eq_ignore_ascii_case("filename") {
                Some(unquote(value.trim()))
            } else if key.eq_ignore_ascii_case("filename*") {
                decode_extended_value(value.trim())
            } else {
                None
            }
        })
    }

    /// Decodes the body according to the transfer encoding.
    ///
    /// # Errors
    ///
    /// Returns an error if decoding fails.
    pub fn decode_body(&self) -> Result<Vec<u8>> {
        decode_transfer(&self.body, self.transfer_encoding())
    }

    /// Gets the decoded body as a string.
    ///
    /// # Errors
    ///
    /// Returns an error if decoding or UTF-8 conversion fails.
    pub fn body_text(&self) -> Result<String> {
        let decoded = self.decode_body()?;
        String::from_utf8(decoded).map_err(Into::into)
    }

    /// Parses the nested parts of a multipart part.
    ///
    /// Returns an empty list for non-multipart parts.
    ///
    /// # Errors
    ///
    /// Returns an error if the boundary is missing or the body is malformed.
    pub fn subparts(&self) -> Result<Vec<Self>> {
        let content_type = self.content_type()?;
        if !content_type.is_multipart() {
            return Ok(Vec::new());
        }
        let boundary = content_type.boundary().ok_or(Error::MissingBoundary)?;
        split_multipart(&self.body, boundary)
    }
}

/// MIME message.
#[derive(Debug, Clone)]
pub struct Message {
    /// Message headers.
    pub headers: Headers,
    /// Message parts (empty for single-part messages).
    pub parts: Vec<Part>,
    /// Body for single-part messages.
    pub body: Option<Vec<u8>>,
}

impl Message {
    /// Parses a complete message.
    ///
    /// # Errors
    ///
    /// Returns an error if the headers are malformed or a multipart body
    /// does not match its declared boundary.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let (head, body) = split_head(raw);
        let headers = Headers::parse(&String::from_utf8(head.to_vec())?)?;
        let mut message = Self {
            headers,
            parts: Vec::new(),
            body: None,
        };

        let content_type = message.content_type()?;
        if content_type.is_multipart() {
            let boundary = content_type.boundary().ok_or(Error::MissingBoundary)?;
            message.parts = split_multipart(body, boundary)?;
        } else {
            message.body = Some(body.to_vec());
        }

        Ok(message)
    }

    /// Gets the content type.
    ///
    /// # Errors
    ///
    /// Returns an error if content type header is invalid.
    pub fn content_type(&self) -> Result<ContentType> {
        self.headers
            .get("content-type")
            .map_or_else(|| Ok(ContentType::new("text", "plain")), ContentType::parse)
    }

    /// Checks if this is a multipart message.
    ///
    /// # Errors
    ///
    /// Returns an error if content type cannot be determined.
    pub fn is_multipart(&self) -> Result<bool> {
        Ok(self.content_type()?.is_multipart())
    }

    /// Gets the From header.
    #[must_use]
    pub fn from(&self) -> Option<&str> {
        self.headers.get("from")
    }

    /// Gets the To header.
    #[must_use]
    pub fn to(&self) -> Option<&str> {
        self.headers.get("to")
    }

    /// Gets the raw Subject header.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.headers.get("subject")
    }

    /// Gets the Subject header with RFC 2047 encoded words decoded.
    ///
    /// # Errors
    ///
    /// Returns an error if an encoded word is malformed.
    pub fn decoded_subject(&self) -> Result<Option<String>> {
        self.subject().map(Headers::decode_value).transpose()
    }

    /// Collects every non-multipart part, descending into nested multiparts.
    ///
    /// # Errors
    ///
    /// Returns an error if a nested multipart is malformed.
    pub fn leaf_parts(&self) -> Result<Vec<Part>> {
        let mut leaves = Vec::new();
        let mut pending: Vec<Part> = self.parts.iter().rev().cloned().collect();

        while let Some(part) = pending.pop() {
            if part.content_type()?.is_multipart() {
                pending.extend(part.subparts()?.into_iter().rev());
            } else {
                leaves.push(part);
            }
        }

        Ok(leaves)
    }

    /// Finds the first inline text/plain part.
    ///
    /// # Errors
    ///
    /// Returns an error if no text part is found or decoding fails.
    pub fn text_part(&self) -> Result<String> {
        self.find_inline("plain")?
            .ok_or_else(|| Error::InvalidMultipart("No text/plain part found".to_string()))
    }

    /// Finds the first inline text/html part.
    ///
    /// # Errors
    ///
    /// Returns an error if no HTML part is found or decoding fails.
    pub fn html_part(&self) -> Result<String> {
        self.find_inline("html")?
            .ok_or_else(|| Error::InvalidMultipart("No text/html part found".to_string()))
    }

    /// Returns the parts marked as attachments.
    ///
    /// # Errors
    ///
    /// Returns an error if a nested multipart is malformed.
    pub fn attachments(&self) -> Result<Vec<Part>> {
        Ok(self
            .leaf_parts()?
            .into_iter()
            .filter(Part::is_attachment)
            .collect())
    }

    fn find_inline(&self, sub_type: &str) -> Result<Option<String>> {
        for part in self.leaf_parts()? {
            if !part.is_attachment() && part.content_type()?.is("text", sub_type) {
                return part.body_text().map(Some);
            }
        }
        Ok(None)
    }
}

fn decode_transfer(body: &[u8], encoding: TransferEncoding) -> Result<Vec<u8>> {
    match encoding {
        TransferEncoding::Base64 => {
            let body_str = String::from_utf8_lossy(body);
            // Remove whitespace for lenient parsing
            let cleaned: String = body_str.chars().filter(|c| !c.is_whitespace()).collect();
            decode_base64(&cleaned)
        }
        TransferEncoding::QuotedPrintable => {
            decode_quoted_printable(&String::from_utf8_lossy(body))
        }
        _ => Ok(body.to_vec()),
    }
}

/// Splits raw bytes into the header block and the body.
fn split_head(raw: &[u8]) -> (&[u8], &[u8]) {
    if let Some(body) = raw.strip_prefix(b"\r\n") {
        return (&[], body);
    }
    if let Some(index) = find(raw, b"\r\n\r\n") {
        return (&raw[..index + 2], &raw[index + 4..]);
    }
    if let Some(index) = find(raw, b"\n\n") {
        return (&raw[..index + 1], &raw[index + 2..]);
    }
    (raw, &[])
}

/// Splits a multipart body into its parts (RFC 2046 §5.1.1).
///
/// The preamble and epilogue are discarded. The line break before each
/// delimiter belongs to the delimiter, not to the preceding part.
fn split_multipart(body: &[u8], boundary: &str) -> Result<Vec<Part>> {
    let open = format!("--{boundary}");
    let close = format!("--{boundary}--");
    let mut parts = Vec::new();
    let mut current: Option<usize> = None;
    let mut offset = 0;

    for line in body.split_inclusive(|&byte| byte == b'\n') {
        let trimmed = trim_line(line);
        let is_close = trimmed == close.as_bytes();
        if is_close || trimmed == open.as_bytes() {
            if let Some(start) = current.take() {
                let end = content_end(body, start, offset);
                parts.push(Part::parse(&body[start..end])?);
            }
            if is_close {
                return Ok(parts);
            }
            current = Some(offset + line.len());
        }
        offset += line.len();
    }

    Err(Error::InvalidMultipart(format!(
        "Missing closing delimiter {close}"
    )))
}

fn trim_line(line: &[u8]) -> &[u8] {
    let mut end = line.len();
    while end > 0 && matches!(line[end - 1], b'\r' | b'\n' | b' ' | b'\t') {
        end -= 1;
    }
    &line[..end]
}

fn content_end(body: &[u8], start: usize, delimiter_start: usize) -> usize {
    let content = &body[start..delimiter_start];
    if content.ends_with(b"\r\n") {
        delimiter_start - 2
    } else if content.ends_with(b"\n") {
        delimiter_start - 1
    } else {
        delimiter_start
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn unquote(value: &str) -> String {
    value
        .strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .map_or_else(|| value.to_string(), |inner| inner.replace("\\\"", "\"").replace("\\\\", "\\"))
}

/// Decodes an RFC 2231 extended value (`UTF-8''percent%20encoded`).
fn decode_extended_value(value: &str) -> Option<String> {
    let mut sections = value.splitn(3, '\'');
    let charset = sections.next()?;
    let _language = sections.next()?;
    let encoded = sections.next()?;
    if !charset.eq_ignore_ascii_case("utf-8") {
        return None;
    }

    let bytes = encoded.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut index = 0;
    while index < bytes.len() {
        if bytes[index] == b'%' {
            let hex = std::str::from_utf8(bytes.get(index + 1..index + 3)?).ok()?;
            decoded.push(u8::from_str_radix(hex, 16).ok()?);
            index += 3;
        } else {
            decoded.push(bytes[index]);
            index += 1;
        }
    }
    String::from_utf8(decoded).ok()
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

    const NESTED: &str = concat!(
        "MIME-Version: 1.0\r\n",
        "Subject: =?UTF-8?B?SMOpbGxv?=\r\n",
        "Content-Type: multipart/mixed; boundary=outer\r\n",
        "\r\n",
        "preamble\r\n",
        "--outer\r\n",
        "Content-Type: multipart/alternative; boundary=inner\r\n",
        "\r\n",
        "--inner\r\n",
        "Content-Type: text/plain; charset=UTF-8\r\n",
        "\r\n",
        "plain body\r\n",
        "--inner\r\n",
        "Content-Type: text/html; charset=UTF-8\r\n",
        "\r\n",
        "<p>html body</p>\r\n",
        "--inner--\r\n",
        "\r\n",
        "--outer\r\n",
        "Content-Type: application/pdf\r\n",
        "Content-Disposition: attachment; filename=\"report.pdf\"\r\n",
        "Content-Transfer-Encoding: base64\r\n",
        "\r\n",
        "SGVsbG8s\r\n",
        "IFdvcmxkIQ==\r\n",
        "--outer--\r\n",
        "epilogue\r\n",
    );

    #[test]
    fn test_transfer_encoding_parse() {
        assert_eq!(TransferEncoding::parse("7bit"), TransferEncoding::SevenBit);
        assert_eq!(TransferEncoding::parse("base64"), TransferEncoding::Base64);
        assert_eq!(
            TransferEncoding::parse("Quoted-Printable"),
            TransferEncoding::QuotedPrintable
        );
    }

    #[test]
    fn test_part_body_text() {
        let mut headers = Headers::new();
        headers.add("Content-Type", "text/plain; charset=utf-8");
        headers.add("Content-Transfer-Encoding", "quoted-printable");
        let part = Part::new(headers, b"H=C3=A9llo".to_vec());

        assert_eq!(part.body_text().unwrap(), "Héllo");
    }

    #[test]
    fn test_parse_single_part() {
        let raw = b"From: sender@example.com\r\nTo: recipient@example.com\r\nSubject: Test\r\n\r\nHello, World!";
        let message = Message::parse(raw).unwrap();

        assert_eq!(message.from(), Some("sender@example.com"));
        assert_eq!(message.to(), Some("recipient@example.com"));
        assert_eq!(message.subject(), Some("Test"));
        assert!(!message.is_multipart().unwrap());
        assert_eq!(message.body.as_deref(), Some(b"Hello, World!".as_slice()));
    }

    #[test]
    fn test_parse_nested_multipart() {
        let message = Message::parse(NESTED.as_bytes()).unwrap();

        assert!(message.is_multipart().unwrap());
        assert_eq!(message.parts.len(), 2);
        assert_eq!(message.decoded_subject().unwrap().as_deref(), Some("Héllo"));

        let alternative = message.parts[0].subparts().unwrap();
        assert_eq!(alternative.len(), 2);
        assert_eq!(alternative[0].body, b"plain body");
        assert_eq!(alternative[1].body, b"<p>html body</p>");

        assert_eq!(message.text_part().unwrap(), "plain body");
        assert_eq!(message.html_part().unwrap(), "<p>html body</p>");
    }

    #[test]
    fn test_parse_attachment() {
        let message = Message::parse(NESTED.as_bytes()).unwrap();
        let attachments = message.attachments().unwrap();

        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].filename().as_deref(), Some("report.pdf"));
        assert_eq!(attachments[0].decode_body().unwrap(), b"Hello, World!");
    }

    #[test]
    fn test_parse_missing_close_delimiter() {
        let raw = b"Content-Type: multipart/mixed; boundary=x\r\n\r\n--x\r\n\r\nbody\r\n";
        assert!(matches!(
            Message::parse(raw),
            Err(Error::InvalidMultipart(_))
        ));
    }

    #[test]
    fn test_parse_missing_boundary() {
        let raw = b"Content-Type: multipart/mixed\r\n\r\n";
        assert!(matches!(Message::parse(raw), Err(Error::MissingBoundary)));
    }

    #[test]
    fn test_extended_filename() {
        let mut headers = Headers::new();
        headers.add(
            "Content-Disposition",
            "attachment; filename*=UTF-8''r%C3%A9sum%C3%A9.pdf",
        );
        let part = Part::new(headers, Vec::new());

        assert!(part.is_attachment());
        assert_eq!(part.filename().as_deref(), Some("résumé.pdf"));
    }
}
