//! Outgoing message construction.
//!
//! [`MessageBuilder`] turns an [`OutgoingEmail`] into the exact bytes handed
//! to an SMTP transport. The layout is always `multipart/mixed`:
//!
//! ```text
//! multipart/mixed
//! ├── multipart/alternative   (when both bodies are present)
//! │   ├── text/plain
//! │   └── text/html
//! │     or a lone text/plain / text/html part
//! └── attachment              (optional, base64)
//! ```

use crate::boundary::Boundary;
use crate::content_type::ContentType;
use crate::encoding::{encode_base64_lines, encode_quoted_printable};
use crate::error::{Error, Result};
use crate::header::Headers;
use crate::message::{Part, TransferEncoding};
use std::fmt::Write as _;
use std::io;
use std::path::{Component, Path};
use tracing::debug;

/// RFC 5322 hard limit for a line, excluding CRLF.
const MAX_LINE_OCTETS: usize = 998;

/// Preferred header line width before folding.
const FOLD_COLUMN: usize = 78;

/// Sender identity rendered into the header block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sender {
    /// Envelope and `From:` address.
    pub address: String,
    /// Human-readable name shown next to the address.
    pub display_name: String,
    /// `Reply-To:` address, if any.
    pub reply_to: Option<String>,
}

/// Source of attachment bytes.
pub trait AttachmentSource {
    /// Reads the whole file at `path`.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the file cannot be read.
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;
}

/// Reads attachments from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSystem;

impl AttachmentSource for FileSystem {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }
}

/// A single email to build and send.
///
/// Empty strings are treated the same as absent values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutgoingEmail {
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub text_body: Option<String>,
    /// HTML body.
    pub html_body: Option<String>,
    /// Attachment path; must live under the attachment root.
    pub attachment: Option<String>,
    /// `To:` recipients, in order.
    pub to: Vec<String>,
}

impl OutgoingEmail {
    /// Creates an email with a subject and nothing else.
    #[must_use]
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            ..Self::default()
        }
    }

    /// Adds a recipient.
    #[must_use]
    pub fn to(mut self, recipient: impl Into<String>) -> Self {
        self.to.push(recipient.into());
        self
    }

    /// Sets the plain-text body.
    #[must_use]
    pub fn text_body(mut self, body: impl Into<String>) -> Self {
        self.text_body = Some(body.into());
        self
    }

    /// Sets the HTML body.
    #[must_use]
    pub fn html_body(mut self, body: impl Into<String>) -> Self {
        self.html_body = Some(body.into());
        self
    }

    /// Sets the attachment path.
    #[must_use]
    pub fn attach(mut self, path: impl Into<String>) -> Self {
        self.attachment = Some(path.into());
        self
    }

    fn text(&self) -> Option<&str> {
        non_empty(self.text_body.as_deref())
    }

    fn html(&self) -> Option<&str> {
        non_empty(self.html_body.as_deref())
    }

    fn attachment_path(&self) -> Option<&str> {
        non_empty(self.attachment.as_deref())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// A fully assembled message: headers and MIME body, CRLF line endings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltMessage(Vec<u8>);

impl BuiltMessage {
    /// Returns the raw message bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consumes the message, returning its bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Returns the size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the message has no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for BuiltMessage {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Builds MIME messages for a fixed sender.
#[derive(Debug, Clone)]
pub struct MessageBuilder<S = FileSystem> {
    sender: Sender,
    attachment_root: String,
    source: S,
}

impl MessageBuilder<FileSystem> {
    /// Creates a builder reading attachments from the filesystem.
    ///
    /// Attachment paths must start with `<attachment_root>/`.
    #[must_use]
    pub fn new(sender: Sender, attachment_root: impl Into<String>) -> Self {
        Self {
            sender,
            attachment_root: attachment_root.into(),
            source: FileSystem,
        }
    }
}

impl<S: AttachmentSource> MessageBuilder<S> {
    /// Replaces the attachment source.
    #[must_use]
    pub fn with_source<T: AttachmentSource>(self, source: T) -> MessageBuilder<T> {
        MessageBuilder {
            sender: self.sender,
            attachment_root: self.attachment_root,
            source,
        }
    }

    /// Returns the sender identity.
    #[must_use]
    pub const fn sender(&self) -> &Sender {
        &self.sender
    }

    /// Builds the complete message.
    ///
    /// The attachment path and the header values are checked before any file
    /// is read.
    ///
    /// # Errors
    ///
    /// - [`Error::EmptyBody`] if neither body is present.
    /// - [`Error::InvalidAttachmentPath`] if the attachment is outside the root.
    /// - [`Error::InvalidHeader`] if an address or name contains a control
    ///   character, or a header line would exceed 998 octets.
    /// - [`Error::AttachmentRead`] if the attachment cannot be read.
    /// - [`Error::Build`] if the message cannot be assembled.
    pub fn build(&self, email: &OutgoingEmail) -> Result<BuiltMessage> {
        let body = match (email.text(), email.html()) {
            (Some(text), Some(html)) => BodyLayout::Alternative { text, html },
            (Some(text), None) => BodyLayout::Single(text_part(ContentType::text_plain(), text)),
            (None, Some(html)) => BodyLayout::Single(text_part(ContentType::text_html(), html)),
            (None, None) => return Err(Error::EmptyBody),
        };

        let attachment_path = email.attachment_path();
        if let Some(path) = attachment_path {
            self.check_attachment_path(path)?;
        }

        let mut headers = self.headers(email)?;

        let attachment = attachment_path
            .map(|path| self.attachment_part(path))
            .transpose()?;

        let mut parts = vec![body.into_part()];
        parts.extend(attachment);

        let payloads: Vec<&[u8]> = parts.iter().map(|part| part.body.as_slice()).collect();
        let boundary = Boundary::generate_avoiding(&payloads);
        headers.add(
            "Content-Type",
            ContentType::multipart_mixed(boundary.as_str()).to_string(),
        );
        check_line_lengths(&headers)?;

        let mut head = String::new();
        write!(head, "{headers}")?;
        head.push_str("\r\n");

        let mut out = head.into_bytes();
        write_multipart(&boundary, &parts, &mut out);
        out.extend_from_slice(b"\r\n");

        debug!(
            parts = parts.len(),
            bytes = out.len(),
            recipients = email.to.len(),
            "built MIME message"
        );
        Ok(BuiltMessage(out))
    }

    fn check_attachment_path(&self, path: &str) -> Result<()> {
        let prefix = format!("{}/", self.attachment_root);
        let escapes_root = Path::new(path)
            .components()
            .any(|component| matches!(component, Component::ParentDir));

        if path.starts_with(&prefix) && !escapes_root {
            Ok(())
        } else {
            Err(Error::InvalidAttachmentPath {
                path: path.to_string(),
                prefix,
            })
        }
    }

    fn attachment_part(&self, path: &str) -> Result<Part> {
        let file_path = Path::new(path);
        let data = self
            .source
            .read(file_path)
            .map_err(|source| Error::AttachmentRead {
                path: path.to_string(),
                source,
            })?;

        let filename = file_path
            .file_name()
            .map_or_else(|| path.to_string(), |name| name.to_string_lossy().into_owned());

        let mut headers = Headers::new();
        headers.add("Content-Type", ContentType::from_path(file_path).to_string());
        headers.add("Content-Disposition", content_disposition(&filename));
        headers.add(
            "Content-Transfer-Encoding",
            TransferEncoding::Base64.to_string(),
        );

        debug!(path, size = data.len(), "attaching file");
        Ok(Part::new(headers, encode_base64_lines(&data).into_bytes()))
    }

    /// Headers up to `Subject`/`Reply-To`; `Content-Type` is added once the
    /// boundary is known.
    fn headers(&self, email: &OutgoingEmail) -> Result<Headers> {
        check_header_value("From", &self.sender.address)?;
        check_header_value("From", &self.sender.display_name)?;
        for recipient in &email.to {
            check_header_value("To", recipient)?;
        }
        let reply_to = non_empty(self.sender.reply_to.as_deref());
        if let Some(reply_to) = reply_to {
            check_header_value("Reply-To", reply_to)?;
        }

        let mut headers = Headers::new();
        headers.add("MIME-Version", "1.0");
        headers.add("Date", chrono::Utc::now().to_rfc2822());
        headers.add("From", self.from_value());
        if !email.to.is_empty() {
            headers.add("To", address_list("To", &email.to));
        }
        headers.add("Subject", Headers::encode_value(&email.subject));
        if let Some(reply_to) = reply_to {
            headers.add("Reply-To", reply_to);
        }
        Ok(headers)
    }

    fn from_value(&self) -> String {
        if self.sender.display_name.is_empty() {
            self.sender.address.clone()
        } else {
            format!(
                "{} <{}>",
                Headers::encode_value(&self.sender.display_name),
                self.sender.address
            )
        }
    }
}

/// Rejects values that would break out of their header line.
fn check_header_value(name: &str, value: &str) -> Result<()> {
    if value.chars().any(char::is_control) {
        return Err(Error::InvalidHeader(format!(
            "{name} contains a control character: {value:?}"
        )));
    }
    Ok(())
}

/// Joins addresses with `, `, folding before a line would pass 78 columns.
fn address_list(name: &str, addresses: &[String]) -> String {
    let mut value = String::new();
    let mut column = name.len() + 2;

    for (index, address) in addresses.iter().enumerate() {
        if index > 0 {
            value.push(',');
            column += 1;
            if column + 1 + address.len() > FOLD_COLUMN {
                value.push_str("\r\n ");
                column = 1;
            } else {
                value.push(' ');
                column += 1;
            }
        }
        value.push_str(address);
        column += address.len();
    }

    value
}

/// Enforces the RFC 5322 hard limit on every rendered header line.
fn check_line_lengths(headers: &Headers) -> Result<()> {
    for (name, value) in headers.iter() {
        for (index, line) in value.split("\r\n").enumerate() {
            let octets = if index == 0 {
                name.len() + 2 + line.len()
            } else {
                line.len()
            };
            if octets > MAX_LINE_OCTETS {
                return Err(Error::InvalidHeader(format!(
                    "{name} line is {octets} octets, limit is {MAX_LINE_OCTETS}"
                )));
            }
        }
    }
    Ok(())
}

/// Body section of the outer multipart.
enum BodyLayout<'a> {
    Alternative { text: &'a str, html: &'a str },
    Single(Part),
}

impl BodyLayout<'_> {
    fn into_part(self) -> Part {
        match self {
            Self::Single(part) => part,
            Self::Alternative { text, html } => {
                let parts = [
                    text_part(ContentType::text_plain(), text),
                    text_part(ContentType::text_html(), html),
                ];
                let payloads: Vec<&[u8]> = parts.iter().map(|part| part.body.as_slice()).collect();
                let boundary = Boundary::generate_avoiding(&payloads);

                let mut body = Vec::new();
                write_multipart(&boundary, &parts, &mut body);

                let mut headers = Headers::new();
                headers.add(
                    "Content-Type",
                    ContentType::multipart_alternative(boundary.as_str()).to_string(),
                );
                Part::new(headers, body)
            }
        }
    }
}

/// Builds a text part, choosing 7bit when the body allows it.
fn text_part(content_type: ContentType, body: &str) -> Part {
    let normalized = body.replace("\r\n", "\n");
    let seven_bit = normalized.is_ascii()
        && !normalized.contains(['\r', '\0'])
        && normalized.split('\n').all(|line| line.len() <= MAX_LINE_OCTETS);

    let (encoding, encoded) = if seven_bit {
        (TransferEncoding::SevenBit, normalized.replace('\n', "\r\n"))
    } else {
        (TransferEncoding::QuotedPrintable, encode_quoted_printable(body))
    };

    let mut headers = Headers::new();
    headers.add("Content-Type", content_type.to_string());
    headers.add("Content-Transfer-Encoding", encoding.to_string());
    Part::new(headers, encoded.into_bytes())
}

/// Writes delimited parts followed by the close delimiter (no trailing CRLF).
fn write_multipart(boundary: &Boundary, parts: &[Part], out: &mut Vec<u8>) {
    for part in parts {
        out.extend_from_slice(boundary.delimiter().as_bytes());
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(part.headers.to_string().as_bytes());
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&part.body);
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(boundary.close_delimiter().as_bytes());
}

fn content_disposition(filename: &str) -> String {
    if filename.chars().all(|c| c.is_ascii() && !c.is_ascii_control()) {
        let escaped = filename.replace('\\', "\\\\").replace('"', "\\\"");
        format!("attachment; filename=\"{escaped}\"")
    } else {
        format!("attachment; filename*=UTF-8''{}", percent_encode(filename))
    }
}

/// Percent-encodes everything outside RFC 2231 `attribute-char`.
fn percent_encode(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len() * 3);
    for byte in value.bytes() {
        if byte.is_ascii_alphanumeric() || b"!#$&+-.^_`|~".contains(&byte) {
            encoded.push(char::from(byte));
        } else {
            let _ = write!(encoded, "%{byte:02X}");
        }
    }
    encoded
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
    use crate::message::Message;
    use std::cell::Cell;
    use std::collections::HashMap;
    use std::path::PathBuf;

    #[derive(Default)]
    struct MemorySource {
        files: HashMap<PathBuf, Vec<u8>>,
        reads: Cell<usize>,
    }

    impl MemorySource {
        fn with_file(path: &str, data: &[u8]) -> Self {
            let mut source = Self::default();
            source.files.insert(PathBuf::from(path), data.to_vec());
            source
        }
    }

    impl AttachmentSource for MemorySource {
        fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
            self.reads.set(self.reads.get() + 1);
            self.files
                .get(path)
                .cloned()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such file"))
        }
    }

    fn sender() -> Sender {
        Sender {
            address: "noreply@example.com".to_string(),
            display_name: "Example Støre".to_string(),
            reply_to: Some("support@example.com".to_string()),
        }
    }

    fn builder(source: MemorySource) -> MessageBuilder<MemorySource> {
        MessageBuilder::new(sender(), "storage").with_source(source)
    }

    fn header_block(raw: &[u8]) -> String {
        let text = String::from_utf8_lossy(raw);
        text.split("\r\n\r\n").next().unwrap().to_string()
    }

    #[test]
    fn test_plain_only() {
        let email = OutgoingEmail::new("Hello").to("a@x.com").text_body("Hi there");
        let built = builder(MemorySource::default()).build(&email).unwrap();
        let message = Message::parse(built.as_bytes()).unwrap();

        assert_eq!(message.to(), Some("a@x.com"));
        assert_eq!(message.parts.len(), 1);
        assert_eq!(
            message.parts[0].headers.get("Content-Type"),
            Some("text/plain; charset=UTF-8")
        );
        assert_eq!(message.parts[0].body_text().unwrap(), "Hi there");
        assert!(!String::from_utf8_lossy(built.as_bytes()).contains("multipart/alternative"));
    }

    #[test]
    fn test_html_only() {
        let email = OutgoingEmail::new("Hello").to("a@x.com").html_body("<b>Hi</b>");
        let built = builder(MemorySource::default()).build(&email).unwrap();
        let message = Message::parse(built.as_bytes()).unwrap();

        assert_eq!(message.parts.len(), 1);
        assert_eq!(
            message.parts[0].headers.get("Content-Type"),
            Some("text/html; charset=UTF-8")
        );
        assert_eq!(message.html_part().unwrap(), "<b>Hi</b>");
    }

    #[test]
    fn test_plain_and_html_nest_alternative() {
        let email = OutgoingEmail::new("Hello")
            .to("a@x.com")
            .text_body("Hi there")
            .html_body("<p>Hi there</p>");
        let built = builder(MemorySource::default()).build(&email).unwrap();
        let message = Message::parse(built.as_bytes()).unwrap();

        assert_eq!(message.parts.len(), 1);
        let outer = message.content_type().unwrap();
        let inner = message.parts[0].content_type().unwrap();
        assert!(inner.is("multipart", "alternative"));
        assert_ne!(outer.boundary(), inner.boundary());

        let alternatives = message.parts[0].subparts().unwrap();
        assert_eq!(alternatives.len(), 2);
        assert_eq!(
            alternatives[0].headers.get("Content-Type"),
            Some("text/plain; charset=UTF-8")
        );
        assert_eq!(
            alternatives[1].headers.get("Content-Type"),
            Some("text/html; charset=UTF-8")
        );
        assert_eq!(alternatives[0].body_text().unwrap(), "Hi there");
        assert_eq!(alternatives[1].body_text().unwrap(), "<p>Hi there</p>");
    }

    #[test]
    fn test_header_order_and_values() {
        let email = OutgoingEmail::new("Hello")
            .to("a@x.com")
            .to("b@x.com")
            .text_body("Hi");
        let built = builder(MemorySource::default()).build(&email).unwrap();
        let head = header_block(built.as_bytes());
        let names: Vec<&str> = head
            .lines()
            .filter(|line| !line.starts_with(' '))
            .filter_map(|line| line.split_once(':').map(|(name, _)| name))
            .collect();

        assert_eq!(
            names,
            ["MIME-Version", "Date", "From", "To", "Subject", "Reply-To", "Content-Type"]
        );
        assert!(head.contains("MIME-Version: 1.0\r\n"));
        assert!(head.contains("From: =?UTF-8?B?RXhhbXBsZSBTdMO4cmU=?= <noreply@example.com>\r\n"));
        assert!(head.contains("To: a@x.com, b@x.com\r\n"));
        assert!(head.contains("Subject: =?UTF-8?B?SGVsbG8=?=\r\n"));
        assert!(head.contains("Reply-To: support@example.com\r\n"));
        assert!(head.contains("Content-Type: multipart/mixed; boundary=\"=_mp_"));
    }

    #[test]
    fn test_reply_to_omitted_when_unset() {
        let sender = Sender {
            address: "noreply@example.com".to_string(),
            display_name: String::new(),
            reply_to: None,
        };
        let email = OutgoingEmail::new("Hello").to("a@x.com").text_body("Hi");
        let built = MessageBuilder::new(sender, "storage").build(&email).unwrap();
        let head = header_block(built.as_bytes());

        assert!(!head.contains("Reply-To"));
        assert!(head.contains("From: noreply@example.com\r\n"));
    }

    #[test]
    fn test_crlf_line_endings_throughout() {
        let email = OutgoingEmail::new("Hello")
            .to("a@x.com")
            .text_body("line one\nline two")
            .html_body("<p>one</p>\n<p>two</p>");
        let built = builder(MemorySource::default()).build(&email).unwrap();
        let raw = built.as_bytes();

        for (index, byte) in raw.iter().enumerate() {
            if *byte == b'\n' {
                assert_eq!(raw[index - 1], b'\r', "bare LF at offset {index}");
            }
        }
        assert!(raw.ends_with(b"--\r\n"));
    }

    #[test]
    fn test_non_ascii_body_uses_quoted_printable() {
        let email = OutgoingEmail::new("Hello").to("a@x.com").text_body("Grüße");
        let built = builder(MemorySource::default()).build(&email).unwrap();
        let message = Message::parse(built.as_bytes()).unwrap();

        assert!(built.as_bytes().is_ascii());
        assert_eq!(
            message.parts[0].transfer_encoding(),
            TransferEncoding::QuotedPrintable
        );
        assert_eq!(message.text_part().unwrap(), "Grüße");
    }

    #[test]
    fn test_lone_carriage_return_survives() {
        for body in ["\r", "Hello\r"] {
            let email = OutgoingEmail::new("Hello").to("a@x.com").text_body(body);
            let built = builder(MemorySource::default()).build(&email).unwrap();
            let message = Message::parse(built.as_bytes()).unwrap();

            assert_eq!(message.parts[0].transfer_encoding(), TransferEncoding::QuotedPrintable);
            assert_eq!(message.text_part().unwrap(), body);
        }
    }

    #[test]
    fn test_empty_body_fails() {
        let source = MemorySource::with_file("storage/a.txt", b"data");
        let email = OutgoingEmail::new("Hello")
            .to("a@x.com")
            .text_body("")
            .html_body("")
            .attach("elsewhere/a.txt");
        let builder = builder(source);

        assert!(matches!(builder.build(&email), Err(Error::EmptyBody)));
        assert_eq!(builder.source.reads.get(), 0);
    }

    #[test]
    fn test_invalid_attachment_path_fails_before_read() {
        let source = MemorySource::with_file("other/a.txt", b"data");
        let builder = builder(source);

        for path in ["other/a.txt", "storage", "storagex/a.txt", "storage/../etc/passwd"] {
            let email = OutgoingEmail::new("Hello").text_body("Hi").attach(path);
            let err = builder.build(&email).unwrap_err();
            assert!(
                matches!(err, Error::InvalidAttachmentPath { ref prefix, .. } if prefix == "storage/"),
                "{path}: {err}"
            );
        }
        assert_eq!(builder.source.reads.get(), 0);
    }

    #[test]
    fn test_unreadable_attachment() {
        let email = OutgoingEmail::new("Hello")
            .text_body("Hi")
            .attach("storage/missing.pdf");
        let err = builder(MemorySource::default()).build(&email).unwrap_err();

        match err {
            Error::AttachmentRead { path, source } => {
                assert_eq!(path, "storage/missing.pdf");
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_attachment_part() {
        let data: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
        let source = MemorySource::with_file("storage/reports/q3.pdf", &data);
        let email = OutgoingEmail::new("Report")
            .to("a@x.com")
            .text_body("See attached")
            .attach("storage/reports/q3.pdf");
        let built = builder(source).build(&email).unwrap();
        let message = Message::parse(built.as_bytes()).unwrap();

        assert_eq!(message.parts.len(), 2);
        let attachment = &message.parts[1];
        assert_eq!(attachment.headers.get("Content-Type"), Some("application/pdf"));
        assert_eq!(
            attachment.headers.get("Content-Disposition"),
            Some("attachment; filename=\"q3.pdf\"")
        );
        assert_eq!(attachment.transfer_encoding(), TransferEncoding::Base64);
        assert!(attachment.body.split(|b| *b == b'\n').all(|line| line.len() <= 77));
        assert_eq!(attachment.decode_body().unwrap(), data);
    }

    #[test]
    fn test_unknown_extension_defaults_to_octet_stream() {
        let source = MemorySource::with_file("storage/blob.zzqx", b"\x00\x01");
        let email = OutgoingEmail::new("Blob").text_body("Hi").attach("storage/blob.zzqx");
        let built = builder(source).build(&email).unwrap();
        let message = Message::parse(built.as_bytes()).unwrap();

        assert_eq!(
            message.attachments().unwrap()[0].headers.get("Content-Type"),
            Some("application/octet-stream")
        );
    }

    #[test]
    fn test_non_ascii_filename() {
        let source = MemorySource::with_file("storage/résumé.txt", b"cv");
        let email = OutgoingEmail::new("CV").text_body("Hi").attach("storage/résumé.txt");
        let built = builder(source).build(&email).unwrap();
        let message = Message::parse(built.as_bytes()).unwrap();
        let attachment = &message.attachments().unwrap()[0];

        assert_eq!(
            attachment.headers.get("Content-Disposition"),
            Some("attachment; filename*=UTF-8''r%C3%A9sum%C3%A9.txt")
        );
        assert_eq!(attachment.filename().as_deref(), Some("résumé.txt"));
    }

    #[test]
    fn test_subject_round_trip() {
        let subject = "Ärger über Öl – 日本語の件名 🚀";
        let email = OutgoingEmail::new(subject).to("a@x.com").text_body("Hi");
        let built = builder(MemorySource::default()).build(&email).unwrap();
        let message = Message::parse(built.as_bytes()).unwrap();

        assert_eq!(message.decoded_subject().unwrap().as_deref(), Some(subject));
    }

    #[test]
    fn test_fresh_boundaries_per_message() {
        let email = OutgoingEmail::new("Hello").text_body("Hi").html_body("<p>Hi</p>");
        let builder = builder(MemorySource::default());
        let first = Message::parse(builder.build(&email).unwrap().as_bytes()).unwrap();
        let second = Message::parse(builder.build(&email).unwrap().as_bytes()).unwrap();

        assert_ne!(
            first.content_type().unwrap().boundary(),
            second.content_type().unwrap().boundary()
        );
    }

    #[test]
    fn test_long_recipient_list_is_folded() {
        let mut email = OutgoingEmail::new("Hello").text_body("Hi");
        for index in 0..60 {
            email = email.to(format!("recipient-number-{index:03}@example.com"));
        }
        let raw = builder(MemorySource::default()).build(&email).unwrap();
        let text = String::from_utf8(raw.into_bytes()).unwrap();

        let longest = text.split("\r\n").map(str::len).max().unwrap();
        assert!(longest <= MAX_LINE_OCTETS, "longest line = {longest}");
        let head = header_block(text.as_bytes());
        let to_lines: Vec<&str> = head
            .split("\r\n")
            .skip_while(|line| !line.starts_with("To: "))
            .take_while(|line| line.starts_with("To: ") || line.starts_with(' '))
            .collect();
        assert!(to_lines.len() > 1);
        for line in to_lines {
            assert!(line.len() <= FOLD_COLUMN, "{line:?}");
        }

        let message = Message::parse(text.as_bytes()).unwrap();
        assert_eq!(message.to(), Some(email.to.join(", ").as_str()));
    }

    #[test]
    fn test_address_list_folding() {
        let short = vec!["a@x.com".to_string(), "b@x.com".to_string()];
        assert_eq!(address_list("To", &short), "a@x.com, b@x.com");

        let long: Vec<String> = (0..3).map(|i| format!("{}{i}@example.com", "x".repeat(30))).collect();
        let folded = address_list("To", &long);
        assert_eq!(folded.matches(",\r\n ").count(), 2);
    }

    #[test]
    fn test_oversized_address_is_rejected() {
        let address = format!("{}@example.com", "x".repeat(MAX_LINE_OCTETS));
        let email = OutgoingEmail::new("Hello").text_body("Hi").to(address);

        let err = builder(MemorySource::default()).build(&email).unwrap_err();
        assert!(matches!(err, Error::InvalidHeader(_)), "{err}");
    }

    #[test]
    fn test_header_injection_is_rejected() {
        let source = MemorySource::with_file("storage/a.txt", b"data");
        let builder = builder(source);
        let email = OutgoingEmail::new("s")
            .text_body("x")
            .to("a@x.com\r\nBcc: spy@evil.com")
            .attach("storage/a.txt");

        let err = builder.build(&email).unwrap_err();
        assert!(matches!(err, Error::InvalidHeader(_)), "{err}");
        assert_eq!(builder.source.reads.get(), 0);
    }

    #[test]
    fn test_reply_to_injection_is_rejected() {
        let sender = Sender {
            reply_to: Some("support@x.com\nX-Evil: 1".to_string()),
            ..sender()
        };
        let email = OutgoingEmail::new("s").text_body("x").to("a@x.com");

        let err = MessageBuilder::new(sender, "storage").build(&email).unwrap_err();
        assert!(matches!(err, Error::InvalidHeader(_)), "{err}");
    }

    #[test]
    fn test_percent_encode() {
        assert_eq!(percent_encode("a b.txt"), "a%20b.txt");
        assert_eq!(percent_encode("ü"), "%C3%BC");
    }
}
