//! MIME encoding and decoding utilities.
//!
//! Supports Base64, Quoted-Printable, and RFC 2047 header encoding.

use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::fmt::Write as _;

/// Maximum encoded line length for Base64 and Quoted-Printable bodies (RFC 2045).
const MAX_LINE_LENGTH: usize = 76;

/// Raw bytes carried by a single RFC 2047 encoded word.
///
/// 39 bytes become 52 Base64 characters, so a word is 64 characters long and
/// `Subject: ` plus the first word stays under 78 columns.
const ENCODED_WORD_BYTES: usize = 39;

/// Encodes data as Base64.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Encodes data as Base64, wrapped at 76 characters with CRLF line breaks.
#[must_use]
pub fn encode_base64_lines(data: &[u8]) -> String {
    let encoded = STANDARD.encode(data);
    let mut result = String::with_capacity(encoded.len() + encoded.len() / MAX_LINE_LENGTH * 2);

    for (index, ch) in encoded.chars().enumerate() {
        if index > 0 && index % MAX_LINE_LENGTH == 0 {
            result.push_str("\r\n");
        }
        result.push(ch);
    }

    result
}

/// Decodes Base64 data.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &str) -> Result<Vec<u8>> {
    STANDARD.decode(data).map_err(Into::into)
}

/// Encodes text using Quoted-Printable encoding (RFC 2045).
///
/// Line breaks (`\n` or `\r\n`) become CRLF hard breaks and a lone CR is
/// escaped as `=0D`. Long lines get soft breaks so that no encoded line
/// exceeds 76 characters. Whitespace at the end of a line is encoded so
/// transports cannot strip it.
#[must_use]
pub fn encode_quoted_printable(text: &str) -> String {
    let mut result = String::with_capacity(text.len());

    let lines: Vec<&str> = text.split('\n').collect();
    let last = lines.len() - 1;

    for (index, line) in lines.into_iter().enumerate() {
        if index > 0 {
            result.push_str("\r\n");
        }
        // Only a CR paired with the following LF is a line ending
        let line = if index < last {
            line.strip_suffix('\r').unwrap_or(line)
        } else {
            line
        };
        encode_quoted_printable_line(line.as_bytes(), &mut result);
    }

    result
}

fn encode_quoted_printable_line(line: &[u8], out: &mut String) {
    let mut column = 0;

    for (index, &byte) in line.iter().enumerate() {
        let last = index + 1 == line.len();
        let literal = matches!(byte, b'!'..=b'<' | b'>'..=b'~')
            || (matches!(byte, b' ' | b'\t') && !last);
        let width = if literal { 1 } else { 3 };

        // Leave room for the soft break `=` unless nothing follows on this line
        let limit = if last {
            MAX_LINE_LENGTH
        } else {
            MAX_LINE_LENGTH - 1
        };
        if column + width > limit {
            out.push_str("=\r\n");
            column = 0;
        }

        if literal {
            out.push(char::from(byte));
        } else {
            let _ = write!(out, "={byte:02X}");
        }
        column += width;
    }
}

/// Decodes Quoted-Printable text (RFC 2045) into raw bytes.
///
/// # Errors
///
/// Returns an error if the input contains invalid escape sequences.
pub fn decode_quoted_printable(text: &str) -> Result<Vec<u8>> {
    let bytes = text.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    let mut index = 0;

    while index < bytes.len() {
        let byte = bytes[index];
        if byte != b'=' {
            result.push(byte);
            index += 1;
            continue;
        }

        // Soft line break
        if bytes.get(index + 1..index + 3) == Some(b"\r\n".as_slice()) {
            index += 3;
            continue;
        }
        if bytes.get(index + 1) == Some(&b'\n') {
            index += 2;
            continue;
        }

        let (Some(&high), Some(&low)) = (bytes.get(index + 1), bytes.get(index + 2)) else {
            return Err(Error::InvalidEncoding(
                "Incomplete escape sequence".to_string(),
            ));
        };
        match (hex_value(high), hex_value(low)) {
            (Some(high), Some(low)) => result.push((high << 4) | low),
            _ => {
                return Err(Error::InvalidEncoding(format!(
                    "Invalid hex escape: ={}{}",
                    char::from(high),
                    char::from(low)
                )));
            }
        }
        index += 3;
    }

    Ok(result)
}

fn hex_value(byte: u8) -> Option<u8> {
    char::from(byte)
        .to_digit(16)
        .and_then(|digit| u8::try_from(digit).ok())
}

/// Encodes a header value as RFC 2047 encoded words.
///
/// Format: `=?UTF-8?B?encoded-text?=`
///
/// The value is always encoded, so arbitrary UTF-8 survives ASCII-only
/// transports. Long values are split on character boundaries into several
/// words folded with `CRLF SP`. An empty value encodes to an empty string.
#[must_use]
pub fn encode_rfc2047(text: &str) -> String {
    let mut words = Vec::new();
    let mut start = 0;

    for (index, ch) in text.char_indices() {
        if index + ch.len_utf8() - start > ENCODED_WORD_BYTES {
            words.push(encode_word(&text[start..index]));
            start = index;
        }
    }
    if start < text.len() {
        words.push(encode_word(&text[start..]));
    }

    words.join("\r\n ")
}

fn encode_word(chunk: &str) -> String {
    format!("=?UTF-8?B?{}?=", encode_base64(chunk.as_bytes()))
}

/// Decodes an RFC 2047 encoded header value.
///
/// Plain text is passed through. Both `B` and `Q` encoded words are
/// understood, and whitespace between adjacent encoded words is dropped.
///
/// # Errors
///
/// Returns an error if an encoded word has an unknown encoding or charset,
/// or its payload is malformed.
pub fn decode_rfc2047(text: &str) -> Result<String> {
    let mut result = String::with_capacity(text.len());
    let mut pending: Vec<u8> = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find("=?") {
        let (before, candidate) = rest.split_at(start);

        if let Some((bytes, consumed)) = parse_encoded_word(candidate)? {
            let only_whitespace = before.chars().all(char::is_whitespace);
            if !(only_whitespace && !pending.is_empty()) {
                flush_pending(&mut pending, &mut result)?;
                result.push_str(before);
            }
            pending.extend_from_slice(&bytes);
            rest = &candidate[consumed..];
        } else {
            flush_pending(&mut pending, &mut result)?;
            result.push_str(before);
            result.push_str("=?");
            rest = &candidate[2..];
        }
    }

    flush_pending(&mut pending, &mut result)?;
    result.push_str(rest);
    Ok(result)
}

fn flush_pending(pending: &mut Vec<u8>, out: &mut String) -> Result<()> {
    if !pending.is_empty() {
        out.push_str(&String::from_utf8(std::mem::take(pending))?);
    }
    Ok(())
}

/// Parses one encoded word at the start of `candidate`.
///
/// Returns the decoded bytes and the number of input bytes consumed, or
/// `None` when the text only looks like the start of an encoded word.
fn parse_encoded_word(candidate: &str) -> Result<Option<(Vec<u8>, usize)>> {
    let inner = &candidate[2..];
    let Some(charset_end) = inner.find('?') else {
        return Ok(None);
    };
    let after_charset = &inner[charset_end + 1..];
    let Some(encoding_end) = after_charset.find('?') else {
        return Ok(None);
    };
    let payload_area = &after_charset[encoding_end + 1..];
    let Some(payload_end) = payload_area.find("?=") else {
        return Ok(None);
    };

    let charset = &inner[..charset_end];
    let encoding = &after_charset[..encoding_end];
    let payload = &payload_area[..payload_end];
    if charset.is_empty()
        || [charset, encoding, payload]
            .iter()
            .any(|part| part.contains(char::is_whitespace))
    {
        return Ok(None);
    }

    // RFC 2231 allows a language suffix: `UTF-8*en`
    let charset = charset.split('*').next().unwrap_or(charset);
    if !charset.eq_ignore_ascii_case("utf-8") && !charset.eq_ignore_ascii_case("us-ascii") {
        return Err(Error::InvalidEncoding(format!(
            "Unsupported charset: {charset}"
        )));
    }

    let bytes = match encoding {
        "B" | "b" => decode_base64(payload)?,
        // Quoted-Printable with underscore for space
        "Q" | "q" => decode_quoted_printable(&payload.replace('_', " "))?,
        _ => {
            return Err(Error::InvalidEncoding(format!(
                "Unknown encoding: {encoding}"
            )));
        }
    };

    let consumed = 2 + charset_end + 1 + encoding_end + 1 + payload_end + 2;
    Ok(Some((bytes, consumed)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_base64_encode_decode() {
        let data = b"Hello, World!";
        let encoded = encode_base64(data);
        assert_eq!(encoded, "SGVsbG8sIFdvcmxkIQ==");

        let decoded = decode_base64(&encoded).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_base64_lines_wrap_at_76() {
        let data = vec![0xABu8; 200];
        let encoded = encode_base64_lines(&data);
        let lines: Vec<&str> = encoded.split("\r\n").collect();

        assert_eq!(lines.len(), 4);
        assert!(lines[..3].iter().all(|line| line.len() == 76));
        assert_eq!(lines.concat(), encode_base64(&data));
    }

    #[test]
    fn test_base64_lines_short_input() {
        assert_eq!(encode_base64_lines(b"abc"), "YWJj");
        assert_eq!(encode_base64_lines(b""), "");
    }

    #[test]
    fn test_quoted_printable_encode() {
        let text = "Hello, World!";
        let encoded = encode_quoted_printable(text);
        assert_eq!(encoded, "Hello, World!");

        let text = "Héllo, Wørld!";
        let encoded = encode_quoted_printable(text);
        assert_eq!(encoded, "H=C3=A9llo, W=C3=B8rld!");
    }

    #[test]
    fn test_quoted_printable_keeps_line_breaks() {
        let encoded = encode_quoted_printable("one\ntwo\r\nthree");
        assert_eq!(encoded, "one\r\ntwo\r\nthree");
    }

    #[test]
    fn test_quoted_printable_keeps_lone_cr() {
        assert_eq!(encode_quoted_printable("\r"), "=0D");
        assert_eq!(encode_quoted_printable("Hello\r"), "Hello=0D");
        assert_eq!(encode_quoted_printable("a\rb\r\r\nc"), "a=0Db=0D\r\nc");

        let decoded = decode_quoted_printable(&encode_quoted_printable("Hello\r")).unwrap();
        assert_eq!(decoded, b"Hello\r");
    }

    #[test]
    fn test_quoted_printable_trailing_whitespace() {
        let encoded = encode_quoted_printable("tail \nnext\t");
        assert_eq!(encoded, "tail=20\r\nnext=09");
    }

    #[test]
    fn test_quoted_printable_soft_breaks() {
        let text = "é".repeat(60);
        let encoded = encode_quoted_printable(&text);

        assert!(encoded.lines().all(|line| line.len() <= 76));
        assert!(encoded.contains("=\r\n"));
        assert_eq!(decode_quoted_printable(&encoded).unwrap(), text.as_bytes());
    }

    #[test]
    fn test_quoted_printable_decode() {
        let decoded = decode_quoted_printable("Hello, World!").unwrap();
        assert_eq!(decoded, b"Hello, World!");

        let decoded = decode_quoted_printable("H=C3=A9llo").unwrap();
        assert_eq!(String::from_utf8(decoded).unwrap(), "Héllo");
    }

    #[test]
    fn test_quoted_printable_soft_line_break() {
        assert_eq!(decode_quoted_printable("Hello=\r\nWorld").unwrap(), b"HelloWorld");
        assert_eq!(decode_quoted_printable("Hello=\nWorld").unwrap(), b"HelloWorld");
    }

    #[test]
    fn test_quoted_printable_invalid_escape() {
        assert!(decode_quoted_printable("bad=ZZ").is_err());
        assert!(decode_quoted_printable("short=4").is_err());
    }

    #[test]
    fn test_rfc2047_encode() {
        assert_eq!(encode_rfc2047("Hello"), "=?UTF-8?B?SGVsbG8=?=");
        assert_eq!(encode_rfc2047("Héllo"), "=?UTF-8?B?SMOpbGxv?=");
        assert_eq!(encode_rfc2047(""), "");
    }

    #[test]
    fn test_rfc2047_encode_long_value_folds() {
        let subject = "Quarterly report – ünïcödé edition ".repeat(4);
        let encoded = encode_rfc2047(&subject);

        let words: Vec<&str> = encoded.split("\r\n ").collect();
        assert!(words.len() > 1);
        for word in &words {
            assert!(word.starts_with("=?UTF-8?B?"));
            assert!(word.ends_with("?="));
            assert!(word.len() <= 75);
        }
        assert_eq!(decode_rfc2047(&encoded).unwrap(), subject);
    }

    #[test]
    fn test_rfc2047_decode() {
        assert_eq!(decode_rfc2047("Hello").unwrap(), "Hello");
        assert_eq!(decode_rfc2047("=?utf-8?B?SMOpbGxv?=").unwrap(), "Héllo");
    }

    #[test]
    fn test_rfc2047_quoted_printable() {
        assert_eq!(decode_rfc2047("=?utf-8?Q?H=C3=A9llo_there?=").unwrap(), "Héllo there");
    }

    #[test]
    fn test_rfc2047_mixed_text() {
        let decoded = decode_rfc2047("Re: =?UTF-8?B?SMOpbGxv?= =?UTF-8?B?IHdvcmxk?= !").unwrap();
        assert_eq!(decoded, "Re: Héllo world !");
    }

    #[test]
    fn test_rfc2047_not_an_encoded_word() {
        assert_eq!(decode_rfc2047("1 =? 2").unwrap(), "1 =? 2");
    }

    #[test]
    fn test_rfc2047_unknown_encoding() {
        assert!(decode_rfc2047("=?UTF-8?X?abc?=").is_err());
        assert!(decode_rfc2047("=?KOI8-R?B?abc=?=").is_err());
    }

    proptest! {
        #[test]
        fn prop_rfc2047_round_trip(text in any::<String>()) {
            let encoded = encode_rfc2047(&text);
            prop_assert!(encoded.is_ascii());
            prop_assert_eq!(decode_rfc2047(&encoded).unwrap(), text);
        }

        #[test]
        fn prop_quoted_printable_round_trip(text in "[^\r\n]{0,300}") {
            let encoded = encode_quoted_printable(&text);
            prop_assert!(encoded.lines().all(|line| line.len() <= 76));
            prop_assert_eq!(decode_quoted_printable(&encoded).unwrap(), text.into_bytes());
        }
    }
}
