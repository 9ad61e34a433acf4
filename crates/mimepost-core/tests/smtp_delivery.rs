//! End-to-end delivery through the SMTP transport.
//!
//! A scripted SMTP server on a loopback socket records the envelope and the
//! DATA payload so the whole dispatch path can be checked without a real
//! mail server.

#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use mimepost_core::{
    AttachmentSource, Dispatcher, ErrorKind, OutgoingEmail, Security, SenderConfig, SmtpTransport,
};
use mimepost_mime::Message;

/// What the scripted server saw during one session.
#[derive(Debug, Default)]
struct Session {
    auth: Option<String>,
    mail_from: Option<String>,
    recipients: Vec<String>,
    data: Vec<u8>,
}

/// Accepts one connection and answers every RCPT with `rcpt_reply`.
async fn scripted_server(rcpt_reply: &'static str) -> (u16, JoinHandle<Session>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read, mut write) = stream.into_split();
        let mut reader = BufReader::new(read);
        let mut session = Session::default();

        write.write_all(b"220 mock ESMTP ready\r\n").await.unwrap();

        let mut line = String::new();
        loop {
            line.clear();
            if reader.read_line(&mut line).await.unwrap_or(0) == 0 {
                break;
            }
            let command = line.trim_end();
            let upper = command.to_ascii_uppercase();

            let reply: &str = if upper.starts_with("EHLO") {
                "250-mock\r\n250 AUTH PLAIN\r\n"
            } else if upper.starts_with("HELO") || upper == "RSET" || upper == "NOOP" {
                "250 OK\r\n"
            } else if upper.starts_with("AUTH PLAIN") {
                session.auth = command.get("AUTH PLAIN ".len()..).map(ToString::to_string);
                "235 2.7.0 Authentication successful\r\n"
            } else if upper.starts_with("MAIL FROM:") {
                session.mail_from = angle_address(command);
                "250 OK\r\n"
            } else if upper.starts_with("RCPT TO:") {
                session.recipients.extend(angle_address(command));
                rcpt_reply
            } else if upper == "DATA" {
                write.write_all(b"354 End data with <CR><LF>.<CR><LF>\r\n").await.unwrap();
                session.data = read_data(&mut reader).await;
                "250 2.0.0 Queued\r\n"
            } else if upper == "QUIT" {
                write.write_all(b"221 Bye\r\n").await.unwrap();
                break;
            } else {
                "502 Command not implemented\r\n"
            };
            write.write_all(reply.as_bytes()).await.unwrap();
        }

        session
    });

    (port, handle)
}

fn angle_address(command: &str) -> Option<String> {
    let start = command.find('<')? + 1;
    let end = command[start..].find('>')? + start;
    Some(command[start..end].to_string())
}

/// Reads a DATA payload up to the lone dot, undoing dot-stuffing.
async fn read_data<R: AsyncBufReadExt + Unpin>(reader: &mut R) -> Vec<u8> {
    let mut data = Vec::new();
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line).await.unwrap_or(0) == 0 || line == ".\r\n" {
            break;
        }
        let unstuffed = line.strip_prefix('.').unwrap_or(&line);
        data.extend_from_slice(unstuffed.as_bytes());
    }
    data
}

struct MemorySource(HashMap<PathBuf, Vec<u8>>);

impl AttachmentSource for MemorySource {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.0
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
    }
}

fn config(port: u16) -> SenderConfig {
    SenderConfig::new("noreply@example.com", "127.0.0.1")
        .with_security(Security::None)
        .with_port(port)
        .with_credential("s3cret")
        .with_display_name("Reports")
        .with_attachment_root("storage")
        .with_bcc("audit@example.com")
}

fn transport() -> SmtpTransport {
    SmtpTransport::new().with_timeout(Some(Duration::from_secs(10)))
}

#[tokio::test]
async fn delivers_message_with_bcc_in_envelope_only() {
    let (port, server) = scripted_server("250 OK\r\n").await;
    let source = MemorySource(HashMap::from([(
        PathBuf::from("storage/report.pdf"),
        b"%PDF-1.4 fake report".to_vec(),
    )]));
    let dispatcher = Dispatcher::new(config(port), transport())
        .unwrap()
        .with_attachment_source(source);

    let email = OutgoingEmail::new("Quarterly numbers")
        .to("alice@example.com")
        .to("bob@example.com")
        .text_body("Numbers attached.")
        .html_body("<p>Numbers attached.</p>")
        .attach("storage/report.pdf");
    dispatcher.send(&email).await.unwrap();

    let session = server.await.unwrap();
    assert_eq!(session.mail_from.as_deref(), Some("noreply@example.com"));
    assert_eq!(
        session.recipients,
        vec!["alice@example.com", "bob@example.com", "audit@example.com"]
    );

    let expected_auth = STANDARD.encode("\0noreply@example.com\0s3cret");
    assert_eq!(session.auth.as_deref(), Some(expected_auth.as_str()));

    let message = Message::parse(&session.data).unwrap();
    assert_eq!(message.to(), Some("alice@example.com, bob@example.com"));
    assert_eq!(
        message.decoded_subject().unwrap().as_deref(),
        Some("Quarterly numbers")
    );
    assert!(
        message
            .headers
            .iter()
            .all(|(name, value)| !name.eq_ignore_ascii_case("bcc")
                && !value.contains("audit@example.com"))
    );
    assert_eq!(message.text_part().unwrap().trim_end(), "Numbers attached.");

    let attachments = message.attachments().unwrap();
    assert_eq!(attachments.len(), 1);
    assert_eq!(attachments[0].filename().as_deref(), Some("report.pdf"));
    assert_eq!(attachments[0].decode_body().unwrap(), b"%PDF-1.4 fake report");
}

#[tokio::test]
async fn rejected_recipient_is_permanent() {
    let (port, server) = scripted_server("550 5.1.1 No such user\r\n").await;
    let dispatcher = Dispatcher::new(config(port), transport()).unwrap();

    let email = OutgoingEmail::new("Hi").to("ghost@example.com").text_body("hello");
    let err = dispatcher.send(&email).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Transport);
    assert!(!err.is_retryable());
    server.abort();
}

#[tokio::test]
async fn deferred_recipient_is_retryable() {
    let (port, server) = scripted_server("451 4.3.0 Try again later\r\n").await;
    let dispatcher = Dispatcher::new(config(port), transport()).unwrap();

    let email = OutgoingEmail::new("Hi").to("alice@example.com").text_body("hello");
    let err = dispatcher.send(&email).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Transport);
    assert!(err.is_retryable());
    server.abort();
}

#[tokio::test]
async fn build_failure_never_connects() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let dispatcher = Dispatcher::new(config(port), transport()).unwrap();

    let email = OutgoingEmail::new("Empty").to("alice@example.com");
    let err = dispatcher.send(&email).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EmptyBody);

    let accepted = tokio::time::timeout(Duration::from_millis(200), listener.accept()).await;
    assert!(accepted.is_err(), "dispatcher connected despite build failure");
}
