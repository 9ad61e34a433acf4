//! Subcommand implementations.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result, bail};
use mimepost_core::{
    Dispatcher, OutgoingEmail, SenderConfig, SmtpTransport, load_config, load_default_config,
};
use mimepost_mime::{Message, MessageBuilder, Part};
use tracing::info;

use crate::MessageArgs;

/// Builds the message described by `args` and sends it.
pub async fn send(args: &MessageArgs) -> Result<()> {
    let config = config(args.config.as_deref())?;
    let email = outgoing_email(args)?;
    if email.to.is_empty() {
        bail!("at least one --to recipient is required");
    }

    let dispatcher = Dispatcher::new(config, SmtpTransport::new())?;
    dispatcher
        .send(&email)
        .await
        .with_context(|| format!("failed to send {:?}", email.subject))?;

    info!(to = ?email.to, "done");
    Ok(())
}

/// Builds the message described by `args` and writes it to stdout.
pub fn preview(args: &MessageArgs, summary: bool) -> Result<()> {
    let config = config(args.config.as_deref())?;
    let email = outgoing_email(args)?;

    let builder = MessageBuilder::new(config.sender(), config.attachment_root.clone());
    let built = builder.build(&email)?;

    let mut stdout = std::io::stdout().lock();
    if summary {
        let message = Message::parse(built.as_bytes())?;
        write_summary(&mut stdout, &message)?;
    } else {
        stdout.write_all(built.as_bytes())?;
    }
    stdout.flush()?;
    Ok(())
}

fn config(path: Option<&Path>) -> Result<SenderConfig> {
    let config = match path {
        Some(path) => load_config(path),
        None => load_default_config(),
    };
    config.context("failed to load sender configuration")
}

fn outgoing_email(args: &MessageArgs) -> Result<OutgoingEmail> {
    let text = match (&args.text, &args.text_file) {
        (Some(text), _) => Some(text.clone()),
        (None, Some(path)) => Some(read_body(path)?),
        (None, None) => None,
    };
    let html = args.html_file.as_deref().map(read_body).transpose()?;

    Ok(OutgoingEmail {
        subject: args.subject.clone(),
        text_body: text,
        html_body: html,
        attachment: args.attach.clone(),
        to: args.to.clone(),
    })
}

fn read_body(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn write_summary(out: &mut impl Write, message: &Message) -> Result<()> {
    writeln!(out, "From:    {}", message.from().unwrap_or_default())?;
    writeln!(out, "To:      {}", message.to().unwrap_or_default())?;
    writeln!(
        out,
        "Subject: {}",
        message.decoded_subject()?.unwrap_or_default()
    )?;
    writeln!(out, "Type:    {}", message.content_type()?.essence())?;

    for part in &message.parts {
        write_part(out, part, 1)?;
    }
    Ok(())
}

fn write_part(out: &mut impl Write, part: &Part, depth: usize) -> Result<()> {
    let content_type = part.content_type()?;
    let indent = "  ".repeat(depth);

    if content_type.is_multipart() {
        writeln!(out, "{indent}{}", content_type.essence())?;
        for sub in part.subparts()? {
            write_part(out, &sub, depth + 1)?;
        }
        return Ok(());
    }

    let size = part.decode_body()?.len();
    match part.filename() {
        Some(name) => writeln!(
            out,
            "{indent}{} ({}, {size} bytes, attachment {name:?})",
            content_type.essence(),
            part.transfer_encoding()
        )?,
        None => writeln!(
            out,
            "{indent}{} ({}, {size} bytes)",
            content_type.essence(),
            part.transfer_encoding()
        )?,
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use mimepost_mime::Sender;

    fn args() -> MessageArgs {
        MessageArgs {
            to: vec!["alice@example.com".to_string()],
            subject: "Hello".to_string(),
            text: Some("hi".to_string()),
            text_file: None,
            html_file: None,
            attach: None,
            config: None,
        }
    }

    #[test]
    fn test_outgoing_email_from_args() {
        let email = outgoing_email(&args()).unwrap();
        assert_eq!(email.subject, "Hello");
        assert_eq!(email.text_body.as_deref(), Some("hi"));
        assert_eq!(email.html_body, None);
        assert_eq!(email.to, vec!["alice@example.com"]);
    }

    #[test]
    fn test_missing_body_file_is_reported() {
        let mut args = args();
        args.text = None;
        args.html_file = Some("/nonexistent/mimepost/body.html".into());
        let err = outgoing_email(&args).unwrap_err();
        assert!(err.to_string().contains("body.html"));
    }

    #[test]
    fn test_summary_lists_parts() {
        let sender = Sender {
            address: "noreply@example.com".to_string(),
            ..Sender::default()
        };
        let email = OutgoingEmail::new("Hello")
            .to("alice@example.com")
            .text_body("hi")
            .html_body("<p>hi</p>");
        let built = MessageBuilder::new(sender, "storage").build(&email).unwrap();
        let message = Message::parse(built.as_bytes()).unwrap();

        let mut out = Vec::new();
        write_summary(&mut out, &message).unwrap();
        let summary = String::from_utf8(out).unwrap();

        assert!(summary.contains("Subject: Hello"));
        assert!(summary.contains("Type:    multipart/mixed"));
        assert!(summary.contains("  multipart/alternative"));
        assert!(summary.contains("    text/plain (7bit, 2 bytes)"));
        assert!(summary.contains("    text/html (7bit, 9 bytes)"));
    }
}
