//! Structural properties of built messages.
//!
//! Every message is parsed back with the crate's own parser and checked for
//! part layout, header encoding and attachment integrity.

#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use proptest::prelude::*;

use mimepost_mime::{
    AttachmentSource, Error, Message, MessageBuilder, OutgoingEmail, Sender, TransferEncoding,
};

/// Attachment source backed by a map.
struct MemorySource(HashMap<PathBuf, Vec<u8>>);

impl AttachmentSource for MemorySource {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.0
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
    }
}

fn sender() -> Sender {
    Sender {
        address: "noreply@example.com".to_string(),
        display_name: "Ops Team".to_string(),
        reply_to: Some("ops@example.com".to_string()),
    }
}

fn builder_with(files: &[(&str, &[u8])]) -> MessageBuilder<MemorySource> {
    let files = files
        .iter()
        .map(|(path, data)| (PathBuf::from(path), data.to_vec()))
        .collect();
    MessageBuilder::new(sender(), "storage").with_source(MemorySource(files))
}

fn body_text() -> impl Strategy<Value = String> {
    "[^\u{0}]{1,400}"
}

#[test]
fn concrete_plain_scenario() {
    let email = OutgoingEmail::new("Hello").to("a@x.com").text_body("Hi there");
    let built = builder_with(&[]).build(&email).unwrap();
    let raw = String::from_utf8(built.as_bytes().to_vec()).unwrap();
    let message = Message::parse(built.as_bytes()).unwrap();

    assert!(raw.contains("\r\nTo: a@x.com\r\n"));
    assert_eq!(message.leaf_parts().unwrap().len(), 1);
    assert_eq!(
        message.parts[0].headers.get("content-type"),
        Some("text/plain; charset=UTF-8")
    );
    assert_eq!(message.text_part().unwrap(), "Hi there");
}

#[test]
fn reads_attachments_from_disk() {
    let root = std::env::temp_dir().join(format!("mimepost-mime-{}", std::process::id()));
    std::fs::create_dir_all(&root).unwrap();
    let file = root.join("notes.txt");
    std::fs::write(&file, b"on-disk attachment").unwrap();

    let builder = MessageBuilder::new(sender(), root.to_string_lossy());
    let email = OutgoingEmail::new("Notes")
        .to("a@x.com")
        .text_body("attached")
        .attach(file.to_string_lossy());
    let built = builder.build(&email);
    std::fs::remove_dir_all(&root).unwrap();

    let message = Message::parse(built.unwrap().as_bytes()).unwrap();
    let attachments = message.attachments().unwrap();
    assert_eq!(attachments.len(), 1);
    assert_eq!(attachments[0].filename().as_deref(), Some("notes.txt"));
    assert_eq!(attachments[0].decode_body().unwrap(), b"on-disk attachment");
}

#[test]
fn missing_file_on_disk_is_a_read_error() {
    let root = std::env::temp_dir();
    let root = root.to_string_lossy();
    let builder = MessageBuilder::new(sender(), root.clone());
    let email = OutgoingEmail::new("Nope")
        .text_body("attached")
        .attach(format!("{root}/mimepost-does-not-exist.bin"));

    assert!(matches!(
        builder.build(&email),
        Err(Error::AttachmentRead { .. })
    ));
}

proptest! {
    #[test]
    fn plain_only_has_single_text_part(text in body_text()) {
        let email = OutgoingEmail::new("s").to("a@x.com").text_body(text.clone());
        let built = builder_with(&[]).build(&email).unwrap();
        let message = Message::parse(built.as_bytes()).unwrap();

        prop_assert_eq!(message.parts.len(), 1);
        prop_assert_eq!(
            message.parts[0].headers.get("content-type"),
            Some("text/plain; charset=UTF-8")
        );
        prop_assert!(!String::from_utf8_lossy(built.as_bytes()).contains("multipart/alternative"));
        prop_assert_eq!(message.text_part().unwrap(), text.replace("\r\n", "\n").replace('\n', "\r\n"));
    }

    #[test]
    fn plain_and_html_nest_two_alternatives(text in body_text(), html in body_text()) {
        let email = OutgoingEmail::new("s").to("a@x.com").text_body(text).html_body(html);
        let built = builder_with(&[]).build(&email).unwrap();
        let message = Message::parse(built.as_bytes()).unwrap();

        prop_assert_eq!(message.parts.len(), 1);
        let nested = message.parts[0].subparts().unwrap();
        prop_assert_eq!(nested.len(), 2);
        prop_assert!(nested[0].content_type().unwrap().is("text", "plain"));
        prop_assert!(nested[1].content_type().unwrap().is("text", "html"));
    }

    #[test]
    fn empty_bodies_always_fail(subject in ".*", attachment in "[a-z/]{0,20}") {
        let email = OutgoingEmail::new(subject)
            .to("a@x.com")
            .text_body("")
            .html_body("")
            .attach(attachment);

        prop_assert!(matches!(builder_with(&[]).build(&email), Err(Error::EmptyBody)));
    }

    #[test]
    fn paths_outside_root_are_rejected(path in "[a-z]{1,10}/[a-z]{1,10}\\.txt") {
        prop_assume!(!path.starts_with("storage/"));
        let email = OutgoingEmail::new("s").text_body("x").attach(path.clone());
        let builder = builder_with(&[(path.as_str(), b"data".as_slice())]);

        let is_invalid_path = matches!(builder.build(&email), Err(Error::InvalidAttachmentPath { .. }));
        prop_assert!(is_invalid_path);
    }

    #[test]
    fn attachment_round_trips(data in proptest::collection::vec(any::<u8>(), 0..4096)) {
        let builder = builder_with(&[("storage/blob.bin", data.as_slice())]);
        let email = OutgoingEmail::new("s").text_body("x").attach("storage/blob.bin");
        let built = builder.build(&email).unwrap();
        let message = Message::parse(built.as_bytes()).unwrap();
        let attachments = message.attachments().unwrap();

        prop_assert_eq!(attachments.len(), 1);
        prop_assert_eq!(attachments[0].transfer_encoding(), TransferEncoding::Base64);
        prop_assert_eq!(attachments[0].decode_body().unwrap(), data);
    }

    #[test]
    fn subject_round_trips(subject in any::<String>()) {
        let email = OutgoingEmail::new(subject.clone()).text_body("x");
        let built = builder_with(&[]).build(&email).unwrap();
        let message = Message::parse(built.as_bytes()).unwrap();

        prop_assert_eq!(message.decoded_subject().unwrap().unwrap_or_default(), subject);
    }

    #[test]
    fn every_line_within_hard_limit(count in 1usize..120, local in "[a-z0-9.-]{1,40}") {
        let mut email = OutgoingEmail::new("s").text_body("x");
        for index in 0..count {
            email = email.to(format!("{local}{index}@example.com"));
        }
        let built = builder_with(&[]).build(&email).unwrap();
        let message = Message::parse(built.as_bytes()).unwrap();

        let raw = String::from_utf8_lossy(built.as_bytes()).into_owned();
        for line in raw.split("\r\n") {
            prop_assert!(line.len() <= 998, "line of {} octets", line.len());
        }
        let expected_to = email.to.join(", ");
        prop_assert_eq!(message.to(), Some(expected_to.as_str()));
    }
}
