//! End-to-end decoding of complete messages.

#![allow(clippy::unwrap_used, clippy::similar_names)]

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use popmail_mime::{
    CharsetResolver, Error, Importance, MAX_NESTING_DEPTH, Message, MessagePart, ParserConfig,
    TransferEncoding,
};
use proptest::prelude::*;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

const FRONTIER: &[u8] = b"From: John Doe <example@example.com>\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/mixed;\r\n\
\tboundary=\"XXXXboundary text\"\r\n\
\r\n\
This is a multipart message in MIME format.\r\n\
\r\n\
--XXXXboundary text\r\n\
Content-Type: text/plain\r\n\
\r\n\
this is the body text\r\n\
\r\n\
--XXXXboundary text\r\n\
Content-Type: text/plain;\r\n\
Content-Disposition: attachment;\r\n\
\tfilename=\"test.txt\"\r\n\
\r\n\
this is the attachment text\r\n\
\r\n\
--XXXXboundary text--\r\n";

const DANISH: &[u8] = b"Return-Path: <thefeds@mail.dk>\r\n\
Received: from fep29 ([80.160.76.233]) by fep34.mail.dk \
(InterMail vM.8.01.04.07 201-2260-137-119-20110503) with ESMTP \
id <20110530134858.YAHN18594.fep34.mail.dk@fep29> for <thefeds@mail.dk>; \
Mon, 30 May 2011 15:48:58 +0200\r\n\
From: =?iso-8859-1?Q?Keld_J=F8rn_Simonsen?= <keld@dkuug.dk>\r\n\
To: \"McDaniel, John\" <jmcdaniel@spam.teltronics.com>, noreply@mail.eksperten.dk\r\n\
Subject: =?iso-8859-1?Q?SV:_Ticket(13349550)_-_Sp=F8rgsm=E5l_omkring_CBB_privat?=\r\n\
Date: Mon, 30 May 2011 15:48:58 +0200\r\n\
Message-ID: <4DE3A0AA.6000105@mail.dk>\r\n\
X-Priority: 1\r\n\
Importance: High\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/mixed; boundary=\"=_mixed\"\r\n\
\r\n\
--=_mixed\r\n\
Content-Type: multipart/alternative; boundary=\"=_alt\"\r\n\
\r\n\
--=_alt\r\n\
Content-Type: text/plain; charset=\"iso-8859-1\"\r\n\
Content-Transfer-Encoding: quoted-printable\r\n\
\r\n\
Hej, her er en l=E6ngere tekst som er blevet=\r\n\
\x20delt over flere linjer.\r\n\
--=_alt\r\n\
Content-Type: text/html; charset=\"utf-8\"\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
PHA+SGVqLCBsw6ZuZ2VyZSB0ZWtzdDwvcD4=\r\n\
--=_alt--\r\n\
--=_mixed\r\n\
Content-Type: application/pdf; name=\"=?utf-8?B?w5huc2tlbGlzdGUucGRm?=\"\r\n\
Content-Disposition: attachment;\r\n\
\tfilename*=ISO-8859-1''%D8%6E%73%6B%65%6C%69%73%74%65%2E%70%64%66\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
JVBERi0xLjQK\r\n\
--=_mixed--\r\n";

#[test]
fn test_frontier_two_parts() {
    init_tracing();
    let message = Message::load(FRONTIER).unwrap();
    let root = message.message_part();

    assert!(root.is_multipart());
    assert_eq!(root.children().len(), 2);
    assert_eq!(
        root.content_type().boundary(),
        Some("XXXXboundary text")
    );

    let body = &root.children()[0];
    assert_eq!(body.body_text().unwrap(), "this is the body text\r\n");
    assert!(!body.is_attachment());

    let attachment = &root.children()[1];
    assert!(attachment.is_attachment());
    assert_eq!(attachment.file_name(), "test.txt");
    assert_eq!(attachment.body().unwrap(), b"this is the attachment text\r\n");

    assert_eq!(message.find_all_attachments().len(), 1);
}

#[test]
fn test_realistic_danish_message() {
    init_tracing();
    let message = Message::load(DANISH).unwrap();
    let header = message.header();

    assert_eq!(header.from.as_ref().unwrap().display_name, "Keld Jørn Simonsen");
    assert_eq!(header.to.len(), 2);
    assert_eq!(header.to[0].display_name, "McDaniel, John");
    assert_eq!(
        header.subject.as_deref(),
        Some("SV: Ticket(13349550) - Spørgsmål omkring CBB privat")
    );
    assert_eq!(
        header.date_sent,
        Some(Utc.with_ymd_and_hms(2011, 5, 30, 13, 48, 58).unwrap())
    );
    assert_eq!(header.message_id.as_deref(), Some("4DE3A0AA.6000105@mail.dk"));
    assert_eq!(header.importance, Importance::High);
    assert_eq!(header.unknown_header("X-Priority"), Some("1"));
    assert_eq!(header.received.len(), 1);
    assert_eq!(header.received[0].names["for"], "<thefeds@mail.dk>");
    assert_eq!(
        header.received[0].date,
        Some(Utc.with_ymd_and_hms(2011, 5, 30, 13, 48, 58).unwrap())
    );

    let plain = message.find_first_plain_text_version().unwrap();
    assert_eq!(plain.content_transfer_encoding(), TransferEncoding::QuotedPrintable);
    assert_eq!(
        plain.body_text().unwrap(),
        "Hej, her er en længere tekst som er blevet delt over flere linjer."
    );

    let html = message.find_first_html_version().unwrap();
    assert_eq!(html.body_text().unwrap(), "<p>Hej, længere tekst</p>");

    let attachments = message.find_all_attachments();
    assert_eq!(attachments.len(), 1);
    assert_eq!(attachments[0].file_name(), "Ønskeliste.pdf");
    assert_eq!(attachments[0].content_type().name(), Some("Ønskeliste.pdf"));
    assert_eq!(attachments[0].body().unwrap(), b"%PDF-1.4\n");

    assert_eq!(message.find_all_text_versions().len(), 2);
}

#[test]
fn test_quoted_printable_soft_break_at_end() {
    let message = Message::load(
        &b"Content-Type: text/plain\r\nContent-Transfer-Encoding: \
          quoted-printable\r\n\r\nHello=\r\n"[..],
    )
    .unwrap();
    assert_eq!(message.message_part().body().unwrap(), b"Hello");
}

#[test]
fn test_unknown_transfer_encoding_fails_load() {
    let err = Message::load(&b"Content-Transfer-Encoding: x-gzip64\r\n\r\nabc"[..]).unwrap_err();
    assert!(matches!(err, Error::UnknownTransferEncoding(_)));
}

#[test]
fn test_message_without_headers() {
    let message = Message::load(&b"just a body, no header block"[..]).unwrap();
    assert_eq!(message.header().subject, None);
    assert_eq!(
        message.message_part().body().unwrap(),
        b"just a body, no header block"
    );
}

#[test]
fn test_save_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("danish.eml");

    let message = Message::load(DANISH).unwrap();
    message.save(&path).unwrap();

    let loaded = Message::load_from_file(&path).unwrap();
    assert_eq!(loaded.raw_bytes(), DANISH);
    assert_eq!(loaded.header(), message.header());

    let attachment = loaded.find_all_attachments()[0];
    let saved = dir.path().join(attachment.file_name());
    attachment.save_to_file(&saved).unwrap();
    assert_eq!(std::fs::read(saved).unwrap(), b"%PDF-1.4\n");
}

#[test]
fn test_private_resolver() {
    let resolver = Arc::new(CharsetResolver::new());
    resolver.add_mapping("x-house-charset", encoding_rs::ISO_8859_2);
    let config = ParserConfig::builder().resolver(resolver).build();

    let raw = b"Subject: =?x-house-charset?Q?=B1?=\r\n\
        Content-Type: text/plain; charset=x-house-charset\r\n\r\n\xb1";
    let message = Message::load_with(&raw[..], &config).unwrap();
    assert_eq!(message.header().subject.as_deref(), Some("ą"));
    assert_eq!(message.message_part().body_text_with(&config).unwrap(), "ą");

    // The global resolver does not know the name.
    let message = Message::load(&raw[..]).unwrap();
    assert_eq!(message.header().subject.as_deref(), Some("=?x-house-charset?Q?=B1?="));
}

#[test]
fn test_part_parse_matches_message_root() {
    let message = Message::load(FRONTIER).unwrap();
    let part = MessagePart::parse(FRONTIER).unwrap();
    assert_eq!(&part, message.message_part());
}

#[test]
fn test_media_type_queries_find_containers() {
    let message = Message::load(DANISH).unwrap();

    let alternative = message
        .find_first_message_part_with_media_type("multipart/alternative")
        .unwrap();
    assert_eq!(alternative.children().len(), 2);

    let mixed = message.find_all_message_parts_with_media_type("MULTIPART/MIXED");
    assert_eq!(mixed.len(), 1);
    assert!(std::ptr::eq(mixed[0], message.message_part()));
}

#[test]
fn test_deep_nesting_is_cut_without_overflow() {
    init_tracing();
    let mut raw = String::from("Content-Type: text/plain\r\n\r\nbottom");
    for level in (0..2_000).rev() {
        raw = format!(
            "Content-Type: multipart/mixed; boundary=n{level}\r\n\r\n\
             --n{level}\r\n{raw}\r\n--n{level}--\r\n"
        );
    }

    // A small stack, like a runtime worker thread, must survive the load.
    let handle = std::thread::Builder::new()
        .stack_size(2 * 1024 * 1024)
        .spawn(move || {
            let message = Message::load(raw).unwrap();
            let containers = message.find_all_message_parts_with_media_type("multipart/mixed");
            let text = message.find_all_text_versions().len();
            (containers.len(), containers.last().map(|part| part.children().len()), text)
        })
        .unwrap();

    let (containers, last_children, text) = handle.join().unwrap();
    assert_eq!(containers, MAX_NESTING_DEPTH + 1);
    assert_eq!(last_children, Some(0));
    assert_eq!(text, 0);
}

proptest! {
    #[test]
    fn load_never_panics(raw in proptest::collection::vec(any::<u8>(), 0..2048)) {
        let _ = Message::load(raw);
    }

    #[test]
    fn multipart_with_random_body_never_panics(body in "\\PC{0,512}") {
        let raw = format!(
            "Content-Type: multipart/mixed; boundary=b\r\n\r\n--b\r\n{body}\r\n--b--\r\n"
        );
        let _ = Message::load(raw.into_bytes());
    }
}
