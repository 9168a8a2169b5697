//! MIME header handling.
//!
//! [`extract_headers`] splits a raw message at the first empty line,
//! [`unfold`] turns the header block into name/value pairs, and
//! [`MessageHeader`] dispatches each pair to the matching field parser.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::address::Address;
use crate::config::ParserConfig;
use crate::content_type::{ContentDisposition, ContentType};
use crate::encoded_word;
use crate::error::{Error, Result};
use crate::line_reader::LineReader;
use crate::received::Received;

/// Splits a raw message into its header block and body.
///
/// The header block ends at the first empty line; the body starts right
/// after it. Without an empty line the header block is empty and the whole
/// input is the body. Header bytes are read as UTF-8, falling back to
/// Windows-1252 for legacy 8-bit headers.
#[must_use]
pub fn extract_headers(raw: &[u8]) -> (String, &[u8]) {
    let mut reader = LineReader::new(raw);

    while let Some((start, line)) = reader.next_with_offset() {
        if line.is_empty() {
            return (header_text(&raw[..start]), reader.remainder());
        }
    }

    tracing::debug!(len = raw.len(), "no header separator, treating input as body");
    (String::new(), raw)
}

fn header_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
    }
}

/// Unfolds a header block into `(name, value)` pairs in their original order.
///
/// A line starting with a space or tab continues the previous value; the
/// line break and exactly one leading whitespace character are removed.
/// Lines that are neither continuations nor `Name: value` are skipped.
#[must_use]
pub fn unfold(header_text: &str) -> Vec<(String, String)> {
    let mut fields: Vec<(String, String)> = Vec::new();

    for line in header_text.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() {
            continue;
        }

        if line.starts_with([' ', '\t']) {
            match fields.last_mut() {
                Some((_, value)) => value.push_str(&line[1..]),
                None => tracing::debug!(line, "continuation line without a header"),
            }
        } else if let Some((name, value)) = line.split_once(':') {
            fields.push((name.trim().to_string(), value.trim_start().to_string()));
        } else {
            tracing::debug!(line, "skipping header line without a colon");
        }
    }

    for (_, value) in &mut fields {
        value.truncate(value.trim_end().len());
    }

    fields
}

/// Transfer encoding types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TransferEncoding {
    /// 7-bit ASCII.
    #[default]
    SevenBit,
    /// 8-bit text.
    EightBit,
    /// Quoted-Printable encoding.
    QuotedPrintable,
    /// Base64 encoding.
    Base64,
    /// Binary (no encoding).
    Binary,
}

impl TransferEncoding {
    /// Parses a `Content-Transfer-Encoding` value.
    ///
    /// An empty value means 7bit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownTransferEncoding`] for any other token, since
    /// guessing would decode the body wrongly.
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "7bit" => Ok(Self::SevenBit),
            "8bit" => Ok(Self::EightBit),
            "quoted-printable" => Ok(Self::QuotedPrintable),
            "base64" => Ok(Self::Base64),
            "binary" => Ok(Self::Binary),
            _ => Err(Error::UnknownTransferEncoding(s.trim().to_string())),
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SevenBit => write!(f, "7bit"),
            Self::EightBit => write!(f, "8bit"),
            Self::QuotedPrintable => write!(f, "quoted-printable"),
            Self::Base64 => write!(f, "base64"),
            Self::Binary => write!(f, "binary"),
        }
    }
}

/// Message importance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Importance {
    /// Low importance.
    Low,
    /// Normal importance.
    #[default]
    Normal,
    /// High importance.
    High,
}

impl Importance {
    /// Parses `low`/`normal`/`high` or a priority number from 1 (highest) to 5.
    ///
    /// Anything else is [`Importance::Normal`].
    #[must_use]
    pub fn parse(s: &str) -> Self {
        let word = s.split_whitespace().next().unwrap_or_default();
        match word.to_ascii_lowercase().as_str() {
            "low" | "4" | "5" => Self::Low,
            "normal" | "3" => Self::Normal,
            "high" | "1" | "2" => Self::High,
            _ => {
                tracing::warn!(value = s, "unrecognised importance, assuming normal");
                Self::Normal
            }
        }
    }
}

/// Parsed message or part header.
///
/// Every field has a default, so a message without headers still yields a
/// usable value. A field that fails to parse keeps its default and the
/// problem is logged; only `Content-Transfer-Encoding` is fatal.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MessageHeader {
    /// `To` recipients.
    pub to: Vec<Address>,
    /// `Cc` recipients.
    pub cc: Vec<Address>,
    /// `Bcc` recipients.
    pub bcc: Vec<Address>,
    /// `From`.
    pub from: Option<Address>,
    /// `Reply-To`.
    pub reply_to: Option<Address>,
    /// `Sender`.
    pub sender: Option<Address>,
    /// `Return-Path`.
    pub return_path: Option<Address>,
    /// `Disposition-Notification-To`.
    pub disposition_notification_to: Vec<Address>,
    /// Decoded `Subject`, or `Thread-Topic` when there is no subject.
    pub subject: Option<String>,
    /// Decoded `Content-Description`.
    pub content_description: Option<String>,
    /// `Date` as written.
    pub date: Option<String>,
    /// `Date` as a UTC instant, when it could be parsed.
    pub date_sent: Option<DateTime<Utc>>,
    /// `Message-ID` without angle brackets.
    pub message_id: Option<String>,
    /// `Content-ID` without angle brackets.
    pub content_id: Option<String>,
    /// `In-Reply-To` message ids without angle brackets.
    pub in_reply_to: Vec<String>,
    /// `References` message ids without angle brackets.
    pub references: Vec<String>,
    /// `MIME-Version`.
    pub mime_version: Option<String>,
    /// `Content-Type`, `text/plain; charset=us-ascii` when absent.
    pub content_type: ContentType,
    /// `Content-Transfer-Encoding`, 7bit when absent.
    pub content_transfer_encoding: TransferEncoding,
    /// `Content-Disposition`.
    pub content_disposition: Option<ContentDisposition>,
    /// `Keywords`, split on commas.
    pub keywords: Vec<String>,
    /// `Received` trace headers in order.
    pub received: Vec<Received>,
    /// `Importance`.
    pub importance: Importance,
    /// Every other header, in order, repeats included.
    pub unknown_headers: Vec<(String, String)>,
}

impl MessageHeader {
    /// Parses a raw header block using the default configuration.
    ///
    /// # Errors
    ///
    /// See [`MessageHeader::parse_with`].
    pub fn parse(header_text: &str) -> Result<Self> {
        Self::parse_with(header_text, &ParserConfig::default())
    }

    /// Parses a raw header block.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownTransferEncoding`] if `Content-Transfer-Encoding`
    /// is not recognised.
    pub fn parse_with(header_text: &str, config: &ParserConfig) -> Result<Self> {
        Self::from_fields(&unfold(header_text), config)
    }

    /// Builds a header from unfolded `(name, value)` pairs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownTransferEncoding`] if `Content-Transfer-Encoding`
    /// is not recognised.
    pub fn from_fields(fields: &[(String, String)], config: &ParserConfig) -> Result<Self> {
        let mut header = Self::default();
        let mut thread_topic = None;

        for (name, value) in fields {
            match name.to_ascii_uppercase().as_str() {
                "TO" => header.to.extend(addresses(value, config)),
                "CC" => header.cc.extend(addresses(value, config)),
                "BCC" => header.bcc.extend(addresses(value, config)),
                "DISPOSITION-NOTIFICATION-TO" => header
                    .disposition_notification_to
                    .extend(addresses(value, config)),
                "FROM" => header.from = Some(Address::parse_with(value, config.resolver())),
                "REPLY-TO" => header.reply_to = Some(Address::parse_with(value, config.resolver())),
                "SENDER" => header.sender = Some(Address::parse_with(value, config.resolver())),
                "RETURN-PATH" => {
                    header.return_path = Some(Address::parse_with(value, config.resolver()));
                }
                "SUBJECT" => header.subject = Some(decode_text(value, config)),
                "THREAD-TOPIC" => thread_topic = Some(decode_text(value, config)),
                "CONTENT-DESCRIPTION" => {
                    header.content_description = Some(decode_text(value, config));
                }
                "DATE" => {
                    header.date = Some(value.clone());
                    header.date_sent = match config.parse_date(value) {
                        Ok(date) => date,
                        Err(e) => {
                            tracing::warn!(
                                date = %value,
                                error = %e,
                                "ignoring invalid Date header"
                            );
                            None
                        }
                    };
                }
                "MESSAGE-ID" => header.message_id = Some(strip_angle_brackets(value)),
                "CONTENT-ID" => header.content_id = Some(strip_angle_brackets(value)),
                "IN-REPLY-TO" => header.in_reply_to.extend(message_ids(value)),
                "REFERENCES" => header.references.extend(message_ids(value)),
                "MIME-VERSION" => header.mime_version = Some(value.clone()),
                "CONTENT-TRANSFER-ENCODING" => {
                    header.content_transfer_encoding = TransferEncoding::parse(value)?;
                }
                "CONTENT-TYPE" => match ContentType::parse_with(value, config) {
                    Ok(content_type) => header.content_type = content_type,
                    Err(e) => {
                        tracing::warn!(value = %value, error = %e, "ignoring invalid Content-Type");
                    }
                },
                "CONTENT-DISPOSITION" => match ContentDisposition::parse_with(value, config) {
                    Ok(disposition) => header.content_disposition = Some(disposition),
                    Err(e) => {
                        tracing::warn!(
                            value = %value,
                            error = %e,
                            "ignoring invalid Content-Disposition"
                        );
                    }
                },
                "KEYWORDS" => header.keywords.extend(
                    value
                        .split(',')
                        .map(|k| k.trim().trim_matches('"').trim().to_string())
                        .filter(|k| !k.is_empty()),
                ),
                "RECEIVED" => header.received.push(Received::parse_with(value, config)),
                "IMPORTANCE" => header.importance = Importance::parse(value),
                _ => header.unknown_headers.push((name.clone(), value.clone())),
            }
        }

        if header.subject.is_none() {
            header.subject = thread_topic;
        }

        Ok(header)
    }

    /// Returns the first value of a header kept in [`Self::unknown_headers`].
    #[must_use]
    pub fn unknown_header(&self, name: &str) -> Option<&str> {
        self.unknown_headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

fn addresses(value: &str, config: &ParserConfig) -> Vec<Address> {
    Address::parse_list_with(value, config.resolver())
}

fn decode_text(value: &str, config: &ParserConfig) -> String {
    encoded_word::decode(value, config.resolver()).unwrap_or_else(|e| {
        tracing::warn!(value, error = %e, "keeping header text undecoded");
        value.to_string()
    })
}

fn strip_angle_brackets(value: &str) -> String {
    let value = value.trim();
    value
        .strip_prefix('<')
        .and_then(|v| v.strip_suffix('>'))
        .unwrap_or(value)
        .trim()
        .to_string()
}

/// Message ids from `<a@b> <c@d>`, also when unfolding glued them together.
fn message_ids(value: &str) -> Vec<String> {
    if value.contains('<') {
        value
            .split('<')
            .skip(1)
            .filter_map(|s| s.split_once('>').map(|(id, _)| id.trim()))
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect()
    } else {
        value
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect()
    }
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
    use chrono::TimeZone;

    #[test]
    fn test_extract_headers() {
        let raw = b"From: a@example.com\r\nSubject: Hi\r\n\r\nBody line\r\n";
        let (headers, body) = extract_headers(raw);
        assert_eq!(headers, "From: a@example.com\r\nSubject: Hi\r\n");
        assert_eq!(body, b"Body line\r\n");
    }

    #[test]
    fn test_extract_headers_lf_only() {
        let (headers, body) = extract_headers(b"Subject: Hi\n\nBody");
        assert_eq!(headers, "Subject: Hi\n");
        assert_eq!(body, b"Body");
    }

    #[test]
    fn test_extract_headers_without_separator() {
        let raw = b"no separator here";
        let (headers, body) = extract_headers(raw);
        assert_eq!(headers, "");
        assert_eq!(body, raw);
    }

    #[test]
    fn test_extract_headers_empty_body() {
        let (headers, body) = extract_headers(b"Subject: Hi\r\n\r\n");
        assert_eq!(headers, "Subject: Hi\r\n");
        assert!(body.is_empty());
    }

    #[test]
    fn test_extract_headers_latin1() {
        let (headers, _) = extract_headers(b"Subject: caf\xe9\r\n\r\n");
        assert_eq!(headers, "Subject: café\r\n");
    }

    #[test]
    fn test_unfold() {
        let fields = unfold(concat!(
            "From: sender@example.com\r\n",
            "Content-Type: text/plain;\r\n",
            " charset=utf-8\r\n",
            "Subject: two\r\n",
            "\t\tindented\r\n",
        ));
        assert_eq!(
            fields,
            vec![
                ("From".to_string(), "sender@example.com".to_string()),
                ("Content-Type".to_string(), "text/plain;charset=utf-8".to_string()),
                ("Subject".to_string(), "two\tindented".to_string()),
            ]
        );
    }

    #[test]
    fn test_unfold_keeps_repeats_and_skips_junk() {
        let fields = unfold("Received: a\r\nnot a header\r\nReceived: b\r\n");
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].1, "a");
        assert_eq!(fields[1].1, "b");
    }

    #[test]
    fn test_unfold_colon_in_value() {
        let fields = unfold("X-Url: http://example.com\r\n");
        assert_eq!(fields[0], ("X-Url".to_string(), "http://example.com".to_string()));
    }

    #[test]
    fn test_transfer_encoding_parse() {
        assert_eq!(TransferEncoding::parse("7bit").unwrap(), TransferEncoding::SevenBit);
        assert_eq!(TransferEncoding::parse(" BASE64 ").unwrap(), TransferEncoding::Base64);
        assert_eq!(
            TransferEncoding::parse("Quoted-Printable").unwrap(),
            TransferEncoding::QuotedPrintable
        );
        assert_eq!(TransferEncoding::parse("").unwrap(), TransferEncoding::SevenBit);
        assert!(matches!(
            TransferEncoding::parse("x-uuencode"),
            Err(Error::UnknownTransferEncoding(token)) if token == "x-uuencode"
        ));
    }

    #[test]
    fn test_importance_parse() {
        assert_eq!(Importance::parse("high"), Importance::High);
        assert_eq!(Importance::parse("LOW"), Importance::Low);
        assert_eq!(Importance::parse("1 (Highest)"), Importance::High);
        assert_eq!(Importance::parse("5"), Importance::Low);
        assert_eq!(Importance::parse("3"), Importance::Normal);
        assert_eq!(Importance::parse("urgent"), Importance::Normal);
    }

    #[test]
    fn test_defaults() {
        let header = MessageHeader::parse("").unwrap();
        assert_eq!(header.content_type.media_type(), "text/plain");
        assert_eq!(header.content_type.charset(), Some("us-ascii"));
        assert_eq!(header.content_transfer_encoding, TransferEncoding::SevenBit);
        assert_eq!(header.importance, Importance::Normal);
        assert!(header.to.is_empty());
        assert!(header.from.is_none());
        assert!(header.date_sent.is_none());
    }

    #[test]
    fn test_message_header_parse() {
        let header = MessageHeader::parse(concat!(
            "From: \"Alice\" <alice@example.com>\r\n",
            "To: bob@example.com, \"Carol, C\" <carol@example.com>\r\n",
            "Cc: dave@example.com\r\n",
            "Subject: =?utf-8?Q?caf=C3=A9?=\r\n",
            "Date: Fri, 21 Nov 1997 09:55:06 -0600\r\n",
            "Message-ID: <1234@local.machine.example>\r\n",
            "MIME-Version: 1.0\r\n",
            "Content-Type: multipart/mixed; boundary=\"frontier\"\r\n",
            "Keywords: one, \"two\" ,three\r\n",
            "Importance: high\r\n",
            "X-Mailer: test\r\n",
            "X-Custom: 1\r\n",
            "X-Custom: 2\r\n",
        ))
        .unwrap();

        assert_eq!(header.from.as_ref().unwrap().display_name, "Alice");
        assert_eq!(header.to.len(), 2);
        assert_eq!(header.to[1].display_name, "Carol, C");
        assert_eq!(header.cc.len(), 1);
        assert_eq!(header.subject.as_deref(), Some("café"));
        assert_eq!(header.date.as_deref(), Some("Fri, 21 Nov 1997 09:55:06 -0600"));
        assert_eq!(
            header.date_sent,
            Some(Utc.with_ymd_and_hms(1997, 11, 21, 15, 55, 6).unwrap())
        );
        assert_eq!(header.message_id.as_deref(), Some("1234@local.machine.example"));
        assert_eq!(header.mime_version.as_deref(), Some("1.0"));
        assert_eq!(header.content_type.boundary(), Some("frontier"));
        assert_eq!(header.keywords, vec!["one", "two", "three"]);
        assert_eq!(header.importance, Importance::High);
        assert_eq!(header.unknown_header("x-mailer"), Some("test"));
        assert_eq!(
            header.unknown_headers[1..],
            [
                ("X-Custom".to_string(), "1".to_string()),
                ("X-Custom".to_string(), "2".to_string())
            ]
        );
    }

    #[test]
    fn test_unknown_transfer_encoding_is_fatal() {
        let err = MessageHeader::parse("Subject: a\r\nContent-Transfer-Encoding: rot13\r\n")
            .unwrap_err();
        assert!(matches!(err, Error::UnknownTransferEncoding(_)));
    }

    #[test]
    fn test_bad_fields_degrade() {
        let header = MessageHeader::parse(concat!(
            "Date: Sun, 03 Mar 2011 00:77:00 -0000\r\n",
            "Content-Type: garbage\r\n",
            "Content-Disposition: ;\r\n",
            "Subject: still parsed\r\n",
        ))
        .unwrap();
        assert!(header.date.is_some());
        assert_eq!(header.date_sent, None);
        assert_eq!(header.content_type, ContentType::default());
        assert_eq!(header.content_disposition, None);
        assert_eq!(header.subject.as_deref(), Some("still parsed"));
    }

    #[test]
    fn test_thread_topic_fallback() {
        let header = MessageHeader::parse("Thread-Topic: topic\r\n").unwrap();
        assert_eq!(header.subject.as_deref(), Some("topic"));

        let header = MessageHeader::parse("Thread-Topic: topic\r\nSubject: subject\r\n").unwrap();
        assert_eq!(header.subject.as_deref(), Some("subject"));
    }

    #[test]
    fn test_ids_and_references() {
        let header = MessageHeader::parse(concat!(
            "Content-ID: <part1@example.com>\r\n",
            "In-Reply-To: <a@example.com>\r\n",
            "References: <a@example.com>\r\n <b@example.com>\r\n",
        ))
        .unwrap();
        assert_eq!(header.content_id.as_deref(), Some("part1@example.com"));
        assert_eq!(header.in_reply_to, vec!["a@example.com"]);
        assert_eq!(header.references, vec!["a@example.com", "b@example.com"]);
    }

    #[test]
    fn test_received_and_return_path() {
        let header = MessageHeader::parse(concat!(
            "Return-Path: <bounce@example.com>\r\n",
            "Received: from a by b; Fri, 21 Nov 1997 09:55:06 -0600\r\n",
            "Received: from c by d; Fri, 21 Nov 1997 09:50:06 -0600\r\n",
            "Disposition-Notification-To: Alice <alice@example.com>\r\n",
        ))
        .unwrap();
        assert_eq!(
            header.return_path.unwrap().mail_address.unwrap().address(),
            "bounce@example.com"
        );
        assert_eq!(header.received.len(), 2);
        assert_eq!(header.received[1].names["from"], "c");
        assert_eq!(header.disposition_notification_to[0].display_name, "Alice");
    }

    #[test]
    fn test_content_type_with_spaces() {
        let header =
            MessageHeader::parse("Content-Type: text/plain; charset = \"us-ascii\"\r\n").unwrap();
        assert_eq!(header.content_type.charset(), Some("us-ascii"));
    }
}
