//! The MIME body tree.

use std::fs;
use std::io;
use std::path::Path;

use encoding_rs::Encoding;

use crate::charset;
use crate::config::ParserConfig;
use crate::content_type::{ContentDisposition, ContentType};
use crate::encoding::{decode_base64, decode_quoted_printable};
use crate::error::Result;
use crate::header::{MessageHeader, TransferEncoding, extract_headers};
use crate::line_reader::LineReader;

/// How many multipart levels are split before deeper bodies are dropped.
pub const MAX_NESTING_DEPTH: usize = 32;

/// A leaf holds decoded bytes, a multipart node holds children.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Content {
    Leaf(Vec<u8>),
    Multipart(Vec<MessagePart>),
}

/// One node of a message body tree.
///
/// Built once from raw bytes and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagePart {
    header: MessageHeader,
    content: Content,
}

impl MessagePart {
    /// Parses a complete entity (headers, empty line, body) with the default
    /// configuration.
    ///
    /// # Errors
    ///
    /// See [`MessagePart::parse_with`].
    pub fn parse(raw: &[u8]) -> Result<Self> {
        Self::parse_with(raw, &ParserConfig::default())
    }

    /// Parses a complete entity: headers, empty line, body.
    ///
    /// # Errors
    ///
    /// Returns an error if this entity or any nested one has an unknown
    /// `Content-Transfer-Encoding`.
    pub fn parse_with(raw: &[u8], config: &ParserConfig) -> Result<Self> {
        Self::parse_at(raw, config, 0)
    }

    fn parse_at(raw: &[u8], config: &ParserConfig, depth: usize) -> Result<Self> {
        let (header_text, body) = extract_headers(raw);
        let header = MessageHeader::parse_with(&header_text, config)?;
        Self::build_at(body, header, config, depth)
    }

    /// Builds a part from an already parsed header and its raw body.
    ///
    /// `multipart/*` bodies are split on the boundary and every piece is
    /// parsed recursively. Other bodies are transfer-decoded and stored.
    ///
    /// A multipart node [`MAX_NESTING_DEPTH`] levels below this one is kept
    /// with no children.
    ///
    /// # Errors
    ///
    /// Returns an error if a nested entity has an unknown
    /// `Content-Transfer-Encoding`.
    pub fn build(raw_body: &[u8], header: MessageHeader, config: &ParserConfig) -> Result<Self> {
        Self::build_at(raw_body, header, config, 0)
    }

    fn build_at(
        raw_body: &[u8],
        header: MessageHeader,
        config: &ParserConfig,
        depth: usize,
    ) -> Result<Self> {
        if !header.content_type.is_multipart() {
            let body = decode_body(raw_body, header.content_transfer_encoding);
            return Ok(Self {
                header,
                content: Content::Leaf(body),
            });
        }

        let children = match header.content_type.boundary() {
            Some(_) if depth >= MAX_NESTING_DEPTH => {
                tracing::warn!(depth, "multipart nesting too deep, no parts");
                Vec::new()
            }
            Some(boundary) => split_parts(raw_body, boundary)
                .into_iter()
                .map(|raw| Self::parse_at(raw, config, depth + 1))
                .collect::<Result<Vec<_>>>()?,
            None => {
                tracing::warn!(
                    media_type = %header.content_type.media_type(),
                    "multipart without boundary, no parts"
                );
                Vec::new()
            }
        };

        Ok(Self {
            header,
            content: Content::Multipart(children),
        })
    }

    /// The headers of this part.
    #[must_use]
    pub const fn header(&self) -> &MessageHeader {
        &self.header
    }

    /// The content type of this part.
    #[must_use]
    pub const fn content_type(&self) -> &ContentType {
        &self.header.content_type
    }

    /// The transfer encoding the body was decoded from.
    #[must_use]
    pub const fn content_transfer_encoding(&self) -> TransferEncoding {
        self.header.content_transfer_encoding
    }

    /// The content disposition, if any.
    #[must_use]
    pub const fn content_disposition(&self) -> Option<&ContentDisposition> {
        self.header.content_disposition.as_ref()
    }

    /// The content id without angle brackets, if any.
    #[must_use]
    pub fn content_id(&self) -> Option<&str> {
        self.header.content_id.as_deref()
    }

    /// Decoded body bytes. `None` for multipart nodes.
    #[must_use]
    pub fn body(&self) -> Option<&[u8]> {
        match &self.content {
            Content::Leaf(body) => Some(body),
            Content::Multipart(_) => None,
        }
    }

    /// Child parts. Empty for leaves.
    #[must_use]
    pub fn children(&self) -> &[Self] {
        match &self.content {
            Content::Leaf(_) => &[],
            Content::Multipart(children) => children,
        }
    }

    /// Returns true for `multipart/*` nodes.
    #[must_use]
    pub const fn is_multipart(&self) -> bool {
        matches!(self.content, Content::Multipart(_))
    }

    /// Returns true for `text/*` and `message/rfc822` parts.
    #[must_use]
    pub fn is_text(&self) -> bool {
        let content_type = self.content_type();
        content_type.is_text() || content_type.is_message()
    }

    /// Returns true for non-text leaves and for anything explicitly marked as
    /// not inline.
    #[must_use]
    pub fn is_attachment(&self) -> bool {
        let non_inline = self
            .content_disposition()
            .is_some_and(|disposition| !disposition.is_inline());
        (!self.is_text() && !self.is_multipart()) || non_inline
    }

    /// The file name from the disposition, else the content type `name`,
    /// else `"(no name)"`.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.content_disposition()
            .and_then(|disposition| disposition.file_name.as_deref())
            .or_else(|| self.content_type().name())
            .unwrap_or("(no name)")
    }

    /// The text encoding named by the `charset` parameter (`us-ascii` if absent).
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnknownCharset`] if the charset cannot be resolved.
    pub fn body_encoding(&self) -> Result<&'static Encoding> {
        self.body_encoding_with(&ParserConfig::default())
    }

    /// Like [`MessagePart::body_encoding`] with a specific configuration.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnknownCharset`] if the charset cannot be resolved.
    pub fn body_encoding_with(&self, config: &ParserConfig) -> Result<&'static Encoding> {
        let name = self.content_type().charset().unwrap_or("us-ascii");
        config.resolver().resolve(name)
    }

    /// The body as text. `None` for multipart nodes.
    ///
    /// An unknown charset is logged and the body is read as Windows-1252.
    #[must_use]
    pub fn body_text(&self) -> Option<String> {
        self.body_text_with(&ParserConfig::default())
    }

    /// Like [`MessagePart::body_text`] with a specific configuration.
    #[must_use]
    pub fn body_text_with(&self, config: &ParserConfig) -> Option<String> {
        let body = self.body()?;
        let encoding = self.body_encoding_with(config).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "reading body as windows-1252");
            encoding_rs::WINDOWS_1252
        });
        Some(charset::decode(body, encoding))
    }

    /// Writes the decoded body to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written, or if this is a
    /// multipart node and so has no body.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let body = self.body().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "multipart node has no body")
        })?;
        fs::write(path, body)?;
        Ok(())
    }
}

fn decode_body(raw: &[u8], encoding: TransferEncoding) -> Vec<u8> {
    match encoding {
        TransferEncoding::QuotedPrintable => decode_quoted_printable(raw),
        TransferEncoding::Base64 => decode_base64(raw).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "malformed base64 body kept undecoded");
            raw.to_vec()
        }),
        TransferEncoding::SevenBit | TransferEncoding::EightBit | TransferEncoding::Binary => {
            raw.to_vec()
        }
    }
}

/// Cuts a multipart body into the raw entities between boundary lines.
///
/// The preamble before the first delimiter and the epilogue after the
/// closing one are dropped. Each piece excludes the line break in front of
/// the following delimiter. Without a closing delimiter, the rest of the
/// body (minus a final line break) is the last piece.
fn split_parts<'a>(body: &'a [u8], boundary: &str) -> Vec<&'a [u8]> {
    let delimiter = format!("--{boundary}");
    let closing = format!("--{boundary}--");
    let mut reader = LineReader::new(body);
    let mut parts = Vec::new();
    let mut start: Option<usize> = None;

    while let Some((line_start, line)) = reader.next_with_offset() {
        let line = line.trim_ascii_end();
        let is_closing = line == closing.as_bytes();
        if !is_closing && line != delimiter.as_bytes() {
            continue;
        }

        if let Some(start) = start {
            let end = strip_line_break(&body[..line_start]).len().max(start);
            parts.push(&body[start..end]);
        }
        if is_closing {
            return parts;
        }
        start = Some(reader.position());
    }

    match start {
        Some(start) => {
            tracing::debug!(boundary, "missing closing delimiter");
            let rest = strip_line_break(&body[start..]);
            if !rest.is_empty() {
                parts.push(rest);
            }
        }
        None => tracing::warn!(boundary, "boundary never found, no parts"),
    }

    parts
}

fn strip_line_break(bytes: &[u8]) -> &[u8] {
    bytes
        .strip_suffix(b"\r\n")
        .or_else(|| bytes.strip_suffix(b"\n"))
        .unwrap_or(bytes)
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

    const FRONTIER: &[u8] = b"MIME-Version: 1.0\r\n\
Content-Type: multipart/mixed; boundary=frontier\r\n\
\r\n\
This is a message with multiple parts in MIME format.\r\n\
--frontier\r\n\
Content-Type: text/plain\r\n\
\r\n\
This is the body of the message.\r\n\
--frontier\r\n\
Content-Type: application/octet-stream\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
PGh0bWw+CiAgPGhlYWQ+CiAgPC9oZWFkPgogIDxib2R5PgogICAgPHA+VGhpcyBpcyB0aGUg\r\n\
Ym9keSBvZiB0aGUgbWVzc2FnZS48L3A+CiAgPC9ib2R5Pgo8L2h0bWw+Cg==\r\n\
--frontier--\r\n";

    fn nested_multipart(levels: usize) -> Vec<u8> {
        let mut raw = String::from("Content-Type: text/plain\r\n\r\nleaf");
        for level in (0..levels).rev() {
            raw = format!(
                "Content-Type: multipart/mixed; boundary=b{level}\r\n\r\n\
                 --b{level}\r\n{raw}\r\n--b{level}--\r\n"
            );
        }
        raw.into_bytes()
    }

    /// Follows first children down, returning the deepest node and its depth.
    fn deepest(part: &MessagePart) -> (&MessagePart, usize) {
        let mut node = part;
        let mut depth = 0;
        while let Some(child) = node.children().first() {
            node = child;
            depth += 1;
        }
        (node, depth)
    }

    #[test]
    fn test_nesting_at_limit_is_fully_parsed() {
        let part = MessagePart::parse(&nested_multipart(MAX_NESTING_DEPTH)).unwrap();
        let (leaf, depth) = deepest(&part);
        assert_eq!(depth, MAX_NESTING_DEPTH);
        assert!(!leaf.is_multipart());
        assert_eq!(leaf.body().unwrap(), b"leaf");
    }

    #[test]
    fn test_nesting_past_limit_is_cut() {
        let part = MessagePart::parse(&nested_multipart(1_000)).unwrap();
        let (last, depth) = deepest(&part);
        assert_eq!(depth, MAX_NESTING_DEPTH);
        assert!(last.is_multipart());
        assert!(last.children().is_empty());
        let boundary = format!("b{MAX_NESTING_DEPTH}");
        assert_eq!(last.content_type().boundary(), Some(boundary.as_str()));
    }

    #[test]
    fn test_two_part_multipart() {
        let part = MessagePart::parse(FRONTIER).unwrap();
        assert!(part.is_multipart());
        assert!(part.body().is_none());
        assert_eq!(part.children().len(), 2);

        let text = &part.children()[0];
        assert_eq!(text.content_type().media_type(), "text/plain");
        assert_eq!(text.body().unwrap(), b"This is the body of the message.");
        assert!(text.is_text());
        assert!(!text.is_attachment());

        let binary = &part.children()[1];
        assert_eq!(binary.content_transfer_encoding(), TransferEncoding::Base64);
        assert!(binary.body().unwrap().starts_with(b"<html>\n  <head>"));
        assert!(binary.is_attachment());
        assert_eq!(binary.file_name(), "(no name)");
    }

    #[test]
    fn test_quoted_printable_leaf() {
        let raw = b"Content-Transfer-Encoding: quoted-printable\r\n\r\nHello=\r\n";
        let part = MessagePart::parse(raw).unwrap();
        assert_eq!(part.body().unwrap(), b"Hello");
        assert_eq!(part.body_text().unwrap(), "Hello");
    }

    #[test]
    fn test_seven_bit_passthrough() {
        let part = MessagePart::parse(b"Subject: x\r\n\r\na=b\r\n").unwrap();
        assert_eq!(part.body().unwrap(), b"a=b\r\n");
        assert!(part.children().is_empty());
    }

    #[test]
    fn test_malformed_base64_body_kept() {
        let raw = b"Content-Transfer-Encoding: base64\r\n\r\n!!!not base64!!!";
        let part = MessagePart::parse(raw).unwrap();
        assert_eq!(part.body().unwrap(), b"!!!not base64!!!");
    }

    #[test]
    fn test_body_text_uses_charset() {
        let part = MessagePart::parse(
            b"Content-Type: text/plain; charset=iso-8859-1\r\n\
Content-Transfer-Encoding: quoted-printable\r\n\r\ncaf=E9",
        )
        .unwrap();
        assert_eq!(part.body().unwrap(), b"caf\xe9");
        assert_eq!(part.body_text().unwrap(), "café");
        assert_eq!(part.body_encoding().unwrap(), encoding_rs::WINDOWS_1252);
    }

    #[test]
    fn test_unknown_charset_body_text_falls_back() {
        let raw = b"Content-Type: text/plain; charset=x-nonsense\r\n\r\ncaf\xe9";
        let part = MessagePart::parse(raw).unwrap();
        assert!(part.body_encoding().is_err());
        assert_eq!(part.body_text().unwrap(), "café");
    }

    #[test]
    fn test_nested_multipart() {
        let raw = b"Content-Type: multipart/mixed; boundary=\"outer\"\r\n\r\n\
--outer\r\n\
Content-Type: multipart/alternative; boundary=\"inner\"\r\n\r\n\
--inner\r\n\
Content-Type: text/plain\r\n\r\n\
plain\r\n\
--inner\r\n\
Content-Type: text/html\r\n\r\n\
<p>html</p>\r\n\
--inner--\r\n\
--outer\r\n\
Content-Type: image/png\r\n\
Content-Disposition: attachment; filename=\"a.png\"\r\n\r\n\
PNG\r\n\
--outer--\r\n\
epilogue\r\n";

        let part = MessagePart::parse(raw).unwrap();
        assert_eq!(part.children().len(), 2);
        let alternative = &part.children()[0];
        assert!(alternative.is_multipart());
        assert_eq!(alternative.children().len(), 2);
        assert_eq!(alternative.children()[1].body().unwrap(), b"<p>html</p>");
        assert_eq!(part.children()[1].file_name(), "a.png");
        assert_eq!(part.children()[1].body().unwrap(), b"PNG");
    }

    #[test]
    fn test_missing_boundary_gives_no_children() {
        let part = MessagePart::parse(b"Content-Type: multipart/mixed\r\n\r\nstuff").unwrap();
        assert!(part.is_multipart());
        assert!(part.children().is_empty());

        let raw = b"Content-Type: multipart/mixed; boundary=x\r\n\r\nno delimiters";
        let part = MessagePart::parse(raw).unwrap();
        assert!(part.children().is_empty());
    }

    #[test]
    fn test_missing_closing_delimiter() {
        let parts = split_parts(b"--b\r\n\r\none\r\n--b\r\n\r\ntwo\r\n", "b");
        assert_eq!(parts, vec![&b"\r\none"[..], b"\r\ntwo"]);
    }

    #[test]
    fn test_boundary_trailing_whitespace_and_lf() {
        let parts = split_parts(b"--b  \n\nx\n--b-- \t\n", "b");
        assert_eq!(parts, vec![&b"\nx"[..]]);
    }

    #[test]
    fn test_empty_part_between_delimiters() {
        let parts = split_parts(b"--b\r\n--b\r\n\r\nx\r\n--b--", "b");
        assert_eq!(parts, vec![&b""[..], b"\r\nx"]);
    }

    #[test]
    fn test_boundary_prefix_is_not_delimiter() {
        let parts = split_parts(b"--b\r\n\r\n--bx not a delimiter\r\n--b--\r\n", "b");
        assert_eq!(parts, vec![&b"\r\n--bx not a delimiter"[..]]);
    }

    #[test]
    fn test_inline_disposition_is_not_attachment() {
        let part = MessagePart::parse(
            b"Content-Type: text/plain\r\nContent-Disposition: inline\r\n\r\nx",
        )
        .unwrap();
        assert!(!part.is_attachment());

        let part = MessagePart::parse(
            b"Content-Type: text/plain\r\nContent-Disposition: attachment; \
              filename=notes.txt\r\n\r\nx",
        )
        .unwrap();
        assert!(part.is_attachment());
        assert_eq!(part.file_name(), "notes.txt");
    }

    #[test]
    fn test_message_rfc822_is_text() {
        let raw = b"Content-Type: message/rfc822\r\n\r\nSubject: inner\r\n\r\nx";
        let part = MessagePart::parse(raw).unwrap();
        assert!(part.is_text());
        assert!(!part.is_attachment());
    }

    #[test]
    fn test_unknown_encoding_in_child_fails() {
        let raw = b"Content-Type: multipart/mixed; boundary=b\r\n\r\n\
--b\r\nContent-Transfer-Encoding: x-weird\r\n\r\nbody\r\n--b--\r\n";
        assert!(MessagePart::parse(raw).is_err());
    }

    #[test]
    fn test_save_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("body.bin");

        let part =
            MessagePart::parse(b"Content-Transfer-Encoding: base64\r\n\r\nAAEC/w==").unwrap();
        part.save_to_file(&path).unwrap();
        assert_eq!(fs::read(&path).unwrap(), vec![0, 1, 2, 255]);

        let multipart = MessagePart::parse(FRONTIER).unwrap();
        assert!(multipart.save_to_file(dir.path().join("none")).is_err());
    }
}
