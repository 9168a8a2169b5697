//! MIME message structure and handling.

use std::fs;
use std::path::Path;

use crate::config::ParserConfig;
use crate::error::Result;
use crate::header::MessageHeader;
use crate::part::MessagePart;
use crate::traverse;

/// A parsed message together with the exact bytes it was parsed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    raw: Vec<u8>,
    root: MessagePart,
}

impl Message {
    /// Parses a raw message with the default configuration.
    ///
    /// # Errors
    ///
    /// See [`Message::load_with`].
    pub fn load(raw: impl Into<Vec<u8>>) -> Result<Self> {
        Self::load_with(raw, &ParserConfig::default())
    }

    /// Parses a raw message, as returned by a POP3 `RETR`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnknownTransferEncoding`] if the message or
    /// one of its parts declares a transfer encoding that cannot be decoded.
    pub fn load_with(raw: impl Into<Vec<u8>>, config: &ParserConfig) -> Result<Self> {
        let raw = raw.into();
        let root = MessagePart::parse_with(&raw, config)?;
        tracing::debug!(
            len = raw.len(),
            media_type = %root.content_type().media_type(),
            "loaded message"
        );
        Ok(Self { raw, root })
    }

    /// Reads and parses a message saved with [`Message::save`].
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the message cannot be parsed.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::load(fs::read(path)?)
    }

    /// Writes the original bytes to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, &self.raw)?;
        Ok(())
    }

    /// The bytes this message was parsed from.
    #[must_use]
    pub fn raw_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// The top-level headers.
    #[must_use]
    pub const fn header(&self) -> &MessageHeader {
        self.root.header()
    }

    /// The top-level body part.
    #[must_use]
    pub const fn message_part(&self) -> &MessagePart {
        &self.root
    }

    /// The first `text/plain` leaf.
    #[must_use]
    pub fn find_first_plain_text_version(&self) -> Option<&MessagePart> {
        self.find_first_message_part_with_media_type("text/plain")
    }

    /// The first `text/html` leaf.
    #[must_use]
    pub fn find_first_html_version(&self) -> Option<&MessagePart> {
        self.find_first_message_part_with_media_type("text/html")
    }

    /// Every text leaf, in order.
    #[must_use]
    pub fn find_all_text_versions(&self) -> Vec<&MessagePart> {
        traverse::find_all_text(&self.root)
    }

    /// Every attachment leaf, in order.
    #[must_use]
    pub fn find_all_attachments(&self) -> Vec<&MessagePart> {
        traverse::find_all_attachments(&self.root)
    }

    /// The first part, containers included, with the given media type,
    /// ignoring case.
    #[must_use]
    pub fn find_first_message_part_with_media_type(
        &self,
        media_type: &str,
    ) -> Option<&MessagePart> {
        traverse::find_first_with_media_type(&self.root, media_type)
    }

    /// Every part, containers included, with the given media type, in
    /// pre-order, ignoring case.
    #[must_use]
    pub fn find_all_message_parts_with_media_type(
        &self,
        media_type: &str,
    ) -> Vec<&MessagePart> {
        traverse::find_all_with_media_type(&self.root, media_type)
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

    const ALTERNATIVE: &[u8] = b"From: sender@example.com\r\n\
To: recipient@example.com\r\n\
Subject: Test\r\n\
Content-Type: multipart/alternative; boundary=\"alt\"\r\n\
\r\n\
--alt\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
Hello, World!\r\n\
--alt\r\n\
Content-Type: text/html; charset=utf-8\r\n\
\r\n\
<b>Hello, World!</b>\r\n\
--alt--\r\n";

    #[test]
    fn test_single_part() {
        let raw = b"From: sender@example.com\r\nSubject: Test\r\n\r\nHello, World!";
        let message = Message::load(&raw[..]).unwrap();
        assert_eq!(
            message.header().from.as_ref().unwrap().mail_address.as_ref().unwrap().address(),
            "sender@example.com"
        );
        assert_eq!(message.header().subject.as_deref(), Some("Test"));
        assert_eq!(message.message_part().body_text().unwrap(), "Hello, World!");
    }

    #[test]
    fn test_text_and_html_versions() {
        let message = Message::load(ALTERNATIVE).unwrap();
        assert_eq!(
            message.find_first_plain_text_version().unwrap().body_text().unwrap(),
            "Hello, World!"
        );
        assert_eq!(
            message.find_first_html_version().unwrap().body_text().unwrap(),
            "<b>Hello, World!</b>"
        );
        assert_eq!(message.find_all_text_versions().len(), 2);
        assert!(message.find_all_attachments().is_empty());
        assert_eq!(message.find_all_message_parts_with_media_type("TEXT/HTML").len(), 1);
    }

    #[test]
    fn test_raw_bytes_kept() {
        let message = Message::load(ALTERNATIVE.to_vec()).unwrap();
        assert_eq!(message.raw_bytes(), ALTERNATIVE);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("message.eml");

        let message = Message::load(ALTERNATIVE).unwrap();
        message.save(&path).unwrap();
        assert_eq!(fs::read(&path).unwrap(), ALTERNATIVE);

        let loaded = Message::load_from_file(&path).unwrap();
        assert_eq!(loaded, message);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Message::load_from_file(dir.path().join("missing.eml")).is_err());
    }
}
