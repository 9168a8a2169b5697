//! Transaction state: maildrop listing, retrieval and deletion.

use popmail_mime::{Message, MessageHeader, ParserConfig, extract_headers};
use tokio::io::{AsyncRead, AsyncWrite};

use super::{Client, Transaction};
use crate::command::Command;
use crate::error::{Error, Result};
use crate::parser::{parse_list_entry, parse_stat, parse_uidl_entry};
use crate::types::{ListEntry, StatInfo, UidlEntry};

impl<S> Client<S, Transaction>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Returns the message count and maildrop size.
    pub async fn stat(&mut self) -> Result<StatInfo> {
        let reply = self.send(&Command::Stat).await?;
        parse_stat(&reply.text)
    }

    /// Returns the size of every message not marked as deleted.
    pub async fn list(&mut self) -> Result<Vec<ListEntry>> {
        let body = self.send_multiline(&Command::List(None)).await?;
        parse_listing(&body, parse_list_entry)
    }

    /// Returns the size of one message.
    pub async fn list_one(&mut self, message: u32) -> Result<ListEntry> {
        check_message_number(message)?;
        let reply = self.send(&Command::List(Some(message))).await?;
        parse_list_entry(&reply.text)
    }

    /// Returns the unique id of every message not marked as deleted.
    pub async fn uidl(&mut self) -> Result<Vec<UidlEntry>> {
        let body = self.send_multiline(&Command::Uidl(None)).await?;
        parse_listing(&body, parse_uidl_entry)
    }

    /// Returns the unique id of one message.
    pub async fn uidl_one(&mut self, message: u32) -> Result<UidlEntry> {
        check_message_number(message)?;
        let reply = self.send(&Command::Uidl(Some(message))).await?;
        parse_uidl_entry(&reply.text)
    }

    /// Retrieves a message as raw bytes, exactly as the server stores it.
    pub async fn retrieve_raw(&mut self, message: u32) -> Result<Vec<u8>> {
        check_message_number(message)?;
        self.send_multiline(&Command::Retr(message)).await
    }

    /// Retrieves and parses a message.
    pub async fn retrieve_message(&mut self, message: u32) -> Result<Message> {
        self.retrieve_message_with(message, &ParserConfig::default())
            .await
    }

    /// Retrieves and parses a message with a custom parser configuration.
    pub async fn retrieve_message_with(
        &mut self,
        message: u32,
        config: &ParserConfig,
    ) -> Result<Message> {
        let raw = self.retrieve_raw(message).await?;
        Ok(Message::load_with(raw, config)?)
    }

    /// Retrieves the headers and the first `lines` body lines of a message.
    pub async fn top(&mut self, message: u32, lines: u32) -> Result<Vec<u8>> {
        check_message_number(message)?;
        self.send_multiline(&Command::Top { message, lines }).await
    }

    /// Retrieves and parses only the headers of a message, via `TOP n 0`.
    pub async fn retrieve_header(&mut self, message: u32) -> Result<MessageHeader> {
        self.retrieve_header_with(message, &ParserConfig::default())
            .await
    }

    /// Retrieves and parses only the headers of a message with a custom
    /// parser configuration.
    pub async fn retrieve_header_with(
        &mut self,
        message: u32,
        config: &ParserConfig,
    ) -> Result<MessageHeader> {
        let raw = self.top(message, 0).await?;
        let (header_text, _) = extract_headers(&raw);
        Ok(MessageHeader::parse_with(&header_text, config)?)
    }

    /// Marks a message as deleted. The deletion takes effect on [`Client::quit`].
    pub async fn delete(&mut self, message: u32) -> Result<()> {
        check_message_number(message)?;
        self.send(&Command::Dele(message)).await?;
        tracing::debug!(message, "marked message as deleted");
        Ok(())
    }

    /// Keeps the connection alive.
    pub async fn noop(&mut self) -> Result<()> {
        self.send(&Command::Noop).await?;
        Ok(())
    }

    /// Unmarks every message marked as deleted in this session.
    pub async fn reset(&mut self) -> Result<()> {
        self.send(&Command::Rset).await?;
        Ok(())
    }
}

fn check_message_number(message: u32) -> Result<()> {
    if message == 0 {
        return Err(Error::InvalidMessageNumber(message));
    }
    Ok(())
}

/// Parses each non-empty line of a listing body.
fn parse_listing<T>(body: &[u8], parse: impl Fn(&str) -> Result<T>) -> Result<Vec<T>> {
    String::from_utf8_lossy(body)
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(parse)
        .collect()
}
