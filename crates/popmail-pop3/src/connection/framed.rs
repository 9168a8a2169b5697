//! Framed I/O for the POP3 protocol.
//!
//! POP3 is line-oriented: status lines and multi-line bodies are both
//! CRLF-terminated, and a multi-line body ends with a lone `.`.

use std::io;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use crate::error::{Error, Result};
use crate::parser::{is_terminator, trim_line_end, unstuff};

/// Default buffer size for reading.
const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Maximum line length to prevent memory exhaustion.
const MAX_LINE_LENGTH: usize = 1024 * 1024; // 1 MB

/// Maximum multi-line body size to prevent memory exhaustion.
const MAX_BODY_SIZE: usize = 256 * 1024 * 1024; // 256 MB

/// Buffered, line-framed connection with a per-operation timeout.
pub struct FramedStream<S> {
    reader: BufReader<S>,
    io_timeout: Duration,
}

impl<S> FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new framed stream.
    pub fn new(stream: S, io_timeout: Duration) -> Self {
        Self {
            reader: BufReader::with_capacity(DEFAULT_BUFFER_SIZE, stream),
            io_timeout,
        }
    }

    /// Sets the per-operation timeout.
    pub const fn set_io_timeout(&mut self, io_timeout: Duration) {
        self.io_timeout = io_timeout;
    }

    /// Reads one line, terminator included.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure, end of stream, an over-long line, or timeout.
    pub async fn read_line(&mut self) -> Result<Vec<u8>> {
        let timeout = self.io_timeout;
        tokio::time::timeout(timeout, self.read_line_inner())
            .await
            .map_err(|_| Error::Timeout(timeout))?
    }

    /// Reads a dot-terminated body. Stuffed dots are removed and every line
    /// ends with CRLF.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure, end of stream, an over-long body, or timeout.
    pub async fn read_multiline(&mut self) -> Result<Vec<u8>> {
        let timeout = self.io_timeout;
        tokio::time::timeout(timeout, self.read_multiline_inner())
            .await
            .map_err(|_| Error::Timeout(timeout))?
    }

    /// Writes a serialized command and flushes.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure or timeout.
    pub async fn write_command(&mut self, data: &[u8]) -> Result<()> {
        let timeout = self.io_timeout;
        let stream = self.reader.get_mut();
        let write = async {
            stream.write_all(data).await?;
            stream.flush().await
        };
        tokio::time::timeout(timeout, write)
            .await
            .map_err(|_| Error::Timeout(timeout))??;
        Ok(())
    }

    async fn read_line_inner(&mut self) -> Result<Vec<u8>> {
        let mut line = Vec::new();

        loop {
            let buf = self.reader.fill_buf().await?;
            if buf.is_empty() {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed",
                )));
            }

            if let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                line.extend_from_slice(&buf[..=pos]);
                self.reader.consume(pos + 1);
                return Ok(line);
            }

            let len = buf.len();
            line.extend_from_slice(buf);
            self.reader.consume(len);

            if line.len() > MAX_LINE_LENGTH {
                return Err(Error::Protocol("line too long".to_string()));
            }
        }
    }

    async fn read_multiline_inner(&mut self) -> Result<Vec<u8>> {
        let mut body = Vec::new();

        loop {
            let line = self.read_line_inner().await?;
            if is_terminator(&line) {
                return Ok(body);
            }

            body.extend_from_slice(unstuff(trim_line_end(&line)));
            body.extend_from_slice(b"\r\n");

            if body.len() > MAX_BODY_SIZE {
                return Err(Error::Protocol(format!(
                    "response body too large (max {MAX_BODY_SIZE} bytes)"
                )));
            }
        }
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

    fn framed(server: &[u8]) -> FramedStream<tokio_test::io::Mock> {
        let mock = tokio_test::io::Builder::new().read(server).build();
        FramedStream::new(mock, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_read_line() {
        let mut stream = framed(b"+OK ready\r\n+OK second\n");
        assert_eq!(stream.read_line().await.unwrap(), b"+OK ready\r\n");
        assert_eq!(stream.read_line().await.unwrap(), b"+OK second\n");
    }

    #[tokio::test]
    async fn test_read_line_eof() {
        let mut stream = framed(b"+OK trunc");
        assert!(matches!(stream.read_line().await, Err(Error::Io(_))));
    }

    #[tokio::test]
    async fn test_read_multiline_unstuffs() {
        let mut stream = framed(b"Subject: x\r\n\r\n..dotted\r\nplain\n.\r\n+OK next\r\n");
        assert_eq!(
            stream.read_multiline().await.unwrap(),
            b"Subject: x\r\n\r\n.dotted\r\nplain\r\n"
        );
        assert_eq!(stream.read_line().await.unwrap(), b"+OK next\r\n");
    }

    #[tokio::test]
    async fn test_read_multiline_empty() {
        let mut stream = framed(b".\r\n");
        assert!(stream.read_multiline().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_write_command() {
        let mock = tokio_test::io::Builder::new().write(b"STAT\r\n").build();
        let mut stream = FramedStream::new(mock, Duration::from_secs(5));
        stream.write_command(b"STAT\r\n").await.unwrap();
    }
}
