//! Error types for MIME decoding.
//!
//! Only input that would silently produce wrong bytes or wrong instants is
//! reported here. Everything else degrades to a default inside the parser.

use std::io;

/// Result type alias for MIME operations.
pub type Result<T> = std::result::Result<T, Error>;

/// MIME error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// RFC 2047 encoding letter other than `Q` or `B`.
    #[error("Unrecognized encoded-word encoding: {0}")]
    UnrecognizedEncoding(String),

    /// Unknown `Content-Transfer-Encoding` token.
    #[error("Unknown content transfer encoding: {0}")]
    UnknownTransferEncoding(String),

    /// Charset name that neither the mapping table nor the fallback hook could resolve.
    #[error("Unknown character set: {0}")]
    UnknownCharset(String),

    /// A date was located but one of its fields is out of range.
    #[error("Invalid date {input:?}: {reason}")]
    InvalidDate {
        /// The text handed to the date parser.
        input: String,
        /// Which field failed.
        reason: String,
    },

    /// Base64 decode error.
    #[error("Base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    /// Invalid content type.
    #[error("Invalid content type: {0}")]
    InvalidContentType(String),

    /// Invalid content disposition.
    #[error("Invalid content disposition: {0}")]
    InvalidDisposition(String),

    /// I/O error while saving or loading a message.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Creates an [`Error::InvalidDate`].
    #[must_use]
    pub fn invalid_date(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDate {
            input: input.into(),
            reason: reason.into(),
        }
    }
}
