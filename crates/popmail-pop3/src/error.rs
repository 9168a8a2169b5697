//! Error types for POP3 operations.

use std::io;
use std::time::Duration;

/// Result type alias for POP3 operations.
pub type Result<T> = std::result::Result<T, Error>;

/// POP3 error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TLS error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Invalid DNS name for TLS.
    #[error("Invalid DNS name: {0}")]
    InvalidDnsName(#[from] rustls::pki_types::InvalidDnsNameError),

    /// A server address or `pop3://` URL could not be understood.
    #[error("Invalid server address: {0}")]
    InvalidAddress(String),

    /// Server answered `-ERR`.
    #[error("{command} rejected: {message}")]
    Server {
        /// Command verb that was rejected (e.g., `RETR`).
        command: String,
        /// Text after `-ERR`.
        message: String,
    },

    /// Login refused because the maildrop is locked or in use.
    #[error("Maildrop locked: {0}")]
    MailboxLocked(String),

    /// Login refused because the previous login was too recent.
    #[error("Login delay in effect: {0}")]
    LoginDelay(String),

    /// Protocol error (unexpected response).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The retrieved message could not be decoded.
    #[error("MIME error: {0}")]
    Mime(#[from] popmail_mime::Error),

    /// Message numbers start at 1.
    #[error("Invalid message number: {0}")]
    InvalidMessageNumber(u32),

    /// Feature not supported by server.
    #[error("Server does not support {0}")]
    NotSupported(String),

    /// Operation timed out.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),
}

impl Error {
    /// Creates a server error for a rejected command.
    #[must_use]
    pub fn server(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Server {
            command: command.into(),
            message: message.into(),
        }
    }

    /// Narrows a rejected login to a more specific error when the server
    /// says why (RFC 2449 response codes or a "lock" hint).
    #[must_use]
    pub fn classify_login(self) -> Self {
        let Self::Server { message, command } = self else {
            return self;
        };
        let upper = message.to_ascii_uppercase();
        if upper.contains("[IN-USE]") || upper.contains("LOCK") {
            Self::MailboxLocked(message)
        } else if upper.contains("[LOGIN-DELAY]") {
            Self::LoginDelay(message)
        } else {
            Self::Server { command, message }
        }
    }

    /// Returns true if the server answered `-ERR`.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Server { .. } | Self::MailboxLocked(_) | Self::LoginDelay(_)
        )
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

    #[test]
    fn test_classify_login() {
        let err = Error::server("PASS", "[IN-USE] Do you have another POP session running?");
        assert!(matches!(err.classify_login(), Error::MailboxLocked(_)));

        let err = Error::server("PASS", "unable to lock maildrop");
        assert!(matches!(err.classify_login(), Error::MailboxLocked(_)));

        let err = Error::server("APOP", "[LOGIN-DELAY] wait 15 minutes");
        assert!(matches!(err.classify_login(), Error::LoginDelay(_)));

        let err = Error::server("PASS", "invalid password");
        assert!(matches!(err.classify_login(), Error::Server { .. }));
    }

    #[test]
    fn test_display() {
        let err = Error::server("RETR", "no such message");
        assert_eq!(err.to_string(), "RETR rejected: no such message");
        assert!(err.is_server_error());
        assert!(!Error::Protocol("x".into()).is_server_error());
    }
}
