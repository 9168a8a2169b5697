//! POP3 status replies.

/// Status indicator of a reply line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// `+OK`
    Ok,
    /// `-ERR`
    Err,
}

/// A POP3 status line: `+OK text` or `-ERR text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Positive or negative.
    pub status: Status,
    /// Text after the status indicator.
    pub text: String,
}

impl Reply {
    /// Creates a new reply.
    #[must_use]
    pub fn new(status: Status, text: impl Into<String>) -> Self {
        Self {
            status,
            text: text.into(),
        }
    }

    /// Returns true for `+OK`.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self.status, Status::Ok)
    }

    /// Returns the RFC 2449 response code, if the text starts with one
    /// (e.g., `IN-USE` from `-ERR [IN-USE] ...`).
    #[must_use]
    pub fn response_code(&self) -> Option<&str> {
        let rest = self.text.strip_prefix('[')?;
        let end = rest.find(']')?;
        Some(&rest[..end])
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
    fn test_is_ok() {
        assert!(Reply::new(Status::Ok, "").is_ok());
        assert!(!Reply::new(Status::Err, "no such message").is_ok());
    }

    #[test]
    fn test_response_code() {
        let reply = Reply::new(Status::Err, "[IN-USE] mailbox locked");
        assert_eq!(reply.response_code(), Some("IN-USE"));
        assert_eq!(Reply::new(Status::Err, "plain text").response_code(), None);
        assert_eq!(Reply::new(Status::Err, "[unterminated").response_code(), None);
    }
}
