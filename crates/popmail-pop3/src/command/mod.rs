//! POP3 command builder.

use std::fmt::Write;

use md5::{Digest, Md5};

/// POP3 command (RFC 1939, RFC 2449).
#[derive(Clone, PartialEq, Eq)]
pub enum Command {
    /// USER - Name the maildrop
    User {
        /// Mailbox name
        name: String,
    },
    /// PASS - Password for the named maildrop
    Pass {
        /// Password
        password: String,
    },
    /// APOP - Digest login
    Apop {
        /// Mailbox name
        name: String,
        /// Lowercase hex MD5 of greeting timestamp and secret
        digest: String,
    },
    /// STAT - Maildrop size
    Stat,
    /// LIST - Scan listing for one or all messages
    List(Option<u32>),
    /// UIDL - Unique-id listing for one or all messages
    Uidl(Option<u32>),
    /// RETR - Retrieve a message
    Retr(u32),
    /// TOP - Headers plus the first lines of the body
    Top {
        /// Message number
        message: u32,
        /// Body lines to include
        lines: u32,
    },
    /// DELE - Mark a message as deleted
    Dele(u32),
    /// NOOP - No operation
    Noop,
    /// RSET - Unmark deleted messages
    Rset,
    /// CAPA - List capabilities
    Capa,
    /// QUIT - Commit deletions and close
    Quit,
}

impl Command {
    /// Builds an APOP command from the greeting timestamp and the shared secret.
    #[must_use]
    pub fn apop(name: impl Into<String>, timestamp: &str, secret: &str) -> Self {
        Self::Apop {
            name: name.into(),
            digest: apop_digest(timestamp, secret),
        }
    }

    /// Returns the command keyword.
    #[must_use]
    pub const fn verb(&self) -> &'static str {
        match self {
            Self::User { .. } => "USER",
            Self::Pass { .. } => "PASS",
            Self::Apop { .. } => "APOP",
            Self::Stat => "STAT",
            Self::List(_) => "LIST",
            Self::Uidl(_) => "UIDL",
            Self::Retr(_) => "RETR",
            Self::Top { .. } => "TOP",
            Self::Dele(_) => "DELE",
            Self::Noop => "NOOP",
            Self::Rset => "RSET",
            Self::Capa => "CAPA",
            Self::Quit => "QUIT",
        }
    }

    /// Returns true if a successful reply is followed by a dot-terminated body.
    #[must_use]
    pub const fn is_multiline(&self) -> bool {
        matches!(
            self,
            Self::List(None) | Self::Uidl(None) | Self::Retr(_) | Self::Top { .. } | Self::Capa
        )
    }

    /// Serializes the command to bytes.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut line = String::from(self.verb());

        match self {
            Self::User { name } => {
                line.push(' ');
                line.push_str(name);
            }
            Self::Pass { password } => {
                line.push(' ');
                line.push_str(password);
            }
            Self::Apop { name, digest } => {
                let _ = write!(line, " {name} {digest}");
            }
            Self::List(Some(n)) | Self::Uidl(Some(n)) | Self::Retr(n) | Self::Dele(n) => {
                let _ = write!(line, " {n}");
            }
            Self::Top { message, lines } => {
                let _ = write!(line, " {message} {lines}");
            }
            Self::Stat
            | Self::List(None)
            | Self::Uidl(None)
            | Self::Noop
            | Self::Rset
            | Self::Capa
            | Self::Quit => {}
        }

        line.push_str("\r\n");
        line.into_bytes()
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pass { .. } => f.write_str("Pass { password: \"***\" }"),
            Self::Apop { name, .. } => f
                .debug_struct("Apop")
                .field("name", name)
                .finish_non_exhaustive(),
            other => {
                let line = other.serialize();
                let text = String::from_utf8_lossy(&line);
                f.write_str(text.trim_end())
            }
        }
    }
}

/// Computes the APOP digest: MD5 over `timestamp` followed by `secret`,
/// rendered as lowercase hex.
#[must_use]
pub fn apop_digest(timestamp: &str, secret: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(timestamp.as_bytes());
    hasher.update(secret.as_bytes());

    hasher
        .finalize()
        .iter()
        .fold(String::with_capacity(32), |mut hex, byte| {
            let _ = write!(hex, "{byte:02x}");
            hex
        })
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
    fn test_user_pass() {
        let cmd = Command::User {
            name: "mrose".to_string(),
        };
        assert_eq!(cmd.serialize(), b"USER mrose\r\n");

        let cmd = Command::Pass {
            password: "secret".to_string(),
        };
        assert_eq!(cmd.serialize(), b"PASS secret\r\n");
    }

    #[test]
    fn test_apop_rfc1939_example() {
        let cmd = Command::apop("mrose", "<1896.697170952@dbc.mtview.ca.us>", "tanstaaf");
        assert_eq!(
            cmd.serialize(),
            b"APOP mrose c4c9334bac560ecc979e58001b3e22fb\r\n"
        );
    }

    #[test]
    fn test_listing_commands() {
        assert_eq!(Command::Stat.serialize(), b"STAT\r\n");
        assert_eq!(Command::List(None).serialize(), b"LIST\r\n");
        assert_eq!(Command::List(Some(2)).serialize(), b"LIST 2\r\n");
        assert_eq!(Command::Uidl(None).serialize(), b"UIDL\r\n");
        assert_eq!(Command::Uidl(Some(7)).serialize(), b"UIDL 7\r\n");
    }

    #[test]
    fn test_message_commands() {
        assert_eq!(Command::Retr(1).serialize(), b"RETR 1\r\n");
        assert_eq!(Command::Dele(3).serialize(), b"DELE 3\r\n");
        assert_eq!(
            Command::Top {
                message: 4,
                lines: 0
            }
            .serialize(),
            b"TOP 4 0\r\n"
        );
    }

    #[test]
    fn test_session_commands() {
        assert_eq!(Command::Noop.serialize(), b"NOOP\r\n");
        assert_eq!(Command::Rset.serialize(), b"RSET\r\n");
        assert_eq!(Command::Capa.serialize(), b"CAPA\r\n");
        assert_eq!(Command::Quit.serialize(), b"QUIT\r\n");
    }

    #[test]
    fn test_is_multiline() {
        assert!(Command::List(None).is_multiline());
        assert!(!Command::List(Some(1)).is_multiline());
        assert!(Command::Retr(1).is_multiline());
        assert!(Command::Capa.is_multiline());
        assert!(!Command::Stat.is_multiline());
    }

    #[test]
    fn test_debug_hides_password() {
        let cmd = Command::Pass {
            password: "hunter2".to_string(),
        };
        assert!(!format!("{cmd:?}").contains("hunter2"));

        let cmd = Command::apop("mrose", "<1@x>", "tanstaaf");
        assert!(!format!("{cmd:?}").contains(&apop_digest("<1@x>", "tanstaaf")));
        assert_eq!(format!("{:?}", Command::Retr(5)), "RETR 5");
    }
}
