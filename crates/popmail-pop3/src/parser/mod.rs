//! POP3 response parser.
//!
//! Replies start with a status line (`+OK ...` or `-ERR ...`). Commands
//! that return data follow a positive status line with lines ending in a
//! lone `.`, where lines that start with `.` carry an extra stuffed dot.

use crate::error::{Error, Result};
use crate::types::{Capability, ListEntry, Reply, StatInfo, Status, UidlEntry};

/// Parses a status line.
///
/// Only the first character is checked: `+` is positive and `-` is
/// negative.
///
/// # Errors
///
/// Returns an error if the line is empty or starts with anything else.
pub fn parse_reply(line: &[u8]) -> Result<Reply> {
    let line = String::from_utf8_lossy(trim_line_end(line));

    let status = match line.as_bytes().first() {
        Some(b'+') => Status::Ok,
        Some(b'-') => Status::Err,
        Some(_) => return Err(Error::Protocol(format!("Malformed status line: {line}"))),
        None => return Err(Error::Protocol("Empty reply".into())),
    };

    let text = line
        .split_once(' ')
        .map_or("", |(_, rest)| rest)
        .trim()
        .to_string();

    Ok(Reply::new(status, text))
}

/// Returns true for the line that ends a multi-line response.
#[must_use]
pub fn is_terminator(line: &[u8]) -> bool {
    trim_line_end(line) == b"."
}

/// Removes the stuffed dot from a multi-line response line.
#[must_use]
pub fn unstuff(line: &[u8]) -> &[u8] {
    line.strip_prefix(b".").unwrap_or(line)
}

/// Strips a trailing `\r\n` or `\n`.
#[must_use]
pub fn trim_line_end(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Extracts the APOP timestamp (`<...>`, brackets included) from a greeting.
#[must_use]
pub fn apop_timestamp(greeting: &str) -> Option<&str> {
    let start = greeting.find('<')?;
    let end = greeting.rfind('>')?;
    (end > start + 1).then(|| &greeting[start..=end])
}

/// Parses the text of a positive `STAT` reply: `count size`.
///
/// # Errors
///
/// Returns an error if either number is missing or malformed.
pub fn parse_stat(text: &str) -> Result<StatInfo> {
    let mut parts = text.split_whitespace();
    let count = parse_number(parts.next(), "STAT", text)?;
    let size = parse_number(parts.next(), "STAT", text)?;
    Ok(StatInfo { count, size })
}

/// Parses a scan listing line: `message size`.
///
/// # Errors
///
/// Returns an error if either number is missing or malformed.
pub fn parse_list_entry(text: &str) -> Result<ListEntry> {
    let mut parts = text.split_whitespace();
    let message = parse_number(parts.next(), "LIST", text)?;
    let size = parse_number(parts.next(), "LIST", text)?;
    Ok(ListEntry { message, size })
}

/// Parses a unique-id listing line: `message uid`.
///
/// # Errors
///
/// Returns an error if the message number or the id is missing.
pub fn parse_uidl_entry(text: &str) -> Result<UidlEntry> {
    let mut parts = text.split_whitespace();
    let message = parse_number(parts.next(), "UIDL", text)?;
    let uid = parts
        .next()
        .ok_or_else(|| Error::Protocol(format!("Missing unique id in UIDL line: {text}")))?;
    Ok(UidlEntry {
        message,
        uid: uid.to_string(),
    })
}

/// Parses the body of a `CAPA` response.
#[must_use]
pub fn parse_capabilities(body: &[u8]) -> Vec<Capability> {
    String::from_utf8_lossy(body)
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(Capability::parse)
        .collect()
}

fn parse_number<T: std::str::FromStr>(field: Option<&str>, command: &str, text: &str) -> Result<T> {
    field
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| Error::Protocol(format!("Malformed {command} response: {text}")))
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
    fn test_parse_ok_reply() {
        let reply = parse_reply(b"+OK 2 messages (320 octets)\r\n").unwrap();
        assert!(reply.is_ok());
        assert_eq!(reply.text, "2 messages (320 octets)");
    }

    #[test]
    fn test_parse_err_reply() {
        let reply = parse_reply(b"-ERR no such message, only 2 messages in maildrop\r\n").unwrap();
        assert_eq!(reply.status, Status::Err);
        assert_eq!(reply.text, "no such message, only 2 messages in maildrop");
    }

    #[test]
    fn test_parse_bare_status() {
        let reply = parse_reply(b"+OK\r\n").unwrap();
        assert!(reply.is_ok());
        assert_eq!(reply.text, "");
    }

    #[test]
    fn test_parse_malformed_reply() {
        assert!(parse_reply(b"* OK imap\r\n").is_err());
        assert!(parse_reply(b"\r\n").is_err());
    }

    #[test]
    fn test_terminator_and_unstuff() {
        assert!(is_terminator(b".\r\n"));
        assert!(is_terminator(b"."));
        assert!(!is_terminator(b"..\r\n"));
        assert!(!is_terminator(b". \r\n"));

        assert_eq!(unstuff(b"..hidden"), b".hidden");
        assert_eq!(unstuff(b"plain"), b"plain");
    }

    #[test]
    fn test_apop_timestamp() {
        assert_eq!(
            apop_timestamp("POP3 server ready <1896.697170952@dbc.mtview.ca.us>"),
            Some("<1896.697170952@dbc.mtview.ca.us>")
        );
        assert_eq!(apop_timestamp("POP3 server ready"), None);
        assert_eq!(apop_timestamp("ready <>"), None);
    }

    #[test]
    fn test_parse_stat() {
        assert_eq!(parse_stat("2 320").unwrap(), StatInfo { count: 2, size: 320 });
        assert!(parse_stat("two").is_err());
    }

    #[test]
    fn test_parse_list_entry() {
        assert_eq!(
            parse_list_entry("1 120").unwrap(),
            ListEntry {
                message: 1,
                size: 120
            }
        );
        assert!(parse_list_entry("1").is_err());
    }

    #[test]
    fn test_parse_uidl_entry() {
        let entry = parse_uidl_entry("1 whqtswO00WBw418f9t5JxYwZ").unwrap();
        assert_eq!(entry.message, 1);
        assert_eq!(entry.uid, "whqtswO00WBw418f9t5JxYwZ");
        assert!(parse_uidl_entry("1").is_err());
    }

    #[test]
    fn test_parse_capabilities() {
        let caps = parse_capabilities(b"TOP\r\nUSER\r\nSASL CRAM-MD5\r\n\r\nUIDL\r\n");
        assert_eq!(caps.len(), 4);
        assert_eq!(caps[0], Capability::Top);
        assert_eq!(caps[2], Capability::Sasl(vec!["CRAM-MD5".to_string()]));
    }
}
