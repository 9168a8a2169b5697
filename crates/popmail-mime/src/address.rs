//! Mail address header parsing.
//!
//! Handles `Display Name <user@domain>`, bare `user@domain`, name-only
//! values and comma-separated lists of those. Parsing never fails: anything
//! that does not reconcile with `user@domain` becomes a name-only address.

use std::fmt;

use crate::charset::CharsetResolver;
use crate::encoded_word;

/// A syntactically valid `local@domain` address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MailAddress {
    local: String,
    domain: String,
}

impl MailAddress {
    /// Parses `local@domain`, returning `None` if it is not a usable address.
    #[must_use]
    pub fn parse(addr: &str) -> Option<Self> {
        let addr = addr.trim();
        match Self::validate(addr) {
            Ok((local, domain)) => Some(Self {
                local: local.to_string(),
                domain: domain.to_string(),
            }),
            Err(reason) => {
                tracing::debug!(address = addr, reason, "rejected mail address");
                None
            }
        }
    }

    /// The part before `@`.
    #[must_use]
    pub fn local(&self) -> &str {
        &self.local
    }

    /// The part after `@`.
    #[must_use]
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// The full `local@domain` form.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}@{}", self.local, self.domain)
    }

    fn validate(addr: &str) -> Result<(&str, &str), &'static str> {
        let (local, domain) = addr.rsplit_once('@').ok_or("missing @")?;

        if local.is_empty() || domain.is_empty() {
            return Err("local and domain parts cannot be empty");
        }

        let quoted_local = local.len() >= 2 && local.starts_with('"') && local.ends_with('"');
        if !quoted_local {
            if local.contains(|c: char| c.is_whitespace() || "\"<>()[],;:\\@".contains(c)) {
                return Err("illegal character in local part");
            }
            if local.starts_with('.') || local.ends_with('.') || local.contains("..") {
                return Err("misplaced dot in local part");
            }
        }

        let literal = domain.starts_with('[') && domain.ends_with(']');
        if !literal {
            if !domain
                .chars()
                .all(|c| c.is_alphanumeric() || c == '-' || c == '.' || c == '_')
            {
                return Err("illegal character in domain");
            }
            if domain.starts_with('.') || domain.ends_with('.') || domain.contains("..") {
                return Err("misplaced dot in domain");
            }
        }

        Ok((local, domain))
    }
}

impl fmt::Display for MailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.local, self.domain)
    }
}

/// One address from an address header.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Address {
    /// Display name with encoded words decoded and quotes removed. May be empty.
    pub display_name: String,
    /// The address, if one could be recognised.
    pub mail_address: Option<MailAddress>,
    /// The text this address was parsed from.
    pub raw: String,
}

impl Address {
    /// Parses a single address using the global charset resolver.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        Self::parse_with(text, &CharsetResolver::global())
    }

    /// Parses a single address.
    ///
    /// The last `<...>` pair holds the address and the text before it is the
    /// display name. Without brackets, text containing `@` is taken as a bare
    /// address. Anything else is a display name only.
    #[must_use]
    pub fn parse_with(text: &str, resolver: &CharsetResolver) -> Self {
        let raw = text.trim();
        let decoded = encoded_word::decode(raw, resolver).unwrap_or_else(|e| {
            tracing::debug!(input = raw, error = %e, "address kept undecoded");
            raw.to_string()
        });

        if let Some(open) = decoded.rfind('<')
            && let Some(close) = decoded[open..].find('>').map(|i| open + i)
        {
            let name = unquote(&decoded[..open]);
            let inner = decoded[open + 1..close].trim();

            if inner.is_empty() {
                let display_name = if name.is_empty() { decoded.clone() } else { name };
                return Self::name_only(display_name, raw);
            }
            if let Some(mail_address) = MailAddress::parse(inner) {
                return Self {
                    display_name: name,
                    mail_address: Some(mail_address),
                    raw: raw.to_string(),
                };
            }
        } else if decoded.contains('@')
            && let Some(mail_address) = MailAddress::parse(&decoded)
        {
            return Self {
                display_name: String::new(),
                mail_address: Some(mail_address),
                raw: raw.to_string(),
            };
        }

        Self::name_only(decoded, raw)
    }

    /// Parses a comma-separated address list using the global charset resolver.
    #[must_use]
    pub fn parse_list(text: &str) -> Vec<Self> {
        Self::parse_list_with(text, &CharsetResolver::global())
    }

    /// Parses a comma-separated address list.
    ///
    /// Commas inside double quotes do not split. Every segment is kept,
    /// including name-only ones.
    #[must_use]
    pub fn parse_list_with(text: &str, resolver: &CharsetResolver) -> Vec<Self> {
        split_addresses(text)
            .into_iter()
            .map(|segment| Self::parse_with(segment, resolver))
            .collect()
    }

    /// Returns true if a mail address was recognised.
    #[must_use]
    pub const fn has_valid_address(&self) -> bool {
        self.mail_address.is_some()
    }

    fn name_only(display_name: String, raw: &str) -> Self {
        Self {
            display_name,
            mail_address: None,
            raw: raw.to_string(),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.mail_address {
            Some(addr) if self.display_name.is_empty() => write!(f, "{addr}"),
            Some(addr) => write!(f, "\"{}\" <{addr}>", self.display_name),
            None => write!(f, "{}", self.raw),
        }
    }
}

fn unquote(name: &str) -> String {
    let name = name.trim();
    name.strip_prefix('"')
        .and_then(|n| n.strip_suffix('"'))
        .unwrap_or(name)
        .trim()
        .to_string()
}

/// Splits on commas outside double quotes. The quote state flips on every `"`.
fn split_addresses(text: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;

    for (i, c) in text.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                segments.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    segments.push(&text[start..]);

    segments
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
    fn test_quoted_name_with_comma() {
        let addr = Address::parse("\"McDaniel, John\" <jmcdaniel@spam.teltronics.com>");
        assert_eq!(addr.display_name, "McDaniel, John");
        assert_eq!(
            addr.mail_address.as_ref().unwrap().address(),
            "jmcdaniel@spam.teltronics.com"
        );

        let list = Address::parse_list("\"McDaniel, John\" <jmcdaniel@spam.teltronics.com>");
        assert_eq!(list.len(), 1);
        assert_eq!(list[0], addr);
    }

    #[test]
    fn test_bare_address() {
        let addr = Address::parse("noreply@mail.eksperten.dk");
        assert!(addr.has_valid_address());
        assert_eq!(addr.display_name, "");
        let mail = addr.mail_address.unwrap();
        assert_eq!(mail.local(), "noreply");
        assert_eq!(mail.domain(), "mail.eksperten.dk");
    }

    #[test]
    fn test_name_only() {
        let addr = Address::parse("Eksperten mailrobot");
        assert!(!addr.has_valid_address());
        assert_eq!(addr.display_name, "Eksperten mailrobot");
        assert_eq!(addr.raw, "Eksperten mailrobot");
    }

    #[test]
    fn test_empty_brackets_degrade() {
        let addr = Address::parse("Undisclosed <>");
        assert!(!addr.has_valid_address());
        assert_eq!(addr.display_name, "Undisclosed");

        let addr = Address::parse("<>");
        assert!(!addr.has_valid_address());
        assert_eq!(addr.display_name, "<>");
    }

    #[test]
    fn test_invalid_address_degrades() {
        let addr = Address::parse("sqlmap-user@sourceforge.net.");
        assert!(!addr.has_valid_address());
        assert_eq!(addr.display_name, "sqlmap-user@sourceforge.net.");

        let addr = Address::parse("Bob <not an address>");
        assert!(!addr.has_valid_address());
    }

    #[test]
    fn test_only_brackets() {
        let addr = Address::parse("<user@example.com>");
        assert_eq!(addr.display_name, "");
        assert_eq!(addr.to_string(), "user@example.com");
    }

    #[test]
    fn test_last_bracket_pair_wins() {
        let addr = Address::parse("a <b> c <user@example.com>");
        assert_eq!(addr.mail_address.unwrap().address(), "user@example.com");
        assert_eq!(addr.display_name, "a <b> c");
    }

    #[test]
    fn test_encoded_display_name() {
        let addr = Address::parse("=?iso-8859-1?Q?Keld_J=F8rn_Simonsen?= <keld@dkuug.dk>");
        assert_eq!(addr.display_name, "Keld Jørn Simonsen");
        assert_eq!(addr.to_string(), "\"Keld Jørn Simonsen\" <keld@dkuug.dk>");
    }

    #[test]
    fn test_list_keeps_every_segment() {
        let list = Address::parse_list("a@example.com, Bob <bob@example.com>, Just A Name");
        assert_eq!(list.len(), 3);
        assert!(list[0].has_valid_address());
        assert_eq!(list[1].display_name, "Bob");
        assert!(!list[2].has_valid_address());
    }

    #[test]
    fn test_list_with_empty_input() {
        let list = Address::parse_list("");
        assert_eq!(list.len(), 1);
        assert!(!list[0].has_valid_address());
    }

    #[test]
    fn test_split_respects_quotes() {
        assert_eq!(split_addresses("\"a,b\" <x@y>, c"), vec!["\"a,b\" <x@y>", " c"]);
    }

    #[test]
    fn test_quoted_local_part() {
        assert!(MailAddress::parse("\"john doe\"@example.com").is_some());
        assert!(MailAddress::parse("john doe@example.com").is_none());
        assert!(MailAddress::parse("@example.com").is_none());
        assert!(MailAddress::parse("john@").is_none());
    }
}
