//! POP3 capabilities (RFC 2449).

/// A capability line from a `CAPA` listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Capability {
    /// TOP command
    Top,
    /// USER/PASS login
    User,
    /// UIDL command
    Uidl,
    /// SASL mechanisms
    Sasl(Vec<String>),
    /// Extended response codes
    RespCodes,
    /// Minimum seconds between logins
    LoginDelay(Option<u64>),
    /// Command pipelining
    Pipelining,
    /// Server retention policy, in days or `NEVER`
    Expire(String),
    /// Server implementation string
    Implementation(String),
    /// STLS command
    Stls,
    /// Unknown capability
    Unknown(String),
}

impl Capability {
    /// Parses one capability line. Names are case-insensitive.
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let mut parts = line.split_whitespace();
        let Some(keyword) = parts.next() else {
            return Self::Unknown(line.to_string());
        };
        let rest = || line.trim_start()[keyword.len()..].trim().to_string();

        match keyword.to_ascii_uppercase().as_str() {
            "TOP" => Self::Top,
            "USER" => Self::User,
            "UIDL" => Self::Uidl,
            "SASL" => Self::Sasl(parts.map(str::to_string).collect()),
            "RESP-CODES" => Self::RespCodes,
            "LOGIN-DELAY" => Self::LoginDelay(parts.next().and_then(|s| s.parse().ok())),
            "PIPELINING" => Self::Pipelining,
            "EXPIRE" => Self::Expire(rest()),
            "IMPLEMENTATION" => Self::Implementation(rest()),
            "STLS" => Self::Stls,
            _ => Self::Unknown(line.trim().to_string()),
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

    #[test]
    fn test_simple_capabilities() {
        assert_eq!(Capability::parse("TOP"), Capability::Top);
        assert_eq!(Capability::parse("user"), Capability::User);
        assert_eq!(Capability::parse("UIDL"), Capability::Uidl);
        assert_eq!(Capability::parse("RESP-CODES"), Capability::RespCodes);
        assert_eq!(Capability::parse("PIPELINING"), Capability::Pipelining);
        assert_eq!(Capability::parse("STLS"), Capability::Stls);
    }

    #[test]
    fn test_capabilities_with_arguments() {
        assert_eq!(
            Capability::parse("SASL CRAM-MD5 KERBEROS_V4"),
            Capability::Sasl(vec!["CRAM-MD5".to_string(), "KERBEROS_V4".to_string()])
        );
        assert_eq!(
            Capability::parse("LOGIN-DELAY 900"),
            Capability::LoginDelay(Some(900))
        );
        assert_eq!(Capability::parse("EXPIRE 60"), Capability::Expire("60".to_string()));
        assert_eq!(
            Capability::parse("IMPLEMENTATION Shlemazle-Plotz-v302"),
            Capability::Implementation("Shlemazle-Plotz-v302".to_string())
        );
    }

    #[test]
    fn test_unknown_capability() {
        assert_eq!(
            Capability::parse("X-VENDOR thing"),
            Capability::Unknown("X-VENDOR thing".to_string())
        );
        assert_eq!(Capability::parse(""), Capability::Unknown(String::new()));
    }
}
