//! Where a maildrop lives and how to reach it.
//!
//! A [`Config`] is built from a host name, through [`ConfigBuilder`], or
//! parsed from a `pop3://` / `pop3s://` URL:
//!
//! ```
//! use popmail_pop3::{Config, Security};
//!
//! let config: Config = "pop3s://pop.example.com".parse().unwrap();
//! assert_eq!(config.security, Security::Implicit);
//! assert_eq!(config.address(), "pop.example.com:995");
//! ```

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use rustls::pki_types::ServerName;

use crate::error::{Error, Result};

/// Transport security for the session.
///
/// `STLS` upgrades are not offered; a session is either TLS from the first
/// byte or plaintext throughout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Security {
    /// Plaintext on port 110. Credentials cross the wire readable.
    None,
    /// TLS from the first byte, port 995.
    #[default]
    Implicit,
}

impl Security {
    /// The well-known port for this mode.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::None => crate::POP3_PORT,
            Self::Implicit => crate::POP3S_PORT,
        }
    }

    /// Returns true if the session runs over TLS.
    #[must_use]
    pub const fn is_tls(self) -> bool {
        matches!(self, Self::Implicit)
    }

    /// URL scheme for this mode.
    #[must_use]
    pub const fn scheme(self) -> &'static str {
        match self {
            Self::None => "pop3",
            Self::Implicit => "pop3s",
        }
    }

    /// `pop3`/`pop` are plaintext, `pop3s`/`pops` are TLS. Case-insensitive.
    fn from_scheme(scheme: &str) -> Option<Self> {
        match scheme.to_ascii_lowercase().as_str() {
            "pop3" | "pop" => Some(Self::None),
            "pop3s" | "pops" => Some(Self::Implicit),
            _ => None,
        }
    }
}

/// How to reach one POP3 server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Host name or IP literal, without brackets.
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// Transport security.
    pub security: Security,
    /// Bound on TCP connect plus TLS handshake.
    pub connect_timeout: Duration,
    /// Bound on each read or write once connected.
    pub io_timeout: Duration,
}

impl Config {
    /// Default bound on connecting.
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
    /// Default bound on each read or write.
    pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(60);

    /// Implicit TLS on port 995 with default timeouts.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self::with_security(host, Security::Implicit)
    }

    /// Plaintext on port 110 with default timeouts.
    #[must_use]
    pub fn plain(host: impl Into<String>) -> Self {
        Self::with_security(host, Security::None)
    }

    fn with_security(host: impl Into<String>, security: Security) -> Self {
        Self {
            host: host.into(),
            port: security.default_port(),
            security,
            connect_timeout: Self::DEFAULT_CONNECT_TIMEOUT,
            io_timeout: Self::DEFAULT_IO_TIMEOUT,
        }
    }

    /// Starts a builder for `host`.
    #[must_use]
    pub fn builder(host: impl Into<String>) -> ConfigBuilder {
        ConfigBuilder::new(host)
    }

    /// The `host:port` pair to dial. IPv6 literals are bracketed.
    #[must_use]
    pub fn address(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// The name checked against the server certificate.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDnsName`] if the host is neither a valid DNS
    /// name nor an IP address.
    pub fn server_name(&self) -> Result<ServerName<'static>> {
        Ok(ServerName::try_from(self.host.clone())?)
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.security.scheme(), self.address())
    }
}

impl FromStr for Config {
    type Err = Error;

    /// Parses `scheme://[userinfo@]host[:port][/...]`.
    ///
    /// Userinfo and path are accepted and dropped; credentials are passed to
    /// `login` or `apop` instead.
    fn from_str(url: &str) -> Result<Self> {
        let invalid = || Error::InvalidAddress(url.to_string());

        let (scheme, rest) = url.trim().split_once("://").ok_or_else(invalid)?;
        let security = Security::from_scheme(scheme).ok_or_else(invalid)?;

        let authority = rest.split(['/', '?']).next().unwrap_or(rest);
        let authority = authority.rsplit_once('@').map_or(authority, |(_, host)| host);
        let (host, port) = split_host_port(authority).ok_or_else(invalid)?;
        if host.is_empty() {
            return Err(invalid());
        }

        let mut config = Self::with_security(host, security);
        if let Some(port) = port {
            config.port = port;
        }
        Ok(config)
    }
}

/// Splits `host[:port]` or `[v6]:port`. `None` on a malformed port or an
/// unbracketed IPv6 literal.
fn split_host_port(authority: &str) -> Option<(&str, Option<u16>)> {
    if let Some(bracketed) = authority.strip_prefix('[') {
        let (host, tail) = bracketed.split_once(']')?;
        let port = match tail {
            "" => None,
            tail => Some(tail.strip_prefix(':')?.parse().ok()?),
        };
        return Some((host, port));
    }

    match authority.split_once(':') {
        Some((_, port)) if port.contains(':') => None,
        Some((host, port)) => Some((host, Some(port.parse().ok()?))),
        None => Some((authority, None)),
    }
}

/// Builder for [`Config`].
///
/// The port follows the security mode unless set explicitly, in either
/// order.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
    port: Option<u16>,
}

impl ConfigBuilder {
    /// Starts from implicit TLS and default timeouts.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            config: Config::new(host),
            port: None,
        }
    }

    /// Overrides the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the security mode.
    #[must_use]
    pub const fn security(mut self, security: Security) -> Self {
        self.config.security = security;
        self
    }

    /// Sets the connect timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Sets the per-operation I/O timeout.
    #[must_use]
    pub const fn io_timeout(mut self, timeout: Duration) -> Self {
        self.config.io_timeout = timeout;
        self
    }

    /// Finishes the configuration.
    #[must_use]
    pub fn build(self) -> Config {
        let mut config = self.config;
        config.port = self.port.unwrap_or_else(|| config.security.default_port());
        config
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
    fn test_security_modes() {
        assert_eq!(Security::None.default_port(), 110);
        assert_eq!(Security::Implicit.default_port(), 995);
        assert!(Security::Implicit.is_tls());
        assert!(!Security::None.is_tls());
        assert_eq!(Security::default(), Security::Implicit);
    }

    #[test]
    fn test_new_and_plain() {
        let config = Config::new("pop.example.com");
        assert_eq!(config.port, 995);
        assert_eq!(config.security, Security::Implicit);
        assert_eq!(config.io_timeout, Config::DEFAULT_IO_TIMEOUT);
        assert_eq!(config.connect_timeout, Config::DEFAULT_CONNECT_TIMEOUT);

        let config = Config::plain("pop.example.com");
        assert_eq!(config.port, 110);
        assert_eq!(config.security, Security::None);
        assert_eq!(config.to_string(), "pop3://pop.example.com:110");
    }

    #[test]
    fn test_builder() {
        let config = Config::builder("pop.example.com")
            .port(1995)
            .connect_timeout(Duration::from_secs(10))
            .io_timeout(Duration::from_secs(5))
            .build();

        assert_eq!(config.port, 1995);
        assert_eq!(config.security, Security::Implicit);
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.io_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_builder_port_follows_security() {
        let config = Config::builder("pop.example.com")
            .security(Security::None)
            .build();
        assert_eq!(config.port, 110);

        // An explicit port wins regardless of call order.
        let config = Config::builder("pop.example.com")
            .port(2110)
            .security(Security::None)
            .build();
        assert_eq!(config.port, 2110);
    }

    #[test]
    fn test_ipv6_address_is_bracketed() {
        let config = Config::plain("::1");
        assert_eq!(config.address(), "[::1]:110");
        assert_eq!(config.to_string(), "pop3://[::1]:110");
    }

    #[test]
    fn test_parse_url() {
        let config: Config = "pop3s://pop.example.com".parse().unwrap();
        assert_eq!(config, Config::new("pop.example.com"));

        let config: Config = "POP3://mail.example.org:2110/".parse().unwrap();
        assert_eq!(config.security, Security::None);
        assert_eq!(config.host, "mail.example.org");
        assert_eq!(config.port, 2110);

        let config: Config = "pop://alice;auth=+APOP@mail.example.org".parse().unwrap();
        assert_eq!(config.host, "mail.example.org");
        assert_eq!(config.port, 110);

        let config: Config = "pops://[2001:db8::1]:9995".parse().unwrap();
        assert_eq!(config.host, "2001:db8::1");
        assert_eq!(config.port, 9995);
        assert!(config.security.is_tls());
    }

    #[test]
    fn test_parse_url_rejects_malformed() {
        for url in [
            "pop.example.com",
            "imap://pop.example.com",
            "pop3://",
            "pop3://host:port",
            "pop3://host:99999",
            "pop3://2001:db8::1",
            "pop3://[2001:db8::1]x",
        ] {
            let err = url.parse::<Config>().unwrap_err();
            assert!(matches!(err, Error::InvalidAddress(_)), "{url}");
        }
    }

    #[test]
    fn test_server_name() {
        assert!(Config::new("pop.example.com").server_name().is_ok());
        assert!(Config::new("127.0.0.1").server_name().is_ok());

        let err = Config::new("not a host").server_name().unwrap_err();
        assert!(matches!(err, Error::InvalidDnsName(_)));
    }
}
