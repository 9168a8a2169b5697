//! Authorization state: greeting and login.

use std::marker::PhantomData;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};

use super::{Authorization, Client, DEFAULT_IO_TIMEOUT, Transaction};
use crate::command::Command;
use crate::connection::config::Config;
use crate::connection::framed::FramedStream;
use crate::connection::stream::{Pop3Stream, connect};
use crate::error::{Error, Result};
use crate::parser::{apop_timestamp, parse_reply};

impl Client<Pop3Stream, Authorization> {
    /// Connects as described by `config` and reads the greeting.
    pub async fn connect(config: &Config) -> Result<Self> {
        let stream = connect(config).await?;
        Self::from_stream_with_timeout(stream, config.io_timeout).await
    }
}

impl<S> Client<S, Authorization>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a client from a connected stream and reads the greeting.
    pub async fn from_stream(stream: S) -> Result<Self> {
        Self::from_stream_with_timeout(stream, DEFAULT_IO_TIMEOUT).await
    }

    /// Like [`Client::from_stream`], with an explicit read/write timeout.
    pub async fn from_stream_with_timeout(stream: S, io_timeout: Duration) -> Result<Self> {
        let mut stream = FramedStream::new(stream, io_timeout);

        let line = stream.read_line().await?;
        let reply = parse_reply(&line)?;
        if !reply.is_ok() {
            return Err(Error::server("greeting", reply.text));
        }
        tracing::debug!(greeting = %reply.text, "POP3 greeting");

        Ok(Self {
            stream,
            greeting: reply.text,
            capabilities: Vec::new(),
            _state: PhantomData,
        })
    }

    /// Returns the APOP timestamp from the greeting, if the server offered one.
    #[must_use]
    pub fn apop_timestamp(&self) -> Option<&str> {
        apop_timestamp(&self.greeting)
    }

    /// Returns true if the greeting carried an APOP timestamp.
    #[must_use]
    pub fn supports_apop(&self) -> bool {
        self.apop_timestamp().is_some()
    }

    /// Logs in with `USER` and `PASS`.
    pub async fn login(
        mut self,
        username: &str,
        password: &str,
    ) -> Result<Client<S, Transaction>> {
        let user = Command::User {
            name: username.to_string(),
        };
        let pass = Command::Pass {
            password: password.to_string(),
        };

        self.send(&user).await.map_err(Error::classify_login)?;
        self.send(&pass).await.map_err(Error::classify_login)?;

        tracing::debug!(username, method = "USER/PASS", "POP3 login succeeded");
        Ok(self.transition())
    }

    /// Logs in with `APOP`, never sending the secret itself.
    pub async fn apop(mut self, username: &str, secret: &str) -> Result<Client<S, Transaction>> {
        let Some(timestamp) = self.apop_timestamp() else {
            return Err(Error::NotSupported("APOP".into()));
        };
        let cmd = Command::apop(username, timestamp, secret);

        self.send(&cmd).await.map_err(Error::classify_login)?;

        tracing::debug!(username, method = "APOP", "POP3 login succeeded");
        Ok(self.transition())
    }

    /// Logs in with `APOP` when the greeting allows it, else with `USER`/`PASS`.
    pub async fn authenticate(
        self,
        username: &str,
        secret: &str,
    ) -> Result<Client<S, Transaction>> {
        if self.supports_apop() {
            self.apop(username, secret).await
        } else {
            self.login(username, secret).await
        }
    }
}
