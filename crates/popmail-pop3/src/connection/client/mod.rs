//! Type-state POP3 client connection.
//!
//! Uses the type-state pattern to enforce valid state transitions at compile time.
//! The POP3 session states are:
//!
//! - `Authorization`: Initial state after the greeting
//! - `Transaction`: After a successful USER/PASS or APOP login
//!
//! The UPDATE state is entered by [`Client::quit`], which consumes the client.

#![allow(clippy::missing_errors_doc)]

mod authorization;
mod states;
mod transaction;

use std::marker::PhantomData;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};

pub use self::states::{Authorization, Transaction};
use super::config::Config;
use super::framed::FramedStream;
use crate::command::Command;
use crate::error::{Error, Result};
use crate::parser::{parse_capabilities, parse_reply};
use crate::types::{Capability, Reply};

/// POP3 client connection with type-state.
///
/// The type parameter `State` tracks the session state at compile time.
pub struct Client<S, State> {
    pub(crate) stream: FramedStream<S>,
    pub(crate) greeting: String,
    pub(crate) capabilities: Vec<Capability>,
    _state: PhantomData<State>,
}

impl<S, State> std::fmt::Debug for Client<S, State> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("greeting", &self.greeting)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

/// Shared implementation for all states.
impl<S, State> Client<S, State>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Returns the text of the server greeting.
    #[must_use]
    pub fn greeting(&self) -> &str {
        &self.greeting
    }

    /// Returns the capabilities from the last `CAPA`, if one was sent.
    #[must_use]
    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    /// Checks if the server advertised a specific capability.
    #[must_use]
    pub fn has_capability(&self, cap: &Capability) -> bool {
        self.capabilities.contains(cap)
    }

    /// Sets the timeout applied to each read or write.
    pub const fn set_io_timeout(&mut self, timeout: Duration) {
        self.stream.set_io_timeout(timeout);
    }

    /// Sends `CAPA` and stores the result (RFC 2449).
    pub async fn capa(&mut self) -> Result<Vec<Capability>> {
        let body = self.send_multiline(&Command::Capa).await?;
        self.capabilities = parse_capabilities(&body);
        Ok(self.capabilities.clone())
    }

    /// Sends `QUIT` and closes the connection.
    ///
    /// From the transaction state this commits pending deletions.
    pub async fn quit(mut self) -> Result<()> {
        let reply = self.send(&Command::Quit).await?;
        tracing::debug!(text = %reply.text, "POP3 session closed");
        Ok(())
    }

    /// Sends a command and reads its status line.
    pub(crate) async fn send(&mut self, cmd: &Command) -> Result<Reply> {
        tracing::trace!(command = ?cmd, "POP3 >");
        self.stream.write_command(&cmd.serialize()).await?;

        let line = self.stream.read_line().await?;
        let reply = parse_reply(&line)?;
        if !reply.is_ok() {
            tracing::debug!(command = cmd.verb(), text = %reply.text, "POP3 command rejected");
            return Err(Error::server(cmd.verb(), reply.text));
        }
        Ok(reply)
    }

    /// Sends a command whose positive reply carries a dot-terminated body.
    pub(crate) async fn send_multiline(&mut self, cmd: &Command) -> Result<Vec<u8>> {
        self.send(cmd).await?;
        let body = self.stream.read_multiline().await?;
        tracing::trace!(command = cmd.verb(), len = body.len(), "POP3 < body");
        Ok(body)
    }

    /// Moves the connection into another state.
    pub(crate) fn transition<Next>(self) -> Client<S, Next> {
        Client {
            stream: self.stream,
            greeting: self.greeting,
            capabilities: self.capabilities,
            _state: PhantomData,
        }
    }
}

/// Default read/write timeout for clients created from a raw stream.
const DEFAULT_IO_TIMEOUT: Duration = Config::DEFAULT_IO_TIMEOUT;
