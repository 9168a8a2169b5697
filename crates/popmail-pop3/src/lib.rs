//! # popmail-pop3
//!
//! An async POP3 client (RFC 1939) that hands retrieved mail to
//! [`popmail_mime`] for decoding.
//!
//! ## Features
//!
//! - **Type-state sessions**: authorization and transaction commands are
//!   only callable in the state that allows them
//! - **Login**: USER/PASS and APOP
//! - **Maildrop commands**: STAT, LIST, UIDL, RETR, TOP, DELE, NOOP, RSET
//! - **Capabilities**: CAPA (RFC 2449) with RFC 2449 login response codes
//! - **TLS**: implicit TLS on port 995 through rustls
//!
//! ## Quick Start
//!
//! ```ignore
//! use popmail_pop3::{Client, Config};
//!
//! #[tokio::main]
//! async fn main() -> popmail_pop3::Result<()> {
//!     let config = Config::new("pop.example.com");
//!     let client = Client::connect(&config).await?;
//!     let mut client = client.authenticate("user@example.com", "password").await?;
//!
//!     let stat = client.stat().await?;
//!     for number in 1..=stat.count {
//!         let message = client.retrieve_message(number).await?;
//!         println!("{:?}", message.header().subject);
//!     }
//!
//!     client.quit().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Session States
//!
//! ```text
//! ┌───────────────┐
//! │ Authorization │ ─── login() / apop() ───→ Transaction ─── quit() ───→ (update)
//! └───────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`command`]: POP3 command builders
//! - [`connection`]: Connection management and type-state client
//! - [`parser`]: Status line and listing parser
//! - [`types`]: Core POP3 types (replies, listings, capabilities)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod parser;
pub mod types;

pub use connection::{
    Authorization, Client, Config, ConfigBuilder, Pop3Stream, Security, Transaction,
};
pub use error::{Error, Result};
pub use types::{Capability, ListEntry, Reply, StatInfo, Status, UidlEntry};

/// Default port for plaintext POP3.
pub const POP3_PORT: u16 = 110;

/// Default port for POP3 over implicit TLS.
pub const POP3S_PORT: u16 = 995;
