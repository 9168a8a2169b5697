//! POP3 connection management with type-state pattern.

mod client;
mod config;
mod framed;
mod stream;

pub use client::{Authorization, Client, Transaction};
pub use config::{Config, ConfigBuilder, Security};
pub use stream::{Pop3Stream, connect, create_tls_connector};
