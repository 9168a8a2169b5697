//! # popmail-mime
//!
//! Tolerant MIME message decoding for mail fetched over POP3.
//!
//! ## Features
//!
//! - **Message parsing**: raw bytes to a [`MessageHeader`] and a tree of [`MessagePart`]s
//! - **Header fields**: addresses, dates, content type and disposition, `Received` traces
//! - **Encoded words**: RFC 2047 `=?charset?Q?...?=` and RFC 2231 parameter values
//! - **Transfer decoding**: Base64 and Quoted-Printable, lenient with malformed input
//! - **Charsets**: a configurable [`CharsetResolver`] on top of `encoding_rs`
//!
//! Malformed but common input is repaired or defaulted and logged through
//! `tracing`. Only problems that would silently produce wrong bytes or wrong
//! instants are returned as errors.
//!
//! ## Quick Start
//!
//! ```
//! use popmail_mime::Message;
//!
//! let raw = b"From: sender@example.com\r\n\
//!             Subject: =?utf-8?Q?caf=C3=A9?=\r\n\
//!             Content-Type: text/plain; charset=utf-8\r\n\
//!             \r\n\
//!             Hello, World!";
//!
//! let message = Message::load(&raw[..])?;
//! assert_eq!(message.header().subject.as_deref(), Some("café"));
//!
//! let text = message.find_first_plain_text_version().and_then(|p| p.body_text());
//! assert_eq!(text.as_deref(), Some("Hello, World!"));
//! # Ok::<(), popmail_mime::Error>(())
//! ```
//!
//! ### Custom charsets and date formats
//!
//! ```
//! use std::sync::Arc;
//! use popmail_mime::{CharsetResolver, Message, ParserConfig};
//!
//! let resolver = Arc::new(CharsetResolver::new());
//! resolver.add_mapping("x-company-latin", encoding_rs::WINDOWS_1252);
//!
//! let config = ParserConfig::builder()
//!     .resolver(resolver)
//!     .date_format("%Y-%m-%d %H:%M:%S")
//!     .build();
//!
//! let message = Message::load_with(&b"Date: 2011-03-02 10:00:00\r\n\r\n"[..], &config)?;
//! assert!(message.header().date_sent.is_some());
//! # Ok::<(), popmail_mime::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod address;
mod config;
mod content_type;
mod error;
mod header;
mod message;
mod params;
mod part;
mod received;

pub mod charset;
pub mod date;
pub mod encoded_word;
pub mod encoding;
pub mod line_reader;
pub mod traverse;

pub use address::{Address, MailAddress};
pub use charset::CharsetResolver;
pub use config::{ParserConfig, ParserConfigBuilder};
pub use content_type::{ContentDisposition, ContentType};
pub use error::{Error, Result};
pub use header::{Importance, MessageHeader, TransferEncoding, extract_headers, unfold};
pub use message::Message;
pub use part::{MAX_NESTING_DEPTH, MessagePart};
pub use received::Received;
