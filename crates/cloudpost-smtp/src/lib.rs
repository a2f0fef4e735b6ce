//! # cloudpost-smtp
//!
//! Async SMTP submission client (RFC 5321) used by the cloudpost transports.
//!
//! ## Features
//!
//! - **Type-state sessions**: invalid command orderings do not compile
//! - **Any byte stream**: the client runs over anything implementing
//!   `AsyncRead + AsyncWrite`, so tests can script a server in memory
//! - **TLS**: implicit TLS (port 465) and STARTTLS upgrades via rustls
//! - **Authentication**: AUTH PLAIN
//! - **Extensions**: SIZE is honoured when the server advertises it
//!
//! ## Quick Start
//!
//! ```ignore
//! use cloudpost_smtp::{Address, Client};
//! use cloudpost_smtp::connection::connect;
//!
//! let stream = connect("smtp.example.com", 587).await?;
//! let client = Client::from_stream(stream).await?;
//! let client = client.ehlo("localhost").await?;
//! let client = client.starttls("smtp.example.com").await?;
//! let client = client.ehlo("localhost").await?;
//! let client = client.auth_plain("user", "secret").await?;
//!
//! let data = b"Subject: Hi\r\n\r\nHello\r\n";
//! let client = client
//!     .mail_from(Address::new("sender@example.com")?, Some(data.len()))
//!     .await?;
//! let client = client.rcpt_to(Address::new("rcpt@example.com")?).await?;
//! let client = client.data().await?;
//! let client = client.send_message(data).await?;
//! client.quit().await?;
//! ```
//!
//! ## Session States
//!
//! ```text
//! Connected ── auth_plain() ──→ Authenticated
//!     │                              │
//!     └────────── mail_from() ───────┘
//!                     │
//!               MailTransaction ── rcpt_to() ──→ RecipientAdded ── data() ──→ Data
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod types;

pub use connection::{
    Authenticated, Client, Connected, Data, MailTransaction, NetworkStream, Ready,
    RecipientAdded, ServerInfo, SmtpStream,
};
pub use error::{Error, Result};
pub use types::{Address, AuthMechanism, Extension, Reply, ReplyCode};
