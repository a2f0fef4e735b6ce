//! # cloudpost-core
//!
//! Concurrent batch delivery of composed email through the SMTP endpoints
//! of cloud email services.
//!
//! This crate provides:
//! - Provider credentials for AWS SES and OCI Email Delivery
//! - SMTP settings parsed from flat `email_*` fields
//! - A [`TransportAdapter`] seam with an SMTP implementation
//! - [`SendEngine`], which delivers a batch with one task per message and
//!   streams every status change over a bounded channel
//! - [`StatusTracker`] with the aggregate progress of a dispatch
//!
//! ## Example
//!
//! ```ignore
//! use cloudpost_core::{AuthConfig, Mailbox, Message, engine_for};
//!
//! let config = AuthConfig::new("aws", &fields)?;
//! let engine = engine_for(config)?;
//! engine.add_message(
//!     Message::new(Mailbox::new("ops@example.com"), "Hello", "<p>Hi</p>", "")
//!         .with_to(["team@example.com"]),
//! );
//!
//! let mut updates = engine.send()?;
//! while let Some(snapshot) = updates.recv().await {
//!     println!("{} {}", snapshot.id, snapshot.status());
//! }
//! println!("sent {:.0}%", engine.send_status()? * 100.0);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod config;
mod engine;
mod error;
pub mod provider;
mod tracker;
mod transport;

pub use cloudpost_mime::{FailureKind, Mailbox, Message, MessageStatus, SendFailure};
pub use config::{Security, SmtpCredentials};
pub use engine::{STATUS_CHANNEL_CAPACITY, SendEngine, engine_for};
pub use error::{Error, Result};
pub use provider::{AuthConfig, AwsAuth, OciAuth, Provider};
pub use tracker::{StatusCounts, StatusTracker};
pub use transport::{
    AwsTransport, Endpoint, OciTransport, PlainAuthenticator, Route, SmtpTransport,
    TransportAdapter,
};
