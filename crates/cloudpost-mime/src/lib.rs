//! # cloudpost-mime
//!
//! Composition of outgoing email for batch delivery.
//!
//! ## Features
//!
//! - **Message model**: sender, recipients, custom headers, attachments and
//!   the delivery status carried through a dispatch
//! - **Wire format**: RFC 5322 headers with a MIME body, `multipart/mixed`
//!   when attachments are present, Base64 attachment parts
//! - **Addresses**: RFC 5322 mailbox parsing with display names
//! - **Encoding**: Base64 and RFC 2047 header encoding
//!
//! ## Quick Start
//!
//! ```ignore
//! use cloudpost_mime::{Mailbox, Message};
//!
//! let mut message = Message::new(
//!     Mailbox::with_name("Ops", "ops@example.com"),
//!     "Nightly report",
//!     "<h1>All green</h1>",
//!     "text/html",
//! )
//! .with_to(["team@example.com"]);
//!
//! message.attach("report.pdf")?;
//! message.add_header("X-Report-Id", "2024-03-05");
//!
//! let recipients = message.tolist()?;
//! let data = message.to_bytes()?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod address;
mod attachment;
mod content_type;
mod error;
mod header;
mod message;
mod status;

pub mod encoding;

pub use address::Mailbox;
pub use attachment::{Attachment, sanitize_filename};
pub use content_type::ContentType;
pub use error::{Error, Result};
pub use header::{Header, Headers};
pub use message::{DEFAULT_BODY_CONTENT_TYPE, Message};
pub use status::{FailureKind, MessageStatus, SendFailure};
