//! Delivery lifecycle of a message.

use crate::error::Error;
use std::fmt;

/// Delivery status of a message.
///
/// ```text
/// NotSent ──→ Queued ──→ Sending ──┬──→ Sent
///                                  └──→ SendError
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MessageStatus {
    /// Created, not handed to a dispatcher.
    #[default]
    NotSent,
    /// Accepted by a dispatcher, waiting for its worker.
    Queued,
    /// Worker is building and submitting the message.
    Sending,
    /// Accepted by the SMTP server.
    Sent,
    /// Delivery failed; see [`crate::Message::error`].
    SendError,
}

impl MessageStatus {
    /// Returns true for `Sent` and `SendError`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Sent | Self::SendError)
    }

    /// Returns true if `next` directly follows `self` in the lifecycle.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::NotSent, Self::Queued)
                | (Self::Queued, Self::Sending)
                | (Self::Sending, Self::Sent | Self::SendError)
        )
    }

    /// Returns the status name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotSent => "not_sent",
            Self::Queued => "queued",
            Self::Sending => "sending",
            Self::Sent => "sent",
            Self::SendError => "send_error",
        }
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of a delivery failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FailureKind {
    /// Malformed address or content.
    Validation,
    /// Local file could not be read.
    Io,
    /// Content could not be encoded.
    Encoding,
    /// SMTP session or submission failed.
    Transport,
}

/// Why a message ended in [`MessageStatus::SendError`].
///
/// Snapshots are cloned onto the status channel, so the originating error is
/// kept as its rendered message together with its category.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[error("{message}")]
pub struct SendFailure {
    /// Failure category.
    pub kind: FailureKind,
    /// Rendered error message.
    pub message: String,
}

impl SendFailure {
    /// Creates a failure.
    #[must_use]
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Creates a transport failure.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Transport, message)
    }
}

impl From<&Error> for SendFailure {
    fn from(err: &Error) -> Self {
        let kind = if err.is_io() {
            FailureKind::Io
        } else if err.is_encoding() {
            FailureKind::Encoding
        } else {
            FailureKind::Validation
        };
        Self::new(kind, err.to_string())
    }
}

impl From<Error> for SendFailure {
    fn from(err: Error) -> Self {
        Self::from(&err)
    }
}
