//! Error types for SMTP operations.

use std::io;

use crate::types::Reply;

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SMTP error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error, including TLS handshake failures.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Server rejected a command.
    #[error("SMTP error {code}: {message}")]
    SmtpError {
        /// Reply code (e.g., 550).
        code: u16,
        /// Error message from server.
        message: String,
    },

    /// Server sent something that is not valid SMTP, or hung up.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Envelope address cannot be sent in a command.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Message exceeds the size the server advertised.
    #[error("Message exceeds size limit: {size} bytes (server accepts {limit})")]
    MessageTooLarge {
        /// Size of the message.
        size: usize,
        /// Limit advertised through the SIZE extension.
        limit: usize,
    },

    /// Feature not supported by server.
    #[error("Server does not support {0}")]
    NotSupported(String),
}

impl Error {
    /// Creates an SMTP error from a reply code and message.
    #[must_use]
    pub fn smtp_error(code: u16, message: impl Into<String>) -> Self {
        Self::SmtpError {
            code,
            message: message.into(),
        }
    }

    /// Creates an SMTP error from a rejected reply.
    #[must_use]
    pub fn from_reply(reply: &Reply) -> Self {
        Self::smtp_error(reply.code.as_u16(), reply.message())
    }

    /// Returns true if this is a permanent error (5xx).
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::SmtpError { code, .. } if *code >= 500 && *code < 600)
    }

    /// Returns true if this is a transient error (4xx).
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::SmtpError { code, .. } if *code >= 400 && *code < 500)
    }
}
