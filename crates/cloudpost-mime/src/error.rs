//! Error types for message composition.

use std::io;
use std::path::PathBuf;

/// Result type alias for message composition.
pub type Result<T> = std::result::Result<T, Error>;

/// Message composition errors.
///
/// All of these are detected before any network I/O happens and none of
/// them are worth retrying.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An address could not be parsed as an RFC 5322 mailbox.
    #[error("invalid address '{address}': {reason}")]
    InvalidAddress {
        /// The offending input, verbatim.
        address: String,
        /// Why parsing failed.
        reason: String,
    },

    /// Message content failed validation (empty attachment, name collision).
    #[error("validation error: {0}")]
    Validation(String),

    /// A file could not be read while attaching it.
    #[error("failed to attach file '{}': {source}", path.display())]
    Io {
        /// Path that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Content cannot be represented on the wire.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Base64 decode error.
    #[error("base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),
}

impl Error {
    /// Creates an [`Error::InvalidAddress`].
    #[must_use]
    pub fn invalid_address(address: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidAddress {
            address: address.into(),
            reason: reason.into(),
        }
    }

    /// Returns true for validation failures (bad address, bad content).
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidAddress { .. } | Self::Validation(_))
    }

    /// Returns true for local file read failures.
    #[must_use]
    pub const fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. })
    }

    /// Returns true for content that cannot be encoded or decoded.
    #[must_use]
    pub const fn is_encoding(&self) -> bool {
        matches!(self, Self::Encoding(_) | Self::Base64Decode(_))
    }
}
