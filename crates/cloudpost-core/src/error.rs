//! Error types for the core library.

use cloudpost_mime::SendFailure;
use thiserror::Error;

/// Errors that can occur while configuring providers or delivering batches.
#[derive(Debug, Error)]
pub enum Error {
    /// Message could not be composed (address, attachment or encoding
    /// problem).
    #[error(transparent)]
    Message(#[from] cloudpost_mime::Error),

    /// SMTP session or submission failed.
    #[error("transport error ({endpoint}): {source}")]
    Transport {
        /// `host:port` of the SMTP endpoint.
        endpoint: String,
        /// Underlying SMTP failure.
        #[source]
        source: cloudpost_smtp::Error,
    },

    /// Operation is intentionally not implemented.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),

    /// Provider name is not known.
    #[error("unsupported provider: {0}")]
    UnsupportedProvider(String),

    /// Required credential fields are empty.
    #[error("missing required {provider} authentication fields: {fields:?}")]
    MissingFields {
        /// Provider whose credentials are incomplete.
        provider: &'static str,
        /// Names of the empty fields.
        fields: Vec<&'static str>,
    },

    /// Configuration values are present but unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration document could not be parsed.
    #[error("configuration error: {0}")]
    Config(#[from] serde_json::Error),
}

impl Error {
    /// Returns true for errors raised while composing a message.
    #[must_use]
    pub const fn is_message(&self) -> bool {
        matches!(self, Self::Message(_))
    }

    /// Returns true for SMTP failures.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// Returns true for operations that are not implemented.
    #[must_use]
    pub const fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported(_))
    }

    /// Converts the error into the failure recorded on a message snapshot.
    #[must_use]
    pub fn to_failure(&self) -> SendFailure {
        match self {
            Self::Message(err) => SendFailure::from(err),
            other => SendFailure::transport(other.to_string()),
        }
    }

    pub(crate) fn no_recipients() -> Self {
        Self::Message(cloudpost_mime::Error::Validation(
            "message has no recipients".into(),
        ))
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
