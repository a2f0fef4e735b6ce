//! Message attachments.

use regex::Regex;
use std::sync::LazyLock;

/// Runs of characters not allowed in attachment filenames.
#[allow(clippy::unwrap_used)] // literal pattern
static UNSAFE_FILENAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9._-]+").unwrap());

/// File content carried by a message, either as a regular attachment or
/// inline (referenced from the body by `cid:`).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Attachment {
    /// Sanitized filename.
    pub filename: String,
    /// Raw file content.
    pub data: Vec<u8>,
    /// Whether the part also carries a `Content-ID` for `cid:` references.
    pub inline: bool,
}

impl Attachment {
    /// Creates an attachment, sanitizing the filename.
    #[must_use]
    pub fn new(filename: &str, data: Vec<u8>, inline: bool) -> Self {
        Self {
            filename: sanitize_filename(filename),
            data,
            inline,
        }
    }
}

/// Replaces every run of characters outside `[A-Za-z0-9._-]` with `_`.
#[must_use]
pub fn sanitize_filename(filename: &str) -> String {
    UNSAFE_FILENAME_CHARS.replace_all(filename, "_").into_owned()
}
