//! MIME encoding and decoding utilities.
//!
//! Supports Base64 bodies and RFC 2047 header encoding.

use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Maximum encoded line length for Base64 bodies (RFC 2045).
pub const MAX_LINE_LENGTH: usize = 76;

/// Encodes data as Base64.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Encodes data as Base64 split into CRLF-terminated lines of at most
/// [`MAX_LINE_LENGTH`] characters.
///
/// The final line carries no trailing CRLF.
#[must_use]
pub fn encode_base64_wrapped(data: &[u8]) -> String {
    let encoded = STANDARD.encode(data);
    let mut wrapped = String::with_capacity(encoded.len() + encoded.len() / MAX_LINE_LENGTH * 2);

    // Base64 output is pure ASCII, so byte chunks are valid str boundaries.
    for (i, chunk) in encoded.as_bytes().chunks(MAX_LINE_LENGTH).enumerate() {
        if i > 0 {
            wrapped.push_str("\r\n");
        }
        wrapped.push_str(&String::from_utf8_lossy(chunk));
    }

    wrapped
}

/// Decodes Base64 data, ignoring embedded whitespace and line breaks.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &str) -> Result<Vec<u8>> {
    let cleaned: String = data.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD.decode(cleaned).map_err(Into::into)
}

/// Encodes text as a single RFC 2047 `B` encoded-word in UTF-8.
///
/// Plain ASCII is encoded too.
#[must_use]
pub fn encode_word(text: &str) -> String {
    format!("=?UTF-8?B?{}?=", encode_base64(text.as_bytes()))
}

/// Decodes an RFC 2047 encoded header value.
///
/// Values that are not encoded-words are returned unchanged.
///
/// # Errors
///
/// Returns an error if the input looks like an encoded-word but is malformed.
pub fn decode_rfc2047(text: &str) -> Result<String> {
    let Some(inner) = text.strip_prefix("=?").and_then(|t| t.strip_suffix("?=")) else {
        return Ok(text.to_string());
    };

    let parts: Vec<&str> = inner.split('?').collect();
    let [_charset, encoding, encoded_text] = parts.as_slice() else {
        return Err(Error::Encoding("invalid RFC 2047 format".to_string()));
    };

    match encoding.to_ascii_uppercase().as_str() {
        "B" => {
            let decoded = decode_base64(encoded_text)?;
            String::from_utf8(decoded)
                .map_err(|e| Error::Encoding(format!("encoded-word is not UTF-8: {e}")))
        }
        "Q" => decode_q(encoded_text),
        other => Err(Error::Encoding(format!("unknown encoding: {other}"))),
    }
}

/// Decodes the RFC 2047 `Q` form (`_` for space, `=XX` escapes).
fn decode_q(text: &str) -> Result<String> {
    let mut bytes = Vec::with_capacity(text.len());
    let mut iter = text.bytes();

    while let Some(byte) = iter.next() {
        match byte {
            b'_' => bytes.push(b' '),
            b'=' => {
                let hex = [iter.next(), iter.next()];
                let [Some(hi), Some(lo)] = hex else {
                    return Err(Error::Encoding("incomplete escape sequence".to_string()));
                };
                let pair = [hi, lo];
                let digits = std::str::from_utf8(&pair)
                    .map_err(|_| Error::Encoding("invalid escape sequence".to_string()))?;
                let value = u8::from_str_radix(digits, 16)
                    .map_err(|e| Error::Encoding(format!("invalid hex: {e}")))?;
                bytes.push(value);
            }
            other => bytes.push(other),
        }
    }

    String::from_utf8(bytes).map_err(|e| Error::Encoding(format!("encoded-word is not UTF-8: {e}")))
}
