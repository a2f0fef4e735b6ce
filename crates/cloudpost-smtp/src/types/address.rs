//! Envelope addresses.

use crate::error::{Error, Result};

/// Address used in `MAIL FROM` and `RCPT TO`.
///
/// Only the bare `local@domain` form is accepted. Characters that would
/// break out of the `<...>` path (angle brackets, whitespace, control
/// characters) are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address(String);

impl Address {
    /// Creates a new envelope address.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the address is malformed.
    pub fn new(addr: impl Into<String>) -> Result<Self> {
        let addr = addr.into();
        Self::validate(&addr)?;
        Ok(Self(addr))
    }

    /// Returns the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(addr: &str) -> Result<()> {
        if let Some(c) = addr
            .chars()
            .find(|c| c.is_whitespace() || c.is_control() || matches!(c, '<' | '>'))
        {
            return Err(Error::InvalidAddress(format!(
                "{addr:?} contains forbidden character {c:?}"
            )));
        }

        let Some((local, domain)) = addr.rsplit_once('@') else {
            return Err(Error::InvalidAddress(format!("{addr:?} is missing '@'")));
        };
        if local.is_empty() || domain.is_empty() {
            return Err(Error::InvalidAddress(format!(
                "{addr:?} has an empty local part or domain"
            )));
        }

        Ok(())
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
