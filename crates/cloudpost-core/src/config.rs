//! SMTP submission settings shared by every provider.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Field names used in provider field maps.
pub mod fields {
    /// SMTP host.
    pub const EMAIL_HOST: &str = "email_host";
    /// SMTP port.
    pub const EMAIL_PORT: &str = "email_port";
    /// SMTP username.
    pub const EMAIL_USER: &str = "email_user";
    /// SMTP password.
    pub const EMAIL_PASSWORD: &str = "email_password";
    /// Envelope sender override.
    pub const EMAIL_FROM: &str = "email_from";
    /// `none`, `tls` or `starttls`.
    pub const EMAIL_SECURITY: &str = "email_security";
}

/// Security/encryption mode for SMTP connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Security {
    /// No encryption.
    None,
    /// Implicit TLS (connect directly with TLS).
    Tls,
    /// STARTTLS upgrade after plaintext connect.
    StartTls,
}

impl Security {
    /// Mode conventionally used on `port`: 465 is implicit TLS, 25 is
    /// plaintext relay, anything else is submission with STARTTLS.
    #[must_use]
    pub const fn for_port(port: u16) -> Self {
        match port {
            465 => Self::Tls,
            25 => Self::None,
            _ => Self::StartTls,
        }
    }

    /// Get display name for the security mode.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::None => "None (insecure)",
            Self::Tls => "SSL/TLS",
            Self::StartTls => "STARTTLS",
        }
    }
}

impl FromStr for Security {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "plain" => Ok(Self::None),
            "tls" | "ssl" => Ok(Self::Tls),
            "starttls" => Ok(Self::StartTls),
            other => Err(Error::InvalidConfig(format!(
                "unknown {}: {other:?}",
                fields::EMAIL_SECURITY
            ))),
        }
    }
}

/// Where and how to submit mail.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmtpCredentials {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Username for AUTH PLAIN; no authentication when empty.
    #[serde(default)]
    pub username: String,
    /// Password for AUTH PLAIN.
    #[serde(default)]
    pub password: String,
    /// Envelope sender used instead of each message's From address.
    #[serde(default)]
    pub from: Option<String>,
    /// Security mode; derived from the port when absent.
    #[serde(default)]
    pub security: Option<Security>,
}

impl SmtpCredentials {
    /// Creates credentials for `host:port` without authentication.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            username: String::new(),
            password: String::new(),
            from: None,
            security: None,
        }
    }

    /// Sets the AUTH PLAIN username and password.
    #[must_use]
    pub fn with_login(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// Sets the security mode.
    #[must_use]
    pub const fn with_security(mut self, security: Security) -> Self {
        self.security = Some(security);
        self
    }

    /// Reads the `email_*` entries of a provider field map.
    ///
    /// Missing entries are left empty and reported by
    /// [`validate`](Self::validate).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the port or security mode cannot
    /// be parsed.
    pub fn from_fields(map: &HashMap<String, String>) -> Result<Self> {
        let get = |key: &str| map.get(key).map_or("", |v| v.trim());

        let port = match get(fields::EMAIL_PORT) {
            "" => 0,
            raw => raw.parse().map_err(|_| {
                Error::InvalidConfig(format!("{} is not a port: {raw:?}", fields::EMAIL_PORT))
            })?,
        };
        let security = match get(fields::EMAIL_SECURITY) {
            "" => None,
            raw => Some(raw.parse()?),
        };
        let from = Some(get(fields::EMAIL_FROM))
            .filter(|f| !f.is_empty())
            .map(str::to_string);

        Ok(Self {
            host: get(fields::EMAIL_HOST).to_string(),
            port,
            username: get(fields::EMAIL_USER).to_string(),
            password: map
                .get(fields::EMAIL_PASSWORD)
                .cloned()
                .unwrap_or_default(),
            from,
            security,
        })
    }

    /// Effective security mode.
    #[must_use]
    pub fn security(&self) -> Security {
        self.security.unwrap_or_else(|| Security::for_port(self.port))
    }

    /// Checks that the settings can be used to connect.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingFields`] if the host or port is missing and
    /// [`Error::InvalidConfig`] if a password is set without a username.
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.host.is_empty() {
            missing.push(fields::EMAIL_HOST);
        }
        if self.port == 0 {
            missing.push(fields::EMAIL_PORT);
        }
        if !missing.is_empty() {
            return Err(Error::MissingFields {
                provider: "smtp",
                fields: missing,
            });
        }

        if self.username.is_empty() && !self.password.is_empty() {
            return Err(Error::InvalidConfig(format!(
                "{} is set without {}",
                fields::EMAIL_PASSWORD,
                fields::EMAIL_USER
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for SmtpCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpCredentials")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("from", &self.from)
            .field("security", &self.security)
            .finish()
    }
}
