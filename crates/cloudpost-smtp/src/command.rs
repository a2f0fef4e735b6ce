//! SMTP commands used during submission.

use std::fmt;

use crate::types::{Address, AuthMechanism};

/// SMTP command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// EHLO with the client's name.
    Ehlo {
        /// Client hostname.
        hostname: String,
    },
    /// STARTTLS
    StartTls,
    /// AUTH with an optional initial response (already Base64 encoded).
    Auth {
        /// SASL mechanism.
        mechanism: AuthMechanism,
        /// Initial client response.
        initial_response: Option<String>,
    },
    /// MAIL FROM, optionally declaring the message size.
    MailFrom {
        /// Reverse path.
        from: Address,
        /// SIZE parameter (RFC 1870).
        size: Option<usize>,
    },
    /// RCPT TO
    RcptTo {
        /// Forward path.
        to: Address,
    },
    /// DATA
    Data,
    /// RSET
    Rset,
    /// QUIT
    Quit,
}

impl Command {
    /// Serializes the command to its wire form, including the trailing CRLF.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut line = match self {
            Self::Ehlo { hostname } => format!("EHLO {hostname}"),
            Self::StartTls => "STARTTLS".to_string(),
            Self::Auth {
                mechanism,
                initial_response,
            } => match initial_response {
                Some(response) => format!("AUTH {} {response}", mechanism.as_str()),
                None => format!("AUTH {}", mechanism.as_str()),
            },
            Self::MailFrom { from, size } => match size {
                Some(size) => format!("MAIL FROM:<{from}> SIZE={size}"),
                None => format!("MAIL FROM:<{from}>"),
            },
            Self::RcptTo { to } => format!("RCPT TO:<{to}>"),
            Self::Data => "DATA".to_string(),
            Self::Rset => "RSET".to_string(),
            Self::Quit => "QUIT".to_string(),
        };
        line.push_str("\r\n");
        line.into_bytes()
    }
}

/// Log-safe rendering: AUTH responses are masked.
impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auth { mechanism, .. } => write!(f, "AUTH {} <redacted>", mechanism.as_str()),
            other => {
                let wire = other.serialize();
                f.write_str(String::from_utf8_lossy(&wire).trim_end())
            }
        }
    }
}
