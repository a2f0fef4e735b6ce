//! SMTP replies and their parsing.
//!
//! A reply is one or more lines sharing a three-digit code. Every line but
//! the last separates the code from the text with `-`; the last uses a
//! space:
//!
//! ```text
//! 250-smtp.example.com
//! 250-SIZE 10240000
//! 250 STARTTLS
//! ```

use crate::error::{Error, Result};

/// SMTP reply from server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Reply code shared by all lines.
    pub code: ReplyCode,
    /// Text of each line, without code and separator.
    pub lines: Vec<String>,
}

impl Reply {
    /// Creates a new reply.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // Vec is not const-compatible
    pub fn new(code: ReplyCode, lines: Vec<String>) -> Self {
        Self { code, lines }
    }

    /// Parses a complete reply from its raw lines (line endings removed).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if there are no lines, a line has no
    /// valid code, or the lines disagree on the code.
    pub fn parse(raw: &[String]) -> Result<Self> {
        let first = raw
            .first()
            .ok_or_else(|| Error::Protocol("empty reply".into()))?;
        let code = parse_code(first)?;

        let mut lines = Vec::with_capacity(raw.len());
        for line in raw {
            if parse_code(line)? != code {
                return Err(Error::Protocol(format!(
                    "reply code changed mid-reply: {line}"
                )));
            }
            lines.push(line.get(4..).unwrap_or_default().to_string());
        }

        Ok(Self { code, lines })
    }

    /// Returns true if `line` terminates a reply.
    #[must_use]
    pub fn is_last_line(line: &str) -> bool {
        line.len() == 3 || line.as_bytes().get(3) == Some(&b' ')
    }

    /// Returns true if this is a success reply (2xx).
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.code.is_success()
    }

    /// Returns the text of all lines joined by spaces.
    #[must_use]
    pub fn message(&self) -> String {
        self.lines.join(" ")
    }
}

fn parse_code(line: &str) -> Result<ReplyCode> {
    let digits = line
        .get(..3)
        .filter(|d| d.bytes().all(|b| b.is_ascii_digit()))
        .ok_or_else(|| Error::Protocol(format!("invalid reply line: {line}")))?;
    match line.as_bytes().get(3) {
        None | Some(b' ' | b'-') => {}
        Some(_) => return Err(Error::Protocol(format!("invalid reply line: {line}"))),
    }
    digits
        .parse()
        .map(ReplyCode::new)
        .map_err(|_| Error::Protocol(format!("invalid reply code: {digits}")))
}

/// SMTP reply code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ReplyCode(u16);

impl ReplyCode {
    /// 220 Service ready
    pub const SERVICE_READY: Self = Self(220);
    /// 221 Service closing transmission channel
    pub const CLOSING: Self = Self(221);
    /// 235 Authentication succeeded
    pub const AUTH_SUCCEEDED: Self = Self(235);
    /// 250 Requested mail action okay, completed
    pub const OK: Self = Self(250);
    /// 354 Start mail input
    pub const START_DATA: Self = Self(354);
    /// 421 Service not available, closing transmission channel
    pub const SERVICE_UNAVAILABLE: Self = Self(421);
    /// 535 Authentication credentials invalid
    pub const AUTH_FAILED: Self = Self(535);
    /// 550 Mailbox unavailable
    pub const MAILBOX_UNAVAILABLE: Self = Self(550);
    /// 552 Exceeded storage allocation
    pub const EXCEEDED_STORAGE: Self = Self(552);

    /// Creates a new reply code.
    #[must_use]
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Returns the numeric code.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Returns true if this is a success code (2xx).
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.0 >= 200 && self.0 < 300
    }

    /// Returns true if this is an intermediate reply (3xx).
    #[must_use]
    pub const fn is_intermediate(self) -> bool {
        self.0 >= 300 && self.0 < 400
    }
}

impl std::fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_parse_single_line() {
        let reply = Reply::parse(&lines(&["250 OK"])).unwrap();
        assert_eq!(reply.code, ReplyCode::OK);
        assert_eq!(reply.lines, vec!["OK"]);
        assert!(reply.is_success());
    }

    #[test]
    fn test_parse_multi_line() {
        let reply = Reply::parse(&lines(&[
            "250-smtp.example.com",
            "250-SIZE 1024",
            "250 STARTTLS",
        ]))
        .unwrap();
        assert_eq!(reply.lines, vec!["smtp.example.com", "SIZE 1024", "STARTTLS"]);
        assert_eq!(reply.message(), "smtp.example.com SIZE 1024 STARTTLS");
    }

    #[test]
    fn test_parse_bare_code() {
        let reply = Reply::parse(&lines(&["354"])).unwrap();
        assert_eq!(reply.code, ReplyCode::START_DATA);
        assert_eq!(reply.lines, vec![""]);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Reply::parse(&[]).is_err());
        assert!(Reply::parse(&lines(&["OK"])).is_err());
        assert!(Reply::parse(&lines(&["25O OK"])).is_err());
        assert!(Reply::parse(&lines(&["250:OK"])).is_err());
    }

    #[test]
    fn test_parse_rejects_mixed_codes() {
        let err = Reply::parse(&lines(&["250-first", "550 second"])).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn test_is_last_line() {
        assert!(Reply::is_last_line("250 OK"));
        assert!(Reply::is_last_line("354"));
        assert!(!Reply::is_last_line("250-PIPELINING"));
        assert!(!Reply::is_last_line("25"));
    }

    #[test]
    fn test_code_classes() {
        assert!(ReplyCode::SERVICE_READY.is_success());
        assert!(ReplyCode::START_DATA.is_intermediate());
        assert!(!ReplyCode::AUTH_FAILED.is_success());
        assert_eq!(ReplyCode::MAILBOX_UNAVAILABLE.to_string(), "550");
    }
}
