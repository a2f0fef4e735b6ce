//! RFC 5322 mailbox parsing and formatting.
//!
//! Accepts the forms found in practice:
//!
//! ```text
//! user@example.com
//! <user@example.com>
//! Jane Doe <user@example.com>
//! "Doe, Jane" <user@example.com>
//! =?UTF-8?B?...?= <user@example.com>
//! ```
//!
//! Comments (CFWS) and obsolete routing syntax are rejected.

use crate::encoding::{decode_rfc2047, encode_word};
use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// A mailbox: optional display name plus addr-spec.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Mailbox {
    /// Display name (optional).
    pub name: Option<String>,
    /// Bare `local@domain` address.
    pub address: String,
}

impl Mailbox {
    /// Creates a mailbox with just an address. The address is not validated
    /// until the message is serialized.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            name: None,
            address: address.into(),
        }
    }

    /// Creates a mailbox with a display name and address.
    #[must_use]
    pub fn with_name(name: impl Into<String>, address: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            name: (!name.is_empty()).then_some(name),
            address: address.into(),
        }
    }

    /// Parses a single RFC 5322 mailbox.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] naming the input if it is not a
    /// valid mailbox.
    pub fn parse(input: &str) -> Result<Self> {
        parse_mailbox(input).map_err(|reason| Error::invalid_address(input, reason))
    }

    /// Checks that [`Mailbox::address`] is a valid addr-spec.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if it is not.
    pub fn validate(&self) -> Result<()> {
        check_addr_spec(&self.address).map_err(|reason| Error::invalid_address(&self.address, reason))
    }
}

impl FromStr for Mailbox {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(name) = self.name.as_deref().filter(|n| !n.is_empty()) else {
            return f.write_str(&self.address);
        };

        if !name.is_ascii() || name.chars().any(char::is_control) {
            return write!(f, "{} <{}>", encode_word(name), self.address);
        }

        let is_phrase = name
            .split(' ')
            .all(|word| !word.is_empty() && word.chars().all(is_atext));
        if is_phrase {
            write!(f, "{name} <{}>", self.address)
        } else {
            f.write_str("\"")?;
            for c in name.chars() {
                if c == '"' || c == '\\' {
                    f.write_str("\\")?;
                }
                write!(f, "{c}")?;
            }
            write!(f, "\" <{}>", self.address)
        }
    }
}

fn parse_mailbox(input: &str) -> std::result::Result<Mailbox, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("no address".to_string());
    }

    if !s.ends_with('>') {
        check_addr_spec(s)?;
        return Ok(Mailbox::new(s));
    }

    let open = find_angle_open(s).ok_or("unmatched '>'")?;
    let address = s[open + 1..s.len() - 1].trim();
    check_addr_spec(address)?;

    let phrase = s[..open].trim();
    let name = if phrase.is_empty() {
        None
    } else {
        Some(parse_phrase(phrase)?)
    };

    Ok(Mailbox {
        name,
        address: address.to_string(),
    })
}

/// Finds the `<` opening the angle-addr, skipping quoted strings.
fn find_angle_open(s: &str) -> Option<usize> {
    let mut in_quotes = false;
    let mut escaped = false;
    let mut open = None;

    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            '<' if !in_quotes => open = Some(i),
            _ => {}
        }
    }

    open
}

/// Parses a display-name phrase: atoms, quoted strings and encoded-words.
fn parse_phrase(phrase: &str) -> std::result::Result<String, String> {
    let mut words = Vec::new();
    let mut rest = phrase;

    while !rest.is_empty() {
        if rest.starts_with('"') {
            let (word, consumed) = parse_quoted(rest)?;
            words.push(word);
            rest = rest[consumed..].trim_start();
            continue;
        }

        let end = rest.find(|c: char| c.is_whitespace() || c == '"').unwrap_or(rest.len());
        let token = &rest[..end];
        if token.starts_with("=?") && token.ends_with("?=") {
            words.push(decode_rfc2047(token).map_err(|e| e.to_string())?);
        } else if token.chars().all(|c| is_atext(c) || c == '.') {
            words.push(token.to_string());
        } else {
            return Err(format!("invalid display name '{phrase}'"));
        }
        rest = rest[end..].trim_start();
    }

    Ok(words.join(" "))
}

/// Parses a quoted-string at the start of `s`, returning its unescaped
/// content and the number of bytes consumed.
fn parse_quoted(s: &str) -> std::result::Result<(String, usize), String> {
    let mut content = String::new();
    let mut chars = s.char_indices().skip(1);

    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Ok((content, i + 1)),
            '\\' => match chars.next() {
                Some((_, escaped)) => content.push(escaped),
                None => break,
            },
            '\r' | '\n' => return Err("line break in quoted string".to_string()),
            other => content.push(other),
        }
    }

    Err("unterminated quoted string".to_string())
}

/// Validates `local-part@domain`.
fn check_addr_spec(addr: &str) -> std::result::Result<(), String> {
    if addr.is_empty() {
        return Err("empty address".to_string());
    }

    let at = addr.rfind('@').ok_or("missing @ in addr-spec")?;
    let (local, domain) = (&addr[..at], &addr[at + 1..]);

    if local.is_empty() {
        return Err("empty local part".to_string());
    }
    if local.starts_with('"') {
        let (_, consumed) = parse_quoted(local)?;
        if consumed != local.len() {
            return Err("trailing characters after quoted local part".to_string());
        }
    } else {
        check_dot_atom(local).map_err(|e| format!("local part: {e}"))?;
    }

    if domain.is_empty() {
        return Err("empty domain".to_string());
    }
    if let Some(literal) = domain.strip_prefix('[') {
        let inner = literal.strip_suffix(']').ok_or("unterminated domain literal")?;
        if !inner
            .chars()
            .all(|c| c.is_ascii_graphic() && !matches!(c, '[' | ']' | '\\'))
        {
            return Err("invalid domain literal".to_string());
        }
    } else {
        check_dot_atom(domain).map_err(|e| format!("domain: {e}"))?;
    }

    Ok(())
}

fn check_dot_atom(s: &str) -> std::result::Result<(), String> {
    for atom in s.split('.') {
        if atom.is_empty() {
            return Err("empty atom".to_string());
        }
        if let Some(bad) = atom.chars().find(|c| !is_atext(*c)) {
            return Err(format!("invalid character '{bad}'"));
        }
    }
    Ok(())
}

/// RFC 5322 `atext`, extended with non-ASCII per RFC 6532.
fn is_atext(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || "!#$%&'*+-/=?^_`{|}~".contains(c)
        || (!c.is_ascii() && !c.is_control() && !c.is_whitespace())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_address() {
        let mailbox = Mailbox::parse("user@example.com").unwrap();
        assert_eq!(mailbox.address, "user@example.com");
        assert!(mailbox.name.is_none());
    }

    #[test]
    fn test_parse_angle_only() {
        let mailbox = Mailbox::parse("  <user@example.com> ").unwrap();
        assert_eq!(mailbox.address, "user@example.com");
        assert!(mailbox.name.is_none());
    }

    #[test]
    fn test_parse_with_name() {
        let mailbox = Mailbox::parse("Jane Doe <jane@example.com>").unwrap();
        assert_eq!(mailbox.name.as_deref(), Some("Jane Doe"));
        assert_eq!(mailbox.address, "jane@example.com");
    }

    #[test]
    fn test_parse_quoted_name() {
        let mailbox = Mailbox::parse(r#""Doe, Jane \"JD\"" <jane@example.com>"#).unwrap();
        assert_eq!(mailbox.name.as_deref(), Some("Doe, Jane \"JD\""));
    }

    #[test]
    fn test_parse_encoded_name() {
        let mailbox = Mailbox::parse("=?utf-8?B?SMOpbGxv?= <h@example.com>").unwrap();
        assert_eq!(mailbox.name.as_deref(), Some("Héllo"));
    }

    #[test]
    fn test_parse_domain_literal_and_quoted_local() {
        assert!(Mailbox::parse("user@[192.168.0.1]").is_ok());
        assert!(Mailbox::parse(r#""john smith"@example.com"#).is_ok());
        assert!(Mailbox::parse("postmaster@localhost").is_ok());
    }

    #[test]
    fn test_parse_rejects_invalid() {
        for input in [
            "not-an-email",
            "",
            "@example.com",
            "user@",
            "user@@example.com",
            "us er@example.com",
            "user@exa..mple.com",
            "Jane <jane@example.com",
            "Jane, Doe <jane@example.com>",
            "\"unterminated <jane@example.com>",
        ] {
            assert!(Mailbox::parse(input).is_err(), "accepted {input:?}");
        }
    }

    #[test]
    fn test_parse_error_names_input() {
        let err = Mailbox::parse("not-an-email").unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("'not-an-email'"));
    }

    #[test]
    fn test_display_forms() {
        assert_eq!(Mailbox::new("a@example.com").to_string(), "a@example.com");
        assert_eq!(
            Mailbox::with_name("Jane Doe", "jane@example.com").to_string(),
            "Jane Doe <jane@example.com>"
        );
        assert_eq!(
            Mailbox::with_name("Doe, Jane", "jane@example.com").to_string(),
            "\"Doe, Jane\" <jane@example.com>"
        );
        assert_eq!(
            Mailbox::with_name("Héllo", "h@example.com").to_string(),
            "=?UTF-8?B?SMOpbGxv?= <h@example.com>"
        );
        assert!(
            !Mailbox::with_name("Tab\there", "t@example.com")
                .to_string()
                .contains('\t')
        );
    }

    #[test]
    fn test_display_parses_back() {
        for mailbox in [
            Mailbox::with_name("Doe, Jane \"JD\"", "jane@example.com"),
            Mailbox::with_name("Zoë Ångström", "zoe@example.com"),
            Mailbox::with_name("Evil\r\nBcc: victim@example.net", "from@example.com"),
            Mailbox::new("plain@example.com"),
        ] {
            assert_eq!(Mailbox::parse(&mailbox.to_string()).unwrap(), mailbox);
        }
    }

    #[test]
    fn test_with_name_empty_is_none() {
        assert!(Mailbox::with_name("", "a@example.com").name.is_none());
    }
}
