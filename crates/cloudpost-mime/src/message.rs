//! Outgoing message model and RFC 5322 / MIME serialization.

use crate::address::Mailbox;
use crate::attachment::{Attachment, sanitize_filename};
use crate::content_type::ContentType;
use crate::encoding::{encode_base64_wrapped, encode_word};
use crate::error::{Error, Result};
use crate::header::{Header, Headers};
use crate::status::{MessageStatus, SendFailure};
use chrono::{DateTime, FixedOffset, Local, Utc};
use std::collections::BTreeMap;
use std::path::Path;

/// Body content type used when none is given.
pub const DEFAULT_BODY_CONTENT_TYPE: &str = "text/html";

/// RFC 5322 date format with a numeric zone (`Mon, 02 Jan 2006 15:04:05 -0700`).
const DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

/// An email to deliver, together with its delivery state.
///
/// Recipient lists hold formatted mailbox strings; they are parsed and
/// validated by [`Message::tolist`] when the message is sent.
///
/// Attachments are keyed by sanitized filename. Attaching two files whose
/// names sanitize to the same key keeps only the last one; use
/// [`Message::attach_buffer_unique`] to reject collisions instead.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Message {
    /// Caller-assigned identifier (may be empty).
    pub id: String,
    /// Sender.
    pub from: Mailbox,
    /// Primary recipients.
    pub mail_to: Vec<String>,
    /// Carbon-copy recipients.
    pub cc: Vec<String>,
    /// Blind carbon-copy recipients (never written to headers).
    pub bcc: Vec<String>,
    /// Reply-To addresses.
    pub reply: Vec<String>,
    /// Subject line.
    pub subject: String,
    /// Body text.
    pub body: String,
    /// MIME type of the body, without parameters.
    pub body_content_type: String,
    /// Custom headers, emitted verbatim in insertion order.
    pub headers: Headers,
    /// Attachments keyed by sanitized filename.
    pub attachments: BTreeMap<String, Attachment>,
    status: MessageStatus,
    error: Option<SendFailure>,
    date_received: DateTime<Utc>,
    date_status: DateTime<Utc>,
}

impl Message {
    /// Creates a message in the [`MessageStatus::NotSent`] state.
    ///
    /// An empty `body_content_type` defaults to `text/html`.
    #[must_use]
    pub fn new(
        from: Mailbox,
        subject: impl Into<String>,
        body: impl Into<String>,
        body_content_type: &str,
    ) -> Self {
        let now = Utc::now();
        let body_content_type = if body_content_type.trim().is_empty() {
            DEFAULT_BODY_CONTENT_TYPE.to_string()
        } else {
            body_content_type.trim().to_string()
        };

        Self {
            id: String::new(),
            from,
            mail_to: Vec::new(),
            cc: Vec::new(),
            bcc: Vec::new(),
            reply: Vec::new(),
            subject: subject.into(),
            body: body.into(),
            body_content_type,
            headers: Headers::new(),
            attachments: BTreeMap::new(),
            status: MessageStatus::NotSent,
            error: None,
            date_received: now,
            date_status: now,
        }
    }

    /// Sets the identifier.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Replaces the `To` list.
    #[must_use]
    pub fn with_to<I, S>(mut self, recipients: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mail_to = recipients.into_iter().map(Into::into).collect();
        self
    }

    /// Replaces the `Cc` list.
    #[must_use]
    pub fn with_cc<I, S>(mut self, recipients: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cc = recipients.into_iter().map(Into::into).collect();
        self
    }

    /// Replaces the `Bcc` list.
    #[must_use]
    pub fn with_bcc<I, S>(mut self, recipients: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.bcc = recipients.into_iter().map(Into::into).collect();
        self
    }

    /// Replaces the `Reply-To` list.
    #[must_use]
    pub fn with_reply<I, S>(mut self, addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reply = addresses.into_iter().map(Into::into).collect();
        self
    }

    /// Appends a recipient to the `To` list and returns the list.
    pub fn add_to(&mut self, address: &Mailbox) -> &[String] {
        self.mail_to.push(address.to_string());
        &self.mail_to
    }

    /// Appends a recipient to the `Cc` list and returns the list.
    pub fn add_cc(&mut self, address: &Mailbox) -> &[String] {
        self.cc.push(address.to_string());
        &self.cc
    }

    /// Appends a recipient to the `Bcc` list and returns the list.
    pub fn add_bcc(&mut self, address: &Mailbox) -> &[String] {
        self.bcc.push(address.to_string());
        &self.bcc
    }

    /// Appends a `Reply-To` address and returns the list.
    pub fn add_reply_to(&mut self, address: &Mailbox) -> &[String] {
        self.reply.push(address.to_string());
        &self.reply
    }

    /// Attaches a file as a regular attachment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read.
    pub fn attach(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.attach_file(path.as_ref(), false)
    }

    /// Attaches a file as inline content.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read.
    pub fn inline(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.attach_file(path.as_ref(), true)
    }

    fn attach_file(&mut self, path: &Path, inline: bool) -> Result<()> {
        let data = std::fs::read(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        self.insert_attachment(Attachment::new(&filename, data, inline));
        Ok(())
    }

    /// Attaches an in-memory buffer. A previous attachment with the same
    /// sanitized name is replaced.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if `data` is empty.
    pub fn attach_buffer(
        &mut self,
        filename: &str,
        data: impl Into<Vec<u8>>,
        inline: bool,
    ) -> Result<()> {
        let data = data.into();
        if data.is_empty() {
            return Err(Error::Validation(format!(
                "buffer for attachment '{filename}' is empty"
            )));
        }

        self.insert_attachment(Attachment::new(filename, data, inline));
        Ok(())
    }

    /// Like [`Message::attach_buffer`], but refuses to replace an existing
    /// attachment with the same sanitized name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if `data` is empty or the name collides.
    pub fn attach_buffer_unique(
        &mut self,
        filename: &str,
        data: impl Into<Vec<u8>>,
        inline: bool,
    ) -> Result<()> {
        let key = sanitize_filename(filename);
        if self.attachments.contains_key(&key) {
            return Err(Error::Validation(format!(
                "attachment '{filename}' collides with existing attachment '{key}'"
            )));
        }
        self.attach_buffer(filename, data, inline)
    }

    fn insert_attachment(&mut self, attachment: Attachment) {
        self.attachments
            .insert(attachment.filename.clone(), attachment);
    }

    /// Appends a custom header and returns it.
    pub fn add_header(&mut self, key: impl Into<String>, value: impl Into<String>) -> Header {
        self.headers.add(key, value)
    }

    /// Returns the envelope recipients: `To`, then `Cc`, then `Bcc`, each
    /// reduced to its bare address. Duplicates are kept.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] naming the first entry that is not a
    /// valid mailbox.
    pub fn tolist(&self) -> Result<Vec<String>> {
        self.mail_to
            .iter()
            .chain(&self.cc)
            .chain(&self.bcc)
            .map(|recipient| Mailbox::parse(recipient).map(|mailbox| mailbox.address))
            .collect()
    }

    /// Serializes the message for SMTP `DATA`.
    ///
    /// Each call uses a fresh multipart boundary and the current time for the
    /// `Date` header. The message itself is not modified.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the sender is invalid or a `To`,
    /// `Cc` or `Reply-To` entry contains a line break, and
    /// [`Error::Encoding`] if the subject contains replacement characters.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.estimated_size());
        self.write_to(&mut buf)?;
        Ok(buf)
    }

    /// Serializes the message, appending to a caller-provided buffer so it
    /// can be reused across messages. Nothing is written on error.
    ///
    /// # Errors
    ///
    /// Same as [`Message::to_bytes`].
    pub fn write_to(&self, buf: &mut Vec<u8>) -> Result<()> {
        self.validate_for_wire()?;
        let date = Local::now().fixed_offset();
        let boundary = self.new_boundary();
        self.render(buf, &date, &boundary);
        Ok(())
    }

    fn validate_for_wire(&self) -> Result<()> {
        self.from.validate()?;

        if let Some(entry) = self
            .mail_to
            .iter()
            .chain(&self.cc)
            .chain(&self.reply)
            .find(|entry| entry.contains(['\r', '\n']))
        {
            return Err(Error::invalid_address(entry.as_str(), "line break in header value"));
        }

        if self.subject.contains(char::REPLACEMENT_CHARACTER) {
            return Err(Error::Encoding(
                "subject contains invalid UTF-8 sequences".to_string(),
            ));
        }

        Ok(())
    }

    /// Generates a boundary that does not occur in the body text.
    ///
    /// Attachment payloads are Base64 and custom headers precede the first
    /// boundary, so the body is the only place a collision can hurt.
    fn new_boundary(&self) -> String {
        loop {
            let boundary = format!("cloudpost{}", uuid::Uuid::new_v4().simple());
            if !self.body.contains(&boundary) {
                return boundary;
            }
        }
    }

    pub(crate) fn render(&self, buf: &mut Vec<u8>, date: &DateTime<FixedOffset>, boundary: &str) {
        write_header(buf, "From", &self.from.to_string());
        write_header(buf, "Date", &date.format(DATE_FORMAT).to_string());
        write_header(buf, "To", &self.mail_to.join(", "));
        if !self.cc.is_empty() {
            write_header(buf, "Cc", &self.cc.join(", "));
        }
        write_header(buf, "Subject", &encode_word(&self.subject));
        if !self.reply.is_empty() {
            write_header(buf, "Reply-To", &self.reply.join(", "));
        }
        write_header(buf, "MIME-Version", "1.0");
        for header in &self.headers {
            write_header(buf, &header.key, &header.value);
        }

        let body_type = format!("{}; charset=utf-8", self.body_content_type());

        if self.attachments.is_empty() {
            write_header(buf, "Content-Type", &body_type);
            buf.extend_from_slice(b"\r\n");
            write_line(buf, &self.body);
            return;
        }

        write_header(
            buf,
            "Content-Type",
            &ContentType::multipart_mixed(boundary).to_string(),
        );
        buf.extend_from_slice(b"\r\n");

        write_delimiter(buf, boundary);
        write_header(buf, "Content-Type", &body_type);
        buf.extend_from_slice(b"\r\n");
        write_line(buf, &self.body);

        for attachment in self.attachments.values() {
            write_delimiter(buf, boundary);
            write_header(
                buf,
                "Content-Type",
                &ContentType::guess(&attachment.filename).to_string(),
            );
            write_header(
                buf,
                "Content-Disposition",
                &format!("attachment; filename=\"{}\"", attachment.filename),
            );
            if attachment.inline {
                write_header(buf, "Content-ID", &format!("<{}>", attachment.filename));
            }
            write_header(buf, "Content-Transfer-Encoding", "base64");
            buf.extend_from_slice(b"\r\n");
            write_line(buf, &encode_base64_wrapped(&attachment.data));
        }

        buf.extend_from_slice(b"--");
        buf.extend_from_slice(boundary.as_bytes());
        buf.extend_from_slice(b"--\r\n");
    }

    fn body_content_type(&self) -> &str {
        if self.body_content_type.is_empty() {
            DEFAULT_BODY_CONTENT_TYPE
        } else {
            &self.body_content_type
        }
    }

    fn estimated_size(&self) -> usize {
        let attachments: usize = self
            .attachments
            .values()
            .map(|a| a.data.len() * 4 / 3 + 256)
            .sum();
        1024 + self.body.len() + attachments
    }

    /// Current delivery status.
    #[must_use]
    pub const fn status(&self) -> MessageStatus {
        self.status
    }

    /// Failure recorded by the last transition to `SendError`.
    #[must_use]
    pub const fn error(&self) -> Option<&SendFailure> {
        self.error.as_ref()
    }

    /// When the message was created.
    #[must_use]
    pub const fn date_received(&self) -> DateTime<Utc> {
        self.date_received
    }

    /// When the status last changed.
    #[must_use]
    pub const fn date_status(&self) -> DateTime<Utc> {
        self.date_status
    }

    /// Returns true once the message reached `Sent` or `SendError`.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Moves the message to `status`, stamping the transition time.
    ///
    /// Any recorded failure is cleared unless `status` is `SendError`.
    pub fn set_status(&mut self, status: MessageStatus) {
        self.status = status;
        self.date_status = Utc::now();
        if status != MessageStatus::SendError {
            self.error = None;
        }
    }

    /// Moves the message to `SendError`, recording why.
    pub fn fail(&mut self, failure: impl Into<SendFailure>) {
        self.set_status(MessageStatus::SendError);
        self.error = Some(failure.into());
    }
}

fn write_header(buf: &mut Vec<u8>, name: &str, value: &str) {
    buf.extend_from_slice(name.as_bytes());
    buf.extend_from_slice(b": ");
    buf.extend_from_slice(value.as_bytes());
    buf.extend_from_slice(b"\r\n");
}

fn write_line(buf: &mut Vec<u8>, text: &str) {
    buf.extend_from_slice(text.as_bytes());
    buf.extend_from_slice(b"\r\n");
}

fn write_delimiter(buf: &mut Vec<u8>, boundary: &str) {
    buf.extend_from_slice(b"--");
    buf.extend_from_slice(boundary.as_bytes());
    buf.extend_from_slice(b"\r\n");
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::similar_names)]
mod tests {
    use super::*;
    use crate::encoding::{decode_base64, encode_base64};
    use chrono::TimeZone;

    fn sample_message() -> Message {
        Message::new(
            Mailbox::with_name("Test", "from@email.com"),
            "Test Subject",
            "This is a test body.",
            "text/plain",
        )
        .with_to(["to@example.com"])
        .with_cc(["cc@example.com"])
        .with_bcc(["bcc@example.com"])
        .with_reply(["reply@example.com"])
    }

    fn fixed_date() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(2 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 5, 9, 7, 1)
            .unwrap()
    }

    fn render(message: &Message, boundary: &str) -> String {
        let mut buf = Vec::new();
        message.render(&mut buf, &fixed_date(), boundary);
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_new_message_defaults() {
        let msg = Message::new(Mailbox::new("a@example.com"), "s", "b", "");
        assert_eq!(msg.body_content_type, "text/html");
        assert_eq!(msg.status(), MessageStatus::NotSent);
        assert!(msg.error().is_none());
        assert_eq!(msg.date_received(), msg.date_status());
    }

    #[test]
    fn test_new_message_keeps_content_type() {
        let msg = sample_message();
        assert_eq!(msg.body_content_type, "text/plain");
        assert_eq!(msg.mail_to, vec!["to@example.com"]);
    }

    #[test]
    fn test_add_recipients_return_lists() {
        let mut msg = Message::new(Mailbox::new("a@example.com"), "s", "b", "");
        assert_eq!(msg.add_to(&Mailbox::new("x@example.com")), ["x@example.com"]);
        let cc = msg.add_cc(&Mailbox::with_name("Y Person", "y@example.com"));
        assert_eq!(cc, ["Y Person <y@example.com>"]);
        msg.add_bcc(&Mailbox::new("z@example.com"));
        let bcc = msg.add_bcc(&Mailbox::new("z@example.com"));
        assert_eq!(bcc.len(), 2);
    }

    #[test]
    fn test_tolist_order_and_normalization() {
        let mut msg = sample_message();
        assert_eq!(
            msg.tolist().unwrap(),
            vec!["to@example.com", "cc@example.com", "bcc@example.com"]
        );

        msg.add_to(&Mailbox::with_name("Named", "to@example.com"));
        assert_eq!(
            msg.tolist().unwrap(),
            vec![
                "to@example.com",
                "to@example.com",
                "cc@example.com",
                "bcc@example.com"
            ]
        );
    }

    #[test]
    fn test_tolist_rejects_invalid_cc() {
        let msg = sample_message().with_cc(["not-an-email"]);
        let err = msg.tolist().unwrap_err();
        assert!(err.is_validation());
        assert!(matches!(&err, Error::InvalidAddress { address, .. } if address == "not-an-email"));
    }

    #[test]
    fn test_attach_buffer_sanitizes_key() {
        let mut msg = sample_message();
        msg.attach_buffer("my file@v1.txt", b"hello".to_vec(), false)
            .unwrap();
        let attachment = msg.attachments.get("my_file_v1.txt").unwrap();
        assert_eq!(attachment.filename, "my_file_v1.txt");
        assert!(!attachment.inline);
    }

    #[test]
    fn test_attach_buffer_rejects_empty() {
        let mut msg = sample_message();
        let err = msg.attach_buffer("empty.txt", Vec::new(), false).unwrap_err();
        assert!(err.is_validation());
        assert!(msg.attachments.is_empty());
    }

    #[test]
    fn test_attach_buffer_collision_last_write_wins() {
        let mut msg = sample_message();
        msg.attach_buffer("a b.txt", b"first".to_vec(), false).unwrap();
        msg.attach_buffer("a@b.txt", b"second".to_vec(), true).unwrap();

        assert_eq!(msg.attachments.len(), 1);
        let attachment = &msg.attachments["a_b.txt"];
        assert_eq!(attachment.data, b"second");
        assert!(attachment.inline);
    }

    #[test]
    fn test_attach_buffer_unique_rejects_collision() {
        let mut msg = sample_message();
        msg.attach_buffer_unique("a b.txt", b"first".to_vec(), false)
            .unwrap();
        let err = msg
            .attach_buffer_unique("a@b.txt", b"second".to_vec(), false)
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(msg.attachments["a_b.txt"].data, b"first");
    }

    #[test]
    fn test_attach_missing_file() {
        let mut msg = sample_message();
        let err = msg.attach("/definitely/not/here.txt").unwrap_err();
        assert!(err.is_io());
    }

    #[test]
    fn test_add_header_returns_header() {
        let mut msg = sample_message();
        let header = msg.add_header("X-Test", "1");
        assert_eq!(header, Header::new("X-Test", "1"));
        assert_eq!(msg.headers.len(), 1);
    }

    #[test]
    fn test_render_single_part() {
        let mut msg = sample_message();
        msg.add_header("X-Campaign", "spring");
        msg.add_header("X-Priority", "1");

        let expected = concat!(
            "From: Test <from@email.com>\r\n",
            "Date: Tue, 05 Mar 2024 09:07:01 +0200\r\n",
            "To: to@example.com\r\n",
            "Cc: cc@example.com\r\n",
            "Subject: =?UTF-8?B?VGVzdCBTdWJqZWN0?=\r\n",
            "Reply-To: reply@example.com\r\n",
            "MIME-Version: 1.0\r\n",
            "X-Campaign: spring\r\n",
            "X-Priority: 1\r\n",
            "Content-Type: text/plain; charset=utf-8\r\n",
            "\r\n",
            "This is a test body.\r\n",
        );
        assert_eq!(render(&msg, "unused"), expected);
    }

    #[test]
    fn test_render_omits_empty_cc_and_reply_and_bcc() {
        let msg = Message::new(Mailbox::new("from@example.com"), "Hi", "Body", "")
            .with_to(["a@example.com", "b@example.com"])
            .with_bcc(["hidden@example.com"]);
        let out = render(&msg, "unused");

        assert!(out.contains("To: a@example.com, b@example.com\r\n"));
        assert!(!out.contains("Cc:"));
        assert!(!out.contains("Reply-To:"));
        assert!(!out.contains("hidden@example.com"));
        assert!(out.contains("Content-Type: text/html; charset=utf-8\r\n"));
    }

    #[test]
    fn test_render_multipart() {
        let mut msg = sample_message();
        let data: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
        msg.attach_buffer("data.bin", data.clone(), false).unwrap();

        let out = render(&msg, "BOUNDARY42");

        assert!(out.contains("Content-Type: multipart/mixed; boundary=BOUNDARY42\r\n\r\n"));
        assert_eq!(out.matches("--BOUNDARY42\r\n").count(), 2);
        assert_eq!(out.matches("--BOUNDARY42--\r\n").count(), 1);
        assert!(out.ends_with("--BOUNDARY42--\r\n"));
        assert!(out.contains(concat!(
            "--BOUNDARY42\r\n",
            "Content-Type: text/plain; charset=utf-8\r\n",
            "\r\n",
            "This is a test body.\r\n",
        )));
        assert!(out.contains("Content-Type: application/octet-stream\r\n"));
        assert!(out.contains("Content-Disposition: attachment; filename=\"data.bin\"\r\n"));
        assert!(out.contains("Content-Transfer-Encoding: base64\r\n\r\n"));

        let (_, payload) = out
            .split_once("Content-Transfer-Encoding: base64\r\n\r\n")
            .unwrap();
        let payload = payload.split("--BOUNDARY42--").next().unwrap();
        assert_eq!(decode_base64(payload).unwrap(), data);
    }

    #[test]
    fn test_render_inline_attachment() {
        let mut msg = sample_message();
        msg.attach_buffer("logo.png", vec![0x89, b'P', b'N', b'G'], true)
            .unwrap();
        let out = render(&msg, "B");

        assert!(out.contains("Content-Type: image/png\r\n"));
        assert!(out.contains("Content-Disposition: attachment; filename=\"logo.png\"\r\n"));
        assert!(!out.contains("Content-Disposition: inline"));
        assert!(out.contains("Content-ID: <logo.png>\r\n"));
    }

    #[test]
    fn test_to_bytes_encodes_line_breaks_in_names() {
        let msg = Message::new(
            Mailbox::with_name("Evil\r\nBcc: victim@example.net", "from@example.com"),
            "s",
            "b",
            "",
        )
        .with_to(["to@example.com"]);
        let out = String::from_utf8(msg.to_bytes().unwrap()).unwrap();

        assert!(!out.lines().any(|line| line.starts_with("Bcc:")));
        let from = out.lines().find(|line| line.starts_with("From: ")).unwrap();
        assert!(from.starts_with("From: =?UTF-8?B?"));
        assert!(from.ends_with(" <from@example.com>"));
    }

    #[test]
    fn test_to_bytes_rejects_line_breaks_in_recipients() {
        let msg = sample_message().with_cc(["cc@example.com\r\nBcc: victim@example.net"]);
        assert!(matches!(msg.to_bytes(), Err(Error::InvalidAddress { .. })));

        let mut msg = sample_message();
        msg.add_to(&Mailbox::with_name("Line\nBreak", "lb@example.com"));
        assert!(msg.to_bytes().is_ok());
    }

    #[test]
    fn test_render_attachments_in_name_order() {
        let mut msg = sample_message();
        msg.attach_buffer("b.txt", b"b".to_vec(), false).unwrap();
        msg.attach_buffer("a.txt", b"a".to_vec(), false).unwrap();
        let out = render(&msg, "B");

        let a = out.find("filename=\"a.txt\"").unwrap();
        let b = out.find("filename=\"b.txt\"").unwrap();
        assert!(a < b);
    }

    #[test]
    fn test_to_bytes_subject_encoding() {
        let msg = Message::new(Mailbox::new("f@example.com"), "Grüße 👋", "b", "");
        let out = String::from_utf8(msg.to_bytes().unwrap()).unwrap();
        let expected = format!("Subject: =?UTF-8?B?{}?=\r\n", encode_base64("Grüße 👋".as_bytes()));
        assert!(out.contains(&expected));
    }

    #[test]
    fn test_to_bytes_rejects_invalid_from() {
        let msg = Message::new(Mailbox::new("not an address"), "s", "b", "");
        assert!(msg.to_bytes().unwrap_err().is_validation());
    }

    #[test]
    fn test_to_bytes_rejects_replacement_char_in_subject() {
        let msg = Message::new(
            Mailbox::new("f@example.com"),
            String::from_utf8_lossy(b"bad \xff subject"),
            "b",
            "",
        );
        assert!(msg.to_bytes().unwrap_err().is_encoding());
    }

    #[test]
    fn test_to_bytes_uses_fresh_boundary() {
        let mut msg = sample_message();
        msg.attach_buffer("a.txt", b"a".to_vec(), false).unwrap();

        let boundary_of = |bytes: Vec<u8>| {
            let text = String::from_utf8(bytes).unwrap();
            let start = text.find("boundary=").unwrap() + "boundary=".len();
            let end = text[start..].find("\r\n").unwrap() + start;
            text[start..end].to_string()
        };

        let first = boundary_of(msg.to_bytes().unwrap());
        let second = boundary_of(msg.to_bytes().unwrap());
        assert_ne!(first, second);
        assert!(first.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_to_bytes_does_not_mutate() {
        let mut msg = sample_message();
        msg.attach_buffer("a.txt", b"a".to_vec(), false).unwrap();
        let before = msg.clone();
        msg.to_bytes().unwrap();
        assert_eq!(msg, before);
    }

    #[test]
    fn test_write_to_appends_and_leaves_buffer_on_error() {
        let mut buf = b"prefix".to_vec();
        sample_message().write_to(&mut buf).unwrap();
        assert!(buf.starts_with(b"prefixFrom: "));

        let mut buf = b"prefix".to_vec();
        let bad = Message::new(Mailbox::new("bad"), "s", "b", "");
        assert!(bad.write_to(&mut buf).is_err());
        assert_eq!(buf, b"prefix");
    }

    #[test]
    fn test_status_transitions_stamp_time_and_error() {
        let mut msg = sample_message();
        msg.set_status(MessageStatus::Queued);
        assert_eq!(msg.status(), MessageStatus::Queued);
        assert!(msg.date_status() >= msg.date_received());

        msg.fail(SendFailure::transport("connection refused"));
        assert_eq!(msg.status(), MessageStatus::SendError);
        assert_eq!(msg.error().unwrap().message, "connection refused");
        assert!(msg.is_terminal());

        msg.set_status(MessageStatus::Sent);
        assert!(msg.error().is_none());
    }
}
