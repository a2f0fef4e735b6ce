//! Type-state SMTP client.

use std::marker::PhantomData;

use base64::Engine;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::trace;

use super::{NetworkStream, ServerInfo, SmtpStream};
use crate::command::Command;
use crate::error::{Error, Result};
use crate::types::{Address, AuthMechanism, Extension, Reply, ReplyCode};

/// Type-state marker: greeting received, not authenticated.
#[derive(Debug)]
pub struct Connected;

/// Type-state marker: AUTH succeeded.
#[derive(Debug)]
pub struct Authenticated;

/// Type-state marker: MAIL FROM accepted.
#[derive(Debug)]
pub struct MailTransaction;

/// Type-state marker: at least one RCPT TO accepted.
#[derive(Debug)]
pub struct RecipientAdded;

/// Type-state marker: DATA accepted, server waits for content.
#[derive(Debug)]
pub struct Data;

/// States from which a mail transaction can start.
pub trait Ready: sealed::Sealed {}
impl Ready for Connected {}
impl Ready for Authenticated {}

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::Connected {}
    impl Sealed for super::Authenticated {}
}

/// SMTP client over stream `S`, in session state `State`.
#[derive(Debug)]
pub struct Client<State, S = NetworkStream> {
    stream: SmtpStream<S>,
    server_info: ServerInfo,
    _state: PhantomData<State>,
}

impl<S: AsyncRead + AsyncWrite + Unpin> Client<Connected, S> {
    /// Creates a client from a stream and reads the server greeting.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the greeting fails or the server refuses
    /// the session.
    pub async fn from_stream(mut stream: SmtpStream<S>) -> Result<Self> {
        let greeting = read_reply(&mut stream).await?;
        ensure(&greeting, ReplyCode::SERVICE_READY)?;

        let hostname = greeting
            .lines
            .first()
            .and_then(|line| line.split_whitespace().next())
            .unwrap_or("unknown")
            .to_string();

        Ok(Self {
            stream,
            server_info: ServerInfo {
                hostname,
                ..ServerInfo::default()
            },
            _state: PhantomData,
        })
    }

    /// Sends EHLO and records the advertised extensions.
    ///
    /// # Errors
    ///
    /// Returns an error if the EHLO command fails.
    pub async fn ehlo(mut self, client_hostname: &str) -> Result<Self> {
        let reply = self
            .send_command(&Command::Ehlo {
                hostname: client_hostname.to_string(),
            })
            .await?;
        ensure_success(&reply)?;

        // First line is the server's greeting, the rest are extensions.
        self.server_info.extensions = reply
            .lines
            .iter()
            .skip(1)
            .map(String::as_str)
            .map(Extension::parse)
            .collect();
        Ok(self)
    }

    /// Authenticates using the PLAIN mechanism.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects the credentials.
    pub async fn auth_plain(
        mut self,
        username: &str,
        password: &str,
    ) -> Result<Client<Authenticated, S>> {
        let credentials = format!("\0{username}\0{password}");
        let encoded = base64::engine::general_purpose::STANDARD.encode(credentials.as_bytes());

        let reply = self
            .send_command(&Command::Auth {
                mechanism: AuthMechanism::Plain,
                initial_response: Some(encoded),
            })
            .await?;
        ensure_success(&reply)?;

        Ok(self.transition())
    }
}

impl Client<Connected, NetworkStream> {
    /// Upgrades the connection to TLS using STARTTLS.
    ///
    /// Extensions advertised before the upgrade are discarded; send EHLO
    /// again afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if STARTTLS is not advertised or the upgrade fails.
    pub async fn starttls(mut self, hostname: &str) -> Result<Self> {
        if !self.server_info.supports_starttls() {
            return Err(Error::NotSupported("STARTTLS".into()));
        }

        let reply = self.send_command(&Command::StartTls).await?;
        ensure(&reply, ReplyCode::SERVICE_READY)?;

        let tls = self.stream.into_inner().upgrade_to_tls(hostname).await?;
        self.stream = SmtpStream::new(tls);
        self.server_info.extensions.clear();
        Ok(self)
    }
}

impl<State: Ready, S: AsyncRead + AsyncWrite + Unpin> Client<State, S> {
    /// Starts a mail transaction.
    ///
    /// When `size` is given and the server advertises SIZE, the size is
    /// declared on the command and checked against the server's limit
    /// first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MessageTooLarge`] if the message exceeds the
    /// advertised limit, or an error if MAIL FROM is rejected.
    pub async fn mail_from(
        mut self,
        from: Address,
        size: Option<usize>,
    ) -> Result<Client<MailTransaction, S>> {
        let size = if self.server_info.supports_size() {
            size
        } else {
            None
        };
        if let (Some(size), Some(limit)) = (size, self.server_info.max_message_size()) {
            if limit > 0 && size > limit {
                return Err(Error::MessageTooLarge { size, limit });
            }
        }

        let reply = self.send_command(&Command::MailFrom { from, size }).await?;
        ensure_success(&reply)?;

        Ok(self.transition())
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> Client<MailTransaction, S> {
    /// Adds the first recipient.
    ///
    /// # Errors
    ///
    /// Returns an error if RCPT TO is rejected.
    pub async fn rcpt_to(mut self, to: Address) -> Result<Client<RecipientAdded, S>> {
        let reply = self.send_command(&Command::RcptTo { to }).await?;
        ensure_success(&reply)?;
        Ok(self.transition())
    }

    /// Aborts the transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if RSET fails.
    pub async fn reset(self) -> Result<Client<Connected, S>> {
        self.rset().await
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> Client<RecipientAdded, S> {
    /// Adds another recipient.
    ///
    /// # Errors
    ///
    /// Returns an error if RCPT TO is rejected.
    pub async fn rcpt_to(mut self, to: Address) -> Result<Self> {
        let reply = self.send_command(&Command::RcptTo { to }).await?;
        ensure_success(&reply)?;
        Ok(self)
    }

    /// Begins sending message data.
    ///
    /// # Errors
    ///
    /// Returns an error unless the server answers 354.
    pub async fn data(mut self) -> Result<Client<Data, S>> {
        let reply = self.send_command(&Command::Data).await?;
        ensure(&reply, ReplyCode::START_DATA)?;
        Ok(self.transition())
    }

    /// Aborts the transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if RSET fails.
    pub async fn reset(self) -> Result<Client<Connected, S>> {
        self.rset().await
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> Client<Data, S> {
    /// Sends the message content and completes the transaction.
    ///
    /// Line endings are normalized to CRLF, lines starting with `.` are
    /// dot-stuffed and the terminating `.` line is appended.
    ///
    /// # Errors
    ///
    /// Returns an error if sending fails or the server rejects the message.
    pub async fn send_message(mut self, message: &[u8]) -> Result<Client<Connected, S>> {
        trace!(bytes = message.len(), "C: <message data>");
        self.stream.write_all(&encode_data(message)).await?;

        let reply = read_reply(&mut self.stream).await?;
        ensure_success(&reply)?;

        Ok(self.transition())
    }
}

impl<State, S: AsyncRead + AsyncWrite + Unpin> Client<State, S> {
    /// Returns what the server advertised.
    pub const fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    /// Sends QUIT and closes the session (available in any state).
    ///
    /// # Errors
    ///
    /// Returns an error if the server answers QUIT with an error.
    pub async fn quit(mut self) -> Result<()> {
        let reply = self.send_command(&Command::Quit).await?;
        if !reply.is_success() {
            return Err(Error::from_reply(&reply));
        }
        Ok(())
    }

    async fn rset(mut self) -> Result<Client<Connected, S>> {
        let reply = self.send_command(&Command::Rset).await?;
        ensure_success(&reply)?;
        Ok(self.transition())
    }

    async fn send_command(&mut self, cmd: &Command) -> Result<Reply> {
        trace!("C: {cmd}");
        self.stream.write_all(&cmd.serialize()).await?;
        read_reply(&mut self.stream).await
    }

    fn transition<Next>(self) -> Client<Next, S> {
        Client {
            stream: self.stream,
            server_info: self.server_info,
            _state: PhantomData,
        }
    }
}

async fn read_reply<S: AsyncRead + AsyncWrite + Unpin>(
    stream: &mut SmtpStream<S>,
) -> Result<Reply> {
    let mut lines = Vec::new();
    loop {
        let line = stream.read_line().await?;
        trace!("S: {line}");
        let last = Reply::is_last_line(&line);
        lines.push(line);
        if last {
            break;
        }
    }
    Reply::parse(&lines)
}

fn ensure_success(reply: &Reply) -> Result<()> {
    if reply.is_success() {
        Ok(())
    } else {
        Err(Error::from_reply(reply))
    }
}

fn ensure(reply: &Reply, expected: ReplyCode) -> Result<()> {
    if reply.code == expected {
        Ok(())
    } else {
        Err(Error::from_reply(reply))
    }
}

/// Encodes message content for the DATA phase.
///
/// Bare LF becomes CRLF, leading dots are doubled and the `.` terminator is
/// appended. A final line ending is not turned into an extra empty line.
#[must_use]
pub fn encode_data(message: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(message.len() + message.len() / 64 + 5);

    if !message.is_empty() {
        let body = message.strip_suffix(b"\n").unwrap_or(message);
        for line in body.split(|&b| b == b'\n') {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if line.first() == Some(&b'.') {
                out.push(b'.');
            }
            out.extend_from_slice(line);
            out.extend_from_slice(b"\r\n");
        }
    }

    out.extend_from_slice(b".\r\n");
    out
}
