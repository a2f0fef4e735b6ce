//! Byte streams carrying an SMTP session.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use rustls::pki_types::ServerName;
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, ReadBuf,
};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;

use crate::error::{Error, Result};

/// Longest reply line accepted from a server (RFC 5321 allows 512).
const MAX_REPLY_LINE: usize = 4096;

/// A network connection that is either plaintext or TLS.
#[derive(Debug)]
pub enum NetworkStream {
    /// Plaintext TCP stream.
    Tcp(TcpStream),
    /// TLS-encrypted stream (boxed to reduce enum size).
    Tls(Box<TlsStream<TcpStream>>),
}

impl NetworkStream {
    /// Upgrades a plaintext stream to TLS (after STARTTLS).
    ///
    /// # Errors
    ///
    /// Returns an error if the stream is already TLS or the handshake fails.
    pub async fn upgrade_to_tls(self, hostname: &str) -> Result<Self> {
        match self {
            Self::Tcp(tcp) => Ok(Self::Tls(Box::new(handshake(hostname, tcp).await?))),
            Self::Tls(_) => Err(Error::Protocol("stream is already using TLS".into())),
        }
    }
}

impl AsyncRead for NetworkStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for NetworkStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Tcp(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(stream) => Pin::new(stream).poll_flush(cx),
            Self::Tls(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::Tls(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

/// Line-oriented wrapper around a session's byte stream.
#[derive(Debug)]
pub struct SmtpStream<S> {
    inner: BufReader<S>,
}

impl<S: AsyncRead + AsyncWrite + Unpin> SmtpStream<S> {
    /// Wraps a connected stream.
    pub fn new(stream: S) -> Self {
        Self {
            inner: BufReader::new(stream),
        }
    }

    /// Reads one line, without its line ending.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the server closed the connection or
    /// sent an over-long line, and [`Error::Io`] if the read fails.
    pub async fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        let read = (&mut self.inner)
            .take(MAX_REPLY_LINE as u64)
            .read_line(&mut line)
            .await?;

        if read == 0 {
            return Err(Error::Protocol("connection closed by server".into()));
        }
        if !line.ends_with('\n') && read >= MAX_REPLY_LINE {
            return Err(Error::Protocol("reply line too long".into()));
        }

        line.truncate(line.trim_end_matches(['\r', '\n']).len());
        Ok(line)
    }

    /// Writes and flushes data.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.inner.get_mut();
        stream.write_all(data).await?;
        stream.flush().await?;
        Ok(())
    }

    /// Returns the underlying stream.
    ///
    /// Anything still buffered is discarded, which is only safe at points
    /// where the server is waiting for the client (e.g. right after the
    /// reply to STARTTLS).
    pub fn into_inner(self) -> S {
        self.inner.into_inner()
    }
}

/// Creates a TLS connector trusting the webpki root certificates.
#[must_use]
pub fn create_tls_connector() -> TlsConnector {
    let root_store = rustls::RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    TlsConnector::from(Arc::new(config))
}

async fn handshake(hostname: &str, tcp: TcpStream) -> Result<TlsStream<TcpStream>> {
    let server_name = ServerName::try_from(hostname.to_string())
        .map_err(|_| Error::Protocol(format!("invalid hostname: {hostname}")))?;
    Ok(create_tls_connector().connect(server_name, tcp).await?)
}

/// Connects to an SMTP server over plain TCP.
///
/// # Errors
///
/// Returns an error if the connection fails.
pub async fn connect(hostname: &str, port: u16) -> Result<SmtpStream<NetworkStream>> {
    let tcp = TcpStream::connect((hostname, port)).await?;
    Ok(SmtpStream::new(NetworkStream::Tcp(tcp)))
}

/// Connects to an SMTP server over TLS (implicit TLS on port 465).
///
/// # Errors
///
/// Returns an error if the connection or TLS handshake fails.
pub async fn connect_tls(hostname: &str, port: u16) -> Result<SmtpStream<NetworkStream>> {
    let tcp = TcpStream::connect((hostname, port)).await?;
    let tls = handshake(hostname, tcp).await?;
    Ok(SmtpStream::new(NetworkStream::Tls(Box::new(tls))))
}
