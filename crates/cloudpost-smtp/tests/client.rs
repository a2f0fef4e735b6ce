//! Session tests for the SMTP client.
//!
//! A mock stream replays canned server replies and captures what the
//! client writes, so full sessions run without a server.

#![allow(clippy::unwrap_used)]

use std::io::{self, Cursor};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use cloudpost_smtp::{Address, Client, Error, SmtpStream};

/// Mock stream that returns predefined replies.
#[derive(Debug)]
struct MockStream {
    /// Replies to return (in order).
    replies: Cursor<Vec<u8>>,
    /// Commands sent by the client, shared so tests can inspect them after
    /// the client consumed the stream.
    sent: Arc<Mutex<Vec<u8>>>,
}

impl MockStream {
    fn new(replies: &str) -> (Self, Arc<Mutex<Vec<u8>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let stream = Self {
            replies: Cursor::new(replies.as_bytes().to_vec()),
            sent: Arc::clone(&sent),
        };
        (stream, sent)
    }
}

impl AsyncRead for MockStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let pos = usize::try_from(self.replies.position()).unwrap();
        let data = self.replies.get_ref();
        if pos >= data.len() {
            return Poll::Ready(Ok(()));
        }

        let to_read = (data.len() - pos).min(buf.remaining());
        buf.put_slice(&data[pos..pos + to_read]);
        self.replies.set_position((pos + to_read) as u64);
        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for MockStream {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.sent.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

fn sent_text(sent: &Arc<Mutex<Vec<u8>>>) -> String {
    String::from_utf8(sent.lock().unwrap().clone()).unwrap()
}

fn addr(s: &str) -> Address {
    Address::new(s).unwrap()
}

const EHLO_REPLY: &str = "250-mx.example.com greets localhost\r\n\
                          250-SIZE 1000\r\n\
                          250-AUTH PLAIN LOGIN\r\n\
                          250 8BITMIME\r\n";

#[tokio::test]
async fn test_full_authenticated_session() {
    let script = format!(
        "220 mx.example.com ESMTP ready\r\n\
         {EHLO_REPLY}\
         235 2.7.0 Authentication successful\r\n\
         250 2.1.0 Sender OK\r\n\
         250 2.1.5 Recipient OK\r\n\
         250 2.1.5 Recipient OK\r\n\
         354 Start mail input\r\n\
         250 2.0.0 Queued\r\n\
         221 2.0.0 Bye\r\n"
    );
    let (mock, sent) = MockStream::new(&script);
    let data = b"Subject: Hi\r\n\r\n.leading dot\r\nbody\r\n";

    let client = Client::from_stream(SmtpStream::new(mock)).await.unwrap();
    assert_eq!(client.server_info().hostname, "mx.example.com");

    let client = client.ehlo("localhost").await.unwrap();
    assert_eq!(client.server_info().max_message_size(), Some(1000));

    let client = client.auth_plain("user", "secret").await.unwrap();
    let client = client
        .mail_from(addr("sender@example.com"), Some(data.len()))
        .await
        .unwrap();
    let client = client.rcpt_to(addr("a@example.com")).await.unwrap();
    let client = client.rcpt_to(addr("b@example.com")).await.unwrap();
    let client = client.data().await.unwrap();
    let client = client.send_message(data).await.unwrap();
    client.quit().await.unwrap();

    let expected = format!(
        "EHLO localhost\r\n\
         AUTH PLAIN AHVzZXIAc2VjcmV0\r\n\
         MAIL FROM:<sender@example.com> SIZE={}\r\n\
         RCPT TO:<a@example.com>\r\n\
         RCPT TO:<b@example.com>\r\n\
         DATA\r\n\
         Subject: Hi\r\n\r\n..leading dot\r\nbody\r\n.\r\n\
         QUIT\r\n",
        data.len()
    );
    assert_eq!(sent_text(&sent), expected);
}

#[tokio::test]
async fn test_unauthenticated_session_without_size() {
    let script = "220 relay ready\r\n\
                  250 relay\r\n\
                  250 OK\r\n\
                  250 OK\r\n\
                  354 go ahead\r\n\
                  250 OK\r\n";
    let (mock, sent) = MockStream::new(script);

    let client = Client::from_stream(SmtpStream::new(mock)).await.unwrap();
    let client = client.ehlo("localhost").await.unwrap();
    let client = client
        .mail_from(addr("sender@example.com"), Some(10))
        .await
        .unwrap();
    let client = client.rcpt_to(addr("to@example.com")).await.unwrap();
    let client = client.data().await.unwrap();
    client.send_message(b"hello").await.unwrap();

    let text = sent_text(&sent);
    assert!(text.contains("MAIL FROM:<sender@example.com>\r\n"));
    assert!(text.ends_with("hello\r\n.\r\n"));
}

#[tokio::test]
async fn test_message_too_large_fails_before_mail_from() {
    let script = format!("220 mx ready\r\n{EHLO_REPLY}");
    let (mock, sent) = MockStream::new(&script);

    let client = Client::from_stream(SmtpStream::new(mock)).await.unwrap();
    let client = client.ehlo("localhost").await.unwrap();
    let err = client
        .mail_from(addr("sender@example.com"), Some(5000))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::MessageTooLarge {
            size: 5000,
            limit: 1000
        }
    ));
    assert!(!sent_text(&sent).contains("MAIL FROM"));
}

#[tokio::test]
async fn test_rejected_credentials() {
    let script = format!(
        "220 mx ready\r\n{EHLO_REPLY}535 5.7.8 Authentication credentials invalid\r\n"
    );
    let (mock, _sent) = MockStream::new(&script);

    let client = Client::from_stream(SmtpStream::new(mock)).await.unwrap();
    let client = client.ehlo("localhost").await.unwrap();
    let err = client.auth_plain("user", "wrong").await.unwrap_err();

    match err {
        Error::SmtpError { code, message } => {
            assert_eq!(code, 535);
            assert!(message.contains("credentials invalid"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_rejected_recipient_is_permanent() {
    let script = "220 mx ready\r\n\
                  250 mx\r\n\
                  250 OK\r\n\
                  550 5.1.1 No such user\r\n";
    let (mock, _sent) = MockStream::new(script);

    let client = Client::from_stream(SmtpStream::new(mock)).await.unwrap();
    let client = client.ehlo("localhost").await.unwrap();
    let client = client
        .mail_from(addr("sender@example.com"), None)
        .await
        .unwrap();
    let err = client.rcpt_to(addr("ghost@example.com")).await.unwrap_err();

    assert!(err.is_permanent());
}

#[tokio::test]
async fn test_greeting_refused() {
    let (mock, _sent) = MockStream::new("554 no service here\r\n");
    let err = Client::from_stream(SmtpStream::new(mock)).await.unwrap_err();
    assert!(err.is_permanent());
}

#[tokio::test]
async fn test_server_hangup_is_protocol_error() {
    let (mock, _sent) = MockStream::new("220 mx ready\r\n");

    let client = Client::from_stream(SmtpStream::new(mock)).await.unwrap();
    let err = client.ehlo("localhost").await.unwrap_err();

    assert!(matches!(err, Error::Protocol(_)));
}

#[tokio::test]
async fn test_reset_returns_to_connected() {
    let script = "220 mx ready\r\n\
                  250 mx\r\n\
                  250 OK\r\n\
                  250 Reset\r\n\
                  250 OK\r\n";
    let (mock, sent) = MockStream::new(script);

    let client = Client::from_stream(SmtpStream::new(mock)).await.unwrap();
    let client = client.ehlo("localhost").await.unwrap();
    let client = client
        .mail_from(addr("one@example.com"), None)
        .await
        .unwrap();
    let client = client.reset().await.unwrap();
    client
        .mail_from(addr("two@example.com"), None)
        .await
        .unwrap();

    assert!(sent_text(&sent).contains("RSET\r\nMAIL FROM:<two@example.com>\r\n"));
}
