//! Integration tests for the POP3 client.
//!
//! These tests use a mock stream to simulate POP3 server responses
//! without requiring a real server connection.

#![allow(clippy::unwrap_used)]

use std::io::{self, Cursor};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use popmail_pop3::{Capability, Client, Error, ListEntry, StatInfo};

/// Mock stream that returns predefined responses.
struct MockStream {
    /// Responses to return (in order).
    responses: Cursor<Vec<u8>>,
    /// Captured commands sent by the client.
    sent: Arc<Mutex<Vec<u8>>>,
}

impl MockStream {
    fn new(responses: &[u8]) -> (Self, Arc<Mutex<Vec<u8>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let stream = Self {
            responses: Cursor::new(responses.to_vec()),
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
        let data = self.responses.get_ref();
        let pos = usize::try_from(self.responses.position()).unwrap();

        if pos >= data.len() {
            return Poll::Ready(Ok(()));
        }

        let remaining = &data[pos..];
        let to_read = remaining.len().min(buf.remaining());
        buf.put_slice(&remaining[..to_read]);
        self.responses.set_position((pos + to_read) as u64);

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

/// A stream whose reads never complete.
struct SilentStream;

impl AsyncRead for SilentStream {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Poll::Pending
    }
}

impl AsyncWrite for SilentStream {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn sent_text(sent: &Arc<Mutex<Vec<u8>>>) -> String {
    String::from_utf8(sent.lock().unwrap().clone()).unwrap()
}

const GREETING: &[u8] = b"+OK POP3 server ready\r\n";
const APOP_GREETING: &[u8] = b"+OK POP3 server ready <1896.697170952@dbc.mtview.ca.us>\r\n";

#[tokio::test]
async fn test_user_pass_session() {
    init_tracing();
    let script = [
        GREETING,
        b"+OK mrose is a real hoopy frood\r\n",
        b"+OK mrose's maildrop has 2 messages (320 octets)\r\n",
        b"+OK 2 320\r\n",
        b"+OK dewey POP3 server signing off\r\n",
    ]
    .concat();
    let (stream, sent) = MockStream::new(&script);

    let client = Client::from_stream(stream).await.unwrap();
    assert_eq!(client.greeting(), "POP3 server ready");
    assert!(!client.supports_apop());

    let mut client = client.login("mrose", "secret").await.unwrap();
    assert_eq!(client.stat().await.unwrap(), StatInfo { count: 2, size: 320 });
    client.quit().await.unwrap();

    assert_eq!(
        sent_text(&sent),
        "USER mrose\r\nPASS secret\r\nSTAT\r\nQUIT\r\n"
    );
}

#[tokio::test]
async fn test_apop_login() {
    let script = [APOP_GREETING, b"+OK maildrop has 1 message (369 octets)\r\n"].concat();
    let (stream, sent) = MockStream::new(&script);

    let client = Client::from_stream(stream).await.unwrap();
    assert_eq!(
        client.apop_timestamp(),
        Some("<1896.697170952@dbc.mtview.ca.us>")
    );
    let _client = client.authenticate("mrose", "tanstaaf").await.unwrap();

    assert_eq!(
        sent_text(&sent),
        "APOP mrose c4c9334bac560ecc979e58001b3e22fb\r\n"
    );
}

#[tokio::test]
async fn test_apop_without_timestamp() {
    let (stream, sent) = MockStream::new(GREETING);
    let client = Client::from_stream(stream).await.unwrap();

    let err = client.apop("mrose", "tanstaaf").await.unwrap_err();
    assert!(matches!(err, Error::NotSupported(_)));
    assert!(sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_login_rejections() {
    let script = [
        GREETING,
        b"+OK\r\n",
        b"-ERR [IN-USE] Do you have another POP session running?\r\n",
    ]
    .concat();
    let (stream, _sent) = MockStream::new(&script);
    let client = Client::from_stream(stream).await.unwrap();
    let err = client.login("mrose", "secret").await.unwrap_err();
    assert!(matches!(err, Error::MailboxLocked(_)));

    let script = [GREETING, b"-ERR never heard of mailbox\r\n"].concat();
    let (stream, _sent) = MockStream::new(&script);
    let client = Client::from_stream(stream).await.unwrap();
    let err = client.login("nobody", "secret").await.unwrap_err();
    assert!(matches!(err, Error::Server { ref command, .. } if command == "USER"));
}

#[tokio::test]
async fn test_negative_greeting() {
    let (stream, _sent) = MockStream::new(b"-ERR server busy\r\n");
    let err = Client::from_stream(stream).await.unwrap_err();
    assert!(err.is_server_error());
}

#[tokio::test]
async fn test_listings() {
    let script = [
        GREETING,
        b"+OK\r\n+OK\r\n",
        b"+OK 2 messages (320 octets)\r\n1 120\r\n2 200\r\n.\r\n",
        b"+OK 2 200\r\n",
        b"+OK\r\n1 whqtswO00WBw418f9t5JxYwZ\r\n2 QhdPYR:00WBw1Ph7x7\r\n.\r\n",
        b"+OK 2 QhdPYR:00WBw1Ph7x7\r\n",
    ]
    .concat();
    let (stream, sent) = MockStream::new(&script);
    let mut client = Client::from_stream(stream)
        .await
        .unwrap()
        .login("mrose", "secret")
        .await
        .unwrap();

    let list = client.list().await.unwrap();
    assert_eq!(
        list,
        vec![
            ListEntry {
                message: 1,
                size: 120
            },
            ListEntry {
                message: 2,
                size: 200
            },
        ]
    );
    assert_eq!(client.list_one(2).await.unwrap().size, 200);

    let uidl = client.uidl().await.unwrap();
    assert_eq!(uidl.len(), 2);
    assert_eq!(uidl[0].uid, "whqtswO00WBw418f9t5JxYwZ");
    assert_eq!(client.uidl_one(2).await.unwrap().uid, "QhdPYR:00WBw1Ph7x7");

    assert!(sent_text(&sent).ends_with("LIST\r\nLIST 2\r\nUIDL\r\nUIDL 2\r\n"));
}

#[tokio::test]
async fn test_retrieve_message() {
    init_tracing();
    let script = [
        GREETING,
        b"+OK\r\n+OK\r\n",
        b"+OK 163 octets\r\n",
        b"From: =?iso-8859-1?Q?Keld_J=F8rn?= <keld@example.dk>\r\n",
        b"Subject: =?utf-8?B?SGVqIHZlcmRlbg==?=\r\n",
        b"Content-Type: text/plain; charset=utf-8\r\n",
        b"\r\n",
        b"Line one\r\n",
        b"..a line that starts with a dot\r\n",
        b".\r\n",
    ]
    .concat();
    let (stream, sent) = MockStream::new(&script);
    let mut client = Client::from_stream(stream)
        .await
        .unwrap()
        .login("keld", "secret")
        .await
        .unwrap();

    let message = client.retrieve_message(1).await.unwrap();
    assert_eq!(message.header().subject.as_deref(), Some("Hej verden"));
    assert_eq!(
        message.header().from.as_ref().unwrap().display_name,
        "Keld Jørn"
    );
    assert_eq!(
        message.message_part().body_text().unwrap(),
        "Line one\r\n.a line that starts with a dot\r\n"
    );
    assert!(sent_text(&sent).ends_with("RETR 1\r\n"));
}

#[tokio::test]
async fn test_retrieve_raw_keeps_bytes() {
    let script = [
        GREETING,
        b"+OK\r\n+OK\r\n",
        b"+OK\r\n",
        b"Subject: raw\r\n\r\n\xe6\xf8\xe5\r\n",
        b".\r\n",
    ]
    .concat();
    let (stream, _sent) = MockStream::new(&script);
    let mut client = Client::from_stream(stream)
        .await
        .unwrap()
        .login("u", "p")
        .await
        .unwrap();

    let raw = client.retrieve_raw(3).await.unwrap();
    assert_eq!(raw, b"Subject: raw\r\n\r\n\xe6\xf8\xe5\r\n");
}

#[tokio::test]
async fn test_retrieve_header_uses_top() {
    let script = [
        GREETING,
        b"+OK\r\n+OK\r\n",
        b"+OK top of message follows\r\n",
        b"Message-ID: <abc@example.com>\r\n",
        b"Subject: headers only\r\n",
        b"\r\n",
        b".\r\n",
    ]
    .concat();
    let (stream, sent) = MockStream::new(&script);
    let mut client = Client::from_stream(stream)
        .await
        .unwrap()
        .login("u", "p")
        .await
        .unwrap();

    let header = client.retrieve_header(4).await.unwrap();
    assert_eq!(header.subject.as_deref(), Some("headers only"));
    assert_eq!(header.message_id.as_deref(), Some("abc@example.com"));
    assert!(sent_text(&sent).ends_with("TOP 4 0\r\n"));
}

#[tokio::test]
async fn test_rejected_retrieve() {
    let script = [
        GREETING,
        b"+OK\r\n+OK\r\n",
        b"-ERR no such message, only 2 messages in maildrop\r\n",
        b"+OK 2 320\r\n",
    ]
    .concat();
    let (stream, _sent) = MockStream::new(&script);
    let mut client = Client::from_stream(stream)
        .await
        .unwrap()
        .login("u", "p")
        .await
        .unwrap();

    let err = client.retrieve_message(9).await.unwrap_err();
    assert!(matches!(err, Error::Server { ref command, .. } if command == "RETR"));

    // The session is still usable.
    assert_eq!(client.stat().await.unwrap().count, 2);
}

#[tokio::test]
async fn test_undecodable_message() {
    let script = [
        GREETING,
        b"+OK\r\n+OK\r\n",
        b"+OK\r\n",
        b"Content-Transfer-Encoding: x-uuencode\r\n\r\nbody\r\n",
        b".\r\n",
    ]
    .concat();
    let (stream, _sent) = MockStream::new(&script);
    let mut client = Client::from_stream(stream)
        .await
        .unwrap()
        .login("u", "p")
        .await
        .unwrap();

    let err = client.retrieve_message(1).await.unwrap_err();
    assert!(matches!(err, Error::Mime(_)));
}

#[tokio::test]
async fn test_delete_reset_noop() {
    let script = [
        GREETING,
        b"+OK\r\n+OK\r\n",
        b"+OK message 1 deleted\r\n",
        b"+OK maildrop has 2 messages (320 octets)\r\n",
        b"+OK\r\n",
        b"+OK bye\r\n",
    ]
    .concat();
    let (stream, sent) = MockStream::new(&script);
    let mut client = Client::from_stream(stream)
        .await
        .unwrap()
        .login("u", "p")
        .await
        .unwrap();

    client.delete(1).await.unwrap();
    client.reset().await.unwrap();
    client.noop().await.unwrap();
    client.quit().await.unwrap();

    assert!(sent_text(&sent).ends_with("DELE 1\r\nRSET\r\nNOOP\r\nQUIT\r\n"));
}

#[tokio::test]
async fn test_message_number_zero() {
    let script = [GREETING, b"+OK\r\n+OK\r\n"].concat();
    let (stream, sent) = MockStream::new(&script);
    let mut client = Client::from_stream(stream)
        .await
        .unwrap()
        .login("u", "p")
        .await
        .unwrap();
    let before = sent.lock().unwrap().len();

    assert!(matches!(
        client.retrieve_raw(0).await,
        Err(Error::InvalidMessageNumber(0))
    ));
    assert!(matches!(client.delete(0).await, Err(Error::InvalidMessageNumber(0))));
    assert_eq!(sent.lock().unwrap().len(), before);
}

#[tokio::test]
async fn test_capa() {
    let script = [
        GREETING,
        b"+OK Capability list follows\r\n",
        b"TOP\r\nUSER\r\nSASL CRAM-MD5 KERBEROS_V4\r\nRESP-CODES\r\nLOGIN-DELAY 900\r\n",
        b"PIPELINING\r\nEXPIRE 60\r\nUIDL\r\nIMPLEMENTATION Shlemazle-Plotz-v302\r\n.\r\n",
    ]
    .concat();
    let (stream, _sent) = MockStream::new(&script);
    let mut client = Client::from_stream(stream).await.unwrap();

    let caps = client.capa().await.unwrap();
    assert_eq!(caps.len(), 9);
    assert!(client.has_capability(&Capability::Top));
    assert!(client.has_capability(&Capability::LoginDelay(Some(900))));
    assert_eq!(client.capabilities(), caps.as_slice());
}

#[tokio::test]
async fn test_read_timeout() {
    let result = Client::from_stream_with_timeout(SilentStream, Duration::from_millis(50)).await;
    assert!(matches!(result, Err(Error::Timeout(_))));
}
