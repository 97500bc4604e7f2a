use std::collections::VecDeque;
use std::future::Future;
use std::pin::pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Waker};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use layer_http::{
    ConnectionState, HttpConnection, HttpError, HttpOptions, Method, NativeError, NativeHttp,
    NativeRequest, ResponseEnvelope,
};
use layer_mtproto::{Message, MessageId, PlainSender};
use tokio::sync::Notify;

// ── Fake native capability ────────────────────────────────────────────────────

#[derive(Default)]
struct FakeNative {
    fail_create:  bool,
    created:      AtomicU32,
    urls:         Mutex<Vec<String>>,
    requests:     Mutex<Vec<(u32, NativeRequest)>>,
    responses:    Mutex<VecDeque<Result<ResponseEnvelope, NativeError>>>,
    destroyed:    Mutex<Vec<u32>>,
    destroy_gate: Option<Arc<Notify>>,
}

impl FakeNative {
    fn replying(responses: Vec<Result<ResponseEnvelope, NativeError>>) -> Self {
        Self { responses: Mutex::new(responses.into()), ..Default::default() }
    }

    fn requests(&self) -> Vec<(u32, NativeRequest)> {
        self.requests.lock().unwrap().clone()
    }

    fn destroyed(&self) -> Vec<u32> {
        self.destroyed.lock().unwrap().clone()
    }
}

impl NativeHttp for FakeNative {
    type Handle = u32;

    async fn create(&self, url: &str) -> Result<u32, NativeError> {
        self.urls.lock().unwrap().push(url.to_string());
        if self.fail_create {
            return Err(NativeError::Other("connection refused".into()));
        }
        Ok(self.created.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn request(&self, handle: &u32, request: NativeRequest) -> Result<ResponseEnvelope, NativeError> {
        self.requests.lock().unwrap().push((*handle, request));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(envelope(200, b"")))
    }

    async fn destroy(&self, handle: u32) -> bool {
        if let Some(gate) = &self.destroy_gate {
            gate.notified().await;
        }
        self.destroyed.lock().unwrap().push(handle);
        true
    }
}

fn envelope(status: u16, body: &[u8]) -> ResponseEnvelope {
    ResponseEnvelope { status, contents: BASE64.encode(body) }
}

fn sent_bytes(request: &NativeRequest) -> Vec<u8> {
    BASE64.decode(request.contents.as_bytes()).unwrap()
}

async fn connected(native: &Arc<FakeNative>) -> HttpConnection<FakeNative> {
    let mut conn = HttpConnection::new(Arc::clone(native), HttpOptions::default());
    conn.connect().await.unwrap();
    conn
}

// ── Buffering ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn read_sends_all_writes_concatenated_in_order() {
    let native = Arc::new(FakeNative::default());
    let mut conn = connected(&native).await;

    conn.write(&[1, 2]).await;
    conn.write(&[]).await;
    conn.write(&[3]).await;
    conn.write(&[4, 5, 6]).await;
    assert_eq!(conn.pending_len(), 6);

    conn.read().await.unwrap();
    assert_eq!(conn.pending_len(), 0);

    let reqs = native.requests();
    assert_eq!(reqs.len(), 1);
    assert_eq!(sent_bytes(&reqs[0].1), vec![1, 2, 3, 4, 5, 6]);
}

#[tokio::test]
async fn queue_is_drained_even_when_request_fails() {
    let native = Arc::new(FakeNative::replying(vec![Err(NativeError::Other("reset".into()))]));
    let mut conn = connected(&native).await;

    conn.write(b"frame").await;
    assert!(matches!(conn.read().await, Err(HttpError::Transport(_))));
    assert_eq!(conn.pending_len(), 0);

    conn.write(b"next").await;
    conn.read().await.unwrap();
    assert_eq!(sent_bytes(&native.requests()[1].1), b"next");
}

#[tokio::test]
async fn write_never_completes_synchronously() {
    let native = Arc::new(FakeNative::default());
    let mut conn = connected(&native).await;

    let mut cx = Context::from_waker(Waker::noop());
    {
        let mut fut = pin!(conn.write(b"abc"));
        assert!(fut.as_mut().poll(&mut cx).is_pending(), "write must yield before completing");
        assert!(fut.as_mut().poll(&mut cx).is_ready());
    }
    assert_eq!(conn.pending_len(), 3);
}

// ── Method selection ──────────────────────────────────────────────────────────

#[tokio::test]
async fn empty_payload_uses_get() {
    let native = Arc::new(FakeNative::default());
    let mut conn = connected(&native).await;

    conn.write(&[]).await;
    conn.read().await.unwrap();

    let (_, req) = &native.requests()[0];
    assert_eq!(req.method, Method::Get);
    assert_eq!(req.contents, "");
}

#[tokio::test]
async fn non_empty_payload_uses_post() {
    let native = Arc::new(FakeNative::default());
    let mut conn = connected(&native).await;

    conn.write(&[0x61, 0x62, 0x63]).await;
    conn.read().await.unwrap();

    let (_, req) = &native.requests()[0];
    assert_eq!(req.method, Method::Post);
    assert_eq!(req.contents, "YWJj");
}

#[tokio::test]
async fn consecutive_reads_without_writes_both_get() {
    let native = Arc::new(FakeNative::default());
    let mut conn = connected(&native).await;

    conn.write(b"abc").await;
    conn.read().await.unwrap();
    conn.read().await.unwrap();
    conn.read().await.unwrap();

    let methods: Vec<Method> = native.requests().iter().map(|(_, r)| r.method).collect();
    assert_eq!(methods, vec![Method::Post, Method::Get, Method::Get]);
    assert!(native.requests()[1].1.contents.is_empty());
}

// ── Headers ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn headers_and_stream_flags() {
    let native = Arc::new(FakeNative::default());
    let mut conn = HttpConnection::new(
        Arc::clone(&native),
        HttpOptions { host: Some("149.154.167.40".into()), port: Some(443), ..Default::default() },
    );
    conn.connect().await.unwrap();
    conn.write(b"abcd").await;
    conn.read().await.unwrap();

    let (handle, req) = &native.requests()[0];
    assert_eq!(*handle, 1);
    assert_eq!(
        req.headers,
        vec![
            ("Content-Length".to_string(), "4".to_string()),
            ("Connection".to_string(), "keep-alive".to_string()),
            ("Host".to_string(), "149.154.167.40".to_string()),
        ]
    );
    assert!(req.binary_request);
    assert!(req.binary_response);
    assert_eq!(native.urls.lock().unwrap()[0], "http://149.154.167.40:443/apiw1");
}

/// Bug-compatible choice: Content-Length is the raw payload size, not the
/// size of the Base64 text handed to the native layer (which transmits the
/// decoded bytes).
#[tokio::test]
async fn content_length_counts_raw_bytes_not_base64() {
    let native = Arc::new(FakeNative::default());
    let mut conn = connected(&native).await;

    conn.write(&[0u8; 20]).await;
    conn.read().await.unwrap();

    let (_, req) = &native.requests()[0];
    assert_eq!(req.contents.len(), 28);
    assert_eq!(req.header("content-length"), Some("20"));
}

// ── Status classification ─────────────────────────────────────────────────────

#[tokio::test]
async fn status_200_returns_decoded_body() {
    let native = Arc::new(FakeNative::replying(vec![Ok(envelope(200, b"abc"))]));
    let mut conn = connected(&native).await;

    conn.write(b"q").await;
    assert_eq!(conn.read().await.unwrap(), b"abc");
}

#[tokio::test]
async fn non_200_carries_body_on_error_channel() {
    let native = Arc::new(FakeNative::replying(vec![
        Ok(envelope(404, b"err")),
        Ok(envelope(201, b"created")),
    ]));
    let mut conn = connected(&native).await;

    match conn.read().await {
        Err(HttpError::Status { status, body }) => {
            assert_eq!(status, 404);
            assert_eq!(body, b"err");
        }
        other => panic!("expected Status error, got {other:?}"),
    }

    let err = conn.read().await.unwrap_err();
    assert_eq!(err.status(), Some(201), "only 200 exactly is success");
    assert_eq!(err.status_body(), Some(&b"created"[..]));
}

#[tokio::test]
async fn transport_failure_is_reported() {
    let native = Arc::new(FakeNative::replying(vec![Err(NativeError::TimedOut)]));
    let mut conn = connected(&native).await;

    assert!(matches!(
        conn.read().await,
        Err(HttpError::Transport(NativeError::TimedOut))
    ));
    assert!(conn.is_connected(), "a failed request does not close the connection");
}

#[tokio::test]
async fn malformed_base64_response_is_a_decode_error() {
    let native = Arc::new(FakeNative::replying(vec![Ok(ResponseEnvelope {
        status:   200,
        contents: "not base64!".into(),
    })]));
    let mut conn = connected(&native).await;

    assert!(matches!(conn.read().await, Err(HttpError::Decode(_))));
}

// ── Connection lifecycle ──────────────────────────────────────────────────────

#[tokio::test]
async fn is_connected_tracks_connect_and_close() {
    let native = Arc::new(FakeNative::default());
    let mut conn = HttpConnection::new(Arc::clone(&native), HttpOptions::default());
    assert!(!conn.is_connected());
    assert_eq!(conn.state(), ConnectionState::Disconnected);

    conn.connect().await.unwrap();
    assert!(conn.is_connected());
    assert_eq!(conn.state(), ConnectionState::Connected);

    conn.close();
    assert!(!conn.is_connected());
    assert_eq!(conn.state(), ConnectionState::Disconnected);
}

/// Corrected behaviour: a failed connect is reported to the caller instead of
/// completing silently, and the adapter stays disconnected.
#[tokio::test]
async fn connect_failure_is_reported_and_leaves_adapter_disconnected() {
    let native = Arc::new(FakeNative { fail_create: true, ..Default::default() });
    let mut conn = HttpConnection::new(Arc::clone(&native), HttpOptions::default());

    let err = conn.connect().await.unwrap_err();
    assert!(matches!(err, HttpError::Connect(NativeError::Other(_))));
    assert!(!conn.is_connected());
    assert_eq!(conn.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn connect_while_connected_keeps_the_handle() {
    let native = Arc::new(FakeNative::default());
    let mut conn = connected(&native).await;
    conn.connect().await.unwrap();
    assert_eq!(native.created.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn read_without_connect_drains_and_fails() {
    let native = Arc::new(FakeNative::default());
    let mut conn = HttpConnection::new(Arc::clone(&native), HttpOptions::default());

    conn.write(b"lost").await;
    assert!(matches!(conn.read().await, Err(HttpError::NotConnected)));
    assert_eq!(conn.pending_len(), 0);
    assert!(native.requests().is_empty());
}

/// Bug-compatible choice: `close` has no completion signal. The connection
/// reads as closed immediately while the native destroy is still pending.
#[tokio::test]
async fn close_returns_before_destroy_completes() {
    let gate = Arc::new(Notify::new());
    let native = Arc::new(FakeNative { destroy_gate: Some(Arc::clone(&gate)), ..Default::default() });
    let mut conn = connected(&native).await;

    conn.close();
    assert!(!conn.is_connected());

    tokio::task::yield_now().await;
    assert!(native.destroyed().is_empty(), "destroy is still blocked");

    gate.notify_one();
    for _ in 0..16 {
        if !native.destroyed().is_empty() {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert_eq!(native.destroyed(), vec![1]);
}

#[tokio::test]
async fn close_when_disconnected_does_nothing() {
    let native = Arc::new(FakeNative::default());
    let mut conn = connected(&native).await;
    conn.close();
    conn.close();
    for _ in 0..4 {
        tokio::task::yield_now().await;
    }
    assert_eq!(native.destroyed(), vec![1]);
}

#[tokio::test]
async fn reconnect_after_close_gets_a_new_handle() {
    let native = Arc::new(FakeNative::default());
    let mut conn = connected(&native).await;
    conn.close();
    conn.connect().await.unwrap();
    conn.read().await.unwrap();
    assert_eq!(native.requests()[0].0, 2);
}

// ── Driven by the MTProto engine ──────────────────────────────────────────────

#[tokio::test]
async fn plain_sender_frame_travels_as_one_post() {
    let reply = Message::plaintext(MessageId(0x6000_0000_0000_0001), vec![0x63, 0x24, 0x16, 0x05])
        .to_plaintext_bytes();
    let native = Arc::new(FakeNative::replying(vec![Ok(envelope(200, &reply))]));
    let conn = HttpConnection::new(Arc::clone(&native), HttpOptions::default());
    let mut sender = PlainSender::new(conn);

    let body = sender.invoke(&[0xf1, 0x8e, 0x7e, 0xbe]).await.unwrap();
    assert_eq!(body, vec![0x63, 0x24, 0x16, 0x05]);

    let reqs = native.requests();
    assert_eq!(reqs.len(), 1);
    assert_eq!(reqs[0].1.method, Method::Post);
    let sent = Message::parse_plaintext(&sent_bytes(&reqs[0].1)).unwrap();
    assert_eq!(sent.body, vec![0xf1, 0x8e, 0x7e, 0xbe]);
    assert_eq!(reqs[0].1.header("Content-Length"), Some("24"));
}
