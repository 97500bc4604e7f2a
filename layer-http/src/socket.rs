//! [`NativeHttp`] over hyper's HTTP/1.1 client connection on tokio TCP.
//!
//! Each handle owns one keep-alive connection to the URL given at
//! [`create`](NativeHttp::create). Requests on a handle run one at a time.
//! If the server closes the connection, the next request on the same handle
//! reopens it.
//!
//! Only `http:` URLs are accepted.
//!
//! # Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use layer_http::{Env, HttpConnection, TcpHttp};
//!
//! # async fn run() -> Result<(), layer_http::HttpError> {
//! let mut conn = HttpConnection::new(Arc::new(TcpHttp::new()), Env::default().http_options());
//! conn.connect().await?;
//! conn.write(&[0u8; 20]).await;
//! let reply = conn.read().await?;
//! # Ok(()) }
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use http::header::CONNECTION;
use http::{Request, Response, Version};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::client::conn::http1::{self, SendRequest};
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use url::Url;

use crate::errors::NativeError;
use crate::native::{NativeHttp, NativeRequest, ResponseEnvelope};

/// Handle type for [`TcpHttp`].
pub type ConnectionId = u32;

/// Largest response body [`TcpHttp::new`] accepts.
pub const DEFAULT_MAX_BODY: usize = 16 * 1024 * 1024;

/// Lifecycle of one [`TcpHttp`] connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SocketState {
    Ready,
    SendingRequest,
    WaitingForResponse,
    Closed,
}

struct Slot {
    /// `host:port`
    addr:   String,
    /// Request target: path plus query.
    target: String,
    sender: Option<SendRequest<Full<Bytes>>>,
    state:  SocketState,
}

impl Slot {
    async fn exchange(
        &mut self,
        request: Request<Full<Bytes>>,
        max_body: usize,
    ) -> Result<(u16, bool, Bytes), NativeError> {
        let sender = self.sender.as_mut().ok_or(NativeError::UnknownHandle)?;
        self.state = SocketState::SendingRequest;
        let response = sender.send_request(request).await.map_err(NativeError::from)?;
        self.state = SocketState::WaitingForResponse;

        let status = response.status().as_u16();
        let close = wants_close(&response);
        let body = Limited::new(response.into_body(), max_body)
            .collect()
            .await
            .map_err(|e| {
                if e.downcast_ref::<LengthLimitError>().is_some() {
                    NativeError::Protocol(format!("response body exceeds {max_body} bytes"))
                } else {
                    match e.downcast::<hyper::Error>() {
                        Ok(e)  => NativeError::from(*e),
                        Err(e) => NativeError::Protocol(e.to_string()),
                    }
                }
            })?
            .to_bytes();
        Ok((status, close, body))
    }
}

fn wants_close(response: &Response<Incoming>) -> bool {
    response.version() == Version::HTTP_10
        || response
            .headers()
            .get_all(CONNECTION)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .any(|t| t.trim().eq_ignore_ascii_case("close"))
}

// ─── TcpHttp ──────────────────────────────────────────────────────────────────

/// HTTP/1.1 executor over tokio TCP.
pub struct TcpHttp {
    next_id:         AtomicU32,
    slots:           Mutex<HashMap<ConnectionId, Arc<Mutex<Slot>>>>,
    connect_timeout: Duration,
    io_timeout:      Duration,
    max_body:        usize,
}

impl TcpHttp {
    /// 15 second connect and I/O timeouts, [`DEFAULT_MAX_BODY`] body cap.
    pub fn new() -> Self {
        Self::with_timeouts(Duration::from_secs(15), Duration::from_secs(15))
    }

    /// `io` bounds each request from first byte written to last byte read.
    pub fn with_timeouts(connect: Duration, io: Duration) -> Self {
        Self {
            next_id:         AtomicU32::new(1),
            slots:           Mutex::new(HashMap::new()),
            connect_timeout: connect,
            io_timeout:      io,
            max_body:        DEFAULT_MAX_BODY,
        }
    }

    /// Reject response bodies longer than `max` bytes with
    /// [`NativeError::Protocol`].
    pub fn with_max_body(mut self, max: usize) -> Self {
        self.max_body = max;
        self
    }

    /// State of the connection behind `handle`, or `None` once destroyed.
    pub async fn state(&self, handle: ConnectionId) -> Option<SocketState> {
        let slot = self.slots.lock().await.get(&handle).cloned()?;
        let state = slot.lock().await.state;
        Some(state)
    }

    /// Number of live handles.
    pub async fn open_connections(&self) -> usize {
        self.slots.lock().await.len()
    }

    async fn open(&self, addr: &str) -> Result<SendRequest<Full<Bytes>>, NativeError> {
        let stream = timeout(self.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| NativeError::TimedOut)??;
        stream.set_nodelay(true)?;

        let mut builder = http1::Builder::new();
        builder.title_case_headers(true);
        let (sender, conn) = builder.handshake(TokioIo::new(stream)).await?;

        let addr = addr.to_string();
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                log::debug!("[tcp_http] connection to {addr} ended: {e}");
            }
        });
        Ok(sender)
    }
}

impl Default for TcpHttp {
    fn default() -> Self { Self::new() }
}

impl NativeHttp for TcpHttp {
    type Handle = ConnectionId;

    async fn create(&self, url: &str) -> Result<ConnectionId, NativeError> {
        let parsed = Url::parse(url).map_err(|e| NativeError::InvalidUrl(format!("{url}: {e}")))?;
        if parsed.scheme() != "http" {
            return Err(NativeError::UnsupportedScheme(parsed.scheme().to_string()));
        }
        let host = parsed
            .host_str()
            .ok_or_else(|| NativeError::InvalidUrl(format!("{url}: missing host")))?;
        let port = parsed.port_or_known_default().unwrap_or(80);
        let addr = format!("{host}:{port}");

        let mut target = parsed.path().to_string();
        if let Some(q) = parsed.query() {
            target.push('?');
            target.push_str(q);
        }

        let sender = self.open(&addr).await?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let slot = Slot { addr, target, sender: Some(sender), state: SocketState::Ready };
        log::info!("[tcp_http] #{id} connected to {}", slot.addr);
        self.slots.lock().await.insert(id, Arc::new(Mutex::new(slot)));
        Ok(id)
    }

    async fn request(
        &self,
        handle: &ConnectionId,
        request: NativeRequest,
    ) -> Result<ResponseEnvelope, NativeError> {
        let slot = self
            .slots
            .lock()
            .await
            .get(handle)
            .cloned()
            .ok_or(NativeError::UnknownHandle)?;
        let mut slot = slot.lock().await;
        if slot.state == SocketState::Closed {
            return Err(NativeError::UnknownHandle);
        }

        let body = if request.binary_request {
            BASE64
                .decode(request.contents.as_bytes())
                .map_err(|e| NativeError::Other(format!("request body is not base64: {e}")))?
        } else {
            request.contents.into_bytes()
        };

        let mut builder = Request::builder()
            .method(request.method.as_str())
            .uri(slot.target.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let outgoing = builder
            .body(Full::new(Bytes::from(body)))
            .map_err(|e| NativeError::Protocol(format!("invalid request: {e}")))?;

        // A sender whose connection was closed by the peer fails `ready`.
        let reusable = match slot.sender.as_mut() {
            Some(sender) => sender.ready().await.is_ok(),
            None         => false,
        };
        if !reusable {
            log::debug!("[tcp_http] #{handle} reopening {}", slot.addr);
            slot.sender = None;
            let sender = self.open(&slot.addr).await?;
            slot.sender = Some(sender);
        }

        let result = match timeout(self.io_timeout, slot.exchange(outgoing, self.max_body)).await {
            Ok(r)  => r,
            Err(_) => Err(NativeError::TimedOut),
        };
        slot.state = SocketState::Ready;

        let (status, close, body) = match result {
            Ok(r) => r,
            Err(e) => {
                log::warn!("[tcp_http] #{handle} request failed: {e}");
                slot.sender = None;
                return Err(e);
            }
        };
        if close {
            slot.sender = None;
        }

        let contents = if request.binary_response {
            BASE64.encode(&body)
        } else {
            String::from_utf8_lossy(&body).into_owned()
        };
        Ok(ResponseEnvelope { status, contents })
    }

    async fn destroy(&self, handle: ConnectionId) -> bool {
        let Some(slot) = self.slots.lock().await.remove(&handle) else {
            return false;
        };
        let mut slot = slot.lock().await;
        slot.state = SocketState::Closed;
        // Dropping the last sender shuts the hyper connection down.
        slot.sender = None;
        log::info!("[tcp_http] #{handle} closed");
        true
    }
}
