//! MTProto-over-HTTP connection adapter.
//!
//! The MTProto engine talks to a connection with a write-then-read pattern.
//! Over HTTP a frame must travel as one request, so [`HttpConnection`]
//! buffers every `write` and turns the next `read` into a single round trip:
//!
//! ```text
//! write(a) ─┐
//! write(b) ─┼─► read() ─► POST base64(a ‖ b) ─► 200 ─► Ok(decoded body)
//!           │                                 └► 4xx/5xx ─► Err(Status { body })
//! ```
//!
//! The HTTP itself is executed by a [`NativeHttp`] capability.

use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use layer_mtproto::Connection;

use crate::errors::HttpError;
use crate::native::{Method, NativeHttp, NativeRequest};

const DEFAULT_PROTOCOL: &str = "http:";
const DEFAULT_HOST:     &str = "localhost";
const DEFAULT_PORT:     u16  = 80;
const DEFAULT_PATH:     &str = "/apiw1";

// ─── HttpOptions ──────────────────────────────────────────────────────────────

/// Where an [`HttpConnection`] points. Unset fields take defaults.
///
/// | Field | Default |
/// |-------|---------|
/// | `protocol` | `"http:"` |
/// | `host` | `"localhost"` |
/// | `port` | `80` |
/// | `path` | `"/apiw1"` |
///
/// Empty strings and port `0` are treated as unset.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HttpOptions {
    pub protocol: Option<String>,
    pub host:     Option<String>,
    pub port:     Option<u16>,
    pub path:     Option<String>,
}

fn or_default(value: Option<&str>, default: &str) -> String {
    match value {
        Some(v) if !v.is_empty() => v.to_string(),
        _                        => default.to_string(),
    }
}

// ─── ConnectionState ──────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

// ─── HttpConnection ───────────────────────────────────────────────────────────

/// One logical MTProto connection carried over HTTP.
///
/// All mutating operations take `&mut self`, so a single caller drives each
/// instance. Nothing is retried and nothing times out at this layer.
pub struct HttpConnection<N: NativeHttp> {
    id:      u32,
    native:  Arc<N>,
    url:     String,
    host:    String,
    handle:  Option<N::Handle>,
    state:   ConnectionState,
    pending: Vec<Vec<u8>>,
}

impl<N: NativeHttp> HttpConnection<N> {
    /// Build an adapter for `options`. No I/O happens until [`connect`](Self::connect).
    pub fn new(native: Arc<N>, options: HttpOptions) -> Self {
        let protocol = or_default(options.protocol.as_deref(), DEFAULT_PROTOCOL);
        let host     = or_default(options.host.as_deref(), DEFAULT_HOST);
        let port     = options.port.filter(|&p| p != 0).unwrap_or(DEFAULT_PORT);
        let path     = or_default(options.path.as_deref(), DEFAULT_PATH);

        Self {
            id: connection_id(),
            native,
            url: format!("{protocol}//{host}:{port}{path}"),
            host,
            handle: None,
            state: ConnectionState::Disconnected,
            pending: Vec::new(),
        }
    }

    /// The target URL, fixed at construction.
    pub fn url(&self) -> &str { &self.url }

    /// Value sent in the `Host` header.
    pub fn host(&self) -> &str { &self.host }

    /// Random tag used in log lines.
    pub fn id(&self) -> u32 { self.id }

    pub fn state(&self) -> ConnectionState { self.state }

    /// `true` iff a native handle is held.
    pub fn is_connected(&self) -> bool { self.handle.is_some() }

    /// Total bytes queued for the next [`read`](Self::read).
    pub fn pending_len(&self) -> usize {
        self.pending.iter().map(Vec::len).sum()
    }

    /// Ask the native capability for a connection to [`url`](Self::url).
    ///
    /// A failure is logged and returned; the adapter stays disconnected.
    /// Calling this while connected does nothing.
    pub async fn connect(&mut self) -> Result<(), HttpError> {
        if self.handle.is_some() {
            log::debug!("[http#{}] connect: already connected", self.id);
            return Ok(());
        }

        self.state = ConnectionState::Connecting;
        log::info!("[http#{}] Connecting to {} …", self.id, self.url);
        match self.native.create(&self.url).await {
            Ok(handle) => {
                log::debug!("[http#{}] native handle {handle:?}", self.id);
                self.handle = Some(handle);
                self.state = ConnectionState::Connected;
                Ok(())
            }
            Err(e) => {
                log::warn!("[http#{}] connect to {} failed: {e}", self.id, self.url);
                self.state = ConnectionState::Disconnected;
                Err(HttpError::Connect(e))
            }
        }
    }

    /// Queue `data` for the next [`read`](Self::read). Performs no I/O.
    ///
    /// Always yields to the scheduler once before completing.
    pub async fn write(&mut self, data: &[u8]) {
        self.pending.push(data.to_vec());
        tokio::task::yield_now().await;
    }

    /// Send everything written since the last read as one HTTP request and
    /// return the response body.
    ///
    /// The write queue is emptied before the request goes out, even if the
    /// request then fails. A non-200 answer comes back as
    /// [`HttpError::Status`] carrying the body.
    pub async fn read(&mut self) -> Result<Vec<u8>, HttpError> {
        let data = std::mem::take(&mut self.pending).concat();

        let Some(handle) = self.handle.as_ref() else {
            log::warn!("[http#{}] read while disconnected; dropped {} bytes", self.id, data.len());
            return Err(HttpError::NotConnected);
        };

        let contents = BASE64.encode(&data);
        let method = if contents.is_empty() { Method::Get } else { Method::Post };

        // Content-Length is the raw size: the body is transmitted decoded.
        let headers = vec![
            ("Content-Length".to_string(), data.len().to_string()),
            ("Connection".to_string(),     "keep-alive".to_string()),
            ("Host".to_string(),           self.host.clone()),
        ];

        log::debug!("[http#{}] {method} {} ({} bytes)", self.id, self.url, data.len());
        let request = NativeRequest {
            method,
            headers,
            contents,
            binary_request:  true,
            binary_response: true,
        };

        let response = self
            .native
            .request(handle, request)
            .await
            .map_err(HttpError::Transport)?;

        let body = BASE64.decode(response.contents.as_bytes())?;
        if response.status == 200 {
            log::debug!("[http#{}] 200 ({} bytes)", self.id, body.len());
            Ok(body)
        } else {
            log::debug!("[http#{}] HTTP {} ({} bytes)", self.id, response.status, body.len());
            Err(HttpError::Status { status: response.status, body })
        }
    }

    /// Drop the connection.
    ///
    /// [`is_connected`](Self::is_connected) is `false` as soon as this
    /// returns; the native destroy runs in the background and nothing
    /// reports its completion.
    pub fn close(&mut self) {
        self.state = ConnectionState::Disconnected;
        let Some(handle) = self.handle.take() else {
            return;
        };

        let id = self.id;
        let native = Arc::clone(&self.native);
        match tokio::runtime::Handle::try_current() {
            Ok(rt) => {
                rt.spawn(async move {
                    let destroyed = native.destroy(handle).await;
                    log::debug!("[http#{id}] destroyed: {destroyed}");
                });
            }
            Err(_) => {
                log::warn!("[http#{id}] close outside a tokio runtime; handle {handle:?} dropped without destroy");
            }
        }
    }
}

impl<N: NativeHttp> Connection for HttpConnection<N> {
    type Error = HttpError;

    async fn connect(&mut self) -> Result<(), HttpError> {
        HttpConnection::connect(self).await
    }

    fn is_connected(&self) -> bool {
        HttpConnection::is_connected(self)
    }

    async fn write(&mut self, data: &[u8]) {
        HttpConnection::write(self, data).await
    }

    async fn read(&mut self) -> Result<Vec<u8>, HttpError> {
        HttpConnection::read(self).await
    }

    fn close(&mut self) {
        HttpConnection::close(self)
    }
}

fn connection_id() -> u32 {
    let mut b = [0u8; 4];
    if getrandom::getrandom(&mut b).is_err() {
        return 0;
    }
    u32::from_le_bytes(b) % 100_000
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::NativeError;
    use crate::native::ResponseEnvelope;

    struct Unreachable;

    impl NativeHttp for Unreachable {
        type Handle = ();

        async fn create(&self, _: &str) -> Result<(), NativeError> {
            Err(NativeError::Other("unreachable".into()))
        }

        async fn request(&self, _: &(), _: NativeRequest) -> Result<ResponseEnvelope, NativeError> {
            Err(NativeError::Other("unreachable".into()))
        }

        async fn destroy(&self, _: ()) -> bool { false }
    }

    fn url_for(options: HttpOptions) -> String {
        HttpConnection::new(Arc::new(Unreachable), options).url().to_string()
    }

    #[test]
    fn url_defaults() {
        assert_eq!(url_for(HttpOptions::default()), "http://localhost:80/apiw1");
    }

    #[test]
    fn url_overrides() {
        let url = url_for(HttpOptions {
            protocol: Some("https:".into()),
            host:     Some("149.154.167.40".into()),
            port:     Some(443),
            path:     Some("/api".into()),
        });
        assert_eq!(url, "https://149.154.167.40:443/api");
    }

    #[test]
    fn empty_values_take_defaults() {
        let url = url_for(HttpOptions {
            protocol: Some(String::new()),
            host:     Some(String::new()),
            port:     Some(0),
            path:     Some(String::new()),
        });
        assert_eq!(url, "http://localhost:80/apiw1");
    }

    #[test]
    fn new_connection_is_disconnected_and_empty() {
        let conn = HttpConnection::new(Arc::new(Unreachable), HttpOptions::default());
        assert!(!conn.is_connected());
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert_eq!(conn.pending_len(), 0);
        assert_eq!(conn.host(), "localhost");
    }

    #[test]
    fn close_outside_runtime_is_harmless() {
        let mut conn = HttpConnection::new(Arc::new(Unreachable), HttpOptions::default());
        conn.handle = Some(());
        conn.state = ConnectionState::Connected;
        conn.close();
        assert!(!conn.is_connected());
        assert_eq!(conn.state(), ConnectionState::Disconnected);
    }
}
