//! The native HTTP capability the adapter drives.
//!
//! [`NativeHttp`] is the create / request / destroy bridge a platform
//! provides. [`crate::TcpHttp`] implements it over tokio; tests use fakes.

use std::fmt;
use std::future::Future;

use crate::errors::NativeError;

/// HTTP method chosen by the adapter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get  => "GET",
            Self::Post => "POST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One request handed to [`NativeHttp::request`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NativeRequest {
    pub method: Method,
    /// Header pairs, sent in this order.
    pub headers: Vec<(String, String)>,
    /// Request body as text. Base64 when `binary_request` is set.
    pub contents: String,
    /// Decode `contents` from Base64 before transmitting.
    pub binary_request: bool,
    /// Return the response body Base64-encoded.
    pub binary_response: bool,
}

impl NativeRequest {
    /// Value of the first header named `name` (ASCII case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// What the capability returns for a completed request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResponseEnvelope {
    pub status: u16,
    /// Response body as text. Base64 when the request set `binary_response`.
    pub contents: String,
}

/// A platform HTTP executor.
///
/// The adapter owns one handle per logical connection and never issues two
/// requests on the same handle at once.
pub trait NativeHttp: Send + Sync + 'static {
    /// Opaque connection handle.
    type Handle: Clone + fmt::Debug + Send + Sync + 'static;

    /// Open a connection to `url`.
    fn create(&self, url: &str) -> impl Future<Output = Result<Self::Handle, NativeError>> + Send;

    /// Execute one request on an open connection.
    fn request(
        &self,
        handle: &Self::Handle,
        request: NativeRequest,
    ) -> impl Future<Output = Result<ResponseEnvelope, NativeError>> + Send;

    /// Tear the connection down. Returns whether anything was destroyed.
    fn destroy(&self, handle: Self::Handle) -> impl Future<Output = bool> + Send;
}
