//! Error types for layer-http.

use std::{fmt, io};

// ─── NativeError ──────────────────────────────────────────────────────────────

/// A failure reported by a [`crate::NativeHttp`] capability.
#[derive(Debug)]
pub enum NativeError {
    /// Socket-level failure.
    Io(io::Error),
    /// The target URL could not be parsed.
    InvalidUrl(String),
    /// The URL scheme is not one the capability can execute.
    UnsupportedScheme(String),
    /// No live connection is registered under the given handle.
    UnknownHandle,
    /// The exchange broke HTTP/1.1 framing, or the response body was too large.
    Protocol(String),
    /// The operation did not finish within the capability's timeout.
    TimedOut,
    /// Anything else, as reported by the platform.
    Other(String),
}

impl fmt::Display for NativeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e)                => write!(f, "I/O error: {e}"),
            Self::InvalidUrl(u)        => write!(f, "invalid URL: {u}"),
            Self::UnsupportedScheme(s) => write!(f, "unsupported scheme: {s}"),
            Self::UnknownHandle        => write!(f, "unknown connection handle"),
            Self::Protocol(s)          => write!(f, "HTTP protocol error: {s}"),
            Self::TimedOut             => write!(f, "timed out"),
            Self::Other(s)             => write!(f, "{s}"),
        }
    }
}

impl std::error::Error for NativeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _           => None,
        }
    }
}

impl From<io::Error> for NativeError {
    fn from(e: io::Error) -> Self { Self::Io(e) }
}

impl From<hyper::Error> for NativeError {
    fn from(e: hyper::Error) -> Self {
        use std::error::Error as _;
        match e.source() {
            Some(cause) => Self::Protocol(format!("{e}: {cause}")),
            None        => Self::Protocol(e.to_string()),
        }
    }
}

// ─── HttpError ────────────────────────────────────────────────────────────────

/// The error type returned from [`crate::HttpConnection`] operations.
#[derive(Debug)]
pub enum HttpError {
    /// The native capability could not create the connection.
    Connect(NativeError),
    /// The native request itself failed.
    Transport(NativeError),
    /// The server answered with a status other than 200.
    ///
    /// `body` holds the decoded response body, which callers may still need.
    Status { status: u16, body: Vec<u8> },
    /// The response contents were not valid Base64.
    Decode(base64::DecodeError),
    /// `read` was called without an open connection.
    NotConnected,
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect(e)              => write!(f, "connect failed: {e}"),
            Self::Transport(e)            => write!(f, "transport error: {e}"),
            Self::Status { status, body } => write!(f, "HTTP {status} ({} byte body)", body.len()),
            Self::Decode(e)               => write!(f, "bad base64 response: {e}"),
            Self::NotConnected            => write!(f, "not connected"),
        }
    }
}

impl std::error::Error for HttpError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Connect(e) | Self::Transport(e) => Some(e),
            Self::Decode(e)                       => Some(e),
            _                                     => None,
        }
    }
}

impl From<base64::DecodeError> for HttpError {
    fn from(e: base64::DecodeError) -> Self { Self::Decode(e) }
}

impl HttpError {
    /// The body carried by a non-200 response, if this is one.
    pub fn status_body(&self) -> Option<&[u8]> {
        match self {
            Self::Status { body, .. } => Some(body),
            _                         => None,
        }
    }

    /// The HTTP status of a non-200 response, if this is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _                           => None,
        }
    }
}

// ─── ConfigError ──────────────────────────────────────────────────────────────

/// A deployment setting could not be interpreted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// The mode string is neither `sandbox` nor `live`.
    UnknownMode(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownMode(m) => write!(f, "unknown mode {m:?} (expected \"sandbox\" or \"live\")"),
        }
    }
}

impl std::error::Error for ConfigError {}
