//! Pluggable connection layer.
//!
//! Implement [`Connection`] over HTTP, TCP, or anything else that can move
//! bytes. The engine only ever calls `write` zero or more times to build one
//! outgoing frame, then `read` exactly once to get the matching response.

use std::fmt;
use std::future::Future;

use crate::message::{FrameError, Message};
use crate::session::Session;

/// A byte pipe driven by the MTProto engine.
///
/// Implementations are free to buffer: a `write` need not touch the network
/// as long as the next `read` delivers everything written since the last one.
pub trait Connection: Send {
    /// The error type returned by `connect` and `read`.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Open the connection.
    fn connect(&mut self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// `true` while the connection is open.
    fn is_connected(&self) -> bool;

    /// Queue bytes for the current outgoing frame.
    fn write(&mut self, data: &[u8]) -> impl Future<Output = ()> + Send;

    /// Flush the current frame and return the raw response frame.
    fn read(&mut self) -> impl Future<Output = Result<Vec<u8>, Self::Error>> + Send;

    /// Close the connection. Returns without waiting for teardown.
    fn close(&mut self);
}

// ─── SendError ────────────────────────────────────────────────────────────────

/// Failure while exchanging a plaintext message.
#[derive(Debug)]
pub enum SendError<E> {
    /// The underlying connection failed.
    Connection(E),
    /// The response was not a valid plaintext frame.
    Frame(FrameError),
}

impl<E: fmt::Display> fmt::Display for SendError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection(e) => write!(f, "connection error: {e}"),
            Self::Frame(e) => write!(f, "bad frame: {e}"),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for SendError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Connection(e) => Some(e),
            Self::Frame(e) => Some(e),
        }
    }
}

impl<E> From<FrameError> for SendError<E> {
    fn from(e: FrameError) -> Self { Self::Frame(e) }
}

// ─── PlainSender ──────────────────────────────────────────────────────────────

/// Exchanges unencrypted messages (the key-exchange phase) over a [`Connection`].
///
/// Each outgoing frame is written in two pieces, envelope header then body,
/// followed by a single read for the response.
pub struct PlainSender<C: Connection> {
    conn: C,
    session: Session,
}

impl<C: Connection> PlainSender<C> {
    /// Wrap a connection. It is opened lazily on the first [`invoke`](Self::invoke).
    pub fn new(conn: C) -> Self {
        Self { conn, session: Session::new() }
    }

    /// Send one serialized TL call and return the body of the response.
    pub async fn invoke(&mut self, body: &[u8]) -> Result<Vec<u8>, SendError<C::Error>> {
        if !self.conn.is_connected() {
            self.conn.connect().await.map_err(SendError::Connection)?;
        }

        let msg = self.session.pack(body.to_vec());
        log::debug!("[sender] → msg_id={:#x} ({} bytes)", msg.id.0, msg.body.len());
        self.conn.write(&msg.plaintext_header()).await;
        self.conn.write(&msg.body).await;

        let frame = self.conn.read().await.map_err(SendError::Connection)?;
        let reply = Message::parse_plaintext(&frame)?;
        log::debug!("[sender] ← msg_id={:#x} ({} bytes)", reply.id.0, reply.body.len());
        Ok(reply.body)
    }

    /// Access the underlying connection.
    pub fn connection(&self) -> &C { &self.conn }

    /// Access the underlying connection mutably.
    pub fn connection_mut(&mut self) -> &mut C { &mut self.conn }

    /// Close the connection and give it back.
    pub fn into_inner(mut self) -> C {
        self.conn.close();
        self.conn
    }
}
