//! MTProto plaintext framing and connection abstractions.
//!
//! This crate handles:
//! * Plaintext message framing and monotonic message IDs
//! * The [`Connection`] contract an MTProto engine drives
//! * [`PlainSender`], which runs unencrypted exchanges over any [`Connection`]
//!
//! It is intentionally transport-agnostic: bring your own HTTP/TCP pipe.
//! TL bodies are treated as opaque bytes.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod message;
pub mod session;
pub mod transport;

pub use message::{FrameError, Message, MessageId};
pub use session::Session;
pub use transport::{Connection, PlainSender, SendError};
