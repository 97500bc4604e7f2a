//! # layer-http
//!
//! MTProto over HTTP for clients whose HTTP stack is a native bridge.
//!
//! ## Pieces
//! - [`HttpConnection`]: buffers the engine's writes and turns each read
//!   into one Base64-bodied HTTP round trip
//! - [`NativeHttp`]: the create / request / destroy capability it drives
//! - [`TcpHttp`]: a [`NativeHttp`] over tokio TCP using hyper's HTTP/1.1 client
//! - [`Env`] / [`Profile`]: sandbox and live data-centre settings
//!
//! `HttpConnection` implements [`layer_mtproto::Connection`], so it plugs
//! straight into [`layer_mtproto::PlainSender`].

#![deny(unsafe_code)]

mod connection;
mod env;
mod errors;
mod native;
mod socket;

pub use connection::{ConnectionState, HttpConnection, HttpOptions};
pub use env::{API_PATH, AppIdentity, Env, MODE_VAR, Mode, Profile};
pub use errors::{ConfigError, HttpError, NativeError};
pub use native::{Method, NativeHttp, NativeRequest, ResponseEnvelope};
pub use socket::{ConnectionId, DEFAULT_MAX_BODY, SocketState, TcpHttp};
