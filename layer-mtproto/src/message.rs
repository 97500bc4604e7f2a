//! MTProto plaintext message framing.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Size of the plaintext envelope header:
/// `auth_key_id:long | message_id:long | message_data_length:int`.
pub const PLAINTEXT_HEADER_LEN: usize = 8 + 8 + 4;

/// A 64-bit MTProto message identifier.
///
/// The upper 32 bits hold the Unix time in seconds, the lower 32 bits the
/// fraction of the current second. The two least significant bits are zero
/// for client messages.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct MessageId(pub u64);

impl MessageId {
    /// A client message ID for the current system time.
    pub fn now() -> Self {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        let fraction = (u64::from(since_epoch.subsec_nanos()) << 32) / 1_000_000_000;
        Self(((since_epoch.as_secs() << 32) | fraction) & !0b11)
    }

    /// Unix time in seconds encoded in the upper half.
    pub fn unix_secs(self) -> u32 {
        (self.0 >> 32) as u32
    }
}

// ─── FrameError ───────────────────────────────────────────────────────────────

/// A received frame could not be read as a plaintext message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FrameError {
    /// Fewer bytes than the fixed 20-byte header.
    TooShort(usize),
    /// `auth_key_id` is non-zero: the frame belongs to an encrypted session.
    Encrypted(u64),
    /// The declared body length runs past the end of the frame.
    Truncated {
        /// Length from the `message_data_length` field.
        declared: usize,
        /// Bytes actually present after the header.
        available: usize,
    },
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort(n) => write!(f, "frame too short ({n} bytes)"),
            Self::Encrypted(id) => write!(f, "auth_key_id {id:#018x} != 0 in plaintext frame"),
            Self::Truncated { declared, available } => {
                write!(f, "truncated body: declared {declared} bytes, {available} available")
            }
        }
    }
}

impl std::error::Error for FrameError {}

// ─── Message ──────────────────────────────────────────────────────────────────

/// An unencrypted MTProto message.
///
/// The body is an already-serialized TL object; this type never looks
/// inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Unique identifier for this message.
    pub id: MessageId,
    /// The serialized TL body.
    pub body: Vec<u8>,
}

impl Message {
    /// Construct a new plaintext message (used before key exchange).
    pub fn plaintext(id: MessageId, body: Vec<u8>) -> Self {
        Self { id, body }
    }

    /// The 20-byte envelope header that precedes [`Message::body`] on the wire.
    pub fn plaintext_header(&self) -> [u8; PLAINTEXT_HEADER_LEN] {
        let mut hdr = [0u8; PLAINTEXT_HEADER_LEN];
        // auth_key_id stays 0
        hdr[8..16].copy_from_slice(&self.id.0.to_le_bytes());
        hdr[16..20].copy_from_slice(&(self.body.len() as u32).to_le_bytes());
        hdr
    }

    /// Serialize into the plaintext wire format:
    ///
    /// ```text
    /// auth_key_id:long  (0 for plaintext)
    /// message_id:long
    /// message_data_length:int
    /// message_data:bytes
    /// ```
    pub fn to_plaintext_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(PLAINTEXT_HEADER_LEN + self.body.len());
        buf.extend(self.plaintext_header());
        buf.extend(&self.body);
        buf
    }

    /// Parse a plaintext frame received from the server.
    ///
    /// Trailing bytes after the declared body are ignored.
    pub fn parse_plaintext(frame: &[u8]) -> Result<Self, FrameError> {
        if frame.len() < PLAINTEXT_HEADER_LEN {
            return Err(FrameError::TooShort(frame.len()));
        }
        let auth_key_id = u64::from_le_bytes(read_array(&frame[..8]));
        if auth_key_id != 0 {
            return Err(FrameError::Encrypted(auth_key_id));
        }
        let id = u64::from_le_bytes(read_array(&frame[8..16]));
        let len = u32::from_le_bytes(read_array(&frame[16..20])) as usize;
        let available = frame.len() - PLAINTEXT_HEADER_LEN;
        if available < len {
            return Err(FrameError::Truncated { declared: len, available });
        }
        Ok(Self {
            id: MessageId(id),
            body: frame[PLAINTEXT_HEADER_LEN..PLAINTEXT_HEADER_LEN + len].to_vec(),
        })
    }
}

fn read_array<const N: usize>(src: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&src[..N]);
    out
}
