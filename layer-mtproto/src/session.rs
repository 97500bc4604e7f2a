//! Message-ID allocation for one plaintext exchange sequence.

use crate::message::{Message, MessageId};

/// Hands out client message IDs for one connection.
///
/// IDs follow the system clock but never repeat or go backwards, even when
/// two are requested within the clock's resolution or the clock steps back.
///
/// # Example
///
/// ```rust
/// use layer_mtproto::Session;
///
/// let mut session = Session::new();
/// let msg = session.pack(vec![0xf1, 0x8e, 0x7e, 0xbe]);
/// assert_eq!(msg.to_plaintext_bytes().len(), 20 + 4);
/// assert!(session.next_msg_id() > msg.id);
/// ```
#[derive(Debug, Default)]
pub struct Session {
    last_msg_id: u64,
}

impl Session {
    /// Create a fresh session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a message ID strictly greater than every earlier one.
    pub fn next_msg_id(&mut self) -> MessageId {
        let id = MessageId::now().0.max(self.last_msg_id.wrapping_add(4));
        self.last_msg_id = id;
        MessageId(id)
    }

    /// The most recently allocated ID, if any.
    pub fn last_msg_id(&self) -> Option<MessageId> {
        (self.last_msg_id != 0).then_some(MessageId(self.last_msg_id))
    }

    /// Wrap an already-serialized TL call into a [`Message`] ready to send.
    pub fn pack(&mut self, body: Vec<u8>) -> Message {
        Message::plaintext(self.next_msg_id(), body)
    }
}
