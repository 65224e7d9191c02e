//! Acknowledgment of received file parts.
//!
//! An ack mirrors the part it confirms: same index, same payload.  The server
//! stops retransmitting a part on the first ack it sees for that index, so
//! repeated acks for one part are harmless confirmations.

use crate::channel::{ChannelError, Transport};
use crate::message::{ContentType, FilePart, Message};

/// Build the ack for `part` without sending it.
pub fn ack_message(part: &FilePart) -> Message {
    Message {
        part: Some(part.part),
        content: part.content.clone(),
        ..Message::new(ContentType::Ack)
    }
}

/// Send exactly one ack datagram for `part`.
///
/// Send failures propagate; nothing is retried here.
pub fn acknowledge<T: Transport + ?Sized>(
    transport: &mut T,
    part: &FilePart,
) -> Result<(), ChannelError> {
    transport.send_message(&ack_message(part))?;
    log::trace!("[ack] → part={} len={}", part.part, part.content.len());
    Ok(())
}
