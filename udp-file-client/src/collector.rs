//! Receive loop for the parts of one file.
//!
//! [`collect`] pulls datagrams until either every expected part has been
//! seen or the overall deadline passes:
//!
//! - Every `filePart` datagram is acknowledged **before** duplicate
//!   detection.  Acking is a response to having seen the part, so a
//!   retransmitted part gets acked again and the sender can stop.
//! - A part index is accepted once; later copies are discarded.
//! - Idle reads, empty datagrams, and undecodable datagrams are skipped
//!   without penalty.
//! - Running out of time is an [`Outcome`], not an error.  Only transport
//!   failures abort the loop.
//!
//! Parts are returned in arrival order.  Putting them back in index order is
//! [`crate::reassembly`]'s job.

use std::collections::HashSet;
use std::time::Duration;

use crate::ack::acknowledge;
use crate::channel::{ChannelError, Received, Transport};
use crate::config::CollectConfig;
use crate::message::{decode_datagram, ContentType, FilePart};
use crate::timer::Deadline;

/// How a collection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// All expected parts arrived.
    Complete,
    /// The overall deadline passed first; the result is partial.
    DeadlineExceeded,
}

/// Result of one [`collect`] call.
#[derive(Debug, Clone)]
pub struct Collection {
    /// Accepted parts in arrival order, one per distinct index.
    pub parts: Vec<FilePart>,
    /// Number of parts the server announced.
    pub expected: usize,
    pub outcome: Outcome,
    /// Ack datagrams sent, duplicates included.
    pub acks_sent: usize,
    /// `filePart` datagrams discarded as already seen.
    pub duplicates: usize,
    pub elapsed: Duration,
}

impl Collection {
    pub fn is_complete(&self) -> bool {
        self.outcome == Outcome::Complete
    }

    pub fn received(&self) -> usize {
        self.parts.len()
    }

    /// Indices in `0..expected` that never arrived, ascending.
    pub fn missing(&self) -> Vec<u32> {
        let seen: HashSet<u32> = self.parts.iter().map(|p| p.part).collect();
        (0..self.expected)
            .filter_map(|i| u32::try_from(i).ok())
            .filter(|i| !seen.contains(i))
            .collect()
    }
}

/// Part indices already accepted during one collection.
#[derive(Debug, Default)]
struct PartRegistry {
    seen: HashSet<u32>,
}

impl PartRegistry {
    /// Record `part`; returns `false` if it was already present.
    fn accept(&mut self, part: u32) -> bool {
        self.seen.insert(part)
    }
}

/// Receive up to `expected` distinct parts from `transport`.
///
/// Returns as soon as `expected` distinct parts are held, or once more than
/// `config.overall_timeout` has elapsed.  Each read waits at most
/// `config.idle_timeout`.
pub fn collect<T: Transport + ?Sized>(
    transport: &mut T,
    expected: usize,
    config: &CollectConfig,
) -> Result<Collection, ChannelError> {
    let mut registry = PartRegistry::default();
    let mut parts: Vec<FilePart> = Vec::new();
    let mut acks_sent = 0usize;
    let mut duplicates = 0usize;
    let deadline = Deadline::after(config.overall_timeout);

    log::debug!(
        "[collect] expecting {expected} parts within {:?}",
        config.overall_timeout
    );

    let outcome = loop {
        if parts.len() == expected {
            break Outcome::Complete;
        }
        if deadline.expired() {
            break Outcome::DeadlineExceeded;
        }

        let bytes = match transport.recv_timeout(deadline.next_wait(config.idle_timeout))? {
            Received::Datagram(bytes) => bytes,
            Received::Idle => continue,
        };

        let msg = match decode_datagram(&bytes) {
            Ok(Some(msg)) => msg,
            Ok(None) => {
                log::trace!("[collect] empty datagram");
                continue;
            }
            Err(e) => {
                log::debug!("[collect] skipping undecodable datagram: {e}");
                continue;
            }
        };

        if msg.content_type != ContentType::FilePart {
            log::debug!("[collect] ignoring `{}` message", msg.content_type);
            continue;
        }
        let Some(part) = msg.into_file_part() else {
            continue;
        };

        acknowledge(&mut *transport, &part)?;
        acks_sent += 1;

        if registry.accept(part.part) {
            log::debug!(
                "[collect] ← part #{} ({} of {expected})",
                u64::from(part.part) + 1,
                parts.len() + 1
            );
            parts.push(part);
        } else {
            duplicates += 1;
            log::trace!("[collect] duplicate part={}", part.part);
        }
    };

    let collection = Collection {
        parts,
        expected,
        outcome,
        acks_sent,
        duplicates,
        elapsed: deadline.elapsed(),
    };

    match outcome {
        Outcome::Complete => log::info!(
            "received {} of {} parts in {:?}",
            collection.received(),
            expected,
            collection.elapsed
        ),
        Outcome::DeadlineExceeded => log::warn!(
            "deadline of {:?} reached: received {} of {} parts",
            config.overall_timeout,
            collection.received(),
            expected
        ),
    }

    Ok(collection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;
    use crate::simulator::ScriptedTransport;

    fn quick() -> CollectConfig {
        CollectConfig {
            idle_timeout: Duration::from_millis(5),
            overall_timeout: Duration::from_millis(150),
        }
    }

    fn part(i: u32) -> Message {
        Message::file_part(i, format!("chunk-{i}").into_bytes())
    }

    #[test]
    fn registry_accepts_each_index_once() {
        let mut r = PartRegistry::default();
        assert!(r.accept(3));
        assert!(!r.accept(3));
        assert!(r.accept(4));
    }

    #[test]
    fn zero_expected_completes_without_reading() {
        let mut t = ScriptedTransport::new();
        t.push_message(&part(0)).unwrap();
        let c = collect(&mut t, 0, &quick()).unwrap();
        assert!(c.is_complete());
        assert!(c.parts.is_empty());
        assert_eq!(t.pending(), 1);
    }

    #[test]
    fn non_part_messages_are_neither_kept_nor_acked() {
        let mut t = ScriptedTransport::new();
        t.push_message(&Message::catalog_request()).unwrap();
        t.push(br#"{"contentType":"ack","part":0,"content":""}"#.to_vec());
        t.push_message(&part(0)).unwrap();

        let c = collect(&mut t, 1, &quick()).unwrap();
        assert!(c.is_complete());
        assert_eq!(c.parts.len(), 1);
        assert_eq!(t.sent().len(), 1);
    }

    #[test]
    fn extra_datagrams_after_completion_are_left_unread() {
        let mut t = ScriptedTransport::new();
        t.push_message(&part(0)).unwrap();
        t.push_message(&part(1)).unwrap();
        t.push_message(&part(1)).unwrap();

        let c = collect(&mut t, 2, &quick()).unwrap();
        assert!(c.is_complete());
        assert_eq!(t.pending(), 1);
        assert_eq!(c.acks_sent, 2);
    }

    #[test]
    fn missing_lists_absent_indices() {
        let mut t = ScriptedTransport::new();
        t.push_message(&part(2)).unwrap();
        t.push_message(&part(0)).unwrap();

        let c = collect(&mut t, 4, &quick()).unwrap();
        assert_eq!(c.outcome, Outcome::DeadlineExceeded);
        assert_eq!(c.missing(), vec![1, 3]);
    }

    struct BrokenSend;

    impl Transport for BrokenSend {
        fn send(&mut self, _bytes: &[u8]) -> Result<(), ChannelError> {
            Err(std::io::Error::other("network down").into())
        }

        fn recv_timeout(&mut self, _idle: Duration) -> Result<Received, ChannelError> {
            Ok(Received::Datagram(part(0).encode().unwrap()))
        }
    }

    #[test]
    fn ack_send_failure_aborts_collection() {
        let err = collect(&mut BrokenSend, 1, &quick()).unwrap_err();
        assert!(matches!(err, ChannelError::Io(_)));
    }
}
