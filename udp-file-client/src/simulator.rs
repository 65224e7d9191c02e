//! Network simulation for deterministic testing.
//!
//! Real networks drop, duplicate, and mangle datagrams.  To exercise the
//! collector without depending on actual network conditions this module
//! provides two [`Transport`] implementations:
//!
//! - [`ScriptedTransport`] — an in-memory inbox of datagrams fed to the
//!   reader in order, recording everything sent.  An empty inbox behaves
//!   like a quiet network: the read sleeps for the idle timeout and reports
//!   [`Received::Idle`].
//! - [`Simulator`] — wraps any transport and applies a seeded fault model:
//!
//! | Fault        | Description                                          |
//! |--------------|------------------------------------------------------|
//! | Loss         | Drop an inbound datagram with probability `loss_rate`. |
//! | Duplication  | Deliver an inbound datagram twice.                   |
//! | Truncation   | Cut an inbound datagram short (never valid JSON).    |
//! | Send loss    | Drop an outbound datagram (e.g. an ack).             |
//!
//! The same seed always yields the same fault sequence.

use std::collections::VecDeque;
use std::thread;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::channel::{ChannelError, Received, Transport};
use crate::message::{CodecError, Message};

// ---------------------------------------------------------------------------
// ScriptedTransport
// ---------------------------------------------------------------------------

/// Replays a fixed list of inbound datagrams and records outbound ones.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    inbox: VecDeque<Vec<u8>>,
    sent: Vec<Vec<u8>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a raw datagram for delivery.
    pub fn push(&mut self, bytes: impl Into<Vec<u8>>) -> &mut Self {
        self.inbox.push_back(bytes.into());
        self
    }

    /// Queue an encoded message for delivery.
    pub fn push_message(&mut self, msg: &Message) -> Result<&mut Self, CodecError> {
        let bytes = msg.encode()?;
        Ok(self.push(bytes))
    }

    /// Datagrams not yet read.
    pub fn pending(&self) -> usize {
        self.inbox.len()
    }

    /// Every datagram sent so far, in order.
    pub fn sent(&self) -> &[Vec<u8>] {
        &self.sent
    }

    /// Sent datagrams that decode as messages.
    pub fn sent_messages(&self) -> Vec<Message> {
        self.sent
            .iter()
            .filter_map(|b| Message::decode(b).ok())
            .collect()
    }
}

impl Transport for ScriptedTransport {
    fn send(&mut self, bytes: &[u8]) -> Result<(), ChannelError> {
        self.sent.push(bytes.to_vec());
        Ok(())
    }

    fn recv_timeout(&mut self, idle: Duration) -> Result<Received, ChannelError> {
        match self.inbox.pop_front() {
            Some(bytes) => Ok(Received::Datagram(bytes)),
            None => {
                thread::sleep(idle);
                Ok(Received::Idle)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Simulator
// ---------------------------------------------------------------------------

/// Configuration for the fault-injection model.
///
/// All probabilities are in the range `[0.0, 1.0]`; out-of-range values are
/// clamped.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Probability that an inbound datagram is silently dropped.
    pub loss_rate: f64,
    /// Probability that an inbound datagram is delivered twice.
    pub duplicate_rate: f64,
    /// Probability that an inbound datagram is truncated.
    pub truncate_rate: f64,
    /// Probability that an outbound datagram is silently dropped.
    pub send_loss_rate: f64,
    /// RNG seed.
    pub seed: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        // No faults by default — the simulator is a transparent pass-through.
        Self {
            loss_rate: 0.0,
            duplicate_rate: 0.0,
            truncate_rate: 0.0,
            send_loss_rate: 0.0,
            seed: 0,
        }
    }
}

/// Counters for the faults actually injected.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SimulatorStats {
    pub dropped: usize,
    pub duplicated: usize,
    pub truncated: usize,
    pub sends_dropped: usize,
}

/// A fault-injecting wrapper around another transport.
pub struct Simulator<T> {
    inner: T,
    config: SimulatorConfig,
    rng: StdRng,
    /// Duplicates waiting to be delivered before the next real read.
    replay: VecDeque<Vec<u8>>,
    stats: SimulatorStats,
}

impl<T: Transport> Simulator<T> {
    pub fn new(inner: T, config: SimulatorConfig) -> Self {
        let clamp = |p: f64| if p.is_nan() { 0.0 } else { p.clamp(0.0, 1.0) };
        let config = SimulatorConfig {
            loss_rate: clamp(config.loss_rate),
            duplicate_rate: clamp(config.duplicate_rate),
            truncate_rate: clamp(config.truncate_rate),
            send_loss_rate: clamp(config.send_loss_rate),
            seed: config.seed,
        };
        Self {
            inner,
            rng: StdRng::seed_from_u64(config.seed),
            config,
            replay: VecDeque::new(),
            stats: SimulatorStats::default(),
        }
    }

    pub fn stats(&self) -> &SimulatorStats {
        &self.stats
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Transport> Transport for Simulator<T> {
    fn send(&mut self, bytes: &[u8]) -> Result<(), ChannelError> {
        if self.rng.random_bool(self.config.send_loss_rate) {
            self.stats.sends_dropped += 1;
            log::trace!("[sim] dropped outbound datagram ({} bytes)", bytes.len());
            return Ok(());
        }
        self.inner.send(bytes)
    }

    fn recv_timeout(&mut self, idle: Duration) -> Result<Received, ChannelError> {
        if let Some(bytes) = self.replay.pop_front() {
            return Ok(Received::Datagram(bytes));
        }

        let mut bytes = match self.inner.recv_timeout(idle)? {
            Received::Datagram(bytes) => bytes,
            Received::Idle => return Ok(Received::Idle),
        };

        if self.rng.random_bool(self.config.loss_rate) {
            self.stats.dropped += 1;
            log::trace!("[sim] dropped inbound datagram ({} bytes)", bytes.len());
            return Ok(Received::Idle);
        }

        if bytes.len() > 1 && self.rng.random_bool(self.config.truncate_rate) {
            // Any proper prefix of a JSON object is unterminated.
            let keep = self.rng.random_range(1..bytes.len());
            bytes.truncate(keep);
            self.stats.truncated += 1;
        }

        if self.rng.random_bool(self.config.duplicate_rate) {
            self.replay.push_back(bytes.clone());
            self.stats.duplicated += 1;
        }

        Ok(Received::Datagram(bytes))
    }
}
