//! Blocking UDP channel to one server.
//!
//! [`Channel`] is a thin wrapper around `std::net::UdpSocket` that remembers
//! the peer and turns a read timeout into [`Received::Idle`] instead of an
//! error.  All protocol logic lives elsewhere; this module owns only byte I/O.
//!
//! The [`Transport`] trait is the seam the rest of the crate is written
//! against, so loops can be driven by [`crate::simulator`] transports in tests.

use std::io::ErrorKind;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;

use thiserror::Error;

use crate::config::ChannelConfig;
use crate::message::{CodecError, Message};

/// Smallest read timeout handed to the OS; a zero timeout is rejected there.
const MIN_READ_TIMEOUT: Duration = Duration::from_millis(1);

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that can arise from channel operations.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Underlying I/O error from the OS.
    #[error("socket I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The server host could not be resolved.
    #[error("cannot resolve {host}:{port}: {source}")]
    Resolve {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },
    /// Resolution succeeded but yielded no usable address.
    #[error("{host}:{port} resolved to no addresses")]
    NoAddress { host: String, port: u16 },
    /// `send` was called before [`Channel::set_peer`].
    #[error("no peer configured")]
    NoPeer,
    /// An outbound message could not be encoded.
    #[error("encode error: {0}")]
    Codec(#[from] CodecError),
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// Result of one bounded receive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    /// One datagram payload, possibly empty.
    Datagram(Vec<u8>),
    /// The idle timeout elapsed with nothing received.
    Idle,
}

/// Datagram I/O against a fixed peer.
pub trait Transport {
    /// Send one best-effort datagram to the peer.
    fn send(&mut self, bytes: &[u8]) -> Result<(), ChannelError>;

    /// Block for at most `idle` waiting for one datagram.
    fn recv_timeout(&mut self, idle: Duration) -> Result<Received, ChannelError>;

    /// Encode `msg` and send it as a single datagram.
    fn send_message(&mut self, msg: &Message) -> Result<(), ChannelError> {
        let bytes = msg.encode()?;
        self.send(&bytes)
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn send(&mut self, bytes: &[u8]) -> Result<(), ChannelError> {
        (**self).send(bytes)
    }

    fn recv_timeout(&mut self, idle: Duration) -> Result<Received, ChannelError> {
        (**self).recv_timeout(idle)
    }
}

/// Errors that mean "nothing usable arrived" rather than a broken socket.
///
/// Some platforms surface an ICMP port-unreachable from an earlier send as
/// a refused/reset error on the next read.
fn is_idle_error(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::WouldBlock
            | ErrorKind::TimedOut
            | ErrorKind::Interrupted
            | ErrorKind::ConnectionRefused
            | ErrorKind::ConnectionReset
    )
}

// ---------------------------------------------------------------------------
// Channel
// ---------------------------------------------------------------------------

/// A bound UDP socket plus the server it talks to.
#[derive(Debug)]
pub struct Channel {
    socket: UdpSocket,
    local_addr: SocketAddr,
    peer: Option<SocketAddr>,
    recv_buffer: usize,
    read_timeout: Option<Duration>,
}

impl Channel {
    /// Bind a new socket as described by `config`.
    pub fn open(config: &ChannelConfig) -> Result<Self, ChannelError> {
        let socket = UdpSocket::bind(config.bind_addr)?;
        let local_addr = socket.local_addr()?;
        log::debug!("[channel] bound {local_addr}");
        Ok(Self {
            socket,
            local_addr,
            peer: None,
            recv_buffer: config.recv_buffer.max(1),
            read_timeout: None,
        })
    }

    /// Address the OS assigned to this channel.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Currently configured peer, if any.
    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Resolve `host:port` and use it for every subsequent send.
    ///
    /// Prefers an address of the same family as the local socket.
    pub fn set_peer(&mut self, host: &str, port: u16) -> Result<SocketAddr, ChannelError> {
        let candidates: Vec<SocketAddr> = (host, port)
            .to_socket_addrs()
            .map_err(|source| ChannelError::Resolve {
                host: host.to_string(),
                port,
                source,
            })?
            .collect();

        let addr = candidates
            .iter()
            .find(|a| a.is_ipv4() == self.local_addr.is_ipv4())
            .or_else(|| candidates.first())
            .copied()
            .ok_or_else(|| ChannelError::NoAddress {
                host: host.to_string(),
                port,
            })?;

        log::debug!("[channel] peer set to {addr} ({host}:{port})");
        self.peer = Some(addr);
        Ok(addr)
    }

    /// Release the socket.
    pub fn close(self) {
        log::debug!("[channel] closing {}", self.local_addr);
    }

    fn apply_read_timeout(&mut self, idle: Duration) -> Result<(), ChannelError> {
        let idle = idle.max(MIN_READ_TIMEOUT);
        if self.read_timeout != Some(idle) {
            self.socket.set_read_timeout(Some(idle))?;
            self.read_timeout = Some(idle);
        }
        Ok(())
    }
}

impl Transport for Channel {
    fn send(&mut self, bytes: &[u8]) -> Result<(), ChannelError> {
        let peer = self.peer.ok_or(ChannelError::NoPeer)?;
        self.socket.send_to(bytes, peer)?;
        log::trace!("[channel] → {} bytes to {peer}", bytes.len());
        Ok(())
    }

    fn recv_timeout(&mut self, idle: Duration) -> Result<Received, ChannelError> {
        self.apply_read_timeout(idle)?;
        let mut buf = vec![0u8; self.recv_buffer];
        match self.socket.recv_from(&mut buf) {
            Ok((n, from)) => {
                log::trace!("[channel] ← {n} bytes from {from}");
                buf.truncate(n);
                Ok(Received::Datagram(buf))
            }
            Err(e) if is_idle_error(&e) => Ok(Received::Idle),
            Err(e) => Err(e.into()),
        }
    }
}
