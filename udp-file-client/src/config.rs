//! Client configuration and protocol defaults.
//!
//! Every knob has a default matching the reference server deployment; the
//! binary overrides them from CLI flags.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Server host used when none is given.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Port the reference server binds.
pub const DEFAULT_PORT: u16 = 3000;

/// How long one receive call waits before reporting that nothing arrived.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_millis(1000);

/// Upper bound on a whole collection (or reply wait) before giving up.
pub const DEFAULT_OVERALL_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Receive buffer size; longer datagrams are truncated by the OS.
pub const DEFAULT_RECV_BUFFER: usize = 1024;

/// Socket-level settings for a [`crate::channel::Channel`].
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Local address to bind; port 0 lets the OS pick an ephemeral port.
    pub bind_addr: SocketAddr,
    /// Size of the buffer each datagram is read into.
    pub recv_buffer: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
            recv_buffer: DEFAULT_RECV_BUFFER,
        }
    }
}

/// Timeouts for the receive loops.
#[derive(Debug, Clone)]
pub struct CollectConfig {
    /// Per-read wait.  An idle read is not an error; the loop simply retries.
    pub idle_timeout: Duration,
    /// Total budget for one loop; when it runs out the loop returns what it has.
    pub overall_timeout: Duration,
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            overall_timeout: DEFAULT_OVERALL_TIMEOUT,
        }
    }
}

/// Everything a [`crate::session::Client`] needs to talk to one server.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub channel: ChannelConfig,
    pub collect: CollectConfig,
}

impl ClientConfig {
    /// Defaults for everything except the server address.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            channel: ChannelConfig::default(),
            collect: CollectConfig::default(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_PORT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_deployment() {
        let cfg = ClientConfig::default();
        assert_eq!(cfg.host, "127.0.0.1");
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.collect.idle_timeout, Duration::from_millis(1000));
        assert_eq!(cfg.collect.overall_timeout, Duration::from_secs(30));
        assert_eq!(cfg.channel.recv_buffer, 1024);
        assert_eq!(cfg.channel.bind_addr.port(), 0);
    }
}
