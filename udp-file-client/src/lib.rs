//! `udp-file-client` — client for a catalog + segmented file retrieval
//! protocol over UDP.
//!
//! # Architecture
//!
//! ```text
//!  ┌───────────────────────────────────┐
//!  │          Session (Client)         │  fetch_catalog / fetch_file
//!  └────┬──────────────────────────────┘
//!       │ expected part count
//!  ┌────▼──────┐   filePart    ┌───────┐
//!  │ Collector │──────────────▶│  Ack  │  echo part + content
//!  └────┬──────┘               └───┬───┘
//!       │  Message ◀──▶ bytes      │
//!  ┌────▼──────────────────────────▼───┐
//!  │     Channel (impl Transport)      │  blocking UdpSocket, idle timeout
//!  └───────────────────────────────────┘
//! ```
//!
//! Each module has a single responsibility:
//! - [`message`]     — wire format (JSON envelope, per-kind payload encoding)
//! - [`channel`]     — UDP socket, peer address, `Transport` trait
//! - [`ack`]         — acknowledgment of received parts
//! - [`collector`]   — dedup + dual-timeout receive loop
//! - [`session`]     — catalog and file request/response flows
//! - [`reassembly`]  — ordering parts and writing the file
//! - [`timer`]       — overall deadline tracking
//! - [`config`]      — defaults and client configuration
//! - [`simulator`]   — scripted and fault-injecting transports for testing

pub mod ack;
pub mod channel;
pub mod collector;
pub mod config;
pub mod message;
pub mod reassembly;
pub mod session;
pub mod simulator;
pub mod timer;

pub use channel::{Channel, ChannelError, Received, Transport};
pub use collector::{collect, Collection, Outcome};
pub use config::{ChannelConfig, ClientConfig, CollectConfig};
pub use message::{CodecError, ContentType, FilePart, Message};
pub use reassembly::{reassemble, write_file, ReassemblyError};
pub use session::{Catalog, Client, FetchError, Transfer};
