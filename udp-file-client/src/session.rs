//! Request/response flows against one server.
//!
//! A [`Client`] holds only configuration.  Each operation opens its own
//! [`Channel`], runs one exchange, and closes the channel again on every exit
//! path:
//!
//! ```text
//!  fetch_catalog:  filePaths ──▶            fetch_file:  fileName(name) ──▶
//!                  ◀── filePaths([...])                  ◀── fileName(chunks = N)
//!                                                        ◀── filePart × N   (each acked)
//! ```
//!
//! The `*_over` functions run the same flows over any [`Transport`].

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::channel::{Channel, ChannelError, Received, Transport};
use crate::collector::{collect, Collection};
use crate::config::{ClientConfig, CollectConfig};
use crate::message::{decode_datagram, ContentType, Message};
use crate::timer::Deadline;

/// Errors surfaced by a session operation.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Channel(#[from] ChannelError),
    /// The server answered with an error object.
    #[error("server error: {0}")]
    Server(String),
    /// Nothing usable arrived before the deadline.
    #[error("no {0} reply within {1:?}")]
    NoReply(&'static str, Duration),
    /// The catalog payload is not a list of names.
    #[error("malformed catalog: {0}")]
    Catalog(#[source] serde_json::Error),
    /// The announce reply did not say how many parts follow.
    #[error("file announcement carries no part count")]
    MissingPartCount,
}

/// Error payload the server sends in place of a normal reply.
#[derive(Debug, Deserialize)]
struct ServerErrorBody {
    error: String,
}

fn server_error(msg: &Message) -> Option<String> {
    serde_json::from_slice::<ServerErrorBody>(&msg.content)
        .ok()
        .map(|body| body.error)
}

/// Files the server offers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    pub files: Vec<String>,
}

impl Catalog {
    pub fn contains(&self, name: &str) -> bool {
        self.files.iter().any(|f| f == name)
    }
}

/// Outcome of a file fetch: the name requested and whatever parts arrived.
#[derive(Debug, Clone)]
pub struct Transfer {
    pub name: String,
    pub collection: Collection,
}

/// Entry point for talking to one server.
#[derive(Debug, Clone)]
pub struct Client {
    config: ClientConfig,
}

impl Client {
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Ask the server which files it offers.
    pub fn fetch_catalog(&self) -> Result<Catalog, FetchError> {
        let mut channel = self.open_channel()?;
        let result = fetch_catalog_over(&mut channel, &self.config.collect);
        channel.close();
        result
    }

    /// Request `name` and collect its parts.
    ///
    /// A transfer that runs out of time is returned, not reported as an
    /// error; check [`Collection::is_complete`].
    pub fn fetch_file(&self, name: &str) -> Result<Transfer, FetchError> {
        let mut channel = self.open_channel()?;
        let result = fetch_file_over(&mut channel, name, &self.config.collect);
        channel.close();
        result
    }

    /// Bind a fresh channel aimed at the configured server.
    ///
    /// If resolution fails the half-built channel is dropped, which releases
    /// the socket.
    fn open_channel(&self) -> Result<Channel, FetchError> {
        let mut channel = Channel::open(&self.config.channel)?;
        channel.set_peer(&self.config.host, self.config.port)?;
        Ok(channel)
    }
}

/// Catalog exchange over an arbitrary transport.
pub fn fetch_catalog_over<T: Transport + ?Sized>(
    transport: &mut T,
    config: &CollectConfig,
) -> Result<Catalog, FetchError> {
    transport.send_message(&Message::catalog_request())?;
    let reply = await_reply(&mut *transport, "catalog", config, |m| {
        m.content_type == ContentType::CatalogResponse
    })?;

    match serde_json::from_slice::<Vec<String>>(&reply.content) {
        Ok(files) => {
            log::info!("catalog lists {} files", files.len());
            Ok(Catalog { files })
        }
        Err(e) => Err(server_error(&reply)
            .map(FetchError::Server)
            .unwrap_or(FetchError::Catalog(e))),
    }
}

/// File exchange over an arbitrary transport.
pub fn fetch_file_over<T: Transport + ?Sized>(
    transport: &mut T,
    name: &str,
    config: &CollectConfig,
) -> Result<Transfer, FetchError> {
    transport.send_message(&Message::file_request(name))?;

    // A missing file is reported with a catalog-tagged error object.
    let reply = await_reply(&mut *transport, "file announcement", config, |m| {
        matches!(
            m.content_type,
            ContentType::FileAnnounce | ContentType::CatalogResponse
        )
    })?;
    if reply.content_type == ContentType::CatalogResponse {
        return Err(FetchError::Server(server_error(&reply).unwrap_or_else(
            || String::from_utf8_lossy(&reply.content).into_owned(),
        )));
    }

    let expected = reply.chunks.ok_or(FetchError::MissingPartCount)? as usize;
    log::info!("fetching {name}: {expected} parts");

    let collection = collect(transport, expected, config)?;
    Ok(Transfer {
        name: name.to_string(),
        collection,
    })
}

/// Read until a message satisfying `wanted` arrives or the overall timeout
/// passes.  Idle reads, empty and malformed datagrams, and unrelated
/// messages are skipped.
fn await_reply<T, F>(
    transport: &mut T,
    what: &'static str,
    config: &CollectConfig,
    wanted: F,
) -> Result<Message, FetchError>
where
    T: Transport + ?Sized,
    F: Fn(&Message) -> bool,
{
    let deadline = Deadline::after(config.overall_timeout);
    while !deadline.expired() {
        let bytes = match transport.recv_timeout(deadline.next_wait(config.idle_timeout))? {
            Received::Datagram(bytes) => bytes,
            Received::Idle => continue,
        };
        match decode_datagram(&bytes) {
            Ok(Some(msg)) if wanted(&msg) => return Ok(msg),
            Ok(Some(msg)) => {
                log::debug!("[session] waiting for {what}, ignoring `{}`", msg.content_type)
            }
            Ok(None) => {}
            Err(e) => log::debug!("[session] skipping undecodable datagram: {e}"),
        }
    }
    Err(FetchError::NoReply(what, config.overall_timeout))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulator::ScriptedTransport;

    fn quick() -> CollectConfig {
        CollectConfig {
            idle_timeout: Duration::from_millis(5),
            overall_timeout: Duration::from_millis(100),
        }
    }

    fn reply(content_type: ContentType, chunks: u32, content: &str) -> Message {
        Message {
            part: Some(0),
            chunks: Some(chunks),
            content: content.as_bytes().to_vec(),
            ..Message::new(content_type)
        }
    }

    #[test]
    fn catalog_request_is_sent_and_reply_parsed() {
        let mut t = ScriptedTransport::new();
        t.push(b"garbage".to_vec());
        t.push_message(&reply(ContentType::CatalogResponse, 2, r#"["a.txt","b.png"]"#))
            .unwrap();

        let catalog = fetch_catalog_over(&mut t, &quick()).unwrap();
        assert_eq!(catalog.files, vec!["a.txt", "b.png"]);
        assert!(catalog.contains("b.png"));

        let sent = t.sent_messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].content_type.tag(), "filePaths");
    }

    #[test]
    fn catalog_error_object_becomes_server_error() {
        let mut t = ScriptedTransport::new();
        t.push_message(&reply(ContentType::CatalogResponse, 0, r#"{"error":"disk gone"}"#))
            .unwrap();
        let err = fetch_catalog_over(&mut t, &quick()).unwrap_err();
        assert!(matches!(err, FetchError::Server(ref m) if m == "disk gone"));
    }

    #[test]
    fn catalog_with_unparseable_content_is_rejected() {
        let mut t = ScriptedTransport::new();
        t.push_message(&reply(ContentType::CatalogResponse, 0, "not json"))
            .unwrap();
        assert!(matches!(
            fetch_catalog_over(&mut t, &quick()),
            Err(FetchError::Catalog(_))
        ));
    }

    #[test]
    fn silent_server_yields_no_reply() {
        let mut t = ScriptedTransport::new();
        assert!(matches!(
            fetch_catalog_over(&mut t, &quick()),
            Err(FetchError::NoReply("catalog", _))
        ));
    }

    #[test]
    fn file_fetch_uses_announced_part_count() {
        let mut t = ScriptedTransport::new();
        t.push_message(&reply(ContentType::FileAnnounce, 2, "a.txt"))
            .unwrap();
        t.push_message(&Message::file_part(1, b"world".to_vec()))
            .unwrap();
        t.push_message(&Message::file_part(0, b"hello ".to_vec()))
            .unwrap();

        let transfer = fetch_file_over(&mut t, "a.txt", &quick()).unwrap();
        assert_eq!(transfer.name, "a.txt");
        assert!(transfer.collection.is_complete());
        assert_eq!(transfer.collection.received(), 2);

        let sent = t.sent_messages();
        assert_eq!(sent[0].content, b"a.txt");
        assert_eq!(sent.len(), 3);
    }

    #[test]
    fn missing_file_is_a_server_error() {
        let mut t = ScriptedTransport::new();
        t.push_message(&reply(
            ContentType::CatalogResponse,
            26,
            r#"{"error":"File not found"}"#,
        ))
        .unwrap();
        let err = fetch_file_over(&mut t, "nope", &quick()).unwrap_err();
        assert!(matches!(err, FetchError::Server(ref m) if m == "File not found"));
    }

    #[test]
    fn announce_without_count_is_rejected() {
        let mut t = ScriptedTransport::new();
        t.push(br#"{"contentType":"fileName","content":"a.txt"}"#.to_vec());
        assert!(matches!(
            fetch_file_over(&mut t, "a.txt", &quick()),
            Err(FetchError::MissingPartCount)
        ));
    }
}
