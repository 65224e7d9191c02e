//! Wire-format definitions for protocol messages.
//!
//! Every datagram exchanged with the server carries exactly one [`Message`].
//! This module is responsible for:
//! - Mapping [`ContentType`] variants to and from their on-wire tags.
//! - Serialising a [`Message`] into a byte buffer ready for transmission.
//! - Deserialising a raw datagram back into a [`Message`], returning `None`
//!   for an empty datagram and an error for malformed input.
//!
//! No I/O happens here — this is pure data transformation.
//!
//! # Wire format
//!
//! One JSON object per datagram, schema version [`SCHEMA_VERSION`]:
//!
//! ```text
//! {
//!   "version":     1,            optional on input, defaults to 1
//!   "contentType": "filePart",   see `tags`
//!   "part":        3,            required for filePart / ack
//!   "chunks":      600,          optional count field set by the server
//!   "content":     "aGVsbG8="    base64 for filePart / ack, UTF-8 text otherwise
//! }
//! ```
//!
//! Requests and their replies share a tag (`filePaths`, `fileName`).  Every
//! datagram this client decodes comes from the server, so shared tags decode
//! to the reply variant.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Schema version written on every outbound message.
pub const SCHEMA_VERSION: u32 = 1;

/// On-wire `contentType` strings.
pub mod tags {
    /// Catalog request and catalog response.
    pub const CATALOG: &str = "filePaths";
    /// File selection request and the server's part-count announcement.
    pub const FILE_NAME: &str = "fileName";
    /// One numbered part of a file.
    pub const FILE_PART: &str = "filePart";
    /// Acknowledgment of a received part.
    pub const ACK: &str = "ack";
}

/// Kind of a [`Message`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ContentType {
    CatalogRequest,
    CatalogResponse,
    FileRequest,
    /// Server reply to a [`ContentType::FileRequest`]; `chunks` holds the
    /// number of parts that will follow.
    FileAnnounce,
    FilePart,
    Ack,
    /// A tag this client does not interpret; the payload is carried opaquely.
    Other(String),
}

impl ContentType {
    /// The tag written into the `contentType` field.
    pub fn tag(&self) -> &str {
        match self {
            Self::CatalogRequest | Self::CatalogResponse => tags::CATALOG,
            Self::FileRequest | Self::FileAnnounce => tags::FILE_NAME,
            Self::FilePart => tags::FILE_PART,
            Self::Ack => tags::ACK,
            Self::Other(tag) => tag.as_str(),
        }
    }

    /// Interpret a tag found on an inbound datagram.
    pub fn from_inbound_tag(tag: &str) -> Self {
        match tag {
            tags::CATALOG => Self::CatalogResponse,
            tags::FILE_NAME => Self::FileAnnounce,
            tags::FILE_PART => Self::FilePart,
            tags::ACK => Self::Ack,
            other => Self::Other(other.to_string()),
        }
    }

    /// Kinds whose `content` is binary and travels base64-encoded.
    fn is_binary(&self) -> bool {
        matches!(self, Self::FilePart | Self::Ack)
    }

    /// Kinds that are meaningless without a part index.
    fn requires_part(&self) -> bool {
        matches!(self, Self::FilePart | Self::Ack)
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// One protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub content_type: ContentType,
    /// Part index; present for `FilePart` and `Ack`.
    pub part: Option<u32>,
    /// Server-provided count (catalog size, total parts, or part length).
    pub chunks: Option<u32>,
    /// Decoded payload bytes.
    pub content: Vec<u8>,
}

/// A file part accepted off the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    pub part: u32,
    pub content: Vec<u8>,
}

/// Errors that can arise when encoding or decoding a datagram.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The datagram is not a JSON object matching the envelope.
    #[error("malformed envelope: {0}")]
    Json(#[from] serde_json::Error),
    /// The envelope declares a schema version this client does not speak.
    #[error("unsupported schema version {0}")]
    UnsupportedVersion(u32),
    /// A `filePart` or `ack` arrived without a part index.
    #[error("`{0}` message carries no part index")]
    MissingPart(String),
    /// Binary payload is not valid base64.
    #[error("part payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    /// Text payload is not valid UTF-8.
    #[error("text payload is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// JSON shape of a message on the wire.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    #[serde(default = "default_version")]
    version: u32,
    content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    part: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    chunks: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

fn default_version() -> u32 {
    SCHEMA_VERSION
}

impl Message {
    /// A message of the given kind with no part, count, or payload.
    pub fn new(content_type: ContentType) -> Self {
        Self {
            content_type,
            part: None,
            chunks: None,
            content: Vec::new(),
        }
    }

    /// Ask the server for its catalog.
    pub fn catalog_request() -> Self {
        Self::new(ContentType::CatalogRequest)
    }

    /// Ask the server to start sending `name`.
    pub fn file_request(name: &str) -> Self {
        Self {
            content: name.as_bytes().to_vec(),
            ..Self::new(ContentType::FileRequest)
        }
    }

    /// A `filePart` as the server would send it.
    pub fn file_part(part: u32, content: Vec<u8>) -> Self {
        Self {
            part: Some(part),
            chunks: u32::try_from(content.len()).ok(),
            content,
            ..Self::new(ContentType::FilePart)
        }
    }

    /// Payload interpreted as UTF-8 text.
    pub fn content_str(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.content)
    }

    /// Convert into a [`FilePart`] if this is a `filePart` message.
    pub fn into_file_part(self) -> Option<FilePart> {
        match (self.content_type, self.part) {
            (ContentType::FilePart, Some(part)) => Some(FilePart {
                part,
                content: self.content,
            }),
            _ => None,
        }
    }

    /// Serialise this message into a datagram payload.
    ///
    /// Binary kinds are base64-encoded; text kinds must hold valid UTF-8.
    /// An empty text payload is omitted from the envelope.
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let content = if self.content_type.is_binary() {
            Some(STANDARD.encode(&self.content))
        } else if self.content.is_empty() {
            None
        } else {
            Some(String::from_utf8(self.content.clone())?)
        };

        let envelope = Envelope {
            version: SCHEMA_VERSION,
            content_type: self.content_type.tag().to_string(),
            part: self.part,
            chunks: self.chunks,
            content,
        };
        Ok(serde_json::to_vec(&envelope)?)
    }

    /// Parse a non-empty datagram payload.
    ///
    /// Use [`decode_datagram`] when the input may be zero-length.
    pub fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        let envelope: Envelope = serde_json::from_slice(buf)?;
        if envelope.version != SCHEMA_VERSION {
            return Err(CodecError::UnsupportedVersion(envelope.version));
        }

        let content_type = ContentType::from_inbound_tag(&envelope.content_type);
        if content_type.requires_part() && envelope.part.is_none() {
            return Err(CodecError::MissingPart(envelope.content_type));
        }

        let raw = envelope.content.unwrap_or_default();
        let content = if content_type.is_binary() {
            STANDARD.decode(raw.as_bytes())?
        } else {
            raw.into_bytes()
        };

        Ok(Self {
            content_type,
            part: envelope.part,
            chunks: envelope.chunks,
            content,
        })
    }
}

/// Decode one received datagram.
///
/// Returns `Ok(None)` for a zero-length datagram ("no message"), which the
/// server sends once its retransmission pass is over.
pub fn decode_datagram(buf: &[u8]) -> Result<Option<Message>, CodecError> {
    if buf.is_empty() {
        return Ok(None);
    }
    Message::decode(buf).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn json(msg: &Message) -> serde_json::Value {
        serde_json::from_slice(&msg.encode().unwrap()).unwrap()
    }

    #[test]
    fn decodes_server_file_part() {
        // Field order as produced by the reference server.
        let raw = br#"{"contentType":"filePart","content":"aGVsbG8=","part":2,"chunks":5}"#;
        let msg = Message::decode(raw).unwrap();
        assert_eq!(msg.content_type, ContentType::FilePart);
        assert_eq!(msg.part, Some(2));
        assert_eq!(msg.chunks, Some(5));
        assert_eq!(msg.content, b"hello");
    }

    #[test]
    fn decodes_catalog_response_as_text() {
        let raw = br#"{"contentType":"filePaths","content":"[\"a.txt\",\"b.bin\"]","part":0,"chunks":2}"#;
        let msg = Message::decode(raw).unwrap();
        assert_eq!(msg.content_type, ContentType::CatalogResponse);
        assert_eq!(msg.content_str().unwrap(), r#"["a.txt","b.bin"]"#);
    }

    #[test]
    fn decodes_file_announce() {
        let raw = br#"{"contentType":"fileName","content":"a.txt","part":0,"chunks":7}"#;
        let msg = Message::decode(raw).unwrap();
        assert_eq!(msg.content_type, ContentType::FileAnnounce);
        assert_eq!(msg.chunks, Some(7));
    }

    #[test]
    fn empty_datagram_is_no_message() {
        assert!(decode_datagram(&[]).unwrap().is_none());
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(matches!(
            decode_datagram(b"\x00\x01not json"),
            Err(CodecError::Json(_))
        ));
    }

    #[test]
    fn truncated_envelope_is_a_decode_error() {
        let bytes = Message::file_part(0, b"abcdef".to_vec()).encode().unwrap();
        assert!(Message::decode(&bytes[..bytes.len() - 3]).is_err());
    }

    #[test]
    fn file_part_without_index_is_rejected() {
        let raw = br#"{"contentType":"filePart","content":"aGk="}"#;
        assert!(matches!(
            Message::decode(raw),
            Err(CodecError::MissingPart(tag)) if tag == "filePart"
        ));
    }

    #[test]
    fn bad_base64_is_rejected() {
        let raw = br#"{"contentType":"filePart","part":0,"content":"***"}"#;
        assert!(matches!(Message::decode(raw), Err(CodecError::Base64(_))));
    }

    #[test]
    fn newer_schema_version_is_rejected() {
        let raw = br#"{"version":2,"contentType":"ack","part":0,"content":""}"#;
        assert!(matches!(
            Message::decode(raw),
            Err(CodecError::UnsupportedVersion(2))
        ));
    }

    #[test]
    fn unknown_tag_is_carried_opaquely() {
        let raw = br#"{"contentType":"status","content":"busy"}"#;
        let msg = Message::decode(raw).unwrap();
        assert_eq!(msg.content_type, ContentType::Other("status".into()));
        assert_eq!(msg.content, b"busy");
    }

    #[test]
    fn catalog_request_has_no_part_or_content() {
        let value = json(&Message::catalog_request());
        assert_eq!(value["contentType"], "filePaths");
        assert_eq!(value["version"], SCHEMA_VERSION);
        assert!(value.get("part").is_none());
        assert!(value.get("content").is_none());
    }

    #[test]
    fn file_request_carries_name_as_text() {
        let value = json(&Message::file_request("notes.txt"));
        assert_eq!(value["contentType"], "fileName");
        assert_eq!(value["content"], "notes.txt");
    }

    #[test]
    fn binary_payload_travels_as_base64() {
        let value = json(&Message::file_part(4, vec![0xff, 0x00, 0x10]));
        assert_eq!(value["content"], "/wAQ");
        assert_eq!(value["part"], 4);
        assert_eq!(value["chunks"], 3);
    }

    #[test]
    fn non_utf8_text_payload_fails_to_encode() {
        let msg = Message {
            content: vec![0xc3, 0x28],
            ..Message::new(ContentType::FileRequest)
        };
        assert!(matches!(msg.encode(), Err(CodecError::Utf8(_))));
    }

    #[test]
    fn into_file_part_only_for_file_parts() {
        let part = Message::file_part(1, b"x".to_vec()).into_file_part().unwrap();
        assert_eq!(part, FilePart { part: 1, content: b"x".to_vec() });
        assert!(Message::catalog_request().into_file_part().is_none());
    }
}
