//! Protocol packets and their wire encoding
//!
//! Socket.IO protocol revision 1 frames look like:
//!
//! ```text
//! type ':' [id ['+']] ':' [endpoint] [':' data]
//! ```
//!
//! | type | kind       | data                                  |
//! |------|------------|---------------------------------------|
//! | `0`  | disconnect | none                                  |
//! | `1`  | connect    | none (endpoint may carry `?query`)    |
//! | `3`  | message    | plain text                            |
//! | `4`  | json       | a JSON document                       |
//! | `5`  | event      | `{"name": "...", "args": [...]}`      |
//!
//! Heartbeat, ack, error and noop frames exist on the wire but are not part of
//! the dispatch set; decoding them yields [`DecodeError::UnsupportedType`].
//!
//! Long-polling bodies may carry several frames, each prefixed with
//! `\u{FFFD}<length>\u{FFFD}` where the length counts UTF-16 code units.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Separator used by the multi-frame polling payload
pub const FRAME_DELIMITER: char = '\u{FFFD}';

/// Frame sent by a poll that timed out with nothing queued
pub const NOOP_FRAME: &str = "8::";

/// Errors produced while decoding a frame or a framed payload
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("empty frame")]
    Empty,

    #[error("frame is not valid UTF-8")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("invalid packet type '{0}'")]
    InvalidType(String),

    #[error("unsupported packet type {0}")]
    UnsupportedType(u8),

    #[error("invalid message id '{0}'")]
    InvalidId(String),

    #[error("missing ':' separator in frame")]
    MissingSeparator,

    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("malformed framed payload: {0}")]
    MalformedPayload(String),
}

/// Discriminant of a [`Packet`], mostly useful for logging and tests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketKind {
    Disconnect,
    Connect,
    Message,
    Json,
    Event,
}

impl PacketKind {
    /// Wire digit for this kind
    pub fn code(self) -> u8 {
        match self {
            PacketKind::Disconnect => 0,
            PacketKind::Connect => 1,
            PacketKind::Message => 3,
            PacketKind::Json => 4,
            PacketKind::Event => 5,
        }
    }

    fn from_code(code: u8) -> Result<Self, DecodeError> {
        match code {
            0 => Ok(PacketKind::Disconnect),
            1 => Ok(PacketKind::Connect),
            3 => Ok(PacketKind::Message),
            4 => Ok(PacketKind::Json),
            5 => Ok(PacketKind::Event),
            other => Err(DecodeError::UnsupportedType(other)),
        }
    }
}

impl fmt::Display for PacketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PacketKind::Disconnect => "disconnect",
            PacketKind::Connect => "connect",
            PacketKind::Message => "message",
            PacketKind::Json => "json",
            PacketKind::Event => "event",
        };
        f.write_str(name)
    }
}

/// Message id carried by data packets
///
/// `ack` is set when the id was suffixed with `+`, meaning the peer expects the
/// acknowledgement to carry data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageId {
    pub id: u64,
    pub ack: bool,
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ack {
            write!(f, "{}+", self.id)
        } else {
            write!(f, "{}", self.id)
        }
    }
}

/// Body of a message or json packet
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Text(String),
    Json(Value),
}

impl Payload {
    /// The payload as a JSON value (text becomes a JSON string)
    pub fn to_value(&self) -> Value {
        match self {
            Payload::Text(text) => Value::String(text.clone()),
            Payload::Json(value) => value.clone(),
        }
    }
}

/// A message or json packet; the two kinds share this representation
#[derive(Debug, Clone, PartialEq)]
pub struct MessagePacket {
    pub id: Option<MessageId>,
    pub endpoint: String,
    pub payload: Payload,
}

/// An event packet: a named call with positional JSON arguments
#[derive(Debug, Clone, PartialEq)]
pub struct EventPacket {
    pub id: Option<MessageId>,
    pub endpoint: String,
    pub name: String,
    pub args: Vec<Value>,
}

#[derive(Deserialize)]
struct EventBody {
    name: String,
    #[serde(default)]
    args: Vec<Value>,
}

#[derive(Serialize)]
struct EventBodyRef<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "<[Value]>::is_empty")]
    args: &'a [Value],
}

/// A protocol packet
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Disconnect { endpoint: String },
    Connect { endpoint: String, query: Option<String> },
    Message(MessagePacket),
    Json(MessagePacket),
    Event(EventPacket),
}

impl Packet {
    /// Connect packet for `endpoint` without a query string
    pub fn connect(endpoint: impl Into<String>) -> Self {
        Packet::Connect {
            endpoint: endpoint.into(),
            query: None,
        }
    }

    pub fn disconnect(endpoint: impl Into<String>) -> Self {
        Packet::Disconnect {
            endpoint: endpoint.into(),
        }
    }

    pub fn message(endpoint: impl Into<String>, text: impl Into<String>) -> Self {
        Packet::Message(MessagePacket {
            id: None,
            endpoint: endpoint.into(),
            payload: Payload::Text(text.into()),
        })
    }

    pub fn json(endpoint: impl Into<String>, value: Value) -> Self {
        Packet::Json(MessagePacket {
            id: None,
            endpoint: endpoint.into(),
            payload: Payload::Json(value),
        })
    }

    pub fn event(endpoint: impl Into<String>, name: impl Into<String>, args: Vec<Value>) -> Self {
        Packet::Event(EventPacket {
            id: None,
            endpoint: endpoint.into(),
            name: name.into(),
            args,
        })
    }

    pub fn kind(&self) -> PacketKind {
        match self {
            Packet::Disconnect { .. } => PacketKind::Disconnect,
            Packet::Connect { .. } => PacketKind::Connect,
            Packet::Message(_) => PacketKind::Message,
            Packet::Json(_) => PacketKind::Json,
            Packet::Event(_) => PacketKind::Event,
        }
    }

    /// Destination namespace of this packet
    pub fn endpoint(&self) -> &str {
        match self {
            Packet::Disconnect { endpoint } | Packet::Connect { endpoint, .. } => endpoint,
            Packet::Message(p) | Packet::Json(p) => &p.endpoint,
            Packet::Event(p) => &p.endpoint,
        }
    }

    /// The shared data-carrying view of message and json packets
    pub fn as_message(&self) -> Option<&MessagePacket> {
        match self {
            Packet::Message(p) | Packet::Json(p) => Some(p),
            _ => None,
        }
    }

    fn id(&self) -> Option<MessageId> {
        match self {
            Packet::Message(p) | Packet::Json(p) => p.id,
            Packet::Event(p) => p.id,
            _ => None,
        }
    }

    /// Encode into a single wire frame
    pub fn encode(&self) -> String {
        let id = self.id().map(|id| id.to_string()).unwrap_or_default();
        let head = format!("{}:{}:", self.kind().code(), id);

        match self {
            Packet::Disconnect { endpoint } => format!("{head}{endpoint}"),
            Packet::Connect { endpoint, query } => match query {
                Some(query) if !query.is_empty() => format!("{head}{endpoint}?{query}"),
                _ => format!("{head}{endpoint}"),
            },
            Packet::Message(p) | Packet::Json(p) => {
                let data = match &p.payload {
                    Payload::Text(text) => text.clone(),
                    Payload::Json(value) => value.to_string(),
                };
                format!("{head}{}:{data}", p.endpoint)
            }
            Packet::Event(p) => {
                let body = EventBodyRef {
                    name: &p.name,
                    args: &p.args,
                };
                // Serializing borrowed strings and values cannot fail.
                let body = serde_json::to_string(&body).unwrap_or_default();
                format!("{head}{}:{body}", p.endpoint)
            }
        }
    }

    /// Decode a single wire frame
    pub fn decode(frame: &str) -> Result<Self, DecodeError> {
        if frame.is_empty() {
            return Err(DecodeError::Empty);
        }

        let mut parts = frame.splitn(4, ':');
        let kind = parts.next().unwrap_or_default();
        let id = parts.next().ok_or(DecodeError::MissingSeparator)?;
        let endpoint = parts.next().ok_or(DecodeError::MissingSeparator)?;
        let data = parts.next().unwrap_or_default();

        let code: u8 = kind
            .parse()
            .map_err(|_| DecodeError::InvalidType(kind.to_string()))?;
        let kind = PacketKind::from_code(code)?;
        let id = parse_id(id)?;

        let packet = match kind {
            PacketKind::Disconnect => Packet::Disconnect {
                endpoint: endpoint.to_string(),
            },
            PacketKind::Connect => match endpoint.split_once('?') {
                Some((endpoint, query)) => Packet::Connect {
                    endpoint: endpoint.to_string(),
                    query: Some(query.to_string()),
                },
                None => Packet::connect(endpoint),
            },
            PacketKind::Message => Packet::Message(MessagePacket {
                id,
                endpoint: endpoint.to_string(),
                payload: Payload::Text(data.to_string()),
            }),
            PacketKind::Json => Packet::Json(MessagePacket {
                id,
                endpoint: endpoint.to_string(),
                payload: Payload::Json(serde_json::from_str(data)?),
            }),
            PacketKind::Event => {
                let body: EventBody = serde_json::from_str(data)?;
                Packet::Event(EventPacket {
                    id,
                    endpoint: endpoint.to_string(),
                    name: body.name,
                    args: body.args,
                })
            }
        };

        Ok(packet)
    }

    /// Decode a frame received as raw bytes
    pub fn decode_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        Self::decode(std::str::from_utf8(bytes)?)
    }
}

fn parse_id(raw: &str) -> Result<Option<MessageId>, DecodeError> {
    if raw.is_empty() {
        return Ok(None);
    }
    let (digits, ack) = match raw.strip_suffix('+') {
        Some(digits) => (digits, true),
        None => (raw, false),
    };
    let id = digits
        .parse()
        .map_err(|_| DecodeError::InvalidId(raw.to_string()))?;
    Ok(Some(MessageId { id, ack }))
}

/// Encode several frames into one polling body
///
/// A single frame is sent as-is; more than one uses the delimited form.
pub fn encode_payload(packets: &[Packet]) -> String {
    if let [packet] = packets {
        return packet.encode();
    }

    let mut out = String::new();
    for packet in packets {
        let frame = packet.encode();
        let len = frame.encode_utf16().count();
        out.push(FRAME_DELIMITER);
        out.push_str(&len.to_string());
        out.push(FRAME_DELIMITER);
        out.push_str(&frame);
    }
    out
}

/// Split a polling body into its frames
///
/// Fails on the first malformed segment; use [`payload_frames`] to keep the
/// frames that precede it.
pub fn decode_payload(body: &str) -> Result<Vec<&str>, DecodeError> {
    payload_frames(body).collect()
}

/// Iterate over the frames of a polling body
///
/// Yields each frame as soon as it is split off. A malformed segment yields
/// one error and ends the iteration.
pub fn payload_frames(body: &str) -> PayloadFrames<'_> {
    PayloadFrames {
        rest: body,
        framed: body.starts_with(FRAME_DELIMITER),
    }
}

/// Iterator returned by [`payload_frames`]
#[derive(Debug, Clone)]
pub struct PayloadFrames<'a> {
    rest: &'a str,
    framed: bool,
}

impl<'a> PayloadFrames<'a> {
    fn split_frame(&self) -> Result<(&'a str, &'a str), DecodeError> {
        let after_open = self
            .rest
            .strip_prefix(FRAME_DELIMITER)
            .ok_or_else(|| DecodeError::MalformedPayload("expected frame delimiter".into()))?;
        let (len, after_len) = after_open
            .split_once(FRAME_DELIMITER)
            .ok_or_else(|| DecodeError::MalformedPayload("unterminated frame length".into()))?;
        let len: usize = len
            .parse()
            .map_err(|_| DecodeError::MalformedPayload(format!("invalid frame length '{len}'")))?;

        // Lengths count UTF-16 units, so walk chars until enough were consumed.
        let mut units = 0;
        let mut end = 0;
        for (offset, ch) in after_len.char_indices() {
            if units >= len {
                break;
            }
            units += ch.len_utf16();
            end = offset + ch.len_utf8();
        }
        if units != len {
            return Err(DecodeError::MalformedPayload(format!(
                "frame shorter than declared length {len}"
            )));
        }

        Ok(after_len.split_at(end))
    }
}

impl<'a> Iterator for PayloadFrames<'a> {
    type Item = Result<&'a str, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.is_empty() {
            return None;
        }
        if !self.framed {
            return Some(Ok(std::mem::take(&mut self.rest)));
        }

        match self.split_frame() {
            Ok((frame, rest)) => {
                self.rest = rest;
                Some(Ok(frame))
            }
            Err(e) => {
                self.rest = "";
                Some(Err(e))
            }
        }
    }
}
