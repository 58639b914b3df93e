//! Core module containing the protocol types shared by server components

pub mod auth;
pub mod error;
pub mod events;
pub mod packet;
pub mod sid;

pub use auth::{AllowAll, Authorize};
pub use error::{ConfigError, RequestError, SessionError, SocketIoError};
pub use events::{EventEmitter, ListenerId};
pub use packet::{DecodeError, EventPacket, MessageId, MessagePacket, Packet, PacketKind, Payload};
pub use sid::{SessionIdGenerator, new_session_id};
