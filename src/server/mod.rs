//! Socket.IO server: handshake, sessions, namespaces and transports
//!
//! - [`SocketIoServer`] owns the session registry and routes requests
//! - [`Session`] binds one transport and multiplexes [`NameSpace`]s over it
//! - [`ServerBuilder`] assembles a server and serves it with axum

pub mod builder;
pub mod host;
pub mod namespace;
pub mod router;
pub mod session;
pub mod transport;

pub use builder::ServerBuilder;
pub use host::{PROTOCOL_VERSION, RouteTarget, SocketIoServer};
pub use namespace::NameSpace;
pub use session::{DEFAULT_ENDPOINT, Session};
pub use transport::{OutboundReceiver, Transport, TransportFactory, TransportRegistry};
