//! Pluggable per-session transports
//!
//! A transport moves frames between one client and one [`Session`]. The
//! session binds exactly one transport for its whole lifetime, built by the
//! [`TransportFactory`] registered under the name the client used.
//!
//! # Architecture
//!
//! ```text
//! HTTP request ──▶ Session::serve(name) ──bind once──▶ TransportFactory::new_instance
//!                                                        │
//!                               Transport::on_data(request) ◀── every later request
//!                                 │                │
//!                     inbound frames           outbound queue
//!                                 │                │
//!                       Session::on_frame    Session::send_packet
//! ```
//!
//! Outbound packets reach the transport through the receiver handed to
//! `new_instance`; transports never call back into the session for them.

pub mod polling;
#[cfg(feature = "websocket")]
pub mod websocket;

use crate::core::error::ConfigError;
use crate::core::packet::Packet;
use crate::server::session::Session;
use async_trait::async_trait;
use axum::extract::Request;
use axum::http::{HeaderMap, HeaderValue, header};
use axum::response::Response;
use indexmap::IndexMap;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::mpsc;

/// Stream of packets the session wants delivered to the client
pub type OutboundReceiver = mpsc::UnboundedReceiver<Packet>;

/// A per-session I/O adapter
#[async_trait]
pub trait Transport: Send + Sync {
    /// Registry name of this transport (e.g. "websocket")
    fn name(&self) -> &str;

    /// Perform one HTTP interaction for the session
    ///
    /// Poll-style transports are called once per request; streaming
    /// transports take over the connection on the first call.
    async fn on_data(&self, request: Request) -> Response;
}

/// Builds a [`Transport`] for a session
pub trait TransportFactory: Send + Sync {
    fn name(&self) -> &str;

    /// Whether `request` may bind this transport to a fresh session
    ///
    /// A rejected request leaves the session unbound, so the client can still
    /// fall back to another transport.
    fn accepts(&self, _request: &Request) -> bool {
        true
    }

    fn new_instance(&self, session: Weak<Session>, outbound: OutboundReceiver)
    -> Arc<dyn Transport>;
}

/// Insertion-ordered set of transport factories
///
/// The order is the order advertised to clients in the handshake.
#[derive(Clone, Default)]
pub struct TransportRegistry {
    factories: IndexMap<String, Arc<dyn TransportFactory>>,
}

impl TransportRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// The transports shipped with the crate: websocket, then xhr-polling
    pub fn with_defaults(polling_duration: Duration) -> Self {
        let mut registry = Self::new();
        #[cfg(feature = "websocket")]
        registry.register(websocket::WebSocketFactory);
        registry.register(polling::PollingFactory::new(polling_duration));
        registry
    }

    /// Register a factory under its own name, replacing any previous one
    pub fn register(&mut self, factory: impl TransportFactory + 'static) -> &mut Self {
        self.register_shared(Arc::new(factory))
    }

    pub fn register_shared(&mut self, factory: Arc<dyn TransportFactory>) -> &mut Self {
        let name = factory.name().to_string();
        self.factories.insert(name, factory);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn TransportFactory>> {
        self.factories.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names in advertised order
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Keep only `names`, in the order given
    ///
    /// Fails if a name is not registered.
    pub fn restrict_to(&self, names: &[String]) -> Result<Self, ConfigError> {
        let mut factories = IndexMap::with_capacity(names.len());
        for name in names {
            let factory = self
                .get(name)
                .ok_or_else(|| ConfigError::UnknownTransport { name: name.clone() })?;
            factories.insert(name.clone(), factory);
        }
        Ok(Self { factories })
    }
}

impl fmt::Debug for TransportRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportRegistry")
            .field("transports", &self.names())
            .finish()
    }
}

/// Cross-origin headers used on handshake and polling responses
///
/// The request's `Origin` is reflected; credentials and GET are allowed.
pub(crate) fn apply_cors(headers: &mut HeaderMap, origin: Option<&HeaderValue>) {
    if let Some(origin) = origin {
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
    }
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
        HeaderValue::from_static("true"),
    );
}
