//! Per-client session: one bound transport, many namespaces
//!
//! A [`Session`] is created by the handshake and lives in the server registry
//! until it is removed. It owns:
//!
//! - the namespace map, memoized per endpoint under its own lock
//! - the single transport, bound by the first request that names one
//! - the outbound queue; packets sent before a transport exists are held and
//!   flushed to it when it binds
//! - the `connected` flag, flipped once by [`Session::on_open`]
//!
//! Inbound frames are decoded and dispatched by packet kind to the addressed
//! namespace. A frame that does not decode is dropped without affecting the
//! transport that delivered it.

use crate::core::error::{RequestError, SocketIoError};
use crate::core::events::ListenerId;
use crate::core::packet::{DecodeError, Packet};
use crate::server::namespace::NameSpace;
use crate::server::transport::{Transport, TransportRegistry};
use axum::extract::Request;
use axum::response::{IntoResponse, Response};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;

/// Endpoint of the default namespace
pub const DEFAULT_ENDPOINT: &str = "";

enum Outbox {
    /// No transport yet; packets wait here
    Pending(Vec<Packet>),
    /// Feeding the bound transport
    Attached(mpsc::UnboundedSender<Packet>),
}

pub struct Session {
    id: String,
    handle: Weak<Session>,
    transports: Arc<TransportRegistry>,
    namespaces: Mutex<HashMap<String, Arc<NameSpace>>>,
    transport: Mutex<Option<Arc<dyn Transport>>>,
    outbox: Mutex<Outbox>,
    connected: AtomicBool,
}

impl Session {
    /// Create a session that binds transports from `transports`
    pub fn new(id: impl Into<String>, transports: Arc<TransportRegistry>) -> Arc<Self> {
        let id = id.into();
        Arc::new_cyclic(|handle| Self {
            id,
            handle: handle.clone(),
            transports,
            namespaces: Mutex::new(HashMap::new()),
            transport: Mutex::new(None),
            outbox: Mutex::new(Outbox::Pending(Vec::new())),
            connected: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether the session has sent its own connect packet
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Get or create the namespace for `endpoint`
    ///
    /// Concurrent callers with the same endpoint always receive the same
    /// instance.
    pub fn namespace(&self, endpoint: &str) -> Arc<NameSpace> {
        let mut namespaces = self.namespaces.lock();
        if let Some(namespace) = namespaces.get(endpoint) {
            return namespace.clone();
        }

        let namespace = Arc::new(NameSpace::new(self.handle.clone(), &self.id, endpoint));
        namespaces.insert(endpoint.to_string(), namespace.clone());
        tracing::debug!(session_id = %self.id, endpoint = %endpoint, "Namespace created");
        namespace
    }

    /// Shortcut for `namespace("")`
    pub fn default_namespace(&self) -> Arc<NameSpace> {
        self.namespace(DEFAULT_ENDPOINT)
    }

    /// Number of namespaces referenced so far
    pub fn namespace_count(&self) -> usize {
        self.namespaces.lock().len()
    }

    /// The bound transport, if a request has bound one
    pub fn transport(&self) -> Option<Arc<dyn Transport>> {
        self.transport.lock().clone()
    }

    /// Service one HTTP interaction through this session's transport
    ///
    /// The first call binds a transport built from the registry entry for
    /// `transport_id`; later calls reuse it whatever name they carry. A request
    /// the factory does not accept gets 400 and leaves the session unbound.
    pub async fn serve(&self, transport_id: &str, request: Request) -> Response {
        let bound = self.bind(transport_id, &request);
        match bound {
            Ok(transport) => transport.on_data(request).await,
            Err(e) => e.into_response(),
        }
    }

    fn bind(
        &self,
        transport_id: &str,
        request: &Request,
    ) -> Result<Arc<dyn Transport>, SocketIoError> {
        let mut slot = self.transport.lock();
        if let Some(transport) = slot.as_ref() {
            if transport.name() != transport_id {
                tracing::warn!(
                    session_id = %self.id,
                    bound = %transport.name(),
                    requested = %transport_id,
                    "Request names a different transport than the bound one"
                );
            }
            return Ok(transport.clone());
        }

        let factory =
            self.transports
                .get(transport_id)
                .ok_or_else(|| RequestError::TransportNotSupported {
                    transport: transport_id.to_string(),
                })?;
        if !factory.accepts(request) {
            return Err(RequestError::UpgradeRequired {
                transport: transport_id.to_string(),
            }
            .into());
        }

        let (tx, rx) = mpsc::unbounded_channel();
        {
            let mut outbox = self.outbox.lock();
            if let Outbox::Pending(pending) = &mut *outbox {
                for packet in pending.drain(..) {
                    // rx is still held here, so this cannot fail
                    let _ = tx.send(packet);
                }
            }
            *outbox = Outbox::Attached(tx);
        }

        let transport = factory.new_instance(self.handle.clone(), rx);
        *slot = Some(transport.clone());
        tracing::debug!(session_id = %self.id, transport = %transport_id, "Transport bound");
        Ok(transport)
    }

    /// Queue a packet for delivery to the client
    pub fn send_packet(&self, packet: Packet) {
        match &mut *self.outbox.lock() {
            Outbox::Pending(pending) => pending.push(packet),
            Outbox::Attached(tx) => {
                if let Err(e) = tx.send(packet) {
                    tracing::trace!(
                        session_id = %self.id,
                        kind = %e.0.kind(),
                        "Transport gone, dropping outbound packet"
                    );
                }
            }
        }
    }

    /// Decode one inbound frame and dispatch it; undecodable frames are dropped
    pub fn on_frame(&self, bytes: &[u8]) {
        match Packet::decode_bytes(bytes) {
            Ok(packet) => self.on_packet(packet),
            Err(e) => {
                tracing::trace!(session_id = %self.id, error = %e, "Dropping undecodable frame");
            }
        }
    }

    /// Route a packet to the namespace it addresses
    pub fn on_packet(&self, packet: Packet) {
        match packet {
            Packet::Disconnect { endpoint } => {
                // No teardown on client disconnect; removal is up to the embedder.
                tracing::debug!(
                    session_id = %self.id,
                    endpoint = %endpoint,
                    "Disconnect packet received"
                );
            }
            Packet::Connect { endpoint, .. } => self.namespace(&endpoint).on_connect(),
            Packet::Message(ref message) | Packet::Json(ref message) => {
                self.namespace(&message.endpoint).on_message(message)
            }
            Packet::Event(event) => self.namespace(&event.endpoint).on_event(&event),
        }
    }

    /// Called by the transport once the connection is live
    ///
    /// Sends the session's connect packet on the default namespace the first
    /// time only.
    pub fn on_open(&self) {
        if self
            .connected
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            tracing::debug!(session_id = %self.id, "Session open");
            self.default_namespace().send_packet(Packet::connect(DEFAULT_ENDPOINT));
        }
    }

    // Shortcuts for the default namespace

    pub fn on<F>(&self, name: impl Into<String>, listener: F) -> ListenerId
    where
        F: Fn(Vec<Value>) + Send + Sync + 'static,
    {
        self.default_namespace().on(name, listener)
    }

    pub fn once<F>(&self, name: impl Into<String>, listener: F) -> ListenerId
    where
        F: Fn(Vec<Value>) + Send + Sync + 'static,
    {
        self.default_namespace().once(name, listener)
    }

    pub fn remove_listener(&self, name: &str, id: ListenerId) -> bool {
        self.default_namespace().remove_listener(name, id)
    }

    pub fn remove_all_listeners(&self, name: &str) {
        self.default_namespace().remove_all_listeners(name)
    }

    pub fn emit(&self, name: impl Into<String>, args: Vec<Value>) {
        self.default_namespace().emit(name, args)
    }

    pub fn emit_raw(&self, name: impl Into<String>, data: &[u8]) -> Result<(), DecodeError> {
        self.default_namespace().emit_raw(name, data)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("connected", &self.is_connected())
            .field(
                "transport",
                &self.transport.lock().as_ref().map(|t| t.name().to_string()),
            )
            .field("namespaces", &self.namespace_count())
            .finish()
    }
}
