//! Logical channels multiplexed over one session
//!
//! A [`NameSpace`] is identified by its session and endpoint (`""` is the
//! default namespace). It owns the listeners for events arriving on that
//! endpoint and stamps its endpoint on every packet it sends.
//!
//! Listener payloads are the event arguments:
//!
//! | inbound packet   | fired event     | listener args          |
//! |------------------|-----------------|------------------------|
//! | connect          | `"connect"`     | `[]`                   |
//! | message / json   | `"message"`     | `[payload]`            |
//! | event            | the event name  | the event's `args`     |

use crate::core::events::{EventEmitter, ListenerId};
use crate::core::packet::{DecodeError, EventPacket, MessagePacket, Packet};
use crate::server::session::Session;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

pub struct NameSpace {
    endpoint: String,
    session_id: String,
    session: Weak<Session>,
    emitter: EventEmitter<Vec<Value>>,
    connected: AtomicBool,
}

impl NameSpace {
    pub(crate) fn new(session: Weak<Session>, session_id: &str, endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            session_id: session_id.to_string(),
            session,
            emitter: EventEmitter::new(),
            connected: AtomicBool::new(false),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// The owning session, unless it has already been dropped
    pub fn session(&self) -> Option<Arc<Session>> {
        self.session.upgrade()
    }

    /// Whether the client has connected to this endpoint
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub fn on<F>(&self, name: impl Into<String>, listener: F) -> ListenerId
    where
        F: Fn(Vec<Value>) + Send + Sync + 'static,
    {
        self.emitter.on(name, listener)
    }

    pub fn once<F>(&self, name: impl Into<String>, listener: F) -> ListenerId
    where
        F: Fn(Vec<Value>) + Send + Sync + 'static,
    {
        self.emitter.once(name, listener)
    }

    pub fn remove_listener(&self, name: &str, id: ListenerId) -> bool {
        self.emitter.remove_listener(name, id)
    }

    pub fn remove_all_listeners(&self, name: &str) {
        self.emitter.remove_all_listeners(name)
    }

    /// Send an event to the client on this endpoint
    pub fn emit(&self, name: impl Into<String>, args: Vec<Value>) {
        self.send_packet(Packet::event(self.endpoint.clone(), name, args));
    }

    /// Send an event whose arguments are already JSON-encoded
    ///
    /// `data` is either a JSON array of arguments or a single JSON value,
    /// which becomes the only argument.
    pub fn emit_raw(&self, name: impl Into<String>, data: &[u8]) -> Result<(), DecodeError> {
        let args = match serde_json::from_slice::<Value>(data)? {
            Value::Array(args) => args,
            other => vec![other],
        };
        self.emit(name, args);
        Ok(())
    }

    /// Send a plain-text message
    pub fn send(&self, text: impl Into<String>) {
        self.send_packet(Packet::message(self.endpoint.clone(), text));
    }

    /// Send a JSON message
    pub fn send_json(&self, value: Value) {
        self.send_packet(Packet::json(self.endpoint.clone(), value));
    }

    pub fn send_packet(&self, packet: Packet) {
        match self.session.upgrade() {
            Some(session) => session.send_packet(packet),
            None => tracing::trace!(
                session_id = %self.session_id,
                endpoint = %self.endpoint,
                "Session dropped, discarding outbound packet"
            ),
        }
    }

    /// The client connected to this endpoint
    ///
    /// Joins on a non-default endpoint are acknowledged with a connect packet.
    pub fn on_connect(&self) {
        self.connected.store(true, Ordering::Release);
        if !self.endpoint.is_empty() {
            self.send_packet(Packet::connect(self.endpoint.clone()));
        }
        tracing::debug!(
            session_id = %self.session_id,
            endpoint = %self.endpoint,
            "Namespace connected"
        );
        self.emitter.fire("connect", Vec::new());
    }

    pub fn on_message(&self, packet: &MessagePacket) {
        self.emitter.fire("message", vec![packet.payload.to_value()]);
    }

    pub fn on_event(&self, packet: &EventPacket) {
        let fired = self.emitter.fire(&packet.name, packet.args.clone());
        if fired == 0 {
            tracing::trace!(
                session_id = %self.session_id,
                endpoint = %self.endpoint,
                event = %packet.name,
                "Event has no listeners"
            );
        }
    }
}

impl fmt::Debug for NameSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NameSpace")
            .field("session_id", &self.session_id)
            .field("endpoint", &self.endpoint)
            .field("connected", &self.is_connected())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::transport::TransportRegistry;
    use serde_json::json;

    #[test]
    fn test_identity() {
        let session = Session::new("NSSESSION0000001", Arc::new(TransportRegistry::new()));
        let ns = session.namespace("/chat");

        assert_eq!(ns.endpoint(), "/chat");
        assert_eq!(ns.session_id(), "NSSESSION0000001");
        assert!(Arc::ptr_eq(&ns.session().unwrap(), &session));
        assert!(!ns.is_connected());
    }

    #[test]
    fn test_send_after_session_dropped_is_silent() {
        let session = Session::new("NSSESSION0000002", Arc::new(TransportRegistry::new()));
        let ns = session.namespace("/chat");
        drop(session);

        assert!(ns.session().is_none());
        ns.emit("late", vec![json!(1)]);
        ns.send("late");
    }

    #[test]
    fn test_on_message_fires_with_payload() {
        let session = Session::new("NSSESSION0000003", Arc::new(TransportRegistry::new()));
        let ns = session.namespace("");
        let seen = Arc::new(parking_lot::Mutex::new(None));
        let s = seen.clone();
        ns.on("message", move |args| *s.lock() = Some(args));

        let Packet::Message(message) = Packet::message("", "hey") else {
            unreachable!()
        };
        ns.on_message(&message);

        assert_eq!(*seen.lock(), Some(vec![json!("hey")]));
    }
}
