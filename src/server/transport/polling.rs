//! XHR long-polling transport
//!
//! - `GET` marks the session open and waits up to the polling duration for
//!   outbound packets. It answers with every packet queued by then (framed
//!   when more than one), with a noop frame on timeout, or with a disconnect
//!   frame once the session is gone.
//! - `POST` carries client frames. Each one is fed to the session as it is
//!   split off; a malformed segment drops the rest of the body and the request
//!   still succeeds with `1`.
//!
//! Only one poll waits on the queue at a time; an overlapping `GET` for the
//! same session answers with a noop immediately.

use super::{OutboundReceiver, Transport, TransportFactory, apply_cors};
use crate::core::error::{RequestError, SocketIoError};
use crate::core::packet::{DecodeError, NOOP_FRAME, Packet, encode_payload, payload_frames};
use crate::server::session::Session;
use async_trait::async_trait;
use axum::body::to_bytes;
use axum::extract::Request;
use axum::http::{Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Mutex;

pub const NAME: &str = "xhr-polling";

/// Upper bound on a POST body
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Factory for [`XhrPolling`] transports
#[derive(Debug, Clone)]
pub struct PollingFactory {
    polling_duration: Duration,
}

impl PollingFactory {
    pub fn new(polling_duration: Duration) -> Self {
        Self { polling_duration }
    }
}

impl TransportFactory for PollingFactory {
    fn name(&self) -> &str {
        NAME
    }

    fn new_instance(
        &self,
        session: Weak<Session>,
        outbound: OutboundReceiver,
    ) -> Arc<dyn Transport> {
        Arc::new(XhrPolling {
            session,
            outbound: Mutex::new(outbound),
            polling_duration: self.polling_duration,
        })
    }
}

struct XhrPolling {
    session: Weak<Session>,
    outbound: Mutex<OutboundReceiver>,
    polling_duration: Duration,
}

impl XhrPolling {
    async fn poll(&self) -> String {
        let Some(session) = self.session.upgrade() else {
            return Packet::disconnect("").encode();
        };
        session.on_open();
        drop(session);

        let Ok(mut outbound) = self.outbound.try_lock() else {
            tracing::debug!("Overlapping poll answered with noop");
            return NOOP_FRAME.to_string();
        };

        let first = match tokio::time::timeout(self.polling_duration, outbound.recv()).await {
            Ok(Some(packet)) => packet,
            Ok(None) => return Packet::disconnect("").encode(),
            Err(_) => return NOOP_FRAME.to_string(),
        };

        let mut packets = vec![first];
        while let Ok(packet) = outbound.try_recv() {
            packets.push(packet);
        }
        encode_payload(&packets)
    }

    async fn receive(&self, request: Request) -> Result<String, SocketIoError> {
        let session = self
            .session
            .upgrade()
            .ok_or_else(|| RequestError::InvalidSessionId {
                session_id: String::new(),
            })?;

        let bytes = to_bytes(request.into_body(), MAX_BODY_BYTES)
            .await
            .map_err(|e| RequestError::InvalidBody {
                message: e.to_string(),
            })?;

        let body = match std::str::from_utf8(&bytes) {
            Ok(body) => body,
            Err(e) => {
                tracing::debug!(
                    session_id = %session.id(),
                    error = %DecodeError::from(e),
                    "Dropping undecodable polling payload"
                );
                return Ok("1".to_string());
            }
        };

        for frame in payload_frames(body) {
            match frame {
                Ok(frame) => session.on_frame(frame.as_bytes()),
                Err(e) => {
                    tracing::debug!(
                        session_id = %session.id(),
                        error = %e,
                        "Dropping rest of polling payload"
                    );
                }
            }
        }

        Ok("1".to_string())
    }
}

#[async_trait]
impl Transport for XhrPolling {
    fn name(&self) -> &str {
        NAME
    }

    async fn on_data(&self, request: Request) -> Response {
        let origin = request.headers().get(header::ORIGIN).cloned();

        let method = request.method().clone();

        let result = match method {
            Method::GET => Ok(self.poll().await),
            Method::POST => self.receive(request).await,
            method => Err(RequestError::MethodNotAllowed {
                method: method.to_string(),
            }
            .into()),
        };

        let mut response = match result {
            Ok(body) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/plain; charset=UTF-8")],
                body,
            )
                .into_response(),
            Err(e) => e.into_response(),
        };
        apply_cors(response.headers_mut(), origin.as_ref());
        response
    }
}
