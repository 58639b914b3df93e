//! WebSocket transport
//!
//! The first request upgrades the connection; from then on the socket carries
//! one frame per WebSocket text message in both directions:
//!
//! 1. The session is marked open, which queues its connect packet
//! 2. A write loop forwards outbound packets to the socket
//! 3. The read loop feeds inbound frames to the session until close or error

use super::{OutboundReceiver, Transport, TransportFactory};
use crate::core::error::{RequestError, SocketIoError};
use crate::server::session::Session;
use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{FromRequestParts, Request, WebSocketUpgrade};
use axum::http::{Method, header};
use axum::response::{IntoResponse, Response};
use futures::SinkExt;
use futures::stream::StreamExt;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

pub const NAME: &str = "websocket";

/// Factory for WebSocket transports
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketFactory;

impl TransportFactory for WebSocketFactory {
    fn name(&self) -> &str {
        NAME
    }

    fn accepts(&self, request: &Request) -> bool {
        request.method() == Method::CONNECT
            || request
                .headers()
                .get(header::UPGRADE)
                .and_then(|value| value.to_str().ok())
                .is_some_and(|value| value.eq_ignore_ascii_case("websocket"))
    }

    fn new_instance(
        &self,
        session: Weak<Session>,
        outbound: OutboundReceiver,
    ) -> Arc<dyn Transport> {
        Arc::new(WebSocketTransport {
            session,
            outbound: Mutex::new(Some(outbound)),
        })
    }
}

struct WebSocketTransport {
    session: Weak<Session>,
    /// Taken by the one connection that owns the socket
    outbound: Mutex<Option<OutboundReceiver>>,
}

#[async_trait]
impl Transport for WebSocketTransport {
    fn name(&self) -> &str {
        NAME
    }

    async fn on_data(&self, request: Request) -> Response {
        let (mut parts, _body) = request.into_parts();
        let upgrade = match WebSocketUpgrade::from_request_parts(&mut parts, &()).await {
            Ok(upgrade) => upgrade,
            Err(rejection) => return rejection.into_response(),
        };

        let Some(outbound) = self.outbound.lock().take() else {
            return SocketIoError::from(RequestError::TransportBusy {
                transport: NAME.to_string(),
            })
            .into_response();
        };

        let session = self.session.clone();
        upgrade.on_upgrade(move |socket| handle_socket(socket, session, outbound))
    }
}

/// Run one WebSocket connection for a session
async fn handle_socket(socket: WebSocket, session: Weak<Session>, mut outbound: OutboundReceiver) {
    let Some(live) = session.upgrade() else {
        return;
    };
    let session_id = live.id().to_string();
    live.on_open();
    drop(live);

    let (mut ws_write, mut ws_read) = socket.split();

    let write_session_id = session_id.clone();
    let write_handle = tokio::spawn(async move {
        while let Some(packet) = outbound.recv().await {
            if ws_write
                .send(Message::Text(packet.encode().into()))
                .await
                .is_err()
            {
                tracing::debug!(
                    session_id = %write_session_id,
                    "WebSocket write failed, closing"
                );
                break;
            }
        }
    });

    while let Some(result) = ws_read.next().await {
        let frame = match result {
            Ok(Message::Text(text)) => text.as_str().as_bytes().to_vec(),
            Ok(Message::Binary(bytes)) => bytes.to_vec(),
            Ok(Message::Close(_)) => {
                tracing::debug!(session_id = %session_id, "Client sent close frame");
                break;
            }
            Ok(_) => continue,
            Err(e) => {
                tracing::debug!(session_id = %session_id, error = %e, "WebSocket read error");
                break;
            }
        };

        match session.upgrade() {
            Some(live) => live.on_frame(&frame),
            None => break,
        }
    }

    write_handle.abort();
    tracing::debug!(session_id = %session_id, "WebSocket connection closed");
}
