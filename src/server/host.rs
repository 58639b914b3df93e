//! The Socket.IO server: session registry, handshake and request routing
//!
//! Every HTTP request under the resource path lands in [`SocketIoServer::route`]:
//!
//! ```text
//! <resource>/1/                      ──▶ handshake ──▶ new Session, "connect" event
//! <resource>/1/<transport>/<sid>     ──▶ registry lookup ──▶ Session::serve
//! anything else                      ──▶ 404
//! ```
//!
//! The registry is the only state shared by all requests. It sits behind one
//! async `RwLock`: handshakes and removals write, every routed request reads.

use crate::config::ServerConfig;
use crate::core::auth::Authorize;
use crate::core::error::{RequestError, SessionError, SocketIoError};
use crate::core::events::{EventEmitter, ListenerId};
use crate::core::sid::SessionIdGenerator;
use crate::server::builder::ServerBuilder;
use crate::server::namespace::NameSpace;
use crate::server::session::Session;
use crate::server::transport::{TransportRegistry, apply_cors};
use axum::Router;
use axum::extract::Request;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tokio::sync::RwLock;

/// Protocol revision served by this crate
pub const PROTOCOL_VERSION: &str = "1";

/// Where a request path points
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteTarget {
    /// `<resource>/1/`
    Handshake,
    /// `<resource>/1/<transport>/<session id>`
    Transport {
        transport: String,
        session_id: String,
    },
}

impl RouteTarget {
    /// Parse a request path; `None` means the path is not a protocol URI
    pub fn parse(path: &str) -> Option<Self> {
        static URI_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex = URI_REGEX.get_or_init(|| {
            Regex::new(r"^(.+?)/(1)(?:/([^/]+)/([^/]+))?/?$").expect("URI pattern is valid")
        });

        let captures = regex.captures(path)?;
        match (captures.get(3), captures.get(4)) {
            (Some(transport), Some(session_id)) => Some(RouteTarget::Transport {
                transport: transport.as_str().to_string(),
                session_id: session_id.as_str().to_string(),
            }),
            _ => Some(RouteTarget::Handshake),
        }
    }
}

pub struct SocketIoServer {
    config: ServerConfig,
    generate_id: SessionIdGenerator,
    transports: Arc<TransportRegistry>,
    authorize: Arc<dyn Authorize>,
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    emitter: EventEmitter<Arc<NameSpace>>,
}

impl SocketIoServer {
    /// Start configuring a server
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    pub(crate) fn from_builder_components(
        config: ServerConfig,
        generate_id: SessionIdGenerator,
        transports: TransportRegistry,
        authorize: Arc<dyn Authorize>,
    ) -> Self {
        Self {
            config,
            generate_id,
            transports: Arc::new(transports),
            authorize,
            sessions: RwLock::new(HashMap::new()),
            emitter: EventEmitter::new(),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn transports(&self) -> &TransportRegistry {
        &self.transports
    }

    /// Axum router serving this server under its resource path
    pub fn into_router(self: Arc<Self>) -> Router {
        super::router::build_router(self)
    }

    /// Bind `addr` and serve until SIGTERM or Ctrl+C
    pub async fn serve(self: Arc<Self>, addr: &str) -> anyhow::Result<()> {
        super::router::serve(self, addr).await
    }

    // === Events ===

    /// Listen for server events
    ///
    /// `"connect"` fires once per successful handshake with the new session's
    /// default namespace.
    pub fn on<F>(&self, name: impl Into<String>, listener: F) -> ListenerId
    where
        F: Fn(Arc<NameSpace>) + Send + Sync + 'static,
    {
        self.emitter.on(name, listener)
    }

    pub fn once<F>(&self, name: impl Into<String>, listener: F) -> ListenerId
    where
        F: Fn(Arc<NameSpace>) + Send + Sync + 'static,
    {
        self.emitter.once(name, listener)
    }

    pub fn remove_listener(&self, name: &str, id: ListenerId) -> bool {
        self.emitter.remove_listener(name, id)
    }

    pub fn remove_all_listeners(&self, name: &str) {
        self.emitter.remove_all_listeners(name)
    }

    // === Routing ===

    /// Handle one HTTP request under the resource path
    pub async fn route(&self, request: Request) -> Response {
        let Some(target) = RouteTarget::parse(request.uri().path()) else {
            return SocketIoError::from(RequestError::InvalidUri {
                uri: request.uri().to_string(),
            })
            .into_response();
        };

        match target {
            RouteTarget::Handshake => self.handshake(request).await,
            RouteTarget::Transport {
                transport,
                session_id,
            } => match self.lookup(&transport, &session_id).await {
                Ok(session) => session.serve(&transport, request).await,
                Err(e) => e.into_response(),
            },
        }
    }

    async fn lookup(&self, transport: &str, session_id: &str) -> Result<Arc<Session>, SocketIoError> {
        if !self.transports.contains(transport) {
            return Err(RequestError::TransportNotSupported {
                transport: transport.to_string(),
            }
            .into());
        }

        self.get_session(session_id).await.ok_or_else(|| {
            RequestError::InvalidSessionId {
                session_id: session_id.to_string(),
            }
            .into()
        })
    }

    /// Allocate a session and answer with `sid:heartbeat:closing:transports`
    async fn handshake(&self, request: Request) -> Response {
        let (parts, _body) = request.into_parts();

        if !self.authorize.authorize(&parts) {
            return SocketIoError::from(RequestError::Unauthorized).into_response();
        }

        // Capacity failures carry CORS headers as well.
        let (mut response, session) = match self.open_session().await {
            Ok(session) => (
                (
                    StatusCode::OK,
                    [(header::CONTENT_TYPE, "text/plain; charset=UTF-8")],
                    self.handshake_body(session.id()),
                )
                    .into_response(),
                Some(session),
            ),
            Err(e) => (e.into_response(), None),
        };
        apply_cors(response.headers_mut(), parts.headers.get(header::ORIGIN));

        if let Some(session) = session {
            tracing::info!(session_id = %session.id(), "Handshake complete");
            self.emitter.fire("connect", session.default_namespace());
        }
        response
    }

    async fn open_session(&self) -> Result<Arc<Session>, SocketIoError> {
        let session_id = (self.generate_id)()
            .filter(|id| !id.is_empty())
            .ok_or(SessionError::IdGenerationFailed)?;

        let session = Session::new(session_id, self.transports.clone());
        self.add_session(session.clone()).await?;
        Ok(session)
    }

    /// The literal handshake body for `session_id`
    pub fn handshake_body(&self, session_id: &str) -> String {
        format!(
            "{}:{}:{}:{}",
            session_id,
            self.config.heartbeat_timeout_ms,
            self.config.closing_timeout_ms,
            self.transports.names().join(",")
        )
    }

    // === Session registry ===

    /// Register a session; an id that is already taken is refused
    pub async fn add_session(&self, session: Arc<Session>) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(session.id()) {
            return Err(SessionError::DuplicateId {
                session_id: session.id().to_string(),
            });
        }
        tracing::debug!(session_id = %session.id(), "Session registered");
        sessions.insert(session.id().to_string(), session);
        Ok(())
    }

    /// Remove a session from the registry, returning it if it was present
    pub async fn remove_session(&self, session_id: &str) -> Option<Arc<Session>> {
        let removed = self.sessions.write().await.remove(session_id);
        if removed.is_some() {
            tracing::debug!(session_id = %session_id, "Session removed");
        }
        removed
    }

    pub async fn get_session(&self, session_id: &str) -> Option<Arc<Session>> {
        self.sessions.read().await.get(session_id).cloned()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn session_ids(&self) -> Vec<String> {
        self.sessions.read().await.keys().cloned().collect()
    }
}

impl std::fmt::Debug for SocketIoServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketIoServer")
            .field("config", &self.config)
            .field("transports", &self.transports)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fixed_id_server(id: &'static str) -> Arc<SocketIoServer> {
        SocketIoServer::builder()
            .with_session_id_generator(move || Some(id.to_string()))
            .build()
            .expect("should build server")
    }

    fn request(path: &str) -> Request {
        Request::builder().uri(path).body(Body::empty()).unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_parse_handshake_paths() {
        assert_eq!(RouteTarget::parse("/socket.io/1"), Some(RouteTarget::Handshake));
        assert_eq!(RouteTarget::parse("/socket.io/1/"), Some(RouteTarget::Handshake));
        assert_eq!(RouteTarget::parse("/a/b/1/"), Some(RouteTarget::Handshake));
    }

    #[test]
    fn test_parse_transport_paths() {
        assert_eq!(
            RouteTarget::parse("/socket.io/1/xhr-polling/abc"),
            Some(RouteTarget::Transport {
                transport: "xhr-polling".to_string(),
                session_id: "abc".to_string(),
            })
        );
        assert_eq!(
            RouteTarget::parse("/socket.io/1/websocket/abc/"),
            Some(RouteTarget::Transport {
                transport: "websocket".to_string(),
                session_id: "abc".to_string(),
            })
        );
    }

    #[test]
    fn test_parse_rejects_bad_paths() {
        assert_eq!(RouteTarget::parse("/socket.io/nonsense"), None);
        assert_eq!(RouteTarget::parse("/socket.io/2/"), None);
        assert_eq!(RouteTarget::parse("/socket.io/1/websocket"), None);
        assert_eq!(RouteTarget::parse("/1/"), None);
    }

    #[tokio::test]
    async fn test_handshake_registers_and_fires_connect_once() {
        let server = fixed_id_server("ABCDEFGHIJ0123KL");
        let fired = Arc::new(AtomicUsize::new(0));
        let f = fired.clone();
        server.on("connect", move |ns| {
            assert_eq!(ns.endpoint(), "");
            assert_eq!(ns.session_id(), "ABCDEFGHIJ0123KL");
            f.fetch_add(1, Ordering::SeqCst);
        });

        let response = server.route(request("/socket.io/1/")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.starts_with("ABCDEFGHIJ0123KL:15000:10000:"));

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(server.get_session("ABCDEFGHIJ0123KL").await.is_some());
    }

    #[tokio::test]
    async fn test_duplicate_generated_id_is_service_unavailable() {
        let server = fixed_id_server("SAMEIDSAMEIDSAME");

        let first = server.route(request("/socket.io/1/")).await;
        let second = server.route(request("/socket.io/1/")).await;

        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(second.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(server.session_count().await, 1);
    }

    #[tokio::test]
    async fn test_remove_then_get_is_absent() {
        let server = SocketIoServer::builder().build().unwrap();
        let session = Session::new("REMOVEME00000001", server.transports.clone());
        server.add_session(session.clone()).await.unwrap();

        assert!(server.remove_session(session.id()).await.is_some());
        assert!(server.get_session(session.id()).await.is_none());
        assert!(server.remove_session(session.id()).await.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_registry_operations_are_linearizable() {
        let server = SocketIoServer::builder().build().unwrap();

        let mut handles = Vec::new();
        for i in 0..64 {
            let server = server.clone();
            handles.push(tokio::spawn(async move {
                let id = format!("SESSION{:09}", i);
                let session = Session::new(id.clone(), server.transports.clone());
                server.add_session(session).await.unwrap();
                assert!(server.get_session(&id).await.is_some());
                if i % 2 == 0 {
                    assert!(server.remove_session(&id).await.is_some());
                }
                id
            }));
        }

        let mut kept = HashSet::new();
        for (i, handle) in handles.into_iter().enumerate() {
            let id = handle.await.unwrap();
            if i % 2 == 1 {
                kept.insert(id);
            }
        }

        let ids: HashSet<String> = server.session_ids().await.into_iter().collect();
        assert_eq!(ids, kept);
        assert_eq!(server.session_count().await, 32);
    }

    #[tokio::test]
    async fn test_route_to_unknown_session_fails() {
        let server = SocketIoServer::builder().build().unwrap();
        let response = server
            .route(request("/socket.io/1/xhr-polling/does-not-exist"))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_text(response).await, "invalid session id");
    }

    #[tokio::test]
    async fn test_handshake_body_lists_transports_in_order() {
        let server = SocketIoServer::builder()
            .with_heartbeat_timeout(60_000)
            .with_closing_timeout(25_000)
            .build()
            .unwrap();
        let names = server.transports().names().join(",");
        assert_eq!(
            server.handshake_body("X"),
            format!("X:60000:25000:{}", names)
        );
    }
}
