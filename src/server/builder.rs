//! ServerBuilder for fluent API to build Socket.IO servers

use super::host::SocketIoServer;
use super::transport::{TransportFactory, TransportRegistry};
use crate::config::ServerConfig;
use crate::core::auth::{AllowAll, Authorize};
use crate::core::sid::{SessionIdGenerator, default_generator};
use anyhow::Result;
use axum::Router;
use std::sync::Arc;

/// Builder for a [`SocketIoServer`]
///
/// Unset values fall back to [`ServerConfig::default`], the OS-random session
/// id generator, the default transport registry and [`AllowAll`].
///
/// # Example
///
/// ```ignore
/// let server = ServerBuilder::new()
///     .with_heartbeat_timeout(60_000)
///     .with_authorize(|req: &Parts| req.headers.contains_key("cookie"))
///     .build()?;
///
/// server.on("connect", |ns| ns.emit("welcome", vec![]));
/// ```
pub struct ServerBuilder {
    config: ServerConfig,
    session_id_generator: Option<SessionIdGenerator>,
    transports: Option<TransportRegistry>,
    extra_transports: Vec<Arc<dyn TransportFactory>>,
    authorize: Option<Arc<dyn Authorize>>,
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            session_id_generator: None,
            transports: None,
            extra_transports: Vec::new(),
            authorize: None,
        }
    }

    /// Start from a loaded configuration
    ///
    /// Setters called afterwards override the matching fields.
    pub fn with_config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Mount prefix, `/socket.io` by default
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.config.resource = resource.into();
        self
    }

    pub fn with_heartbeat_timeout(mut self, ms: u64) -> Self {
        self.config.heartbeat_timeout_ms = ms;
        self
    }

    pub fn with_closing_timeout(mut self, ms: u64) -> Self {
        self.config.closing_timeout_ms = ms;
        self
    }

    /// How long a long-poll waits before answering with a noop
    pub fn with_polling_duration(mut self, ms: u64) -> Self {
        self.config.polling_duration_ms = ms;
        self
    }

    /// Replace the session id source
    ///
    /// Returning `None` (or an empty id) makes the handshake fail with 503.
    pub fn with_session_id_generator<F>(mut self, generator: F) -> Self
    where
        F: Fn() -> Option<String> + Send + Sync + 'static,
    {
        self.session_id_generator = Some(Arc::new(generator));
        self
    }

    /// Replace the whole transport registry
    pub fn with_transports(mut self, registry: TransportRegistry) -> Self {
        self.transports = Some(registry);
        self
    }

    /// Add (or replace, by name) one transport on top of the registry
    pub fn with_transport(mut self, factory: impl TransportFactory + 'static) -> Self {
        self.extra_transports.push(Arc::new(factory));
        self
    }

    /// Decide which handshakes may open a session
    pub fn with_authorize(mut self, authorize: impl Authorize + 'static) -> Self {
        self.authorize = Some(Arc::new(authorize));
        self
    }

    /// Build the server
    pub fn build(self) -> Result<Arc<SocketIoServer>> {
        self.config.validate()?;

        let mut registry = self
            .transports
            .unwrap_or_else(|| TransportRegistry::with_defaults(self.config.polling_duration()));
        for factory in self.extra_transports {
            registry.register_shared(factory);
        }
        if let Some(names) = &self.config.transports {
            registry = registry.restrict_to(names)?;
        }
        if registry.is_empty() {
            anyhow::bail!("At least one transport must be enabled");
        }

        tracing::debug!(
            resource = %self.config.normalized_resource(),
            transports = ?registry.names(),
            "Socket.IO server built"
        );

        Ok(Arc::new(SocketIoServer::from_builder_components(
            self.config,
            self.session_id_generator.unwrap_or_else(default_generator),
            registry,
            self.authorize.unwrap_or_else(|| Arc::new(AllowAll)),
        )))
    }

    /// Build the server and mount it on an axum router
    pub fn build_router(self) -> Result<Router> {
        Ok(self.build()?.into_router())
    }

    /// Build the server and serve it with graceful shutdown
    ///
    /// Use [`SocketIoServer::serve`] instead when listeners must be
    /// registered before the first handshake.
    ///
    /// # Example
    ///
    /// ```ignore
    /// ServerBuilder::new()
    ///     .with_heartbeat_timeout(60_000)
    ///     .serve("127.0.0.1:3000").await?;
    /// ```
    pub async fn serve(self, addr: &str) -> Result<()> {
        self.build()?.serve(addr).await
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
