//! # socketio-rs
//!
//! A Socket.IO (protocol revision 1) server core for axum applications.
//!
//! ## Features
//!
//! - **Handshake and routing**: `<resource>/1/` allocates a session, later
//!   requests are routed to it by transport name and session id
//! - **Namespaces**: independent endpoints multiplexed over one session
//! - **Event API**: `on` / `once` / `emit` on the server, sessions and namespaces
//! - **Pluggable transports**: WebSocket and XHR long-polling out of the box
//! - **Configuration-Based**: YAML-loadable `ServerConfig`
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use socketio::prelude::*;
//!
//! let server = ServerBuilder::new().build()?;
//!
//! server.on("connect", |ns: Arc<NameSpace>| {
//!     let reply = Arc::downgrade(&ns);
//!     ns.on("ping", move |args| {
//!         if let Some(ns) = reply.upgrade() {
//!             ns.emit("pong", args);
//!         }
//!     });
//! });
//!
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
//! axum::serve(listener, server.into_router()).await?;
//! ```

pub mod config;
pub mod core;
pub mod server;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core ===
    pub use crate::core::{
        auth::{AllowAll, Authorize},
        error::{ConfigError, RequestError, SessionError, SocketIoError},
        events::{EventEmitter, ListenerId},
        packet::{DecodeError, Packet, PacketKind, Payload},
    };

    // === Config ===
    pub use crate::config::ServerConfig;

    // === Server ===
    pub use crate::server::{
        NameSpace, ServerBuilder, Session, SocketIoServer, Transport, TransportFactory,
        TransportRegistry,
    };

    // === External dependencies ===
    pub use anyhow::Result;
    pub use async_trait::async_trait;
    pub use serde_json::{Value, json};
    pub use std::sync::Arc;

    // === Axum ===
    pub use axum::{Router, http::request::Parts};
}
