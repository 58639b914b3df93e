//! Mounting the server on an axum Router and serving it

use super::host::SocketIoServer;
use anyhow::Result;
use axum::Router;
use axum::extract::{Request, State};
use axum::response::Response;
use axum::routing::any;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Build the router serving every method under the configured resource
///
/// - `{resource}` and `{resource}/{*path}` → [`SocketIoServer::route`]
///
/// Paths are matched against the protocol grammar by the server itself, so
/// the handler sees the full request URI.
pub fn build_router(server: Arc<SocketIoServer>) -> Router {
    let resource = server.config().normalized_resource();

    let mut router = Router::new().route(&format!("{}/{{*path}}", resource), any(handle));
    if !resource.is_empty() {
        router = router.route(&resource, any(handle));
    }

    router.with_state(server).layer(TraceLayer::new_for_http())
}

async fn handle(State(server): State<Arc<SocketIoServer>>, request: Request) -> Response {
    server.route(request).await
}

/// Serve the application with graceful shutdown
///
/// This will:
/// - Bind to the provided address
/// - Start serving requests
/// - Handle SIGTERM and SIGINT (Ctrl+C) for graceful shutdown
pub async fn serve(server: Arc<SocketIoServer>, addr: &str) -> Result<()> {
    let app = build_router(server);
    let listener = TcpListener::bind(addr).await?;

    tracing::info!("Socket.IO server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or Ctrl+C)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, initiating graceful shutdown...");
        },
    }
}
