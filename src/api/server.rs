//! HTTP/WebSocket server for the browser editor surface (spec §4.6).

use super::state::ApiState;
use super::ws;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};

use std::net::SocketAddr;

/// Start the WebSocket server on the given address.
///
/// The editor frontend itself runs as a separate dev server
/// (`config.editor_port`, an external collaborator); this process only
/// speaks the `/ws` protocol and a `/health` probe.
pub async fn start_ws_server(bind: SocketAddr, state: ApiState, shutdown_rx: tokio::sync::watch::Receiver<bool>) -> anyhow::Result<tokio::task::JoinHandle<()>> {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    let app = Router::new()
        .route("/ws", get(ws::upgrade))
        .route("/health", get(health))
        .layer(cors)
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|error| anyhow::anyhow!("failed to bind websocket server to {}: {}", bind, error))?;

    tracing::info!(address = %bind, "websocket server started");

    let handle = tokio::spawn(async move {
        let mut shutdown_rx = shutdown_rx;
        let shutdown_signal = async move {
            let _ = shutdown_rx.wait_for(|shutdown| *shutdown).await;
        };

        if let Err(error) = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal).await {
            tracing::error!(%error, "websocket server failed");
        }
    });

    Ok(handle)
}

async fn health() -> StatusCode {
    StatusCode::OK
}
