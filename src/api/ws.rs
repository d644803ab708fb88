//! WebSocket upgrade endpoint: wires a connected browser client's inbound
//! text frames into the ChatBridge (spec §4.6/§6.1). Replies are not sent
//! directly to the originating socket here — the ChatBridge consumer
//! broadcasts every processed response to all connected clients, including
//! this one, so every tab stays in sync (spec §4.5/§8).

use super::state::ApiState;
use crate::chat::{ChatMessage, Origin};

use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;

use tokio::sync::mpsc;

pub async fn upgrade(ws: WebSocketUpgrade, State(state): State<ApiState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: ApiState) {
    let client_id = uuid::Uuid::new_v4().to_string();
    let (inbound_tx, mut inbound_rx) = mpsc::channel::<String>(32);

    state.ws_hub.register(client_id.clone(), socket, inbound_tx).await;
    #[cfg(feature = "metrics")]
    crate::telemetry::Metrics::global().ws_clients_connected.inc();

    while let Some(content) = inbound_rx.recv().await {
        let message = ChatMessage {
            id: 0,
            role: "user".into(),
            content,
            origin: Origin::WebSocket,
            timestamp: chrono::Utc::now(),
            meta: Default::default(),
        };

        let Some(rx) = state.chat.submit(message).await else {
            continue;
        };
        // The response itself is delivered to every client via the bridge's
        // broadcast; we only wait here so a dropped engine doesn't leave the
        // queue backed up.
        let _ = rx.await;
    }

    state.ws_hub.unregister(&client_id).await;
    #[cfg(feature = "metrics")]
    crate::telemetry::Metrics::global().ws_clients_connected.dec();
}
