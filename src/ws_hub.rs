//! WSHub: tracks connected WebSocket clients and broadcasts/targets envelope
//! messages to them (spec §4.6).

use crate::error::{Result, WsError};

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::{mpsc, RwLock};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Idle interval between pings sent to each client.
const PING_INTERVAL: Duration = Duration::from_secs(30);
/// A client that hasn't answered a ping within this window is disconnected.
const PONG_TIMEOUT: Duration = Duration::from_secs(60);
/// A single write that doesn't complete within this window disconnects the client.
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Outbound envelope shape shared by every message type the hub sends (§6.1).
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: serde_json::Value,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl Envelope {
    pub fn new(kind: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            data,
            timestamp: chrono::Utc::now(),
        }
    }
}

struct Client {
    outbound: mpsc::Sender<Message>,
}

/// Registry of connected WebSocket clients and the single entry point for
/// broadcasting or targeting envelope messages to them.
pub struct WsHub {
    clients: RwLock<HashMap<String, Client>>,
}

impl WsHub {
    pub fn new() -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
        }
    }

    /// Take ownership of an accepted socket: split it, spawn its writer and
    /// reader tasks, and register it under `client_id`. Inbound text frames
    /// are forwarded on `inbound` as chat content for the caller to submit to
    /// the [`crate::chat_bridge::ChatBridge`].
    pub async fn register(
        self: &Arc<Self>,
        client_id: String,
        socket: WebSocket,
        inbound: mpsc::Sender<String>,
    ) {
        let (mut sink, mut stream) = socket.split();
        let (tx, mut rx) = mpsc::channel::<Message>(64);

        self.clients.write().await.insert(
            client_id.clone(),
            Client {
                outbound: tx.clone(),
            },
        );

        let writer_hub = self.clone();
        let writer_id = client_id.clone();
        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                match tokio::time::timeout(WRITE_TIMEOUT, sink.send(message)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(error)) => {
                        tracing::warn!(client = %writer_id, %error, "websocket write failed");
                        break;
                    }
                    Err(_) => {
                        tracing::warn!(client = %writer_id, "websocket write timed out");
                        break;
                    }
                }
            }
            writer_hub.unregister(&writer_id).await;
        });

        let hub = self.clone();
        let reader_id = client_id.clone();
        let reader_tx = tx.clone();
        tokio::spawn(async move {
            let mut ping_ticker = tokio::time::interval(PING_INTERVAL);
            ping_ticker.tick().await; // first tick fires immediately

            loop {
                tokio::select! {
                    _ = ping_ticker.tick() => {
                        if reader_tx.send(Message::Ping(Vec::new().into())).await.is_err() {
                            break;
                        }
                    }
                    frame = tokio::time::timeout(PONG_TIMEOUT, stream.next()) => {
                        match frame {
                            Ok(Some(Ok(Message::Text(text)))) => {
                                if inbound.send(text.to_string()).await.is_err() {
                                    break;
                                }
                            }
                            Ok(Some(Ok(Message::Pong(_)))) => continue,
                            Ok(Some(Ok(Message::Close(_)))) | Ok(None) => break,
                            Ok(Some(Ok(_))) => continue,
                            Ok(Some(Err(error))) => {
                                tracing::warn!(client = %reader_id, %error, "websocket read error");
                                break;
                            }
                            Err(_) => {
                                tracing::warn!(client = %reader_id, "websocket pong timeout, disconnecting");
                                break;
                            }
                        }
                    }
                }
            }
            hub.unregister(&reader_id).await;
        });
    }

    pub async fn unregister(&self, client_id: &str) {
        self.clients.write().await.remove(client_id);
    }

    /// Send an envelope to every connected client. Per-client failures are
    /// logged but don't abort the broadcast.
    pub async fn broadcast(&self, envelope: &Envelope) {
        let Ok(payload) = serde_json::to_string(envelope) else {
            tracing::warn!(kind = %envelope.kind, "failed to serialize envelope for broadcast");
            return;
        };
        let clients = self.clients.read().await;
        for (id, client) in clients.iter() {
            if client.outbound.try_send(Message::Text(payload.clone().into())).is_err() {
                tracing::warn!(client = %id, "dropping broadcast: outbound queue full or closed");
            }
        }
    }

    /// Send an envelope to exactly one client.
    pub async fn send_to(&self, client_id: &str, envelope: &Envelope) -> Result<()> {
        let payload = serde_json::to_string(envelope).map_err(crate::error::Error::from)?;
        let clients = self.clients.read().await;
        let client = clients
            .get(client_id)
            .ok_or_else(|| WsError::UnknownClient(client_id.to_string()))?;
        client
            .outbound
            .try_send(Message::Text(payload.into()))
            .map_err(|_| WsError::WriteTimeout(client_id.to_string()))?;
        Ok(())
    }

    pub async fn connected_count(&self) -> usize {
        self.clients.read().await.len()
    }
}

impl Default for WsHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_client_send_errors() {
        let hub = WsHub::new();
        let result = hub.send_to("ghost", &Envelope::new("ping", serde_json::json!({}))).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn starts_with_no_clients() {
        let hub = WsHub::new();
        assert_eq!(hub.connected_count().await, 0);
    }
}
