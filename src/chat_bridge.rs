//! ChatBridge: funnels chat messages from all three surfaces (terminal,
//! WebSocket, JSON-RPC agent) into a single consumer that drives the
//! ChatEngine, and routes replies back out (spec §4.5).

use crate::chat::{ChatEngine, ChatMessage, ChatResponse, Origin};
use crate::ws_hub::{Envelope as WsEnvelope, WsHub};

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Bound on each origin's inbound queue. A producer that outruns this rate
/// has its oldest pending message dropped rather than blocking.
const QUEUE_CAPACITY: usize = 100;
/// Grace period given to in-flight work when [`ChatBridge::shutdown`] is called.
const SHUTDOWN_DRAIN: std::time::Duration = std::time::Duration::from_secs(2);

struct Envelope {
    message: ChatMessage,
    reply: oneshot::Sender<ChatResponse>,
}

/// Handle used by a transport to submit a message and await its reply.
#[derive(Clone)]
pub struct ChatBridgeHandle {
    terminal: mpsc::Sender<Envelope>,
    websocket: mpsc::Sender<Envelope>,
    agent: mpsc::Sender<Envelope>,
}

impl ChatBridgeHandle {
    /// Submit a message for processing. Returns `None` if the bridge's queue
    /// for this origin is full — the caller should log and drop, never block.
    pub async fn submit(&self, message: ChatMessage) -> Option<oneshot::Receiver<ChatResponse>> {
        let (tx, rx) = oneshot::channel();
        let sender = match message.origin {
            Origin::Terminal => &self.terminal,
            Origin::WebSocket => &self.websocket,
            Origin::Agent => &self.agent,
        };
        let envelope = Envelope { message, reply: tx };
        match sender.try_send(envelope) {
            Ok(()) => Some(rx),
            Err(mpsc::error::TrySendError::Full(envelope)) => {
                tracing::warn!(origin = ?envelope.message.origin, "chat bridge queue full, dropping message");
                None
            }
            Err(mpsc::error::TrySendError::Closed(_)) => None,
        }
    }
}

/// Owns the three inbound queues and the single consumer task that drains
/// them round-robin into a [`ChatEngine`].
pub struct ChatBridge {
    handle: ChatBridgeHandle,
    consumer: JoinHandle<()>,
}

impl ChatBridge {
    /// Spawn the consumer. Every processed response is mirrored to every
    /// connected WS client via `ws_hub.broadcast()` in addition to being
    /// returned to the originating caller, regardless of which surface the
    /// message came from (spec §4.5/§8's fan-out completeness property).
    pub fn spawn(engine: Arc<ChatEngine>, ws_hub: Arc<WsHub>) -> Self {
        let (terminal_tx, mut terminal_rx) = mpsc::channel(QUEUE_CAPACITY);
        let (websocket_tx, mut websocket_rx) = mpsc::channel(QUEUE_CAPACITY);
        let (agent_tx, mut agent_rx) = mpsc::channel(QUEUE_CAPACITY);

        let consumer = tokio::spawn(async move {
            loop {
                let envelope = tokio::select! {
                    biased;
                    Some(envelope) = terminal_rx.recv() => envelope,
                    Some(envelope) = websocket_rx.recv() => envelope,
                    Some(envelope) = agent_rx.recv() => envelope,
                    else => break,
                };

                let response = engine.handle(&envelope.message.content, envelope.message.origin).await;

                let ws_envelope = WsEnvelope::new(
                    "chat_response",
                    serde_json::to_value(&response).unwrap_or(serde_json::Value::Null),
                );
                ws_hub.broadcast(&ws_envelope).await;

                let _ = envelope.reply.send(response);
            }
        });

        Self {
            handle: ChatBridgeHandle {
                terminal: terminal_tx,
                websocket: websocket_tx,
                agent: agent_tx,
            },
            consumer,
        }
    }

    pub fn handle(&self) -> ChatBridgeHandle {
        self.handle.clone()
    }

    /// Stop accepting new work and give in-flight processing a grace period
    /// to finish before aborting the consumer task.
    pub async fn shutdown(self) {
        drop(self.handle);
        let _ = tokio::time::timeout(SHUTDOWN_DRAIN, self.consumer).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::LlmClient;
    use crate::view_store::ViewStore;

    fn test_message(content: &str, origin: Origin) -> ChatMessage {
        ChatMessage {
            id: 0,
            role: "user".into(),
            content: content.into(),
            origin,
            timestamp: chrono::Utc::now(),
            meta: Default::default(),
        }
    }

    #[tokio::test]
    async fn submitted_message_receives_a_reply() {
        let engine = Arc::new(ChatEngine::new(
            Arc::new(ViewStore::new()),
            LlmClient::from_api_key(None),
            512,
            std::time::Duration::from_secs(5),
        ));
        let bridge = ChatBridge::spawn(engine, Arc::new(WsHub::new()));
        let handle = bridge.handle();

        let rx = handle
            .submit(test_message("help", Origin::Terminal))
            .await
            .expect("queue should accept a message");
        let response = rx.await.expect("engine should reply");
        assert!(response.content.contains("add <component>"));

        bridge.shutdown().await;
    }

    #[tokio::test]
    async fn different_origins_are_each_served() {
        let engine = Arc::new(ChatEngine::new(
            Arc::new(ViewStore::new()),
            LlmClient::from_api_key(None),
            512,
            std::time::Duration::from_secs(5),
        ));
        let bridge = ChatBridge::spawn(engine, Arc::new(WsHub::new()));
        let handle = bridge.handle();

        let a = handle.submit(test_message("status", Origin::Terminal)).await.unwrap();
        let b = handle.submit(test_message("status", Origin::WebSocket)).await.unwrap();
        let c = handle.submit(test_message("status", Origin::Agent)).await.unwrap();

        assert!(a.await.is_ok());
        assert!(b.await.is_ok());
        assert!(c.await.is_ok());

        bridge.shutdown().await;
    }
}
