//! ChatEngine: turns one chat message into a reply, optionally mutating the
//! shared ViewStore along the way (spec §4.4).

pub mod action;
pub mod heuristic;

use crate::error::ChatError;
use crate::llm_client::{ChatTurn, LlmClient, Role};
use crate::prompt_builder::{Mode, PromptBuilder};
use crate::view_store::{Mutation, ViewStore};

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use action::{extract_ui_action, strip_span, ActionKind, RemoveComponentData, UpdateComponentData};

/// Where a chat message originated, carried through to logging and to any
/// transport-specific reply routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Terminal,
    WebSocket,
    Agent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: u64,
    pub role: String,
    pub content: String,
    pub origin: Origin,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    pub meta: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub id: u64,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<ActionKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_data: Option<serde_json::Value>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Processes chat messages one at a time against a shared [`ViewStore`],
/// preferring an [`LlmClient`] when configured and falling back to the
/// deterministic [`heuristic`] responder otherwise or on upstream failure.
pub struct ChatEngine {
    view_store: Arc<ViewStore>,
    llm: Option<LlmClient>,
    max_tokens: u32,
    timeout: Duration,
    next_id: AtomicU64,
}

impl ChatEngine {
    pub fn new(view_store: Arc<ViewStore>, llm: Option<LlmClient>, max_tokens: u32, timeout: Duration) -> Self {
        Self {
            view_store,
            llm,
            max_tokens,
            timeout,
            next_id: AtomicU64::new(1),
        }
    }

    /// Process one message to completion: no concurrent mutation of the
    /// ViewStore happens from within the engine itself, so callers serialize
    /// calls to `handle` (e.g. via ChatBridge's single consumer task).
    pub async fn handle(&self, content: &str, origin: Origin) -> ChatResponse {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let view = self.view_store.snapshot();

        let reply_text = match &self.llm {
            Some(client) => match self.complete_with_llm(client, &view, content).await {
                Ok(text) => text,
                Err(error) => {
                    tracing::warn!(%error, ?origin, "LLM completion failed, falling back to heuristic responder");
                    return self.respond_heuristically(id, content, &view).await;
                }
            },
            None => return self.respond_heuristically(id, content, &view).await,
        };

        match extract_ui_action(&reply_text) {
            Some((action, span)) => {
                let mutation = match action_to_mutation(&action) {
                    Ok(mutation) => mutation,
                    Err(error) => {
                        tracing::warn!(%error, "ui_update block failed to convert to a mutation");
                        return ChatResponse {
                            id,
                            content: reply_text,
                            action: None,
                            action_data: None,
                            timestamp: now(),
                        };
                    }
                };

                match self.view_store.apply(mutation).await {
                    Ok(_) => ChatResponse {
                        id,
                        content: strip_span(&reply_text, span),
                        action: Some(action.kind),
                        action_data: Some(action.data),
                        timestamp: now(),
                    },
                    Err(error) => {
                        tracing::warn!(%error, "ui_update mutation rejected by the ViewStore");
                        ChatResponse {
                            id,
                            content: format!("{}\n\n(I couldn't apply that change: {error})", strip_span(&reply_text, span)),
                            action: None,
                            action_data: None,
                            timestamp: now(),
                        }
                    }
                }
            }
            None => ChatResponse {
                id,
                content: reply_text,
                action: None,
                action_data: None,
                timestamp: now(),
            },
        }
    }

    async fn complete_with_llm(
        &self,
        client: &LlmClient,
        view: &crate::view_store::ViewState,
        content: &str,
    ) -> Result<String, ChatError> {
        let prompt = PromptBuilder::build(view, Mode::General, content);
        let completion = client
            .complete(
                &prompt.system_prompt,
                &[ChatTurn {
                    role: Role::User,
                    content: prompt.user_prompt,
                }],
                self.max_tokens,
                self.timeout,
            )
            .await?;
        Ok(completion.text)
    }

    async fn respond_heuristically(&self, id: u64, content: &str, view: &crate::view_store::ViewState) -> ChatResponse {
        let reply = heuristic::respond(content, view);
        let (action, action_data) = match reply.mutation {
            Some(mutation) => {
                let summary_kind = mutation_action_kind(&mutation);
                match self.view_store.apply(mutation).await {
                    Ok((_, change_set)) => (
                        Some(summary_kind),
                        Some(serde_json::to_value(&change_set.mutation).unwrap_or(serde_json::Value::Null)),
                    ),
                    Err(error) => {
                        tracing::warn!(%error, "heuristic mutation rejected by the ViewStore");
                        (None, None)
                    }
                }
            }
            None => (None, None),
        };

        ChatResponse {
            id,
            content: reply.content,
            action,
            action_data,
            timestamp: now(),
        }
    }
}

fn mutation_action_kind(mutation: &Mutation) -> ActionKind {
    match mutation {
        Mutation::AddComponent(_) => ActionKind::AddComponent,
        Mutation::UpdateComponent { .. } => ActionKind::UpdateComponent,
        Mutation::RemoveComponent { .. } => ActionKind::RemoveComponent,
        Mutation::SetTheme(_) => ActionKind::UpdateTheme,
        Mutation::SetLayout(_) | Mutation::SetCanvas(_) | Mutation::ReplaceAll(_) => {
            ActionKind::UpdateLayout
        }
    }
}

fn action_to_mutation(action: &action::UiAction) -> Result<Mutation, serde_json::Error> {
    Ok(match action.kind {
        ActionKind::AddComponent => Mutation::AddComponent(serde_json::from_value(action.data.clone())?),
        ActionKind::UpdateComponent => {
            let data: UpdateComponentData = serde_json::from_value(action.data.clone())?;
            Mutation::UpdateComponent {
                id: data.id,
                patch: data.patch,
            }
        }
        ActionKind::RemoveComponent => {
            let data: RemoveComponentData = serde_json::from_value(action.data.clone())?;
            Mutation::RemoveComponent { id: data.id }
        }
        ActionKind::UpdateTheme => Mutation::SetTheme(serde_json::from_value(action.data.clone())?),
        ActionKind::UpdateLayout => Mutation::SetLayout(serde_json::from_value(action.data.clone())?),
    })
}

fn now() -> chrono::DateTime<chrono::Utc> {
    chrono::Utc::now()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn falls_back_to_heuristic_when_no_llm_configured() {
        let store = Arc::new(ViewStore::new());
        let engine = ChatEngine::new(store.clone(), None, 512, Duration::from_secs(5));
        let response = engine.handle("agregar botón", Origin::Terminal).await;
        assert_eq!(response.action, Some(ActionKind::AddComponent));
        assert_eq!(store.snapshot().components.len(), 1);
    }

    #[tokio::test]
    async fn plain_status_query_has_no_action() {
        let store = Arc::new(ViewStore::new());
        let engine = ChatEngine::new(store, None, 512, Duration::from_secs(5));
        let response = engine.handle("status", Origin::WebSocket).await;
        assert!(response.action.is_none());
        assert!(response.content.contains("component(s)"));
    }

    #[tokio::test]
    async fn ids_increase_monotonically() {
        let store = Arc::new(ViewStore::new());
        let engine = ChatEngine::new(store, None, 512, Duration::from_secs(5));
        let first = engine.handle("help", Origin::Terminal).await;
        let second = engine.handle("help", Origin::Terminal).await;
        assert!(second.id > first.id);
    }
}
