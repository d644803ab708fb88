//! Shared state threaded through every HTTP/WebSocket route.

use crate::chat_bridge::ChatBridgeHandle;
use crate::config::Config;
use crate::view_store::ViewStore;
use crate::ws_hub::WsHub;

use std::sync::Arc;

#[derive(Clone)]
pub struct ApiState {
    pub view_store: Arc<ViewStore>,
    pub chat: ChatBridgeHandle,
    pub ws_hub: Arc<WsHub>,
    pub config: Config,
}
