//! JSONRPCServer: line-delimited JSON-RPC 2.0 over stdio (spec §4.7).
//!
//! Framing: one JSON object per line on stdin, one per line on stdout.
//! Nothing else may reach stdout — diagnostics go through `tracing` to
//! stderr/the log file.

pub mod protocol;
pub mod tools;

use protocol::{Request, Response, INVALID_PARAMS, METHOD_NOT_FOUND, PARSE_ERROR};
use tools::RpcContext;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

const PROTOCOL_VERSION: &str = "2024-11-05";
const SERVER_NAME: &str = "vibercode";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Run the JSON-RPC server against the given stdin/stdout handles until EOF.
pub async fn serve(ctx: RpcContext, stdin: impl tokio::io::AsyncRead + Unpin, mut stdout: impl tokio::io::AsyncWrite + Unpin) {
    let mut lines = BufReader::new(stdin).lines();
    let mut initialized = false;

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break, // EOF: graceful shutdown
            Err(error) => {
                tracing::error!(%error, "failed to read from stdin");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let response = handle_line(&ctx, &line, &mut initialized).await;
        if let Some(response) = response {
            if let Ok(mut text) = serde_json::to_string(&response) {
                text.push('\n');
                if stdout.write_all(text.as_bytes()).await.is_err() {
                    tracing::error!("failed to write JSON-RPC response to stdout");
                    break;
                }
                let _ = stdout.flush().await;
            }
        }
    }
}

async fn handle_line(ctx: &RpcContext, line: &str, initialized: &mut bool) -> Option<Response> {
    let request: Request = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(error) => {
            return Some(Response::err(serde_json::Value::Null, PARSE_ERROR, format!("parse error: {error}")));
        }
    };

    let id = request.id.clone().unwrap_or(serde_json::Value::Null);

    match request.method.as_str() {
        "initialize" => {
            *initialized = true;
            Some(Response::ok(
                id,
                serde_json::json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": { "tools": { "listChanged": false } },
                    "serverInfo": { "name": SERVER_NAME, "version": SERVER_VERSION },
                }),
            ))
        }
        "initialized" => {
            // Notification: never respond, even if id happened to be set.
            None
        }
        "tools/list" => {
            let tools: Vec<serde_json::Value> = tools::tool_defs()
                .into_iter()
                .map(|tool| {
                    serde_json::json!({
                        "name": tool.name,
                        "description": tool.description,
                        "inputSchema": tool.input_schema,
                    })
                })
                .collect();
            Some(Response::ok(id, serde_json::json!({ "tools": tools })))
        }
        "tools/call" => Some(handle_tool_call(ctx, id, request.params).await),
        other => {
            if request.is_notification() {
                None
            } else {
                Some(Response::err(id, METHOD_NOT_FOUND, format!("unknown method: {other}")))
            }
        }
    }
}

async fn handle_tool_call(ctx: &RpcContext, id: serde_json::Value, params: serde_json::Value) -> Response {
    let name = match params.get("name").and_then(|v| v.as_str()) {
        Some(name) => name.to_string(),
        None => return Response::err(id, INVALID_PARAMS, "tools/call requires a string 'name'"),
    };
    let arguments = params.get("arguments").cloned().unwrap_or(serde_json::Value::Object(Default::default()));

    match tools::call(ctx, &name, arguments).await {
        Ok(result) => Response::ok(
            id,
            serde_json::json!({
                "content": [{ "type": "text", "text": result.to_string() }],
            }),
        ),
        Err(error) => Response::err(id, error.rpc_code(), error.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::ChatEngine;
    use crate::chat_bridge::ChatBridge;
    use crate::config::Config;
    use crate::generator::Generator;
    use crate::project_supervisor::ProjectSupervisor;
    use crate::schema_store::SchemaStore;
    use crate::view_store::ViewStore;
    use std::sync::Arc;

    async fn test_context() -> RpcContext {
        let view_store = Arc::new(ViewStore::new());
        let engine = Arc::new(ChatEngine::new(view_store.clone(), None, 512, std::time::Duration::from_secs(5)));
        let bridge = ChatBridge::spawn(engine);
        let dir = tempfile::tempdir().unwrap();
        let schemas = Arc::new(SchemaStore::new(dir.path()));
        schemas.init().await.unwrap();
        RpcContext {
            view_store,
            chat: bridge.handle(),
            schemas,
            generator: Arc::new(Generator::new().unwrap()),
            supervisor: Arc::new(ProjectSupervisor::new()),
            config: Config {
                data_dir: dir.path().to_path_buf(),
                ws: crate::config::WsConfig::default(),
                editor_port: 5173,
                llm: crate::config::LlmConfig::default(),
                stub: crate::config::StubConfig::default(),
                metrics: crate::config::MetricsConfig::default(),
            },
        }
    }

    #[tokio::test]
    async fn initialize_then_tools_list_round_trips() {
        let ctx = test_context().await;
        let mut initialized = false;
        let init = handle_line(&ctx, r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#, &mut initialized)
            .await
            .unwrap();
        assert!(init.error.is_none());

        let list = handle_line(&ctx, r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#, &mut initialized)
            .await
            .unwrap();
        let tools = list.result.unwrap();
        assert_eq!(tools["tools"].as_array().unwrap().len(), 7);
    }

    #[tokio::test]
    async fn initialized_notification_gets_no_response() {
        let ctx = test_context().await;
        let mut initialized = false;
        let response = handle_line(&ctx, r#"{"jsonrpc":"2.0","method":"initialized"}"#, &mut initialized).await;
        assert!(response.is_none());
    }

    #[tokio::test]
    async fn unknown_method_with_id_returns_method_not_found() {
        let ctx = test_context().await;
        let mut initialized = false;
        let response = handle_line(&ctx, r#"{"jsonrpc":"2.0","id":3,"method":"bogus"}"#, &mut initialized)
            .await
            .unwrap();
        assert_eq!(response.error.unwrap().code, METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_json_returns_parse_error() {
        let ctx = test_context().await;
        let mut initialized = false;
        let response = handle_line(&ctx, "not json", &mut initialized).await.unwrap();
        assert_eq!(response.error.unwrap().code, PARSE_ERROR);
    }

    #[tokio::test]
    async fn chat_send_tool_call_returns_content() {
        let ctx = test_context().await;
        let mut initialized = false;
        let call = serde_json::json!({
            "jsonrpc": "2.0", "id": 4, "method": "tools/call",
            "params": { "name": "chat_send", "arguments": { "message": "help" } },
        });
        let response = handle_line(&ctx, &call.to_string(), &mut initialized).await.unwrap();
        assert!(response.result.is_some());
    }
}
