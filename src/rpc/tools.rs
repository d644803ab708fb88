//! The fixed JSON-RPC tool set (spec §4.7/§6.3): schemas plus dispatch.

use crate::chat::{ChatMessage, Origin};
use crate::chat_bridge::ChatBridgeHandle;
use crate::config::Config;
use crate::error::{Error, GeneratorError, Result, RpcError, SchemaStoreError};
use crate::generator::Generator;
use crate::project_supervisor::{ProjectSupervisor, RunOptions};
use crate::schema_store::SchemaStore;
use crate::view_store::{ComponentPatch, Mutation, Position, Size, ViewState, ViewStore};

use schemars::JsonSchema;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Everything a tool call needs to reach the core's shared state.
pub struct RpcContext {
    pub view_store: Arc<ViewStore>,
    pub chat: ChatBridgeHandle,
    pub schemas: Arc<SchemaStore>,
    pub generator: Arc<Generator>,
    pub supervisor: Arc<ProjectSupervisor>,
    pub config: Config,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct VibeStartParams {
    pub mode: String,
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ComponentUpdateParams {
    #[serde(rename = "componentId")]
    pub component_id: String,
    pub action: String,
    pub properties: Option<serde_json::Map<String, serde_json::Value>>,
    pub position: Option<Position>,
    pub size: Option<Size>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct EmptyParams {}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ChatSendParams {
    pub message: String,
    pub mode: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GenerateCodeParams {
    pub project_name: String,
    pub database: String,
    #[serde(default)]
    pub features: Vec<String>,
    pub output_path: Option<String>,
}

/// One entry of `tools/list`'s result.
pub struct ToolDef {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: serde_json::Value,
}

pub fn tool_defs() -> Vec<ToolDef> {
    vec![
        ToolDef {
            name: "vibe_start",
            description: "Start a chat session in general or component mode",
            input_schema: schema_for::<VibeStartParams>(),
        },
        ToolDef {
            name: "component_update",
            description: "Add, update, or remove a component on the view",
            input_schema: schema_for::<ComponentUpdateParams>(),
        },
        ToolDef {
            name: "view_state_get",
            description: "Return the full current ViewState",
            input_schema: schema_for::<EmptyParams>(),
        },
        ToolDef {
            name: "view_state_set",
            description: "Replace the entire ViewState wholesale",
            input_schema: schema_for::<ViewState>(),
        },
        ToolDef {
            name: "chat_send",
            description: "Send a chat message and receive the engine's response",
            input_schema: schema_for::<ChatSendParams>(),
        },
        ToolDef {
            name: "generate_code",
            description: "Generate a backend project from a stored schema",
            input_schema: schema_for::<GenerateCodeParams>(),
        },
        ToolDef {
            name: "project_status",
            description: "Report the status of every generated project and the server listeners",
            input_schema: schema_for::<EmptyParams>(),
        },
    ]
}

fn schema_for<T: JsonSchema>() -> serde_json::Value {
    let schema = schemars::schema_for!(T);
    serde_json::to_value(schema).unwrap_or(serde_json::Value::Null)
}

/// Dispatch one `tools/call`. Returns the tool's JSON result on success.
pub async fn call(ctx: &RpcContext, name: &str, arguments: serde_json::Value) -> Result<serde_json::Value> {
    match name {
        "vibe_start" => {
            let params: VibeStartParams = parse_params(arguments)?;
            Ok(serde_json::json!({ "mode": params.mode, "port": params.port.unwrap_or(ctx.config.ws.port) }))
        }
        "component_update" => {
            let params: ComponentUpdateParams = parse_params(arguments)?;
            component_update(ctx, params).await
        }
        "view_state_get" => {
            let view = ctx.view_store.snapshot();
            serde_json::to_value(&view).map_err(Error::from)
        }
        "view_state_set" => {
            let view: ViewState = serde_json::from_value(arguments)
                .map_err(|error| RpcError::InvalidParams(error.to_string()))?;
            let (state, _) = ctx.view_store.apply(Mutation::ReplaceAll(view)).await?;
            serde_json::to_value(&state).map_err(Error::from)
        }
        "chat_send" => {
            let params: ChatSendParams = parse_params(arguments)?;
            chat_send(ctx, params).await
        }
        "generate_code" => {
            let params: GenerateCodeParams = parse_params(arguments)?;
            generate_code(ctx, params).await
        }
        "project_status" => {
            let projects = ctx.supervisor.list().await;
            Ok(serde_json::json!({
                "projects": projects,
                "servers": { "ws": true, "http": ctx.config.metrics.bind.is_some() },
            }))
        }
        other => Err(RpcError::UnknownTool(other.to_string()).into()),
    }
}

fn parse_params<T: for<'de> Deserialize<'de>>(value: serde_json::Value) -> Result<T> {
    serde_json::from_value(value).map_err(|error| RpcError::InvalidParams(error.to_string()).into())
}

async fn component_update(ctx: &RpcContext, params: ComponentUpdateParams) -> Result<serde_json::Value> {
    let mutation = match params.action.as_str() {
        "add" => {
            let position = params.position.unwrap_or(Position { x: 100, y: 100 });
            let size = params.size.unwrap_or(Size { w: 160, h: 40 });
            let component_type = crate::view_store::ComponentType::parse(
                params.component_id.split('_').next().unwrap_or(&params.component_id),
            )
            .ok_or_else(|| RpcError::InvalidParams(format!("'{}' has no recognizable component type prefix", params.component_id)))?;
            Mutation::AddComponent(crate::view_store::Component {
                id: params.component_id,
                component_type,
                category: crate::view_store::ComponentCategory::Atom,
                properties: params.properties.unwrap_or_default(),
                position,
                size,
            })
        }
        "update" => Mutation::UpdateComponent {
            id: params.component_id,
            patch: ComponentPatch {
                properties: params.properties,
                position: params.position,
                size: params.size,
            },
        },
        "remove" => Mutation::RemoveComponent { id: params.component_id },
        other => return Err(RpcError::InvalidParams(format!("unknown action '{other}'")).into()),
    };

    let (state, _) = ctx.view_store.apply(mutation).await?;
    serde_json::to_value(&state).map_err(Error::from)
}

async fn chat_send(ctx: &RpcContext, params: ChatSendParams) -> Result<serde_json::Value> {
    let message = ChatMessage {
        id: 0,
        role: "user".into(),
        content: params.message,
        origin: Origin::Agent,
        timestamp: chrono::Utc::now(),
        meta: Default::default(),
    };
    let rx = ctx
        .chat
        .submit(message)
        .await
        .ok_or_else(|| RpcError::InvalidRequest("chat queue is full".into()))?;
    let response = rx
        .await
        .map_err(|_| Error::Other(anyhow::anyhow!("chat engine dropped the reply channel")))?;
    serde_json::to_value(&response).map_err(Error::from)
}

async fn generate_code(ctx: &RpcContext, params: GenerateCodeParams) -> Result<serde_json::Value> {
    let schema = ctx
        .schemas
        .list()
        .await?
        .into_iter()
        .find(|s| s.name == params.project_name || s.id == params.project_name)
        .ok_or_else(|| SchemaStoreError::NotFound(params.project_name.clone()))?;

    if !crate::schema_store::is_safe_slug(&params.project_name) {
        return Err(GeneratorError::InvalidSchema(format!("'{}' is not a safe project name", params.project_name)).into());
    }

    let output_root = params
        .output_path
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|| ctx.config.projects_dir().join(&params.project_name));

    let manifest = ctx.generator.generate(&schema, &params.project_name, &output_root).await?;
    ctx.supervisor
        .register(&params.project_name, &schema.id, output_root.clone())
        .await;

    Ok(serde_json::json!({
        "manifest": manifest,
        "output_path": output_root.display().to_string(),
    }))
}

/// Wraps [`ProjectSupervisor::run`] with the `build_first`/`env`/`port` shape
/// `tools/call` exposes for projects already generated. Not itself a tool —
/// `generate_code` registers; `run` (CLI / future tool) launches.
pub async fn run_project(supervisor: &ProjectSupervisor, name: &str, env: HashMap<String, String>, port: Option<u16>, build_first: bool) -> Result<serde_json::Value> {
    let handle = supervisor.run(name, RunOptions { port, env, build_first }).await?;
    serde_json::to_value(&handle).map_err(Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_tool_has_a_non_null_schema() {
        for tool in tool_defs() {
            assert_ne!(tool.input_schema, serde_json::Value::Null, "{} has no schema", tool.name);
        }
    }

    #[test]
    fn tool_set_matches_the_spec_exactly() {
        let names: Vec<&str> = tool_defs().iter().map(|t| t.name).collect();
        assert_eq!(
            names,
            vec![
                "vibe_start",
                "component_update",
                "view_state_get",
                "view_state_set",
                "chat_send",
                "generate_code",
                "project_status",
            ]
        );
    }
}
