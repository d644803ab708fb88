//! Configuration loading and validation.

use crate::error::{ConfigError, Result};
use anyhow::Context as _;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// ViberCode configuration, assembled once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Data directory: SchemaStore documents and default generated-project roots.
    pub data_dir: PathBuf,

    /// WebSocket hub settings.
    pub ws: WsConfig,

    /// Editor dev-server port, recorded for display only (external collaborator).
    pub editor_port: u16,

    /// LLM backend configuration.
    pub llm: LlmConfig,

    /// Stub-mode toggles for optional external backends.
    pub stub: StubConfig,

    /// Metrics HTTP endpoint, present only when configured and the `metrics`
    /// feature is compiled in.
    pub metrics: MetricsConfig,
}

/// WebSocket hub configuration.
#[derive(Debug, Clone, Copy)]
pub struct WsConfig {
    pub port: u16,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self { port: 3001 }
    }
}

/// LLM backend configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Anthropic API key. Its absence selects the heuristic responder.
    pub anthropic_api_key: Option<String>,

    /// Hard timeout for a single `Complete` call, per spec §4.3/§5.
    pub timeout_secs: u64,

    /// Max tokens requested per completion.
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            anthropic_api_key: None,
            timeout_secs: 30,
            max_tokens: 1024,
        }
    }
}

/// Stub-mode toggles for optional vector/graph backends (§6.5).
#[derive(Debug, Clone, Copy, Default)]
pub struct StubConfig {
    pub qdrant_enabled: bool,
    pub neo4j_enabled: bool,
}

/// Metrics server configuration.
#[derive(Debug, Clone, Default)]
pub struct MetricsConfig {
    pub bind: Option<SocketAddr>,
}

/// Shape of an optional `VIBE_CONFIG` TOML file. Every field is optional;
/// environment variables always take precedence over values loaded here.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    data_dir: Option<PathBuf>,
    ws_port: Option<u16>,
    editor_port: Option<u16>,
    llm_timeout_secs: Option<u64>,
    llm_max_tokens: Option<u32>,
}

impl Config {
    /// Load configuration: defaults, then an optional TOML file named by
    /// `VIBE_CONFIG`, then environment variables (which always win).
    pub fn load() -> Result<Self> {
        let file = match std::env::var("VIBE_CONFIG") {
            Ok(path) => Some(Self::load_file(Path::new(&path))?),
            Err(_) => None,
        };

        let data_dir = std::env::var("VIBE_DATA_DIR")
            .ok()
            .map(PathBuf::from)
            .or_else(|| file.as_ref().and_then(|f| f.data_dir.clone()))
            .or_else(|| dirs::data_dir().map(|d| d.join("vibercode")))
            .unwrap_or_else(|| PathBuf::from("./data"));

        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;

        let ws_port = env_u16("VIBE_WS_PORT")?
            .or_else(|| file.as_ref().and_then(|f| f.ws_port))
            .unwrap_or(WsConfig::default().port);

        let editor_port = env_u16("VIBE_EDITOR_PORT")?
            .or_else(|| file.as_ref().and_then(|f| f.editor_port))
            .unwrap_or(5173);

        let llm = LlmConfig {
            anthropic_api_key: std::env::var("ANTHROPIC_API_KEY").ok(),
            timeout_secs: file
                .as_ref()
                .and_then(|f| f.llm_timeout_secs)
                .unwrap_or(LlmConfig::default().timeout_secs),
            max_tokens: file
                .as_ref()
                .and_then(|f| f.llm_max_tokens)
                .unwrap_or(LlmConfig::default().max_tokens),
        };

        let stub = StubConfig {
            qdrant_enabled: env_bool("QDRANT_ENABLED"),
            neo4j_enabled: env_bool("NEO4J_ENABLED"),
        };

        let metrics = MetricsConfig {
            bind: std::env::var("VIBE_METRICS_ADDR")
                .ok()
                .map(|addr| {
                    addr.parse()
                        .map_err(|error| ConfigError::Invalid(format!("invalid VIBE_METRICS_ADDR '{addr}': {error}")))
                })
                .transpose()?,
        };

        Ok(Self {
            data_dir,
            ws: WsConfig { port: ws_port },
            editor_port,
            llm,
            stub,
            metrics,
        })
    }

    fn load_file(path: &Path) -> Result<FileConfig> {
        let text = std::fs::read_to_string(path).map_err(|error| ConfigError::Load {
            path: path.display().to_string(),
            source: std::sync::Arc::new(error),
        })?;
        toml::from_str(&text)
            .map_err(|error| ConfigError::Invalid(format!("failed to parse {}: {error}", path.display())))
            .map_err(Into::into)
    }

    /// Directory the SchemaStore persists one JSON document per schema into.
    pub fn schema_dir(&self) -> PathBuf {
        self.data_dir.join("schemas")
    }

    /// Default root new generated projects are written under.
    pub fn projects_dir(&self) -> PathBuf {
        self.data_dir.join("projects")
    }
}

fn env_u16(name: &str) -> Result<Option<u16>> {
    match std::env::var(name) {
        Ok(value) => value
            .parse::<u16>()
            .map(Some)
            .map_err(|error| ConfigError::Invalid(format!("invalid {name} '{value}': {error}")).into()),
        Err(_) => Ok(None),
    }
}

fn env_bool(name: &str) -> bool {
    matches!(
        std::env::var(name).as_deref(),
        Ok("true") | Ok("1") | Ok("yes")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_bool_defaults_false_when_unset() {
        // SAFETY: test-only, single-threaded access to a var no other test touches.
        unsafe { std::env::remove_var("VIBERCODE_TEST_UNSET_FLAG") };
        assert!(!env_bool("VIBERCODE_TEST_UNSET_FLAG"));
    }

    #[test]
    fn env_u16_rejects_non_numeric() {
        unsafe { std::env::set_var("VIBERCODE_TEST_PORT", "not-a-number") };
        let result = env_u16("VIBERCODE_TEST_PORT");
        unsafe { std::env::remove_var("VIBERCODE_TEST_PORT") };
        assert!(result.is_err());
    }
}
