//! ViberCode: an interactive code-generation workbench combining a
//! multi-surface chat engine with a schema-driven project generator.

pub mod api;
pub mod chat;
pub mod chat_bridge;
pub mod config;
pub mod error;
pub mod generator;
pub mod llm_client;
pub mod logging;
pub mod project_supervisor;
pub mod prompt_builder;
pub mod rpc;
pub mod schema_store;
#[cfg(feature = "metrics")]
pub mod telemetry;
pub mod view_store;
pub mod ws_hub;

pub use error::{Error, Result};
