//! ViberCode CLI entry point.

use clap::{Parser, Subcommand};

use vibercode::chat::{ChatEngine, ChatMessage, Origin};
use vibercode::chat_bridge::ChatBridge;
use vibercode::config::Config;
use vibercode::error::{Error, ErrorKind};
use vibercode::generator::{ComponentKind, Generator};
use vibercode::llm_client::LlmClient;
use vibercode::project_supervisor::{ProjectSupervisor, RunOptions};
use vibercode::rpc::tools::RpcContext;
use vibercode::schema_store::{DbProvider, Field, FieldKind, Schema, SchemaStore};
use vibercode::view_store::ViewStore;
use vibercode::ws_hub::WsHub;

use std::collections::HashMap;
use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "vibercode", version)]
#[command(about = "An interactive code-generation workbench: chat-driven UI editing plus schema-driven project scaffolding")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to a TOML config file (overridden by VIBE_CONFIG)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging to a daily-rolling file under the data directory
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Start the WebSocket server for the browser editor surface
    Serve,
    /// Alias for `serve`
    Ws,
    /// Run the JSON-RPC agent surface over stdio
    Mcp,
    /// Drive the chat engine from the terminal
    Vibe {
        /// Restrict the session to one component id (unused today, reserved
        /// for a future scoped chat mode)
        component: Option<String>,
    },
    /// Render project or component scaffolding
    Generate {
        #[command(subcommand)]
        kind: GenerateKind,
    },
    /// Manage schema descriptors
    Schema {
        #[command(subcommand)]
        action: SchemaAction,
    },
    /// Build and launch a generated project
    Run {
        /// Name the project was registered under
        project: String,
    },
}

#[derive(Subcommand)]
enum GenerateKind {
    /// Render a full project tree from a schema
    Resource {
        schema: String,
        #[arg(long)]
        project_name: String,
        #[arg(long)]
        output: PathBuf,
    },
    /// Render one handler module for a schema into an existing project
    Api {
        schema: String,
        #[arg(long)]
        project_name: String,
        #[arg(long)]
        output: PathBuf,
    },
    /// Render a logging middleware module into an existing project
    Middleware {
        #[arg(long)]
        project_name: String,
        #[arg(long)]
        output: PathBuf,
    },
    /// Render an integration test scaffold for a schema
    Test {
        schema: String,
        #[arg(long)]
        project_name: String,
        #[arg(long)]
        output: PathBuf,
    },
    /// Render a Dockerfile into an existing project
    Deployment {
        #[arg(long)]
        project_name: String,
        #[arg(long)]
        output: PathBuf,
    },
    /// Render a plugin scaffold into an existing project
    Plugin {
        #[arg(long)]
        project_name: String,
        #[arg(long)]
        output: PathBuf,
    },
}

#[derive(Subcommand)]
enum SchemaAction {
    /// Create a new schema descriptor with a single required `id` field.
    /// Further fields are added by hand-editing the JSON document or via an
    /// agent's `schema_update` tool call.
    Generate {
        name: String,
        #[arg(short = 'm', long)]
        module: String,
        #[arg(short = 'd', long, value_enum)]
        db: DbProvider,
    },
    /// List known schema descriptors
    List,
    /// Print one schema descriptor as JSON
    Show { id: String },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        // SAFETY: single-threaded at this point, before the Tokio runtime
        // spawns any worker that might also touch the environment.
        unsafe { std::env::set_var("VIBE_CONFIG", path) };
    }

    let config = match Config::load() {
        Ok(config) => config,
        Err(error) => {
            eprintln!("failed to load configuration: {error}");
            std::process::exit(exit_code_for(&error));
        }
    };

    let _log_guard = vibercode::logging::init(cli.debug, &config.data_dir);

    match run(cli.command, config).await {
        Ok(()) => std::process::exit(0),
        Err(error) => {
            tracing::error!(%error, "command failed");
            eprintln!("error: {error}");
            std::process::exit(exit_code_for(&error));
        }
    }
}

/// Maps an [`Error`]'s externally-visible kind to the process exit codes the
/// CLI documents: 0 success, 1 general error, 2 bad args, 3 FS error, 4 DB
/// error, 5 template error.
fn exit_code_for(error: &Error) -> i32 {
    match error {
        Error::Generator(vibercode::error::GeneratorError::Template(_)) => 5,
        Error::SchemaStore(_) => 4,
        Error::Io(_) | Error::Generator(vibercode::error::GeneratorError::Io(_)) => 3,
        _ => match error.kind() {
            ErrorKind::InvalidInput => 2,
            _ => 1,
        },
    }
}

async fn run(command: Command, config: Config) -> vibercode::error::Result<()> {
    match command {
        Command::Serve | Command::Ws => cmd_serve(config).await,
        Command::Mcp => cmd_mcp(config).await,
        Command::Vibe { component } => cmd_vibe(config, component).await,
        Command::Generate { kind } => cmd_generate(config, kind).await,
        Command::Schema { action } => cmd_schema(config, action).await,
        Command::Run { project } => cmd_run(config, project).await,
    }
}

fn build_chat_bridge(view_store: Arc<ViewStore>, ws_hub: Arc<WsHub>, config: &Config) -> ChatBridge {
    let llm = LlmClient::from_api_key(config.llm.anthropic_api_key.clone());
    let engine = Arc::new(ChatEngine::new(
        view_store,
        llm,
        config.llm.max_tokens,
        std::time::Duration::from_secs(config.llm.timeout_secs),
    ));
    ChatBridge::spawn(engine, ws_hub)
}

async fn cmd_serve(config: Config) -> vibercode::error::Result<()> {
    let view_store = Arc::new(ViewStore::new());
    let ws_hub = Arc::new(WsHub::new());
    let bridge = build_chat_bridge(view_store.clone(), ws_hub.clone(), &config);

    let view_updates_handle = spawn_view_update_broadcaster(view_store.clone(), ws_hub.clone());

    let state = vibercode::api::ApiState {
        view_store,
        chat: bridge.handle(),
        ws_hub,
        config: config.clone(),
    };

    let bind = std::net::SocketAddr::from(([0, 0, 0, 0], config.ws.port));
    let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    #[cfg(feature = "metrics")]
    let _metrics_handle = vibercode::telemetry::start_metrics_server(&config.metrics, shutdown_rx.clone())
        .await
        .map_err(vibercode::error::ConfigError::Other)?;

    let handle = vibercode::api::start_ws_server(bind, state, shutdown_rx)
        .await
        .map_err(vibercode::error::ConfigError::Other)?;

    tracing::info!(port = config.ws.port, "vibercode websocket server ready");
    let _ = handle.await;
    view_updates_handle.abort();
    bridge.shutdown().await;
    Ok(())
}

/// Drains the ViewStore's change feed and mirrors every committed mutation to
/// every connected WS client as a `view_state_update` envelope (spec §4.6/§6.1).
fn spawn_view_update_broadcaster(view_store: Arc<ViewStore>, ws_hub: Arc<WsHub>) -> tokio::task::JoinHandle<()> {
    let mut changes = view_store.subscribe();
    tokio::spawn(async move {
        loop {
            match changes.recv().await {
                Ok(change_set) => {
                    let envelope = vibercode::ws_hub::Envelope::new(
                        "view_state_update",
                        serde_json::to_value(&change_set).unwrap_or(serde_json::Value::Null),
                    );
                    ws_hub.broadcast(&envelope).await;
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "view update broadcaster lagged, some mutations were not mirrored");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

async fn cmd_mcp(config: Config) -> vibercode::error::Result<()> {
    let view_store = Arc::new(ViewStore::new());
    let ws_hub = Arc::new(WsHub::new());
    let bridge = build_chat_bridge(view_store.clone(), ws_hub, &config);

    let schemas = Arc::new(SchemaStore::new(config.schema_dir()));
    schemas.init().await?;

    let ctx = RpcContext {
        view_store,
        chat: bridge.handle(),
        schemas,
        generator: Arc::new(Generator::new()?),
        supervisor: Arc::new(ProjectSupervisor::new()),
        config,
    };

    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();
    vibercode::rpc::serve(ctx, stdin, stdout).await;
    bridge.shutdown().await;
    Ok(())
}

/// Terminal chat REPL: reads lines from stdin, submits them to the bridge as
/// if they'd arrived over the terminal surface, prints each reply.
async fn cmd_vibe(config: Config, component: Option<String>) -> vibercode::error::Result<()> {
    let view_store = Arc::new(ViewStore::new());
    let bridge = build_chat_bridge(view_store, Arc::new(WsHub::new()), &config);
    let handle = bridge.handle();

    if let Some(component) = &component {
        println!("(scoped to component {component}, though scoping isn't enforced yet)");
    }
    println!("vibercode chat — type a message and press enter, Ctrl-D to quit");

    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush().ok();
        let mut line = String::new();
        if stdin.read_line(&mut line).unwrap_or(0) == 0 {
            break;
        }
        let content = line.trim();
        if content.is_empty() {
            continue;
        }

        let message = ChatMessage {
            id: 0,
            role: "user".into(),
            content: content.to_string(),
            origin: Origin::Terminal,
            timestamp: chrono::Utc::now(),
            meta: Default::default(),
        };

        match handle.submit(message).await {
            Some(rx) => match rx.await {
                Ok(response) => println!("{}", response.content),
                Err(_) => println!("(no reply — the chat engine dropped the request)"),
            },
            None => println!("(too busy right now, try again)"),
        }
    }

    bridge.shutdown().await;
    Ok(())
}

async fn cmd_generate(config: Config, kind: GenerateKind) -> vibercode::error::Result<()> {
    let generator = Generator::new()?;
    let schemas = SchemaStore::new(config.schema_dir());
    schemas.init().await?;

    let manifest = match kind {
        GenerateKind::Resource { schema, project_name, output } => {
            let schema = schemas.load(&schema).await?;
            generator.generate(&schema, &project_name, &output).await?
        }
        GenerateKind::Api { schema, project_name, output } => {
            let schema = schemas.load(&schema).await?;
            generator
                .generate_component(ComponentKind::Api, Some(&schema), &project_name, &output)
                .await?
        }
        GenerateKind::Test { schema, project_name, output } => {
            let schema = schemas.load(&schema).await?;
            generator
                .generate_component(ComponentKind::Test, Some(&schema), &project_name, &output)
                .await?
        }
        GenerateKind::Middleware { project_name, output } => {
            generator
                .generate_component(ComponentKind::Middleware, None, &project_name, &output)
                .await?
        }
        GenerateKind::Deployment { project_name, output } => {
            generator
                .generate_component(ComponentKind::Deployment, None, &project_name, &output)
                .await?
        }
        GenerateKind::Plugin { project_name, output } => {
            generator
                .generate_component(ComponentKind::Plugin, None, &project_name, &output)
                .await?
        }
    };

    for entry in &manifest {
        println!("{}", entry.path);
    }
    tracing::info!(files = manifest.len(), "generation complete");
    Ok(())
}

async fn cmd_schema(config: Config, action: SchemaAction) -> vibercode::error::Result<()> {
    let schemas = SchemaStore::new(config.schema_dir());
    schemas.init().await?;

    match action {
        SchemaAction::Generate { name, module, db } => {
            let now = chrono::Utc::now();
            let id = slugify(&name);
            let schema = Schema {
                id: id.clone(),
                name,
                description: String::new(),
                module_path: module,
                db_provider: db,
                fields: vec![Field {
                    name: "id".into(),
                    display_name: "ID".into(),
                    kind: FieldKind::Uuid,
                    required: true,
                    unique: true,
                    enum_values: vec![],
                    relation_target: None,
                    validation_rules: vec![],
                }],
                created_at: now,
                updated_at: now,
            };
            let created = schemas.create(schema).await?;
            println!("created schema '{}' ({})", created.name, created.id);
        }
        SchemaAction::List => {
            for schema in schemas.list().await? {
                println!("{}\t{}\t{} field(s)", schema.id, schema.name, schema.fields.len());
            }
        }
        SchemaAction::Show { id } => {
            let schema = schemas.load(&id).await?;
            println!("{}", serde_json::to_string_pretty(&schema)?);
        }
    }
    Ok(())
}

async fn cmd_run(config: Config, project: String) -> vibercode::error::Result<()> {
    let supervisor = ProjectSupervisor::new();
    let output_path = config.projects_dir().join(&project);
    supervisor.register(&project, &project, output_path).await;

    let handle = supervisor
        .run(
            &project,
            RunOptions {
                port: None,
                env: HashMap::new(),
                build_first: true,
            },
        )
        .await?;

    println!("{}", serde_json::to_string_pretty(&handle)?);
    Ok(())
}

fn slugify(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}
