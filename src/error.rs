//! Crate-wide error taxonomy.

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error enum wrapping domain-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    ViewStore(#[from] ViewStoreError),

    #[error(transparent)]
    Chat(#[from] ChatError),

    #[error(transparent)]
    Ws(#[from] WsError),

    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error(transparent)]
    Generator(#[from] GeneratorError),

    #[error(transparent)]
    SchemaStore(#[from] SchemaStoreError),

    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// The externally-visible error kinds from the spec's §7 error handling design.
///
/// Every domain error below maps to exactly one of these via [`Error::kind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    Conflict,
    Unauthorized,
    Timeout,
    Upstream,
    Io,
    Internal,
}

impl Error {
    /// Classify this error into the externally-visible kind used to pick an
    /// HTTP status code or JSON-RPC error code range.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config(_) => ErrorKind::Internal,
            Error::ViewStore(e) => e.kind(),
            Error::Chat(e) => e.kind(),
            Error::Ws(e) => e.kind(),
            Error::Rpc(e) => e.kind(),
            Error::Generator(e) => e.kind(),
            Error::SchemaStore(e) => e.kind(),
            Error::Supervisor(e) => e.kind(),
            Error::Io(_) => ErrorKind::Io,
            Error::Json(_) => ErrorKind::InvalidInput,
            Error::Other(_) => ErrorKind::Internal,
        }
    }

    /// HTTP status code for this error, per §7's propagation policy.
    pub fn http_status(&self) -> u16 {
        match self.kind() {
            ErrorKind::InvalidInput => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::Unauthorized => 401,
            ErrorKind::Timeout => 408,
            ErrorKind::Upstream => 502,
            ErrorKind::Io | ErrorKind::Internal => 500,
        }
    }

    /// JSON-RPC error code for this error, in the tool-specific `-32000..-32099` range.
    pub fn rpc_code(&self) -> i64 {
        match self.kind() {
            ErrorKind::InvalidInput => -32000,
            ErrorKind::NotFound => -32001,
            ErrorKind::Conflict => -32002,
            ErrorKind::Unauthorized => -32003,
            ErrorKind::Timeout => -32004,
            ErrorKind::Upstream => -32005,
            ErrorKind::Io => -32006,
            ErrorKind::Internal => -32007,
        }
    }
}

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load config from {path}: {source}")]
    Load {
        path: String,
        source: std::sync::Arc<std::io::Error>,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// ViewStore mutation errors.
#[derive(Debug, thiserror::Error)]
pub enum ViewStoreError {
    #[error("mutation would violate a view-state invariant: {0}")]
    InvalidMutation(String),

    #[error("no component with id {0}")]
    UnknownComponentId(String),

    #[error("a component with id {0} already exists")]
    DuplicateComponentId(String),

    #[error("no free slot found for the new component after {0} candidate positions")]
    NoFreeSlot(usize),
}

impl ViewStoreError {
    fn kind(&self) -> ErrorKind {
        match self {
            ViewStoreError::InvalidMutation(_) => ErrorKind::InvalidInput,
            ViewStoreError::UnknownComponentId(_) => ErrorKind::NotFound,
            ViewStoreError::DuplicateComponentId(_) => ErrorKind::Conflict,
            ViewStoreError::NoFreeSlot(_) => ErrorKind::Internal,
        }
    }
}

/// ChatEngine / LLMClient errors.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("no LLM credentials configured")]
    AuthMissing,

    #[error("network error reaching the LLM backend: {0}")]
    Network(String),

    #[error("LLM backend rate-limited this request")]
    RateLimited,

    #[error("LLM backend returned a server error: {0}")]
    ServerError(String),

    #[error("LLM request timed out")]
    Timeout,
}

impl ChatError {
    fn kind(&self) -> ErrorKind {
        match self {
            ChatError::AuthMissing => ErrorKind::Unauthorized,
            ChatError::Network(_) | ChatError::ServerError(_) => ErrorKind::Upstream,
            ChatError::RateLimited => ErrorKind::Upstream,
            ChatError::Timeout => ErrorKind::Timeout,
        }
    }
}

/// WSHub errors.
#[derive(Debug, thiserror::Error)]
pub enum WsError {
    #[error("write to client {0} timed out")]
    WriteTimeout(String),

    #[error("client {0} is not registered")]
    UnknownClient(String),
}

impl WsError {
    fn kind(&self) -> ErrorKind {
        match self {
            WsError::WriteTimeout(_) => ErrorKind::Timeout,
            WsError::UnknownClient(_) => ErrorKind::NotFound,
        }
    }
}

/// JSON-RPC protocol errors (distinct from the JSON-RPC wire error codes,
/// which are derived from [`Error::rpc_code`] at the transport boundary).
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("failed to parse JSON-RPC message: {0}")]
    Parse(String),

    #[error("invalid JSON-RPC request: {0}")]
    InvalidRequest(String),

    #[error("unknown method: {0}")]
    MethodNotFound(String),

    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("unknown tool: {0}")]
    UnknownTool(String),
}

impl RpcError {
    fn kind(&self) -> ErrorKind {
        match self {
            RpcError::Parse(_) | RpcError::InvalidRequest(_) | RpcError::InvalidParams(_) => {
                ErrorKind::InvalidInput
            }
            RpcError::MethodNotFound(_) | RpcError::UnknownTool(_) => ErrorKind::NotFound,
        }
    }
}

/// Generator errors.
#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error("template error: {0}")]
    Template(String),

    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    #[error("generator IO error: {0}")]
    Io(String),
}

impl GeneratorError {
    fn kind(&self) -> ErrorKind {
        match self {
            GeneratorError::Template(_) => ErrorKind::Internal,
            GeneratorError::InvalidSchema(_) => ErrorKind::InvalidInput,
            GeneratorError::Io(_) => ErrorKind::Io,
        }
    }
}

/// SchemaStore errors.
#[derive(Debug, thiserror::Error)]
pub enum SchemaStoreError {
    #[error("schema {0} already exists")]
    Conflict(String),

    #[error("schema {0} not found")]
    NotFound(String),

    #[error("schema store IO error: {0}")]
    Io(String),
}

impl SchemaStoreError {
    fn kind(&self) -> ErrorKind {
        match self {
            SchemaStoreError::Conflict(_) => ErrorKind::Conflict,
            SchemaStoreError::NotFound(_) => ErrorKind::NotFound,
            SchemaStoreError::Io(_) => ErrorKind::Io,
        }
    }
}

/// ProjectSupervisor errors.
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("project {0} is already running")]
    AlreadyRunning(String),

    #[error("project {0} is not known")]
    UnknownProject(String),

    #[error("build failed for project {0}: {1}")]
    BuildFailed(String, String),

    #[error("failed to spawn project {0}: {1}")]
    SpawnFailed(String, String),
}

impl SupervisorError {
    fn kind(&self) -> ErrorKind {
        match self {
            SupervisorError::AlreadyRunning(_) => ErrorKind::Conflict,
            SupervisorError::UnknownProject(_) => ErrorKind::NotFound,
            SupervisorError::BuildFailed(..) | SupervisorError::SpawnFailed(..) => {
                ErrorKind::Upstream
            }
        }
    }
}
