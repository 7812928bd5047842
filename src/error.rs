use crate::session::Resource;
use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for the console.
///
/// Each subsystem defines its own error type. Library callers match on these
/// to decide how to recover; the binary and CLI glue use `anyhow::Result`
/// for ad-hoc context chains.
#[derive(Debug, Error)]
pub enum ConsoleError {
    // ── Backend transport ───────────────────────────────────────────────
    #[error("api: {0}")]
    Api(#[from] ApiError),

    // ── Session ─────────────────────────────────────────────────────────
    #[error("session: {0}")]
    Session(#[from] SessionError),

    // ── Policy lifecycle ────────────────────────────────────────────────
    #[error("policy: {0}")]
    Policy(#[from] PolicyError),

    // ── Workflow addressing ─────────────────────────────────────────────
    #[error("workflow: {0}")]
    Workflow(#[from] FormatViolation),

    // ── Deliberation composer ───────────────────────────────────────────
    #[error("deliberation: {0}")]
    Deliberation(#[from] ValidationError),

    // ── Config ──────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ConsoleError {
    /// The transport failure behind this error, if any.
    pub fn api(&self) -> Option<&ApiError> {
        match self {
            Self::Api(err) => Some(err),
            _ => None,
        }
    }
}

// ─── Backend transport errors ────────────────────────────────────────────────

/// A failed call to the backend collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// No response reached the caller (connect failure, timeout, ...).
    #[error("{message}")]
    Network { message: String },

    /// The backend answered with a success status but a body of the wrong
    /// shape.
    #[error("unexpected response body: {message}")]
    Decode { message: String },

    /// The backend answered with an error status.
    #[error("http {status} ({status_text})")]
    Http {
        status: u16,
        status_text: String,
        body: String,
    },
}

impl ApiError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    pub fn http(status: u16, status_text: impl Into<String>, body: impl Into<String>) -> Self {
        Self::Http {
            status,
            status_text: status_text.into(),
            body: body.into(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Network { .. } | Self::Decode { .. } => None,
            Self::Http { status, .. } => Some(*status),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }
}

// ─── Session errors ─────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("not authenticated for {0}")]
    NotAuthenticated(Resource),

    #[error("credential for {0} must not be empty")]
    EmptyCredential(Resource),
}

// ─── Policy lifecycle errors ────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("a draft is already open")]
    DraftAlreadyOpen,

    #[error("no draft is open")]
    NoDraft,

    #[error("draft needs both content and a version description")]
    IncompleteDraft,

    #[error("version {0} is not a committed version")]
    UnknownVersion(i64),

    #[error("no committed version is selected")]
    NothingSelected,

    #[error("policy content is not valid JSON: {0}")]
    InvalidContent(String),

    #[error("backend returned a malformed {what}: {message}")]
    Malformed { what: &'static str, message: String },
}

// ─── Workflow format violations ─────────────────────────────────────────────

/// The compiled workflow graph does not have the expected shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatViolation {
    #[error("edge {offset} in {scope} references unknown task {task} (table has {max})")]
    UnknownTask {
        scope: String,
        offset: usize,
        task: usize,
        max: usize,
    },

    #[error("edge {offset} in {scope} is a task node without a task index")]
    MissingTaskIndex { scope: String, offset: usize },

    #[error("compiled workflow is not valid: {0}")]
    Malformed(String),
}

// ─── Operator input errors ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no workflow has been compiled")]
    NoWorkflow,

    #[error("{0} request needs a task")]
    TaskRequired(&'static str),

    #[error("{0} request does not take a dataset")]
    DatasetNotAllowed(&'static str),

    #[error("{0} request needs a task or a dataset")]
    TaskOrDatasetRequired(&'static str),

    #[error("task index {index} is out of range ({len} tasks)")]
    UnknownTask { index: usize, len: usize },

    #[error("dataset id is not valid JSON: {0}")]
    InvalidDataset(String),
}

// ─── Config errors ──────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, ConsoleError>;
