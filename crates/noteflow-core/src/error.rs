use thiserror::Error;

use crate::state::StateField;

/// A misconfigured workflow graph.
///
/// Raised by `WorkflowDefinition::validate` before any run starts. This is
/// the only error class that is fatal to a run; everything that happens
/// after validation is recorded as data on the state instead.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GraphConfigError {
    #[error("duplicate node name: {0}")]
    DuplicateNode(String),

    #[error("edge references unknown node: {0}")]
    UnknownNode(String),

    #[error("workflow has no entry node (every node has a predecessor)")]
    NoEntry,

    #[error("workflow has multiple entry nodes: {}", .0.join(", "))]
    MultipleEntries(Vec<String>),

    #[error("workflow contains a cycle through: {}", .0.join(", "))]
    Cycle(Vec<String>),

    #[error("node {0} is unreachable from the entry node")]
    Unreachable(String),

    #[error("nodes {first} and {second} both write state field {field}")]
    DuplicateWriter {
        field: StateField,
        first: String,
        second: String,
    },

    #[error("node {node} declares a write to read-only field {field}")]
    ReadOnlyWrite { node: String, field: StateField },

    #[error("workflow declares no finish nodes")]
    NoFinishNodes,

    #[error("finish node {0} is not part of the workflow")]
    UnknownFinishNode(String),
}

/// Error class of a failed language-model call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelErrorKind {
    Timeout,
    QuotaExceeded,
    MalformedResponse,
    Transport,
}

impl std::fmt::Display for ModelErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Timeout => "timeout",
            Self::QuotaExceeded => "quota exceeded",
            Self::MalformedResponse => "malformed response",
            Self::Transport => "transport error",
        };
        write!(f, "{}", s)
    }
}

/// A classified failure from the external text-generation capability.
#[derive(Debug, Error, Clone)]
#[error("{kind}: {message}")]
pub struct ModelError {
    pub kind: ModelErrorKind,
    pub message: String,
    /// Unparseable payload, kept for malformed responses so callers can
    /// fall back to the raw text.
    pub raw: Option<String>,
}

impl ModelError {
    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            kind: ModelErrorKind::Timeout,
            message: message.into(),
            raw: None,
        }
    }

    pub fn quota_exceeded(message: impl Into<String>) -> Self {
        Self {
            kind: ModelErrorKind::QuotaExceeded,
            message: message.into(),
            raw: None,
        }
    }

    pub fn malformed(message: impl Into<String>, raw: impl Into<String>) -> Self {
        Self {
            kind: ModelErrorKind::MalformedResponse,
            message: message.into(),
            raw: Some(raw.into()),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            kind: ModelErrorKind::Transport,
            message: message.into(),
            raw: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum NoteflowError {
    // Graph errors
    #[error(transparent)]
    Graph(#[from] GraphConfigError),

    // Model errors
    #[error(transparent)]
    Model(#[from] ModelError),

    // Stage errors
    #[error("required input {0} is unavailable")]
    MissingInput(StateField),

    /// One non-fatal node failure, as recorded in `errors` and on the
    /// node's result.
    #[error("{node} failed: {message}")]
    NodeExecution { node: String, message: String },

    #[error("unknown stage: {0}")]
    UnknownStage(String),

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),
}

pub type Result<T> = std::result::Result<T, NoteflowError>;
