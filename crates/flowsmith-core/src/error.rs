use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::NodeId;

#[derive(Debug, Error)]
pub enum FlowsmithError {
    // Pre-execution validation
    #[error("Missing required inputs: {0}")]
    Validation(ValidationFailure),

    #[error("Workflow contains a dependency cycle: {}", format_path(.path))]
    Cycle { path: Vec<NodeId> },

    // Graph edits
    #[error("Graph error: {0}")]
    Graph(String),

    #[error("Unknown node kind: {0}")]
    UnknownNodeKind(String),

    #[error("Template error: {0}")]
    Template(String),

    // Execution gateway
    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Execution channel error: {0}")]
    Channel(String),

    #[error("An execution is already in flight")]
    ExecutionInFlight,

    #[error("Output decode error: {0}")]
    Decode(String),

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FlowsmithError>;

/// An input node that has neither data nor files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingInput {
    pub node_id: NodeId,
    pub label: String,
}

/// Every input node that blocks an execution from starting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationFailure {
    pub missing: Vec<MissingInput>,
}

impl ValidationFailure {
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty()
    }

    /// Labels of the offending nodes, in graph order.
    pub fn labels(&self) -> Vec<&str> {
        self.missing.iter().map(|m| m.label.as_str()).collect()
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.labels().join(", "))
    }
}

fn format_path(path: &[NodeId]) -> String {
    path.iter()
        .map(|id| id.as_str())
        .collect::<Vec<_>>()
        .join(" -> ")
}
