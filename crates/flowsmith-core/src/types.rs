use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::FlowsmithError;

/// Unique, immutable node identifier.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    /// Fresh identifier for a node dropped onto the canvas.
    pub fn generate(kind: NodeKind) -> Self {
        let uuid = Uuid::new_v4().to_string();
        Self(format!("{}-{}", kind.as_str(), &uuid[..8]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Edge identifier.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(pub String);

impl EdgeId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EdgeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Canvas position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Broad node category shown in the palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Input,
    Ai,
    Output,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Input => "input",
            Self::Ai => "ai",
            Self::Output => "output",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputKind {
    Text,
    File,
    Form,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransformKind {
    Summarize,
    Analyze,
    Extract,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputKind {
    Document,
    Markdown,
    Spreadsheet,
}

/// What a node does, resolved once from its wire string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum NodeKind {
    Input(InputKind),
    AiTransform(TransformKind),
    Output(OutputKind),
}

impl NodeKind {
    pub const ALL: [NodeKind; 10] = [
        NodeKind::Input(InputKind::Text),
        NodeKind::Input(InputKind::File),
        NodeKind::Input(InputKind::Form),
        NodeKind::AiTransform(TransformKind::Summarize),
        NodeKind::AiTransform(TransformKind::Analyze),
        NodeKind::AiTransform(TransformKind::Extract),
        NodeKind::AiTransform(TransformKind::Custom),
        NodeKind::Output(OutputKind::Document),
        NodeKind::Output(OutputKind::Markdown),
        NodeKind::Output(OutputKind::Spreadsheet),
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Input(InputKind::Text) => "text-input",
            Self::Input(InputKind::File) => "file-upload",
            Self::Input(InputKind::Form) => "form-input",
            Self::AiTransform(TransformKind::Summarize) => "ai-summarize",
            Self::AiTransform(TransformKind::Analyze) => "ai-analyze",
            Self::AiTransform(TransformKind::Extract) => "ai-extract",
            Self::AiTransform(TransformKind::Custom) => "ai-custom",
            Self::Output(OutputKind::Document) => "document-output",
            Self::Output(OutputKind::Markdown) => "markdown-output",
            Self::Output(OutputKind::Spreadsheet) => "spreadsheet-output",
        }
    }

    /// Category a freshly created node of this kind belongs to.
    pub fn category(&self) -> Category {
        match self {
            Self::Input(_) => Category::Input,
            Self::AiTransform(_) => Category::Ai,
            Self::Output(_) => Category::Output,
        }
    }

    pub fn is_input(&self) -> bool {
        matches!(self, Self::Input(_))
    }
}

impl FromStr for NodeKind {
    type Err = FlowsmithError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| FlowsmithError::UnknownNodeKind(s.to_string()))
    }
}

impl TryFrom<String> for NodeKind {
    type Error = FlowsmithError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<NodeKind> for String {
    fn from(kind: NodeKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Generic pipeline stage reported while an execution runs.
///
/// Stage names are reused for every node, so they are not globally ordered
/// across an execution. `Complete` and `Error` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Reading,
    Analyzing,
    Summarizing,
    Generating,
    Complete,
    Error,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }

    /// Progress shown for a stage before any node has reported in.
    pub fn stage_progress(&self) -> f64 {
        match self {
            Self::Reading => 10.0,
            Self::Analyzing => 30.0,
            Self::Summarizing => 50.0,
            Self::Generating => 70.0,
            Self::Complete => 100.0,
            Self::Error => 0.0,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Reading => "reading",
            Self::Analyzing => "analyzing",
            Self::Summarizing => "summarizing",
            Self::Generating => "generating",
            Self::Complete => "complete",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// An uploaded file in transport form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRef {
    pub name: String,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub size: u64,
    /// Base64 payload.
    pub data: String,
}

/// Run-time inputs for one node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<FileRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_instructions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
}

impl NodeParams {
    /// True when the node carries non-empty data or at least one file.
    pub fn has_input(&self) -> bool {
        !self.files.is_empty() || self.data.as_ref().is_some_and(|d| !is_blank(d))
    }
}

fn is_blank(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => true,
        serde_json::Value::String(s) => s.trim().is_empty(),
        serde_json::Value::Array(a) => a.is_empty(),
        serde_json::Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

/// A produced file, either raw bytes or a base64 string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilePayload {
    Base64(String),
    Bytes(Vec<u8>),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markdown: Option<String>,
}

/// Final output of a successful execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<FilePayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ResultData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

impl ExecutionResult {
    /// Interpret a `done` payload. Plain strings become markdown.
    pub fn from_final_output(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(text) => Self::markdown(text.clone()),
            serde_json::Value::Object(map) => match serde_json::from_value::<Self>(value.clone()) {
                Ok(result) if result != Self::default() || map.is_empty() => result,
                _ => Self::markdown(value.to_string()),
            },
            serde_json::Value::Null => Self::default(),
            other => Self::markdown(other.to_string()),
        }
    }

    pub fn markdown(text: impl Into<String>) -> Self {
        Self {
            data: Some(ResultData { markdown: Some(text.into()) }),
            ..Self::default()
        }
    }

    pub fn markdown_text(&self) -> Option<&str> {
        self.data.as_ref().and_then(|d| d.markdown.as_deref())
    }
}
