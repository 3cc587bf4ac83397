//! Small graphs used across the test suites.

use flowsmith_core::graph::{Edge, Node, WorkflowGraph};
use flowsmith_core::types::{InputKind, NodeKind, OutputKind, TransformKind};

/// `a(text input) -> b(summarize) -> c(markdown output)`.
pub fn linear_pipeline() -> WorkflowGraph {
    WorkflowGraph::from_parts(
        vec![
            Node::new("a", NodeKind::Input(InputKind::Text)).with_label("Brief"),
            Node::new("b", NodeKind::AiTransform(TransformKind::Summarize)).with_label("Summary"),
            Node::new("c", NodeKind::Output(OutputKind::Markdown)).with_label("Report"),
        ],
        vec![Edge::between("a", "b"), Edge::between("b", "c")],
    )
}

/// `a(text input), b(file upload) -> c(analyze)`.
pub fn fan_in() -> WorkflowGraph {
    WorkflowGraph::from_parts(
        vec![
            Node::new("a", NodeKind::Input(InputKind::Text)).with_label("Question"),
            Node::new("b", NodeKind::Input(InputKind::File)).with_label("Documents"),
            Node::new("c", NodeKind::AiTransform(TransformKind::Analyze)).with_label("Analysis"),
        ],
        vec![Edge::between("a", "c"), Edge::between("b", "c")],
    )
}
