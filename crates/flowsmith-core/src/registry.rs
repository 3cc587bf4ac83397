//! Static node palette.
//!
//! Presentation details (icon handles, default labels) live here, keyed by
//! [`NodeKind`], and are looked up at render time. Nodes never carry them.

use crate::types::{InputKind, NodeKind, OutputKind, TransformKind};

/// Palette entry for a node kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeSpec {
    pub kind: NodeKind,
    pub default_label: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
}

const SPECS: [NodeSpec; 10] = [
    NodeSpec {
        kind: NodeKind::Input(InputKind::Text),
        default_label: "Text Input",
        description: "Free-form text provided at run time",
        icon: "type",
    },
    NodeSpec {
        kind: NodeKind::Input(InputKind::File),
        default_label: "File Upload",
        description: "One or more documents uploaded at run time",
        icon: "upload",
    },
    NodeSpec {
        kind: NodeKind::Input(InputKind::Form),
        default_label: "Form Input",
        description: "Structured fields filled in at run time",
        icon: "list-checks",
    },
    NodeSpec {
        kind: NodeKind::AiTransform(TransformKind::Summarize),
        default_label: "Summarize",
        description: "Condense upstream content",
        icon: "sparkles",
    },
    NodeSpec {
        kind: NodeKind::AiTransform(TransformKind::Analyze),
        default_label: "Analyze",
        description: "Examine upstream content against instructions",
        icon: "brain",
    },
    NodeSpec {
        kind: NodeKind::AiTransform(TransformKind::Extract),
        default_label: "Extract",
        description: "Pull structured fields out of upstream content",
        icon: "scan-text",
    },
    NodeSpec {
        kind: NodeKind::AiTransform(TransformKind::Custom),
        default_label: "Custom Prompt",
        description: "Apply free-text instructions to upstream content",
        icon: "wand",
    },
    NodeSpec {
        kind: NodeKind::Output(OutputKind::Document),
        default_label: "Document",
        description: "Render the result as a downloadable document",
        icon: "file-text",
    },
    NodeSpec {
        kind: NodeKind::Output(OutputKind::Markdown),
        default_label: "Markdown",
        description: "Render the result as markdown",
        icon: "file-code",
    },
    NodeSpec {
        kind: NodeKind::Output(OutputKind::Spreadsheet),
        default_label: "Spreadsheet",
        description: "Render the result as a spreadsheet",
        icon: "table",
    },
];

/// Palette entry for `kind`.
pub fn spec_for(kind: NodeKind) -> &'static NodeSpec {
    SPECS
        .iter()
        .find(|s| s.kind == kind)
        .unwrap_or(&SPECS[0])
}

/// Icon handle for `kind`.
pub fn icon_for(kind: NodeKind) -> &'static str {
    spec_for(kind).icon
}

/// All palette entries in display order.
pub fn palette() -> &'static [NodeSpec] {
    &SPECS
}
