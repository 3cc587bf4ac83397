//! Template exchange format shared with the agent catalog.

use serde::{Deserialize, Serialize};

use crate::error::{FlowsmithError, Result};
use crate::graph::{Edge, Node, WorkflowGraph};
use crate::types::{Category, NodeId, NodeKind, Position};

/// A saved workflow as exchanged with the catalog service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    pub nodes: Vec<TemplateNode>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateNode {
    pub id: NodeId,
    pub kind: NodeKind,
    pub category: Category,
    pub data: TemplateNodeData,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateNodeData {
    pub label: String,
    #[serde(default)]
    pub config: serde_json::Map<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

/// Catalog metadata carried alongside a graph.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateMeta {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: String,
}

impl Template {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| match e.classify() {
            serde_json::error::Category::Data => FlowsmithError::Template(e.to_string()),
            _ => FlowsmithError::Json(e),
        })
    }

    /// Load a template file from disk.
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn meta(&self) -> TemplateMeta {
        TemplateMeta {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            category: self.category.clone(),
        }
    }

    /// Build the in-memory graph.
    pub fn to_graph(&self) -> WorkflowGraph {
        let nodes = self
            .nodes
            .iter()
            .map(|n| Node {
                id: n.id.clone(),
                kind: n.kind,
                category: n.category,
                position: n.position,
                label: n.data.label.clone(),
                description: n.data.description.clone(),
                config: n.data.config.clone(),
            })
            .collect();
        WorkflowGraph::from_parts(nodes, self.edges.clone())
    }

    /// Serialize a graph back into exchange form.
    pub fn from_graph(meta: TemplateMeta, graph: &WorkflowGraph) -> Self {
        let nodes = graph
            .nodes()
            .iter()
            .map(|n| TemplateNode {
                id: n.id.clone(),
                kind: n.kind,
                category: n.category,
                data: TemplateNodeData {
                    label: n.label.clone(),
                    config: n.config.clone(),
                    description: n.description.clone(),
                },
                position: n.position,
            })
            .collect();
        Self {
            id: meta.id,
            name: meta.name,
            description: meta.description,
            category: meta.category,
            nodes,
            edges: graph.edges().to_vec(),
        }
    }
}
